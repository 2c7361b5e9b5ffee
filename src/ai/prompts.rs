//! Prompts for escalated advising questions.

/// System prompt for escalated questions.
pub const ADVISOR_SYSTEM_PROMPT: &str = r"You are an academic advisor for an undergraduate computer science program.

Answer the student's question using the catalog facts provided.

When answering:
1. Treat the listed facts as authoritative and do not contradict them.
2. If the facts do not cover the question, say so and suggest who to ask.
3. Keep the answer short and concrete; cite course codes exactly as given.

Never invent course numbers, prerequisites or policy values.
";

/// Format an escalated question together with its grounding facts.
#[must_use]
pub fn format_escalation_prompt(question: &str, facts: &[String]) -> String {
    if facts.is_empty() {
        return format!("Question: {question}\n\nNo catalog facts matched this question.");
    }

    let listed = facts
        .iter()
        .map(|fact| format!("- {fact}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!("Catalog facts:\n{listed}\n\nQuestion: {question}")
}
