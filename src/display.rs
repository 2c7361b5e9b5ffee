//! Colored terminal output for the advisor CLI.

use std::io::{self, Write};

use chrono::Utc;
use owo_colors::OwoColorize;

use crate::catalog::CourseCode;
use crate::compose::AdvisorResponse;
use crate::graph::{IntegrityReport, Requirement, Roadmap};
use crate::router::{AttemptOutcome, Tier};
use crate::safety::{CircuitStatus, SafetyReport};

/// Get current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Truncate a string to a maximum length, adding ellipsis if truncated.
#[must_use]
pub fn truncate(s: &str, max_len: usize, raw_mode: bool) -> String {
    if raw_mode || s.chars().count() <= max_len {
        return s.to_string();
    }
    if max_len <= 3 {
        return "...".to_string();
    }
    let kept: String = s.chars().take(max_len - 3).collect();
    format!("{kept}...")
}

/// Bracketed label for the tier that answered.
#[must_use]
pub fn tier_tag(tier: Option<Tier>) -> &'static str {
    match tier {
        Some(Tier::Structured) => "[STRUCTURED]",
        Some(Tier::RuleBased) => "[RULE]",
        Some(Tier::Escalation) => "[ESCALATION]",
        None => "[ERROR]",
    }
}

fn colored_tag(tier: Option<Tier>) -> String {
    let tag = tier_tag(tier);
    match tier {
        Some(Tier::Structured) => tag.green().bold().to_string(),
        Some(Tier::RuleBased) => tag.cyan().bold().to_string(),
        Some(Tier::Escalation) => tag.yellow().bold().to_string(),
        None => tag.red().bold().to_string(),
    }
}

fn status_label(status: CircuitStatus) -> String {
    match status {
        CircuitStatus::Closed => "closed".green().to_string(),
        CircuitStatus::Open => "open".red().to_string(),
        CircuitStatus::HalfOpen => "half-open".yellow().to_string(),
    }
}

/// Print an answer with its tier tag and routing summary.
pub fn print_answer(response: &AdvisorResponse, verbose: bool) {
    println!(
        "{} {} kind={} confidence={:.2} ({}ms){}",
        timestamp().dimmed(),
        colored_tag(response.tier),
        response.kind,
        response.confidence,
        response.elapsed_ms,
        if response.degraded {
            format!(" {}", "degraded".yellow())
        } else {
            String::new()
        }
    );
    println!("{}", response.answer);

    if verbose {
        println!("  {}", truncate(&response.rationale, 120, false).dimmed());
        for attempt in &response.attempts {
            let outcome = match attempt.outcome {
                AttemptOutcome::Succeeded => "ok".green().to_string(),
                AttemptOutcome::FailedRetryable => "retryable".yellow().to_string(),
                AttemptOutcome::FailedTerminal => "failed".red().to_string(),
                AttemptOutcome::Skipped => "skipped".dimmed().to_string(),
            };
            println!(
                "  {} {} {} {}",
                attempt.tier.as_str().dimmed(),
                outcome,
                attempt.error.unwrap_or_default().dimmed(),
                format!("{}ms", attempt.elapsed_ms).dimmed()
            );
        }
    }
    let _ = io::stdout().flush();
}

/// Print direct requirements and the full prerequisite closure of a course.
pub fn print_prerequisites(course: &str, direct: &[Requirement], all: &[String]) {
    println!("{} {}", "[PREREQS]".blue().bold(), course.bold());
    if direct.is_empty() {
        println!("  {}", "none".dimmed());
    }
    for requirement in direct {
        println!("  {requirement}");
    }
    if !all.is_empty() {
        println!("  {} {}", "all:".dimmed(), all.join(", "));
    }
    let _ = io::stdout().flush();
}

/// Print a semester plan.
pub fn print_roadmap(roadmap: &Roadmap) {
    println!("{} {}", "[ROADMAP]".blue().bold(), roadmap.track.bold());
    for semester in &roadmap.semesters {
        let courses: Vec<&str> = semester.courses.iter().map(CourseCode::as_str).collect();
        println!("  {} {}", format!("Semester {}:", semester.number).cyan(), courses.join(", "));
    }
    if roadmap.semesters.is_empty() && roadmap.is_complete() {
        println!("  {}", "nothing left to plan".green());
    }
    if roadmap.electives_short > 0 {
        println!(
            "  {} {} elective(s) could not be planned",
            "[SHORT]".yellow().bold(),
            roadmap.electives_short
        );
    }
    for blocked in &roadmap.blocked {
        println!(
            "  {} {} - {}",
            "[BLOCKED]".red().bold(),
            blocked.course,
            blocked.error.to_string().dimmed()
        );
    }
    let _ = io::stdout().flush();
}

/// Print the graph integrity report.
pub fn print_integrity(report: &IntegrityReport) {
    let tag = if report.is_clean() {
        "[INTEGRITY]".green().bold().to_string()
    } else {
        "[INTEGRITY]".red().bold().to_string()
    };
    println!(
        "{} {} courses, {} edges, {} cycle(s), {} dangling edge(s)",
        tag,
        report.courses,
        report.edges,
        report.cycles.len(),
        report.dangling.len()
    );
    for cycle in &report.cycles {
        let path: Vec<&str> = cycle.iter().map(CourseCode::as_str).collect();
        println!("  {} {}", "cycle:".red(), path.join(" -> "));
    }
    for edge in &report.dangling {
        println!(
            "  {} {} -> {}",
            "dangling:".yellow(),
            edge.course,
            edge.required
        );
    }
    let _ = io::stdout().flush();
}

/// Print per-tier breaker health.
pub fn print_safety_report(report: &SafetyReport) {
    if report.escalation_only {
        println!("{} escalation-only mode", "[SAFETY]".yellow().bold());
    }
    for health in &report.tiers {
        println!(
            "{} {:<10} {} failures={} rate={:.2} trips={} budget={}ms",
            "[SAFETY]".magenta().bold(),
            health.tier.as_str(),
            status_label(health.status),
            health.consecutive_failures,
            health.failure_rate,
            health.trips,
            health.budget_ms
        );
    }
    let _ = io::stdout().flush();
}

/// Print AI provider status.
pub fn print_generator(provider: &str, model: &str, available: bool) {
    println!(
        "{} {} ({}) - {}",
        "[AI]".magenta().bold(),
        provider.cyan(),
        model.dimmed(),
        if available {
            "configured".green().to_string()
        } else {
            "unavailable".red().to_string()
        }
    );
    let _ = io::stdout().flush();
}

/// Print a success message.
pub fn print_ok(message: &str) {
    println!("{} {}", "[OK]".green().bold(), message);
    let _ = io::stdout().flush();
}

/// Print an error message.
pub fn print_error(message: &str) {
    eprintln!("{} {}", "[ERROR]".red().bold(), message);
    let _ = io::stderr().flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_string() {
        assert_eq!(truncate("hello", 10, false), "hello");
    }

    #[test]
    fn test_truncate_exact_length() {
        assert_eq!(truncate("hello", 5, false), "hello");
    }

    #[test]
    fn test_truncate_long_string() {
        assert_eq!(truncate("hello world", 8, false), "hello...");
    }

    #[test]
    fn test_truncate_very_short_max() {
        assert_eq!(truncate("hello", 3, false), "...");
        assert_eq!(truncate("hello", 0, false), "...");
    }

    #[test]
    fn test_truncate_raw_mode_no_truncation() {
        let long_string = "a".repeat(200);
        assert_eq!(truncate(&long_string, 10, true), long_string);
    }

    #[test]
    fn test_truncate_multibyte_boundary() {
        assert_eq!(truncate("ééééé", 4, false), "é...");
    }

    #[test]
    fn test_tier_tags() {
        assert_eq!(tier_tag(Some(Tier::Structured)), "[STRUCTURED]");
        assert_eq!(tier_tag(Some(Tier::RuleBased)), "[RULE]");
        assert_eq!(tier_tag(Some(Tier::Escalation)), "[ESCALATION]");
        assert_eq!(tier_tag(None), "[ERROR]");
    }
}
