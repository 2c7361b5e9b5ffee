//! Text generation for escalated questions.

mod client;
mod prompts;

pub use client::*;
pub use prompts::{format_escalation_prompt, ADVISOR_SYSTEM_PROMPT};
