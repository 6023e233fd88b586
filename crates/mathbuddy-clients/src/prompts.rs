//! Prompt construction for the chat model.
//!
//! Builds the tutor persona prompt that frames every conversation and the
//! structured solve prompt whose reply format the parser understands. Keeping
//! the wording here, next to the parser, makes it harder for the two to drift
//! apart.

use std::fmt::Write;

/// System prompt for the structured problem solver.
pub const SOLVER_SYSTEM_PROMPT: &str =
    "You are a helpful math tutor specializing in clear, step-by-step solutions.";

/// Builds the tutor persona system prompt for a session.
///
/// The prompt pins the model to the session's current topic and difficulty.
/// When `prerequisites` is non-empty the model is told what the student has
/// already covered so it can build on it. When `report_progress` is set the
/// model is asked to append the machine-readable progress line that the
/// tracker's model-reported estimator understands.
#[must_use]
pub fn tutor_system_prompt(
    topic: &str,
    difficulty: u8,
    prerequisites: &[String],
    report_progress: bool,
) -> String {
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "You are MathBuddy, a friendly and encouraging math tutor."
    );
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "The student is currently working on: {topic}.");
    let _ = writeln!(
        prompt,
        "Difficulty level: {difficulty} out of 10. Match your explanations and any practice problems to this level."
    );
    if !prerequisites.is_empty() {
        let _ = writeln!(
            prompt,
            "The student has already covered: {}. Build on these without re-teaching them.",
            prerequisites.join(", ")
        );
    }
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "Guidelines:");
    let _ = writeln!(prompt, "- Explain one idea at a time, in plain language.");
    let _ = writeln!(
        prompt,
        "- Ask a guiding question instead of giving the answer away."
    );
    let _ = writeln!(
        prompt,
        "- Celebrate correct reasoning and gently correct mistakes."
    );
    if report_progress {
        let _ = writeln!(prompt);
        let _ = writeln!(
            prompt,
            "After your reply, on its own line, report your read of the student's progress in exactly this form:"
        );
        let _ = writeln!(prompt, "[progress topic=\"<topic name>\" difficulty=<1-10>]");
        let _ = writeln!(
            prompt,
            "Include the line only when your estimate differs from the current values."
        );
    }
    prompt
}

/// Builds the structured solve prompt for a math question.
///
/// The reply format requested here is what `parse_solution` expects, so the
/// steps can later be replayed one at a time.
#[must_use]
pub fn solve_prompt(question: &str) -> String {
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "Solve the following math problem and format your response exactly as:"
    );
    let _ = writeln!(prompt, "1. Problem type: [type of problem]");
    let _ = writeln!(prompt, "2. Steps:");
    let _ = writeln!(prompt, "Step 1: [first step]");
    let _ = writeln!(prompt, "Step 2: [second step]");
    let _ = writeln!(prompt, "(continue numbering steps as needed)");
    let _ = writeln!(prompt, "3. Final answer: [answer]");
    let _ = writeln!(prompt, "4. Summary: [brief summary of the solution]");
    let _ = writeln!(prompt);
    let _ = write!(prompt, "Problem: {question}");
    prompt
}
