//! Structured solution parsing.
//!
//! The solve prompt asks the model for a numbered reply: problem type, worked
//! steps, final answer, summary. Models follow that contract loosely, so the
//! parser is forgiving: headers match case-insensitively with or without their
//! list numbers, wrapped lines are folded into the entry above them, and a
//! reply with no recognizable structure becomes a single step.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Problem type reported when the reply does not name one.
pub const DEFAULT_PROBLEM_TYPE: &str = "General";

static PROBLEM_TYPE_LINE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:\d+\.\s*)?problem type:\s*(.*)$").ok());

static STEPS_HEADER_LINE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:\d+\.\s*)?steps:?\s*$").ok());

static STEP_LINE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:\d+\.\s*)?(?:steps:\s*)?step\s+\d+:\s*(.*)$").ok());

static FINAL_ANSWER_LINE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:\d+\.\s*)?final answer:\s*(.*)$").ok());

static SUMMARY_LINE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:\d+\.\s*)?summary:\s*(.*)$").ok());

/// A model reply to the solve prompt, broken into its parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedSolution {
    /// Classified problem type, e.g. "Derivative".
    pub problem_type: String,
    /// Ordered worked steps.
    pub steps: Vec<String>,
    /// Final answer, when the reply contained one.
    pub final_answer: Option<String>,
    /// Brief summary of the solution.
    pub summary: String,
}

/// Which entry subsequent unlabeled lines belong to.
enum Collecting {
    Nothing,
    Step,
    FinalAnswer,
    Summary,
}

/// Parses a model reply into a [`ParsedSolution`].
///
/// Never fails: a reply with no recognizable headers is returned as a single
/// step with the whole text as its summary.
///
/// # Examples
///
/// ```
/// use mathbuddy_clients::parse_solution;
///
/// let reply = "1. Problem type: Arithmetic\n\
///              2. Steps:\n\
///              Step 1: Add 2 and 2.\n\
///              3. Final answer: 4\n\
///              4. Summary: Simple addition.";
/// let solution = parse_solution(reply);
/// assert_eq!(solution.problem_type, "Arithmetic");
/// assert_eq!(solution.steps, vec!["Add 2 and 2.".to_string()]);
/// assert_eq!(solution.final_answer.as_deref(), Some("4"));
/// assert_eq!(solution.summary, "Simple addition.");
/// ```
#[must_use]
pub fn parse_solution(reply: &str) -> ParsedSolution {
    let mut problem_type = String::new();
    let mut steps: Vec<String> = Vec::new();
    let mut final_answer = String::new();
    let mut summary = String::new();
    let mut collecting = Collecting::Nothing;

    for line in reply.lines() {
        if let Some(text) = capture(&PROBLEM_TYPE_LINE, line) {
            problem_type = text.to_string();
            collecting = Collecting::Nothing;
        } else if matches_header(&STEPS_HEADER_LINE, line) {
            collecting = Collecting::Nothing;
        } else if let Some(text) = capture(&STEP_LINE, line) {
            steps.push(text.to_string());
            collecting = Collecting::Step;
        } else if let Some(text) = capture(&FINAL_ANSWER_LINE, line) {
            final_answer = text.to_string();
            collecting = Collecting::FinalAnswer;
        } else if let Some(text) = capture(&SUMMARY_LINE, line) {
            summary = text.to_string();
            collecting = Collecting::Summary;
        } else {
            let continuation = line.trim();
            if continuation.is_empty() {
                continue;
            }
            match collecting {
                Collecting::Nothing => {}
                Collecting::Step => {
                    if let Some(step) = steps.last_mut() {
                        fold_into(step, continuation);
                    }
                }
                Collecting::FinalAnswer => fold_into(&mut final_answer, continuation),
                Collecting::Summary => fold_into(&mut summary, continuation),
            }
        }
    }

    let trimmed_reply = reply.trim();
    if steps.is_empty() && !trimmed_reply.is_empty() {
        steps.push(trimmed_reply.to_string());
    }
    if problem_type.is_empty() {
        problem_type = DEFAULT_PROBLEM_TYPE.to_string();
    }
    let final_answer = if final_answer.is_empty() {
        None
    } else {
        Some(final_answer)
    };
    if summary.is_empty() {
        summary = final_answer
            .clone()
            .unwrap_or_else(|| trimmed_reply.to_string());
    }

    ParsedSolution {
        problem_type,
        steps,
        final_answer,
        summary,
    }
}

/// Runs a single-capture line regex, returning the trimmed capture.
fn capture<'a>(re: &Lazy<Option<Regex>>, line: &'a str) -> Option<&'a str> {
    let compiled = re.as_ref()?;
    let caps = compiled.captures(line)?;
    Some(caps.get(1)?.as_str().trim())
}

fn matches_header(re: &Lazy<Option<Regex>>, line: &str) -> bool {
    re.as_ref().is_some_and(|compiled| compiled.is_match(line))
}

/// Folds a wrapped line into the entry above it.
fn fold_into(entry: &mut String, continuation: &str) {
    if !entry.is_empty() {
        entry.push(' ');
    }
    entry.push_str(continuation);
}
