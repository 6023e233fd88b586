//! Progress estimation policies.
//!
//! Prototypes of this system estimated topic and difficulty in two
//! incompatible ways: scanning the student's message for keywords, and
//! asking the model itself to report a judgment. Both strategies survive
//! here as implementations of [`ProgressEstimator`], selected by
//! configuration. Estimates are advisory: they nudge topic and difficulty
//! but never trigger promotion, which stays exclusive to graded outcomes.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ladder::{Ladder, MAX_DIFFICULTY, MIN_DIFFICULTY};

/// Phrases suggesting the student wants easier material.
static EASIER_CUES: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?i)\b(too hard|too difficult|don'?t understand|confused|i'?m lost|slow down|easier)\b")
        .ok()
});

/// Phrases suggesting the student wants harder material.
static HARDER_CUES: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)\b(too easy|harder|more difficult|challenge me|speed up)\b").ok());

/// Matches the whole `[progress ...]` marker line a tutor reply may end with.
static PROGRESS_MARKER: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?m)^\s*\[progress\b([^\]]*)\]\s*$").ok());

/// Extracts the quoted topic from marker attributes.
static MARKER_TOPIC: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r#"topic="([^"]+)""#).ok());

/// Extracts the difficulty number from marker attributes.
static MARKER_DIFFICULTY: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"difficulty=(\d+)").ok());

// ============================================================================
// ProgressEstimate
// ============================================================================

/// A best-effort suggestion for where a session's progress should move.
///
/// All fields are optional; an empty estimate leaves the session untouched.
/// Topic suggestions are validated against the ladder and difficulty
/// suggestions clamped into range when applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressEstimate {
    /// Suggested topic, if the exchange pointed at one.
    pub topic: Option<String>,

    /// Suggested difficulty, if the exchange pointed at one.
    pub difficulty: Option<u8>,

    /// Replacement reply text when the estimator strips machine-readable
    /// markers out of the model's reply. `None` leaves the reply as-is.
    pub cleaned_reply: Option<String>,
}

impl ProgressEstimate {
    /// Returns `true` when the estimate carries no suggestion at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.topic.is_none() && self.difficulty.is_none() && self.cleaned_reply.is_none()
    }
}

// ============================================================================
// ProgressEstimator
// ============================================================================

/// Strategy for deriving topic/difficulty adjustments from one exchange.
///
/// Implementations inspect the student's message and the tutor's reply and
/// return a [`ProgressEstimate`]. The tracker runs the estimator under the
/// session lock, so `current_difficulty` is the value the estimate will be
/// applied against.
pub trait ProgressEstimator: Send + Sync {
    /// Estimates progress adjustments for one completed exchange.
    fn estimate(
        &self,
        user_message: &str,
        assistant_reply: &str,
        current_difficulty: u8,
    ) -> ProgressEstimate;
}

// ============================================================================
// KeywordEstimator
// ============================================================================

/// Scans the student's message for topic and pacing keywords.
///
/// Topic keywords are built from the ladder itself: an entry matches when
/// its name or any of its subtopics appears in the message (whole-word,
/// case-insensitive). Pacing phrases such as "too hard" or "too easy"
/// nudge difficulty one step from its current value; conflicting cues
/// cancel out.
#[derive(Debug, Clone)]
pub struct KeywordEstimator {
    topics: Vec<(String, Regex)>,
}

impl KeywordEstimator {
    /// Builds matchers for every entry of `ladder`.
    #[must_use]
    pub fn new(ladder: &Ladder) -> Self {
        let mut topics = Vec::with_capacity(ladder.len());
        for entry in ladder.entries() {
            let keywords: Vec<String> = std::iter::once(entry.name.as_str())
                .chain(entry.subtopics.iter().map(String::as_str))
                .filter(|keyword| !keyword.trim().is_empty())
                .map(|keyword| regex::escape(&keyword.to_lowercase()))
                .collect();
            if keywords.is_empty() {
                continue;
            }
            let pattern = format!(r"(?i)\b(?:{})\b", keywords.join("|"));
            let Ok(matcher) = Regex::new(&pattern) else {
                tracing::debug!(topic = %entry.name, "skipping unmatchable topic keywords");
                continue;
            };
            topics.push((entry.name.clone(), matcher));
        }
        Self { topics }
    }
}

impl ProgressEstimator for KeywordEstimator {
    fn estimate(
        &self,
        user_message: &str,
        _assistant_reply: &str,
        current_difficulty: u8,
    ) -> ProgressEstimate {
        let topic = self
            .topics
            .iter()
            .find(|(_, matcher)| matcher.is_match(user_message))
            .map(|(name, _)| name.clone());

        let wants_easier = EASIER_CUES
            .as_ref()
            .is_some_and(|re| re.is_match(user_message));
        let wants_harder = HARDER_CUES
            .as_ref()
            .is_some_and(|re| re.is_match(user_message));
        let difficulty = match (wants_easier, wants_harder) {
            (true, false) => Some(current_difficulty.saturating_sub(1).max(MIN_DIFFICULTY)),
            (false, true) => Some(current_difficulty.saturating_add(1).min(MAX_DIFFICULTY)),
            // Conflicting or absent cues leave difficulty alone.
            _ => None,
        };

        ProgressEstimate {
            topic,
            difficulty,
            cleaned_reply: None,
        }
    }
}

// ============================================================================
// ModelReportedEstimator
// ============================================================================

/// Reads a structured progress marker out of the tutor's reply.
///
/// The tutor model is prompted to end replies with a line such as
/// `[progress topic="Algebra 1" difficulty=6]`. The marker is parsed for
/// suggestions and stripped from the text shown to the student. Replies
/// without a marker produce an empty estimate, which is fine: the marker
/// is a request, not a contract.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelReportedEstimator;

impl ModelReportedEstimator {
    /// Creates the estimator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ProgressEstimator for ModelReportedEstimator {
    fn estimate(
        &self,
        _user_message: &str,
        assistant_reply: &str,
        _current_difficulty: u8,
    ) -> ProgressEstimate {
        let Some(marker_re) = PROGRESS_MARKER.as_ref() else {
            return ProgressEstimate::default();
        };
        let Some(found) = marker_re.captures(assistant_reply) else {
            return ProgressEstimate::default();
        };

        let attrs = found.get(1).map_or("", |m| m.as_str());
        let topic = MARKER_TOPIC
            .as_ref()
            .and_then(|re| re.captures(attrs))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string());
        let difficulty = MARKER_DIFFICULTY
            .as_ref()
            .and_then(|re| re.captures(attrs))
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u8>().ok());

        let cleaned = marker_re
            .replace_all(assistant_reply, "")
            .trim()
            .to_string();

        ProgressEstimate {
            topic,
            difficulty,
            cleaned_reply: Some(cleaned),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
