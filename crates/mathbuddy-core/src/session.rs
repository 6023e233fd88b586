//! Session state: one student's conversation, topic, and difficulty.
//!
//! A [`Session`] is a plain value; all transition rules are synchronous
//! methods with no I/O. Serialization of sessions between callers is
//! mediated by the tracker, which hands out snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ladder::{Ladder, MAX_DIFFICULTY, MIN_DIFFICULTY};
use crate::policy::ProgressEstimate;

/// Sentinel step returned once a walkthrough is exhausted.
///
/// Requesting a step past the end is not an error; the student simply gets
/// this closing line on every further request.
pub const ALL_STEPS_COMPLETE: &str =
    "All steps complete! Ask me another question whenever you're ready.";

// ============================================================================
// SessionId
// ============================================================================

/// Opaque unique session identifier.
///
/// Generated once at session creation and never reused. A generation
/// collision within one process is treated as a fatal invariant violation
/// by the tracker, not a handled case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generates a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ============================================================================
// Role and MessageRecord
// ============================================================================

/// Author of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Instructions framing the tutor's behavior.
    System,
    /// The student.
    User,
    /// The tutor model.
    Assistant,
}

impl Role {
    /// The lowercase wire name of this role.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message in a session's conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Who authored the message.
    pub role: Role,

    /// The message text.
    pub content: String,

    /// When the message was recorded.
    pub timestamp: DateTime<Utc>,
}

impl MessageRecord {
    /// Creates a new record with the current timestamp.
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

// ============================================================================
// StepAdvance
// ============================================================================

/// Result of advancing the step cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepAdvance {
    /// The step text to present to the student.
    pub step: String,

    /// `true` once the walkthrough is exhausted; stays `true` on every
    /// later call.
    pub is_final: bool,
}

// ============================================================================
// Session
// ============================================================================

/// Complete state of one tutoring session.
///
/// Invariants, maintained by the methods below:
/// - `difficulty` stays within `[MIN_DIFFICULTY, MAX_DIFFICULTY]`
/// - `topic` always names a valid entry of the session's ladder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier, fixed at creation.
    pub id: SessionId,

    /// Current ladder entry the student is working at.
    pub topic: String,

    /// Current difficulty within the topic.
    pub difficulty: u8,

    /// Conversation history in insertion order.
    pub history: Vec<MessageRecord>,

    /// Steps of the most recent solved problem, in presentation order.
    pub steps: Vec<String>,

    /// 0-based cursor into `steps`; the next step to present.
    pub step_cursor: usize,

    /// When the session was created.
    pub created_at: DateTime<Utc>,

    /// When the session was last mutated.
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Creates a fresh session at the ladder's first entry and initial
    /// difficulty, with empty history and no active problem.
    #[must_use]
    pub fn new(ladder: &Ladder) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::generate(),
            topic: ladder.first().name.clone(),
            difficulty: ladder.initial_difficulty(),
            history: Vec::new(),
            steps: Vec::new(),
            step_cursor: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Appends a message to the history and updates the timestamp.
    pub fn push_message(&mut self, role: Role, content: impl Into<String>) {
        self.history.push(MessageRecord::new(role, content));
        self.touch();
    }

    /// Applies a graded outcome: one difficulty step up or down, then the
    /// promotion check.
    ///
    /// A correct answer raises difficulty by one (clamped at
    /// `MAX_DIFFICULTY`); a wrong answer lowers it by one (clamped at
    /// `MIN_DIFFICULTY`). If the result reaches the ladder's promotion
    /// threshold and a next entry exists, the session moves to that entry
    /// and difficulty restarts at the ladder's reset value. At the final
    /// entry the topic stays put and difficulty merely clamps. Both updates
    /// happen before this method returns; no intermediate state is
    /// observable.
    ///
    /// # Examples
    ///
    /// ```
    /// use mathbuddy_core::{Ladder, Session};
    ///
    /// let ladder = Ladder::grade_levels();
    /// let mut session = Session::new(&ladder);
    /// assert_eq!((session.topic.as_str(), session.difficulty), ("3rd Grade", 1));
    ///
    /// // Seven straight correct answers climb 1 -> 8 and promote.
    /// for _ in 0..7 {
    ///     session.apply_outcome(true, &ladder);
    /// }
    /// assert_eq!((session.topic.as_str(), session.difficulty), ("4th Grade", 1));
    /// ```
    pub fn apply_outcome(&mut self, was_correct: bool, ladder: &Ladder) {
        self.difficulty = if was_correct {
            self.difficulty.saturating_add(1).min(MAX_DIFFICULTY)
        } else {
            self.difficulty.saturating_sub(1).max(MIN_DIFFICULTY)
        };

        if self.difficulty >= ladder.promote_at() {
            if let Some(next) = ladder.next_after(&self.topic) {
                self.topic = next.name.clone();
                self.difficulty = ladder.reset_to();
            }
        }

        self.touch();
    }

    /// Applies a best-effort progress estimate.
    ///
    /// Topic suggestions that do not resolve to a ladder entry are
    /// discarded with a debug log; difficulty suggestions are clamped into
    /// range. Estimates never trigger promotion; only graded outcomes via
    /// [`Session::apply_outcome`] do.
    pub fn apply_estimate(&mut self, estimate: &ProgressEstimate, ladder: &Ladder) {
        if let Some(topic) = &estimate.topic {
            if let Some(entry) = ladder.resolve(topic) {
                self.topic = entry.name.clone();
            } else {
                tracing::debug!(session_id = %self.id, topic = %topic, "discarding estimate for unknown topic");
            }
        }

        if let Some(difficulty) = estimate.difficulty {
            self.difficulty = difficulty.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY);
        }

        self.touch();
    }

    /// Replaces the active walkthrough and rewinds the cursor.
    pub fn set_steps(&mut self, steps: Vec<String>) {
        self.steps = steps;
        self.step_cursor = 0;
        self.touch();
    }

    /// Returns the step at the cursor and advances it.
    ///
    /// `is_final` turns `true` on the call that consumes the last step and
    /// stays `true` afterwards; exhausted (or empty) walkthroughs return
    /// the [`ALL_STEPS_COMPLETE`] sentinel instead of erroring.
    ///
    /// # Examples
    ///
    /// ```
    /// use mathbuddy_core::{Ladder, Session, ALL_STEPS_COMPLETE};
    ///
    /// let mut session = Session::new(&Ladder::grade_levels());
    /// session.set_steps(vec!["Differentiate both sides.".to_string()]);
    ///
    /// let first = session.advance_step();
    /// assert_eq!(first.step, "Differentiate both sides.");
    /// assert!(first.is_final);
    ///
    /// let past_end = session.advance_step();
    /// assert_eq!(past_end.step, ALL_STEPS_COMPLETE);
    /// assert!(past_end.is_final);
    /// ```
    pub fn advance_step(&mut self) -> StepAdvance {
        match self.steps.get(self.step_cursor).cloned() {
            Some(step) => {
                self.step_cursor += 1;
                self.touch();
                StepAdvance {
                    step,
                    is_final: self.step_cursor >= self.steps.len(),
                }
            }
            None => StepAdvance {
                step: ALL_STEPS_COMPLETE.to_string(),
                is_final: true,
            },
        }
    }

    /// Drops the oldest history entries so at most `limit` remain.
    pub fn truncate_history(&mut self, limit: usize) {
        if self.history.len() > limit {
            let excess = self.history.len() - limit;
            self.history.drain(..excess);
        }
    }

    /// Updates the `updated_at` timestamp to the current time.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

// ============================================================================
// Tests
// ============================================================================
