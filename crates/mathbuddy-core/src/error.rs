//! Error types for the progress tracker.
//!
//! The tracker distinguishes two failure classes: unknown session
//! identifiers, which are ordinary client errors, and broken internal
//! invariants, which indicate a programming defect and are never
//! recoverable. Ladder construction failures get their own variant since
//! custom ladders are built from caller-supplied data.

/// A specialized `Result` type for progress-tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Errors that can occur during progress tracking.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// No session exists for the given identifier.
    ///
    /// A client error: the caller supplied an unknown or stale session id.
    /// Not retried; the caller should start a new session instead.
    #[error("Unknown session: '{id}'\n\nSuggestion: Start a new session and retry with its id")]
    SessionNotFound {
        /// The identifier that failed to resolve.
        id: String,
    },

    /// An internal invariant was broken.
    ///
    /// Should never occur in practice (for example a session-id collision).
    /// Indicates a programming defect, never bad client input.
    #[error("Progress tracker invariant violated: {message}")]
    InvariantViolation {
        /// Description of the broken invariant.
        message: String,
    },

    /// A ladder could not be constructed from the given entries and tuning.
    #[error("Invalid ladder: {message}\n\nSuggestion: {suggestion}")]
    InvalidLadder {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the caller.
        suggestion: String,
    },
}

impl TrackerError {
    /// Creates a new `SessionNotFound` error for the given identifier.
    #[must_use]
    pub fn session_not_found(id: impl std::fmt::Display) -> Self {
        Self::SessionNotFound { id: id.to_string() }
    }

    /// Creates a new `InvariantViolation` with the given description.
    #[must_use]
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidLadder` error with the given message and suggestion.
    #[must_use]
    pub fn invalid_ladder(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::InvalidLadder {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Returns `true` if this error is caused by client input and can be
    /// reported back without alarm.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::SessionNotFound { .. })
    }

    /// Returns `true` if this error indicates a defect that should abort the
    /// current operation loudly rather than be retried.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::InvariantViolation { .. })
    }
}
