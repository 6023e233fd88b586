//! MathBuddy progress tracking.
//!
//! Owns per-session topic/difficulty state, applies the deterministic
//! transition rules after each interaction, and exposes the read/update
//! operations the HTTP boundary builds on. The LLM and knowledge-engine
//! collaborators live elsewhere; this crate does no I/O beyond its own
//! in-memory map.

pub mod error;
pub mod ladder;
pub mod policy;
pub mod session;
pub mod tracker;

pub use error::{Result, TrackerError};
pub use ladder::{Ladder, TopicEntry, MAX_DIFFICULTY, MIN_DIFFICULTY};
pub use policy::{KeywordEstimator, ModelReportedEstimator, ProgressEstimate, ProgressEstimator};
pub use session::{
    MessageRecord, Role, Session, SessionId, StepAdvance, ALL_STEPS_COMPLETE,
};
pub use tracker::{ProgressTracker, RecordedTurn};
