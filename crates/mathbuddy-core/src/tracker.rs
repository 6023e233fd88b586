//! The progress tracker: owner of every live session.
//!
//! All session access goes through the tracker; no caller ever holds a
//! direct reference into the map. Mutations to one session serialize on
//! that session's own mutex, so concurrent requests can never lose an
//! update, while operations on different sessions proceed independently.
//! Sessions live for the process lifetime; there is no eviction.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::error::{Result, TrackerError};
use crate::ladder::Ladder;
use crate::policy::ProgressEstimator;
use crate::session::{Role, Session, SessionId, StepAdvance};

/// Result of recording one chat exchange.
#[derive(Debug, Clone)]
pub struct RecordedTurn {
    /// Snapshot of the session after the exchange was applied.
    pub session: Session,

    /// Assistant reply with any estimator markers stripped; this is the
    /// text that was stored and should be shown to the student.
    pub reply: String,
}

/// Tracks every live tutoring session.
///
/// The map lock is held only long enough to look up or insert an entry;
/// each entry carries its own mutex guarding the session value. Methods
/// return snapshots, never references into the map.
pub struct ProgressTracker {
    ladder: Ladder,
    history_limit: Option<usize>,
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<Session>>>>,
}

impl ProgressTracker {
    /// Creates a tracker for the given ladder.
    ///
    /// `history_limit` caps each session's conversation history to the most
    /// recent N messages; `None` keeps history unbounded.
    #[must_use]
    pub fn new(ladder: Ladder, history_limit: Option<usize>) -> Self {
        Self {
            ladder,
            history_limit,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// The ladder every session of this tracker climbs.
    #[must_use]
    pub const fn ladder(&self) -> &Ladder {
        &self.ladder
    }

    /// Creates a fresh session and returns its initial snapshot.
    ///
    /// # Errors
    ///
    /// Returns `TrackerError::InvariantViolation` on an id collision, which
    /// indicates a defect in id generation rather than a recoverable
    /// condition.
    pub async fn create_session(&self) -> Result<Session> {
        let session = Session::new(&self.ladder);
        let id = session.id;

        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&id) {
            return Err(TrackerError::invariant(format!(
                "generated session id {id} already exists"
            )));
        }
        sessions.insert(id, Arc::new(Mutex::new(session.clone())));
        drop(sessions);

        tracing::info!(session_id = %id, topic = %session.topic, difficulty = session.difficulty, "session created");
        Ok(session)
    }

    /// Returns a read-only snapshot of the session.
    pub async fn session(&self, id: SessionId) -> Result<Session> {
        let entry = self.lookup(id).await?;
        let session = entry.lock().await;
        Ok(session.clone())
    }

    /// Applies a graded outcome to the session and returns the updated
    /// snapshot.
    ///
    /// The difficulty step and any promotion happen atomically under the
    /// session's lock; two racing calls serialize in some order, never
    /// interleave.
    pub async fn record_outcome(&self, id: SessionId, was_correct: bool) -> Result<Session> {
        let entry = self.lookup(id).await?;
        let mut session = entry.lock().await;
        session.apply_outcome(was_correct, &self.ladder);
        tracing::info!(
            session_id = %id,
            correct = was_correct,
            topic = %session.topic,
            difficulty = session.difficulty,
            "outcome recorded"
        );
        Ok(session.clone())
    }

    /// Records one chat exchange: stores the student's message and the
    /// tutor's reply, runs the estimator, and applies its suggestion.
    ///
    /// The estimator runs under the session lock so its view of the current
    /// difficulty is the one the estimate is applied against. The returned
    /// [`RecordedTurn`] carries the reply text actually stored, with any
    /// machine-readable markers stripped.
    pub async fn record_turn(
        &self,
        id: SessionId,
        user_message: &str,
        assistant_reply: &str,
        estimator: &dyn ProgressEstimator,
    ) -> Result<RecordedTurn> {
        let entry = self.lookup(id).await?;
        let mut session = entry.lock().await;

        let estimate = estimator.estimate(user_message, assistant_reply, session.difficulty);
        let reply = estimate
            .cleaned_reply
            .clone()
            .unwrap_or_else(|| assistant_reply.to_string());

        session.push_message(Role::User, user_message);
        session.push_message(Role::Assistant, reply.clone());
        session.apply_estimate(&estimate, &self.ladder);
        if let Some(limit) = self.history_limit {
            session.truncate_history(limit);
        }

        tracing::debug!(
            session_id = %id,
            topic = %session.topic,
            difficulty = session.difficulty,
            messages = session.history.len(),
            "turn recorded"
        );
        Ok(RecordedTurn {
            session: session.clone(),
            reply,
        })
    }

    /// Appends a system message to the session's history.
    pub async fn add_system_note(&self, id: SessionId, content: impl Into<String>) -> Result<Session> {
        let entry = self.lookup(id).await?;
        let mut session = entry.lock().await;
        session.push_message(Role::System, content);
        Ok(session.clone())
    }

    /// Replaces the session's active walkthrough and rewinds its cursor.
    pub async fn store_steps(&self, id: SessionId, steps: Vec<String>) -> Result<Session> {
        let entry = self.lookup(id).await?;
        let mut session = entry.lock().await;
        session.set_steps(steps);
        tracing::debug!(session_id = %id, steps = session.steps.len(), "walkthrough stored");
        Ok(session.clone())
    }

    /// Returns the next walkthrough step and advances the cursor.
    pub async fn advance_step(&self, id: SessionId) -> Result<StepAdvance> {
        let entry = self.lookup(id).await?;
        let mut session = entry.lock().await;
        Ok(session.advance_step())
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn lookup(&self, id: SessionId) -> Result<Arc<Mutex<Session>>> {
        let sessions = self.sessions.read().await;
        sessions
            .get(&id)
            .cloned()
            .ok_or_else(|| TrackerError::session_not_found(id))
    }
}

// ============================================================================
// Tests
// ============================================================================
