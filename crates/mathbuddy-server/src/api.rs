//! HTTP API endpoints for the MathBuddy server.
//!
//! This module provides the REST API that chat clients (web widget, Slack,
//! Discord, terminal) call to run tutoring sessions against the progress
//! tracker and the upstream chat and knowledge services.
//!
//! # Endpoints
//!
//! - `POST /start_session` - Create a tutoring session
//! - `POST /chat` - Send a student message, get the tutor's reply
//! - `POST /solve` - Solve a problem into structured steps
//! - `POST /next_step` - Reveal the next step of the last solved problem
//! - `POST /check_answer` - Check an answer against the knowledge engine
//! - `GET /progress/{session_id}` - Session progress snapshot
//! - `GET /health` - Liveness probe with session count
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use mathbuddy_clients::{ChatOptions, HttpChatModel};
//! use mathbuddy_server::{create_router, AppState, Config};
//!
//! # async fn example() {
//! let config = Config::default();
//! let chat = Arc::new(HttpChatModel::new(ChatOptions::new("sk-demo")).unwrap());
//! let state = AppState::new(config, chat, None);
//!
//! let router = create_router(state);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await.unwrap();
//! axum::serve(listener, router).await.unwrap();
//! # }
//! ```

use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use mathbuddy_clients::{
    answers_match, parse_solution, solve_prompt, tutor_system_prompt, ChatModel, ChatTurn,
    ClientError, ClientErrorKind, KnowledgeEngine, SOLVER_SYSTEM_PROMPT,
};
use mathbuddy_core::{ProgressEstimator, ProgressTracker, SessionId, TrackerError};

use crate::config::{Config, EstimatorKind};
use crate::ratelimit::{self, RateLimiter};

/// Header clients present their API key in.
pub const API_KEY_HEADER: &str = "x-api-key";

// ============================================================================
// Request/Response Types
// ============================================================================

/// Response body for the start-session endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSessionResponse {
    /// Identifier for the new session.
    pub session_id: SessionId,
    /// Topic the session starts on.
    pub topic: String,
    /// Starting difficulty.
    pub difficulty: u8,
}

/// Request body for the chat endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    /// The student's message.
    pub message: String,
    /// Session the message belongs to.
    pub session_id: SessionId,
}

/// Response body for the chat endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// The tutor's reply.
    pub response: String,
    /// Topic after this exchange.
    pub topic: String,
    /// Difficulty after this exchange.
    pub difficulty: u8,
}

/// Request body for the solve endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SolveRequest {
    /// The math problem to solve.
    pub question: String,
    /// Session to attach the worked steps to, if any.
    #[serde(default)]
    pub session_id: Option<SessionId>,
}

/// Response body for the solve endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveResponse {
    /// Classified problem type.
    pub problem_type: String,
    /// Ordered worked steps.
    pub steps: Vec<String>,
    /// Final answer, when the reply contained one.
    pub final_answer: Option<String>,
    /// Brief summary of the solution.
    pub summary: String,
    /// Whether the knowledge engine agreed with the final answer. `None`
    /// when no engine is configured, the reply had no final answer, or
    /// verification failed.
    pub verified: Option<bool>,
}

/// Request body for the next-step endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct NextStepRequest {
    /// Session whose walkthrough to advance.
    pub session_id: SessionId,
}

/// Response body for the next-step endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextStepResponse {
    /// The step to present.
    pub step: String,
    /// Whether the walkthrough is exhausted after this step.
    pub is_final: bool,
}

/// Request body for the check-answer endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckAnswerRequest {
    /// The question the answer responds to.
    pub question: String,
    /// The student's proposed answer.
    pub answer: String,
    /// Session to grade the outcome against, if any.
    #[serde(default)]
    pub session_id: Option<SessionId>,
}

/// Response body for the check-answer endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckAnswerResponse {
    /// Whether the answer matched the engine's result.
    pub correct: bool,
    /// The engine's own answer.
    pub expected: Option<String>,
    /// Session topic after grading, when a session was given.
    pub topic: Option<String>,
    /// Session difficulty after grading, when a session was given.
    pub difficulty: Option<u8>,
}

/// Response body for the progress endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressResponse {
    /// Session identifier.
    pub session_id: SessionId,
    /// Current topic.
    pub topic: String,
    /// Current difficulty.
    pub difficulty: u8,
    /// Skills the student is assumed to have before this topic.
    pub prerequisites: Vec<String>,
    /// Messages in the transcript.
    pub message_count: usize,
    /// Walkthrough steps not yet revealed.
    pub steps_remaining: usize,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the session was last touched.
    pub updated_at: DateTime<Utc>,
}

/// Response body for the health endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is up.
    pub status: String,
    /// Number of live sessions.
    pub sessions: usize,
}

/// Error response body returned on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Description of the error.
    pub error: String,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for the HTTP server.
///
/// Carries the configuration, the session tracker, and the upstream
/// clients, all wrapped for thread-safe sharing across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    /// Owner of every live session.
    pub tracker: Arc<ProgressTracker>,
    /// Chat model used for tutoring replies and structured solves.
    pub chat: Arc<dyn ChatModel>,
    /// Knowledge engine for authoritative answers, when configured.
    pub knowledge: Option<Arc<dyn KnowledgeEngine>>,
    /// Policy that estimates progress from conversation turns.
    pub estimator: Arc<dyn ProgressEstimator>,
}

impl AppState {
    /// Creates state from configuration and already-built upstream clients.
    ///
    /// The ladder, estimator, and tracker are derived from the
    /// configuration; the clients are injected so tests and alternative
    /// deployments can substitute their own.
    #[must_use]
    pub fn new(
        config: Config,
        chat: Arc<dyn ChatModel>,
        knowledge: Option<Arc<dyn KnowledgeEngine>>,
    ) -> Self {
        let ladder = config.ladder.build();
        let estimator = config.estimator.build(&ladder);
        let tracker = Arc::new(ProgressTracker::new(ladder, config.history_limit));
        Self {
            config,
            tracker,
            chat,
            knowledge,
            estimator,
        }
    }
}

// ============================================================================
// API Error Type
// ============================================================================

/// Internal error type for API handlers.
#[derive(Debug)]
enum ApiError {
    /// Session lookup or mutation failed.
    Tracker(TrackerError),
    /// An upstream service call failed.
    Upstream(ClientError),
    /// The endpoint needs a knowledge engine and none is configured.
    KnowledgeUnavailable,
    /// A required request field was empty.
    EmptyField(&'static str),
}

impl From<TrackerError> for ApiError {
    fn from(err: TrackerError) -> Self {
        Self::Tracker(err)
    }
}

impl From<ClientError> for ApiError {
    fn from(err: ClientError) -> Self {
        Self::Upstream(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Tracker(err) => {
                let status = if err.is_client_error() {
                    StatusCode::NOT_FOUND
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                (status, err.to_string())
            }
            Self::Upstream(err) => {
                // A rate-limited upstream propagates as 429 so clients back
                // off; everything else is a gateway fault.
                let status = if err.kind() == Some(ClientErrorKind::RateLimit) {
                    StatusCode::TOO_MANY_REQUESTS
                } else {
                    StatusCode::BAD_GATEWAY
                };
                (status, err.to_string())
            }
            Self::KnowledgeUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "no knowledge engine is configured".to_string(),
            ),
            Self::EmptyField(field) => (
                StatusCode::BAD_REQUEST,
                format!("{field} must not be empty"),
            ),
        };

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router with all API endpoints.
///
/// # Arguments
///
/// * `state` - The shared application state
///
/// # Returns
///
/// An axum `Router` configured with:
/// - The tutoring endpoints, behind API-key auth and rate limiting when
///   those are configured
/// - An unauthenticated `/health` probe
/// - CORS middleware for browser clients
/// - Tracing middleware for request logging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS for browser-based chat widgets (allow all origins)
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut api_routes = Router::new()
        .route("/start_session", post(handle_start_session))
        .route("/chat", post(handle_chat))
        .route("/solve", post(handle_solve))
        .route("/next_step", post(handle_next_step))
        .route("/check_answer", post(handle_check_answer))
        .route("/progress/:session_id", get(handle_progress));

    // Layers wrap the routes added above them, so /health stays outside
    // both auth and throttling.
    if let Some(expected) = &state.config.api_key {
        api_routes = api_routes.layer(middleware::from_fn_with_state(
            Arc::new(expected.clone()),
            require_api_key,
        ));
    }
    if let Some(rate_config) = &state.config.rate_limit {
        api_routes = api_routes.layer(middleware::from_fn_with_state(
            Arc::new(RateLimiter::new(rate_config)),
            ratelimit::enforce,
        ));
    }

    Router::new()
        .merge(api_routes)
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

/// Middleware rejecting requests without the expected `X-API-Key` header.
async fn require_api_key(
    State(expected): State<Arc<String>>,
    request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    if presented == Some(expected.as_str()) {
        next.run(request).await
    } else {
        warn!("request rejected: invalid or missing API key");
        let body = Json(ErrorResponse {
            error: "invalid or missing API key".to_string(),
        });
        (StatusCode::UNAUTHORIZED, body).into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Handler for `POST /start_session`.
///
/// Creates a session at the ladder's first topic and seeds its transcript
/// with the tutor persona prompt.
async fn handle_start_session(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StartSessionResponse>, ApiError> {
    let session = state.tracker.create_session().await?;

    let prerequisites = state.tracker.ladder().prerequisites(&session.topic);
    let report_progress = state.config.estimator == EstimatorKind::ModelReported;
    let persona = tutor_system_prompt(
        &session.topic,
        session.difficulty,
        prerequisites,
        report_progress,
    );
    state.tracker.add_system_note(session.id, persona).await?;

    info!(session_id = %session.id, topic = %session.topic, "session started");

    Ok(Json(StartSessionResponse {
        session_id: session.id,
        topic: session.topic,
        difficulty: session.difficulty,
    }))
}

/// Handler for `POST /chat`.
///
/// Replays the session transcript to the chat model with the student's new
/// message appended, then records the exchange and applies the progress
/// estimate.
async fn handle_chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    if request.message.trim().is_empty() {
        return Err(ApiError::EmptyField("message"));
    }

    let session = state.tracker.session(request.session_id).await?;
    let mut turns: Vec<ChatTurn> = session
        .history
        .iter()
        .map(|record| ChatTurn::new(record.role.as_str(), record.content.clone()))
        .collect();
    turns.push(ChatTurn::user(request.message.clone()));

    let reply = state.chat.complete(&turns).await?;
    let turn = state
        .tracker
        .record_turn(
            request.session_id,
            &request.message,
            &reply,
            state.estimator.as_ref(),
        )
        .await?;

    info!(
        session_id = %request.session_id,
        topic = %turn.session.topic,
        difficulty = turn.session.difficulty,
        "chat turn recorded"
    );

    Ok(Json(ChatResponse {
        response: turn.reply,
        topic: turn.session.topic,
        difficulty: turn.session.difficulty,
    }))
}

/// Handler for `POST /solve`.
///
/// Asks the chat model for a structured solution and parses it into steps.
/// When a session is given, the steps are stored there for `/next_step`;
/// when a knowledge engine is configured, the final answer is checked
/// against it best-effort.
async fn handle_solve(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SolveRequest>,
) -> Result<Json<SolveResponse>, ApiError> {
    if request.question.trim().is_empty() {
        return Err(ApiError::EmptyField("question"));
    }
    // Reject unknown sessions before spending a completion call.
    if let Some(session_id) = request.session_id {
        state.tracker.session(session_id).await?;
    }

    let turns = vec![
        ChatTurn::system(SOLVER_SYSTEM_PROMPT),
        ChatTurn::user(solve_prompt(&request.question)),
    ];
    let reply = state.chat.complete(&turns).await?;
    let solution = parse_solution(&reply);

    let verified = match (&state.knowledge, &solution.final_answer) {
        (Some(knowledge), Some(final_answer)) => {
            match knowledge.answer(&request.question).await {
                Ok(expected) => Some(answers_match(&expected, final_answer)),
                Err(err) => {
                    // Verification is advisory; the solve itself succeeded.
                    warn!(error = %err, "final answer verification skipped");
                    None
                }
            }
        }
        _ => None,
    };

    if let Some(session_id) = request.session_id {
        state
            .tracker
            .store_steps(session_id, solution.steps.clone())
            .await?;
    }

    info!(
        problem_type = %solution.problem_type,
        steps = solution.steps.len(),
        verified = ?verified,
        "problem solved"
    );

    Ok(Json(SolveResponse {
        problem_type: solution.problem_type,
        steps: solution.steps,
        final_answer: solution.final_answer,
        summary: solution.summary,
        verified,
    }))
}

/// Handler for `POST /next_step`.
///
/// Reveals the next stored walkthrough step; past the end it keeps
/// returning the completion sentinel.
async fn handle_next_step(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NextStepRequest>,
) -> Result<Json<NextStepResponse>, ApiError> {
    let advance = state.tracker.advance_step(request.session_id).await?;
    Ok(Json(NextStepResponse {
        step: advance.step,
        is_final: advance.is_final,
    }))
}

/// Handler for `POST /check_answer`.
///
/// Grades the student's answer against the knowledge engine's result. When
/// a session is given, the graded outcome drives its difficulty and
/// promotion.
async fn handle_check_answer(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CheckAnswerRequest>,
) -> Result<Json<CheckAnswerResponse>, ApiError> {
    if request.question.trim().is_empty() {
        return Err(ApiError::EmptyField("question"));
    }
    if request.answer.trim().is_empty() {
        return Err(ApiError::EmptyField("answer"));
    }
    let Some(knowledge) = &state.knowledge else {
        return Err(ApiError::KnowledgeUnavailable);
    };

    let expected = knowledge.answer(&request.question).await?;
    let correct = answers_match(&expected, &request.answer);

    let (topic, difficulty) = if let Some(session_id) = request.session_id {
        let session = state.tracker.record_outcome(session_id, correct).await?;
        (Some(session.topic), Some(session.difficulty))
    } else {
        (None, None)
    };

    info!(correct, graded = topic.is_some(), "answer checked");

    Ok(Json(CheckAnswerResponse {
        correct,
        expected: Some(expected),
        topic,
        difficulty,
    }))
}

/// Handler for `GET /progress/{session_id}`.
///
/// Returns a snapshot of the session's progress state.
async fn handle_progress(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<SessionId>,
) -> Result<Json<ProgressResponse>, ApiError> {
    let session = state.tracker.session(session_id).await?;
    let prerequisites = state.tracker.ladder().prerequisites(&session.topic).to_vec();
    Ok(Json(ProgressResponse {
        session_id: session.id,
        topic: session.topic,
        difficulty: session.difficulty,
        prerequisites,
        message_count: session.history.len(),
        steps_remaining: session.steps.len().saturating_sub(session.step_cursor),
        created_at: session.created_at,
        updated_at: session.updated_at,
    }))
}

/// Handler for `GET /health`.
async fn handle_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        sessions: state.tracker.session_count().await,
    })
}

// ============================================================================
// Tests
// ============================================================================
