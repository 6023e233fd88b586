//! # MathBuddy Server
//!
//! HTTP server for the MathBuddy tutoring backend. Exposes the tutoring
//! endpoints over REST, wires the progress tracker to the upstream chat
//! and knowledge clients, and applies API-key auth and rate limiting from
//! configuration.

pub mod api;
pub mod config;
pub mod error;
pub mod ratelimit;

pub use api::{
    create_router, AppState, ChatRequest, ChatResponse, CheckAnswerRequest, CheckAnswerResponse,
    ErrorResponse, HealthResponse, NextStepRequest, NextStepResponse, ProgressResponse,
    SolveRequest, SolveResponse, StartSessionResponse, API_KEY_HEADER,
};
pub use config::{
    ChatConfig, Config, EstimatorKind, KnowledgeConfig, LadderVariant, RateLimitConfig,
    CONFIG_FILE_NAME,
};
pub use error::{Result, ServerError};
pub use ratelimit::{RateDecision, RateLimiter};
