//! MathBuddy Upstream Clients
//!
//! HTTP clients for the chat model and the computational knowledge engine,
//! plus the prompts sent to them and the parser for structured solve replies.

pub mod chat;
pub mod error;
pub mod knowledge;
pub mod parse;
pub mod prompts;

pub use chat::{
    ChatModel, ChatOptions, ChatTurn, HttpChatModel, DEFAULT_CHAT_BASE_URL, DEFAULT_CHAT_MODEL,
};
pub use error::{ClientError, ClientErrorKind, Result};
pub use knowledge::{
    answers_match, HttpKnowledgeEngine, KnowledgeEngine, KnowledgeOptions,
    DEFAULT_KNOWLEDGE_BASE_URL,
};
pub use parse::{parse_solution, ParsedSolution, DEFAULT_PROBLEM_TYPE};
pub use prompts::{solve_prompt, tutor_system_prompt, SOLVER_SYSTEM_PROMPT};
