//! Configuration types for the MathBuddy server.
//!
//! This module provides all configuration structures used to control the
//! server, including the topic ladder variant, progress estimation policy,
//! authentication, rate limiting, and upstream service settings.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use mathbuddy_clients::{
    ChatOptions, KnowledgeOptions, DEFAULT_CHAT_BASE_URL, DEFAULT_CHAT_MODEL,
    DEFAULT_KNOWLEDGE_BASE_URL,
};
use mathbuddy_core::{KeywordEstimator, Ladder, ModelReportedEstimator, ProgressEstimator};

use crate::error::{Result, ServerError};

/// The default config file name.
pub const CONFIG_FILE_NAME: &str = "mathbuddy.json";

/// Default TCP port for the HTTP server.
const fn default_port() -> u16 {
    8080
}

/// Default requests allowed per rate-limit window.
const fn default_max_requests() -> u32 {
    60
}

/// Default rate-limit window in seconds.
const fn default_window_seconds() -> u64 {
    60
}

/// Default chat-completions base URL.
fn default_chat_base_url() -> String {
    DEFAULT_CHAT_BASE_URL.to_string()
}

/// Default chat model identifier.
fn default_chat_model() -> String {
    DEFAULT_CHAT_MODEL.to_string()
}

/// Default environment variable holding the chat API key.
fn default_chat_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

/// Default chat request timeout in seconds.
const fn default_chat_timeout() -> u64 {
    30
}

/// Default knowledge API base URL.
fn default_knowledge_base_url() -> String {
    DEFAULT_KNOWLEDGE_BASE_URL.to_string()
}

/// Default environment variable holding the knowledge app ID.
fn default_knowledge_app_id_env() -> String {
    "WOLFRAM_ALPHA_APP_ID".to_string()
}

/// Default knowledge request timeout in seconds.
const fn default_knowledge_timeout() -> u64 {
    15
}

/// Main configuration for the MathBuddy server.
///
/// Controls the listening port, which topic ladder new sessions start on,
/// how progress is estimated from conversation, and how the upstream chat
/// and knowledge services are reached.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// TCP port the HTTP server listens on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// API key clients must present in the `X-API-Key` header.
    ///
    /// When absent, authentication is disabled.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Which topic ladder new sessions are created on.
    #[serde(default)]
    pub ladder: LadderVariant,

    /// Which policy estimates progress from conversation turns.
    #[serde(default)]
    pub estimator: EstimatorKind,

    /// Maximum messages kept per session transcript.
    ///
    /// When absent, transcripts grow without bound.
    #[serde(default)]
    pub history_limit: Option<usize>,

    /// Request throttling settings. When absent, throttling is disabled.
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,

    /// Chat model settings.
    #[serde(default)]
    pub chat: ChatConfig,

    /// Knowledge engine settings.
    ///
    /// When absent, the server runs without answer verification and the
    /// endpoints that need it report the engine as unavailable.
    #[serde(default)]
    pub knowledge: Option<KnowledgeConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            api_key: None,
            ladder: LadderVariant::default(),
            estimator: EstimatorKind::default(),
            history_limit: None,
            rate_limit: None,
            chat: ChatConfig::default(),
            knowledge: None,
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// Looks for `mathbuddy.json` in the current directory. If found, loads
    /// and validates the configuration. If not found, returns default
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            ServerError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads configuration from a specific directory.
    ///
    /// # Errors
    ///
    /// Returns an error if `mathbuddy.json` exists there but contains
    /// invalid JSON.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        Self::load_from_file(&config_path)
    }

    /// Loads configuration from a specific file path.
    ///
    /// If the file does not exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::ConfigParseError` if the file exists but
    /// contains invalid JSON or invalid enum values.
    ///
    /// Returns `ServerError::ConfigValidationError` if the configuration
    /// values are invalid (e.g., a blank API key, a zero-length window).
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(ServerError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| ServerError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::ConfigValidationError` if any check fails.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(ServerError::config_validation(
                "port must be greater than 0",
                "Set port to a value between 1 and 65535 in your mathbuddy.json",
            ));
        }

        if let Some(key) = &self.api_key {
            if key.trim().is_empty() {
                return Err(ServerError::config_validation(
                    "apiKey must not be blank",
                    "Provide a non-empty apiKey, or omit it to disable authentication",
                ));
            }
        }

        if self.history_limit == Some(0) {
            return Err(ServerError::config_validation(
                "historyLimit must be greater than 0",
                "Set historyLimit to at least 1, or omit it to keep full transcripts",
            ));
        }

        if let Some(rate_limit) = &self.rate_limit {
            if rate_limit.max_requests == 0 {
                return Err(ServerError::config_validation(
                    "rateLimit.maxRequests must be greater than 0",
                    "Set rateLimit.maxRequests to at least 1, or omit rateLimit to disable throttling",
                ));
            }
            if rate_limit.window_seconds == 0 {
                return Err(ServerError::config_validation(
                    "rateLimit.windowSeconds must be greater than 0",
                    "Set rateLimit.windowSeconds to at least 1 second",
                ));
            }
        }

        self.chat.validate()?;

        if let Some(knowledge) = &self.knowledge {
            knowledge.validate()?;
        }

        Ok(())
    }
}

/// Built-in topic ladders a session can progress through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LadderVariant {
    /// School grade levels, 3rd Grade through Calculus 1 (default).
    #[default]
    GradeLevels,
    /// Course-grained subjects, Arithmetic through Calculus.
    CourseTopics,
}

impl LadderVariant {
    /// Parses a string into a `LadderVariant`, case-insensitively.
    fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "gradelevels" | "grade_levels" => Some(Self::GradeLevels),
            "coursetopics" | "course_topics" => Some(Self::CourseTopics),
            _ => None,
        }
    }

    /// Builds the ladder this variant names.
    #[must_use]
    pub fn build(self) -> Ladder {
        match self {
            Self::GradeLevels => Ladder::grade_levels(),
            Self::CourseTopics => Ladder::course_topics(),
        }
    }
}

impl<'de> Deserialize<'de> for LadderVariant {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str_case_insensitive(&s).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid ladder '{s}': expected 'gradeLevels' or 'courseTopics'"
            ))
        })
    }
}

impl Serialize for LadderVariant {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let s = match self {
            Self::GradeLevels => "gradeLevels",
            Self::CourseTopics => "courseTopics",
        };
        serializer.serialize_str(s)
    }
}

/// Supported progress estimation policies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EstimatorKind {
    /// Scan conversation text for topic keywords and pacing cues (default).
    #[default]
    Keyword,
    /// Trust a structured progress line the model appends to its replies.
    ModelReported,
}

impl EstimatorKind {
    /// Parses a string into an `EstimatorKind`, case-insensitively.
    fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "keyword" => Some(Self::Keyword),
            "modelreported" | "model_reported" => Some(Self::ModelReported),
            _ => None,
        }
    }

    /// Builds the estimator this kind names for the given ladder.
    #[must_use]
    pub fn build(self, ladder: &Ladder) -> Arc<dyn ProgressEstimator> {
        match self {
            Self::Keyword => Arc::new(KeywordEstimator::new(ladder)),
            Self::ModelReported => Arc::new(ModelReportedEstimator::new()),
        }
    }
}

impl<'de> Deserialize<'de> for EstimatorKind {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str_case_insensitive(&s).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid estimator '{s}': expected 'keyword' or 'modelReported'"
            ))
        })
    }
}

impl Serialize for EstimatorKind {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let s = match self {
            Self::Keyword => "keyword",
            Self::ModelReported => "modelReported",
        };
        serializer.serialize_str(s)
    }
}

/// Request throttling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitConfig {
    /// Requests allowed per window, per API key.
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Window length in seconds.
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_seconds: default_window_seconds(),
        }
    }
}

/// Chat model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatConfig {
    /// Base URL of the chat-completions API.
    #[serde(default = "default_chat_base_url")]
    pub base_url: String,

    /// Model identifier to request.
    #[serde(default = "default_chat_model")]
    pub model: String,

    /// Environment variable the API key is read from.
    #[serde(default = "default_chat_api_key_env")]
    pub api_key_env: String,

    /// Request timeout in seconds.
    #[serde(default = "default_chat_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: default_chat_base_url(),
            model: default_chat_model(),
            api_key_env: default_chat_api_key_env(),
            timeout_seconds: default_chat_timeout(),
        }
    }
}

impl ChatConfig {
    /// Resolves client options, reading the API key from the environment.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::MissingEnvVar` if the configured environment
    /// variable is not set.
    pub fn chat_options(&self) -> Result<ChatOptions> {
        let api_key = std::env::var(&self.api_key_env).map_err(|_| {
            ServerError::missing_env_var(
                &self.api_key_env,
                format!(
                    "Export {}=<your chat API key> before starting the server",
                    self.api_key_env
                ),
            )
        })?;
        Ok(ChatOptions::new(api_key)
            .with_base_url(self.base_url.clone())
            .with_model(self.model.clone())
            .with_timeout_secs(self.timeout_seconds))
    }

    fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(ServerError::config_validation(
                "chat.baseUrl must not be empty",
                "Provide the base URL of an OpenAI-compatible API",
            ));
        }
        if self.model.trim().is_empty() {
            return Err(ServerError::config_validation(
                "chat.model must not be empty",
                "Provide a model identifier, e.g. 'gpt-3.5-turbo'",
            ));
        }
        if self.api_key_env.trim().is_empty() {
            return Err(ServerError::config_validation(
                "chat.apiKeyEnv must not be empty",
                "Name the environment variable holding your chat API key",
            ));
        }
        if self.timeout_seconds == 0 {
            return Err(ServerError::config_validation(
                "chat.timeoutSeconds must be greater than 0",
                "Set chat.timeoutSeconds to at least 1 second",
            ));
        }
        Ok(())
    }
}

/// Knowledge engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeConfig {
    /// Base URL of the short-answers API.
    #[serde(default = "default_knowledge_base_url")]
    pub base_url: String,

    /// Environment variable the application ID is read from.
    #[serde(default = "default_knowledge_app_id_env")]
    pub app_id_env: String,

    /// Request timeout in seconds.
    #[serde(default = "default_knowledge_timeout")]
    pub timeout_seconds: u64,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            base_url: default_knowledge_base_url(),
            app_id_env: default_knowledge_app_id_env(),
            timeout_seconds: default_knowledge_timeout(),
        }
    }
}

impl KnowledgeConfig {
    /// Resolves client options, reading the app ID from the environment.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::MissingEnvVar` if the configured environment
    /// variable is not set.
    pub fn knowledge_options(&self) -> Result<KnowledgeOptions> {
        let app_id = std::env::var(&self.app_id_env).map_err(|_| {
            ServerError::missing_env_var(
                &self.app_id_env,
                format!(
                    "Export {}=<your knowledge app ID> before starting the server",
                    self.app_id_env
                ),
            )
        })?;
        Ok(KnowledgeOptions::new(app_id)
            .with_base_url(self.base_url.clone())
            .with_timeout_secs(self.timeout_seconds))
    }

    fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(ServerError::config_validation(
                "knowledge.baseUrl must not be empty",
                "Provide the base URL of a short-answers API",
            ));
        }
        if self.app_id_env.trim().is_empty() {
            return Err(ServerError::config_validation(
                "knowledge.appIdEnv must not be empty",
                "Name the environment variable holding your knowledge app ID",
            ));
        }
        if self.timeout_seconds == 0 {
            return Err(ServerError::config_validation(
                "knowledge.timeoutSeconds must be greater than 0",
                "Set knowledge.timeoutSeconds to at least 1 second",
            ));
        }
        Ok(())
    }
}
