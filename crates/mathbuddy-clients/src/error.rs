//! Error types for upstream service clients.
//!
//! Chat-model and knowledge-engine failures are classified by kind so callers
//! can decide between retrying, surfacing a rate limit, or giving up.

/// A specialized `Result` type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Longest upstream body snippet carried in an error message.
const MAX_BODY_SNIPPET: usize = 200;

/// Errors that can occur while talking to upstream services.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The upstream service rejected the request or failed to serve it.
    #[error("Upstream API error ({kind}): {message}\n\nSuggestion: {suggestion}")]
    Api {
        /// The kind of API error (e.g., rate limit, authentication, server).
        kind: ClientErrorKind,
        /// Detailed error message from the service.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    /// The upstream service answered, but the body could not be interpreted.
    #[error("Unexpected upstream response: {message}\n\nSuggestion: Check that the configured base URL points at a compatible service")]
    UnexpectedResponse {
        /// Description of what was wrong with the response.
        message: String,
    },

    /// A client was constructed with unusable options.
    #[error("Invalid client options: {message}\n\nSuggestion: {suggestion}")]
    InvalidOptions {
        /// Description of the invalid option.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },
}

/// Categories of upstream API errors for structured error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientErrorKind {
    /// Authentication failure (invalid API key, expired credentials).
    Authentication,
    /// Rate limit exceeded.
    RateLimit,
    /// Server error (5xx responses).
    Server,
    /// Network connectivity issues.
    Network,
    /// Other unclassified errors.
    Other,
}

impl std::fmt::Display for ClientErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::RateLimit => write!(f, "rate_limit"),
            Self::Server => write!(f, "server"),
            Self::Network => write!(f, "network"),
            Self::Other => write!(f, "other"),
        }
    }
}

impl ClientErrorKind {
    /// Returns a suggestion message for this error kind.
    #[must_use]
    pub const fn suggestion(&self) -> &'static str {
        match self {
            Self::Authentication => "Check your API key or credentials",
            Self::RateLimit => "Wait and retry, or reduce request frequency",
            Self::Server => "Retry later; the upstream service may be experiencing issues",
            Self::Network => "Check your network connection",
            Self::Other => "Check the upstream service's status page",
        }
    }
}

impl ClientError {
    /// Creates a new `Api` error with automatic suggestion based on error kind.
    #[must_use]
    pub fn api(kind: ClientErrorKind, message: impl Into<String>) -> Self {
        let suggestion = kind.suggestion().to_string();
        Self::Api {
            kind,
            message: message.into(),
            suggestion,
        }
    }

    /// Creates a new `UnexpectedResponse` error.
    #[must_use]
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidOptions` error.
    #[must_use]
    pub fn invalid_options(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::InvalidOptions {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Classifies a non-success HTTP status into an `Api` error.
    ///
    /// The response body is trimmed and truncated before it is embedded in the
    /// message, since upstream error pages can run to kilobytes of HTML.
    #[must_use]
    pub fn from_status(status: u16, body: &str) -> Self {
        let kind = match status {
            401 | 403 => ClientErrorKind::Authentication,
            429 => ClientErrorKind::RateLimit,
            500..=599 => ClientErrorKind::Server,
            _ => ClientErrorKind::Other,
        };
        let snippet: String = body.trim().chars().take(MAX_BODY_SNIPPET).collect();
        if snippet.is_empty() {
            Self::api(kind, format!("HTTP {status}"))
        } else {
            Self::api(kind, format!("HTTP {status}: {snippet}"))
        }
    }

    /// Classifies a transport-level failure from the HTTP client.
    #[must_use]
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            Self::api(ClientErrorKind::Network, err.to_string())
        } else if err.is_decode() {
            Self::unexpected(err.to_string())
        } else {
            Self::api(ClientErrorKind::Other, err.to_string())
        }
    }

    /// Returns the error kind when this is an `Api` error.
    #[must_use]
    pub const fn kind(&self) -> Option<ClientErrorKind> {
        match self {
            Self::Api { kind, .. } => Some(*kind),
            Self::UnexpectedResponse { .. } | Self::InvalidOptions { .. } => None,
        }
    }

    /// Returns `true` if this error is transient and may be retried.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Api {
                kind: ClientErrorKind::RateLimit | ClientErrorKind::Server | ClientErrorKind::Network,
                ..
            }
        )
    }
}
