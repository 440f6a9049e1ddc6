//! Error types for dracin operations.

use thiserror::Error;

/// Result type alias using the dracin Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for governed upstream calls, adapters, and the gateway.
///
/// The enum is `Clone` because a single upstream failure is delivered to every
/// caller that joined the same in-flight request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Upstream answered with a non-success HTTP status.
    #[error("Upstream returned HTTP {status}: {detail}")]
    UpstreamHttp { status: u16, detail: String },

    /// Upstream answered with a success status but no body.
    #[error("Empty response from upstream")]
    EmptyUpstreamResponse,

    /// Upstream body was not valid JSON.
    #[error("Undecodable upstream response: {0}")]
    Decode(String),

    /// The governor queue was already at capacity.
    #[error("Request queue is full ({depth} pending)")]
    QueueOverflow { depth: usize },

    /// A single upstream attempt exceeded the request timeout.
    #[error("Upstream request timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    /// Transport-level failure (DNS, connect, reset).
    #[error("Network error: {0}")]
    Network(String),

    /// Retries ran out; `last` is the failure of the final attempt.
    #[error("{last} (gave up after {attempts} attempts)")]
    Exhausted { attempts: u32, last: Box<Error> },

    /// Entity not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Persistent store error.
    #[error("Store error: {0}")]
    Store(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an upstream HTTP error.
    pub fn upstream(status: u16, detail: impl Into<String>) -> Self {
        Self::UpstreamHttp {
            status,
            detail: detail.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a store error.
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// The underlying failure, looking through [`Error::Exhausted`].
    pub fn root(&self) -> &Error {
        match self {
            Self::Exhausted { last, .. } => last.root(),
            other => other,
        }
    }

    /// Whether a governed request failing with this error may be attempted again.
    ///
    /// 429, 503 and every other 5xx are transient, as are timeouts and
    /// network errors. Remaining 4xx, overflow, empty and undecodable bodies
    /// are terminal.
    pub fn is_retryable(&self) -> bool {
        match self.root() {
            Self::UpstreamHttp { status, .. } => *status == 429 || *status >= 500,
            Self::Timeout { .. } | Self::Network(_) => true,
            _ => false,
        }
    }

    /// Number of upstream attempts this error represents.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } => *attempts,
            _ => 1,
        }
    }

    /// Upstream status code, if the root failure was an HTTP answer.
    pub fn upstream_status(&self) -> Option<u16> {
        match self.root() {
            Self::UpstreamHttp { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Short machine-readable label of the root failure.
    pub fn kind(&self) -> &'static str {
        match self.root() {
            Self::UpstreamHttp { .. } => "upstream_http",
            Self::EmptyUpstreamResponse => "empty_upstream_response",
            Self::Decode(_) => "decode",
            Self::QueueOverflow { .. } => "queue_overflow",
            Self::Timeout { .. } => "timeout",
            Self::Network(_) => "network",
            Self::Exhausted { .. } => "exhausted",
            Self::NotFound { .. } => "not_found",
            Self::Config(_) => "config",
            Self::Store(_) => "store",
            Self::Internal(_) => "internal",
        }
    }

    /// HTTP status the gateway answers with for this error.
    pub fn http_status(&self) -> u16 {
        match self.root() {
            Self::UpstreamHttp { status, .. } => *status,
            Self::EmptyUpstreamResponse | Self::Decode(_) => 502,
            Self::QueueOverflow { .. } => 503,
            // An unreachable upstream is a failed fetch, however it failed.
            Self::Timeout { .. } | Self::Network(_) => 500,
            Self::NotFound { .. } => 404,
            Self::Exhausted { .. } | Self::Config(_) | Self::Store(_) | Self::Internal(_) => 500,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
