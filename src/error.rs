//! Error types for blog-archive
//!
//! Failures fall into three groups:
//! - [`FetchError`]: the feed could not be read (transport) or answered with an
//!   error envelope (application). Ends the ingestion loop, never the process.
//! - [`DatabaseError`]: the record store failed. Propagated to the caller.
//! - Asset download failures never become an [`Error`]; workers log them and
//!   count them in the pool's drain report.

use thiserror::Error;

/// Result type alias for blog-archive operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for blog-archive
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "assets.workers")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// Feed request failed
    #[error("feed error: {0}")]
    Fetch(#[from] FetchError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error outside of a feed request
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The asset pool has been shut down and accepts no more work
    #[error("asset pool is shut down: not accepting new downloads")]
    ShuttingDown,

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Constraint violation (e.g., duplicate key)
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
}

/// A feed request that did not produce a usable response
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The request never got a response (connect failure, timeout, reset)
    #[error("transport failure: {0}")]
    Transport(String),

    /// The feed responded but signalled an error, or the body was unusable
    #[error("feed returned status {status}: {message}")]
    Application {
        /// HTTP or envelope status code
        status: u16,
        /// Message from the envelope, or a description of what was wrong
        message: String,
    },
}

impl FetchError {
    /// Whether the failure happened before any response was received
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Status code carried by an application-level failure
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport(_) => None,
            Self::Application { status, .. } => Some(*status),
        }
    }
}

/// Send failures carry no status and become transport errors
impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Self::Application {
                status: status.as_u16(),
                message: e.to_string(),
            },
            None => Self::Transport(e.to_string()),
        }
    }
}

impl Error {
    /// Shorthand for a configuration error tied to a config key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}
