//! Error types for Redis operations

use thiserror::Error;

/// Result type for Redis operations
pub type RedisResult<T> = Result<T, RedisError>;

/// Error code Redis replies with when a consumer group already exists
pub const BUSYGROUP: &str = "BUSYGROUP";

/// Error code Redis replies with when EVALSHA references an unknown script
pub const NOSCRIPT: &str = "NOSCRIPT";

/// Comprehensive error type for Redis operations
#[derive(Error, Debug)]
pub enum RedisError {
    /// Error reported by the underlying Redis driver
    #[error("Redis error: {0}")]
    Driver(#[from] redis::RedisError),

    /// Raw server error reply, code first (`"BUSYGROUP ..."`)
    ///
    /// The `redis` driver reports replies as [`RedisError::Driver`]; this
    /// variant is for custom stream backends that talk to Redis some other
    /// way. [`RedisError::code`] and the `is_*` helpers read both.
    #[error("Server error: {0}")]
    Server(String),

    /// Connection could not be established
    #[error("Connection error: {0}")]
    Connection(String),

    /// Timeout error
    #[error("Operation timed out")]
    Timeout,

    /// The caller's cancellation token fired while the operation was in flight
    #[error("Operation cancelled")]
    Cancelled,

    /// Type conversion error
    #[error("Type conversion error: {0}")]
    Type(String),

    /// Invalid configuration or arguments
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Maximum retry attempts exceeded
    #[error("Maximum retry attempts ({0}) exceeded")]
    MaxRetriesExceeded(usize),

    /// Unexpected response from server
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// A message handler failed and the consumer was configured to stop
    #[error("Handler failed for message {id}: {reason}")]
    Handler {
        /// ID of the message that failed
        id: String,
        /// Handler error rendered as text
        reason: String,
    },

    /// A background consumer task panicked or was aborted
    #[error("Consumer task failed: {0}")]
    Task(String),
}

impl RedisError {
    /// Error code of a server error reply (`BUSYGROUP`, `NOSCRIPT`, `WRONGTYPE`, ...)
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Driver(err) => err.code(),
            Self::Server(msg) => msg.split_whitespace().next(),
            _ => None,
        }
    }

    /// Check whether this is the "consumer group already exists" reply
    #[must_use]
    pub fn is_busy_group(&self) -> bool {
        self.code() == Some(BUSYGROUP)
    }

    /// Check whether this is the "script not loaded" reply
    #[must_use]
    pub fn is_no_script(&self) -> bool {
        match self {
            Self::Driver(err) => err.kind() == redis::ErrorKind::NoScriptError,
            _ => self.code() == Some(NOSCRIPT),
        }
    }

    /// Check whether this error was caused by a timeout
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout => true,
            Self::Driver(err) => err.is_timeout(),
            _ => false,
        }
    }

    /// Check whether the connection that produced this error is unusable
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::Connection(_) => true,
            Self::Driver(err) => {
                err.is_connection_dropped() || err.is_connection_refusal() || err.is_io_error()
            }
            _ => false,
        }
    }
}
