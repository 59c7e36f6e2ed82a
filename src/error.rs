//! Error types and handling infrastructure for dlog.
//!
//! This module provides a centralized error handling system using `thiserror` for
//! custom error types and `anyhow` for application-level error handling with context.
//!
//! Errors split into three tiers: fatal startup errors (daemon unreachable, no
//! terminal), transient per-retrieve errors that stop one streaming direction, and
//! user-input errors surfaced in the infobar.

use thiserror::Error;

/// The main error type for dlog operations.
#[derive(Error, Debug)]
pub enum DlogError {
    /// IO errors from the byte buffer, history file, or save-to-disk path
    #[error("IO operation failed: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// An offset that cannot be represented or addressed in the byte buffer
    #[error("invalid offset: {0}")]
    InvalidOffset(u64),

    /// The container daemon could not be reached
    #[error("container daemon unavailable: {message}")]
    SourceUnavailable { message: String },

    /// The requested container no longer exists on the daemon
    #[error("container gone: {id}")]
    ContainerGone { id: String },

    /// A log stream was shut down while a read was in flight
    #[error("log stream closed")]
    Closed,

    /// A retrieve window contained no records (end of history)
    #[error("retrieved empty logs")]
    RetrieveEmpty,

    /// A filter or search pattern failed to compile
    #[error("bad filter: {message}")]
    BadFilter { message: String },

    /// A record's leading token did not parse as an RFC3339 timestamp
    #[error("bad timestamp: {token}")]
    BadTimestamp { token: String },

    /// Terminal setup or drawing failures
    #[error("terminal failure: {message}")]
    Terminal { message: String },

    /// Generic error for cases not covered by specific variants
    #[error("operation failed: {message}")]
    Other { message: String },
}

/// Standard Result type for dlog operations.
pub type Result<T> = std::result::Result<T, DlogError>;

impl DlogError {
    /// Create an Io error from an io::Error with additional context
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a SourceUnavailable error with a descriptive message
    pub fn source_unavailable(message: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            message: message.into(),
        }
    }

    /// Create a ContainerGone error for a container id
    pub fn container_gone(id: impl Into<String>) -> Self {
        Self::ContainerGone { id: id.into() }
    }

    /// Create a BadFilter error with a descriptive message
    pub fn bad_filter(message: impl Into<String>) -> Self {
        Self::BadFilter {
            message: message.into(),
        }
    }

    /// Create a BadTimestamp error for an unparseable token
    pub fn bad_timestamp(token: impl Into<String>) -> Self {
        Self::BadTimestamp {
            token: token.into(),
        }
    }

    /// Create a Terminal error with a descriptive message
    pub fn terminal(message: impl Into<String>) -> Self {
        Self::Terminal {
            message: message.into(),
        }
    }

    /// Create a generic Other error with a descriptive message
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for DlogError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: "IO operation failed".to_string(),
            source: err,
        }
    }
}
