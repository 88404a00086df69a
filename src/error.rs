//! Error types

use crate::protocol::{ApplicationException, BeeswaxException, TStatus};
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type
///
/// Remote failures are carried verbatim (the decoded exception struct), so the
/// caller always sees the server's original cause.
#[derive(Debug, Error)]
pub enum Error {
    /// Socket creation, read or write failure
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Establishing the socket exceeded the connect timeout
    #[error("connect to {addr} timed out after {timeout:?}")]
    ConnectTimeout {
        /// Address that was dialed
        addr: String,
        /// Configured connect timeout
        timeout: Duration,
    },

    /// SASL negotiation failed or the mechanism is unsupported
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Server raised a BeeswaxException
    #[error("server error: {0}")]
    Beeswax(BeeswaxException),

    /// Server does not know the query handle
    #[error("query not found on server")]
    QueryNotFound,

    /// Server raised a Thrift application exception (unknown method, internal error...)
    #[error("remote application error: {0}")]
    Application(ApplicationException),

    /// Server answered with a non-OK status
    #[error("server returned status {0}")]
    Status(TStatus),

    /// Malformed or unexpected reply
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Invalid options or authentication configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Session already closed, or peer closed the socket
    #[error("connection closed")]
    ConnectionClosed,

    /// Session already tracks an outstanding query
    #[error("connection busy: {0}")]
    ConnectionBusy(String),

    /// Illegal session state transition
    #[error("invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// Expected state
        expected: String,
        /// Actual state
        actual: String,
    },

    /// Cancellation token fired before the remote call completed
    #[error("operation cancelled")]
    Cancelled,

    /// Query reached the EXCEPTION state; carries the server-side log
    #[error("query failed: {0}")]
    QueryFailed(String),
}

impl Error {
    /// Socket-level failure (refused, unreachable, timed out, reset)
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::ConnectTimeout { .. } | Error::ConnectionClosed
        )
    }

    /// SASL negotiation failure
    pub fn is_authentication(&self) -> bool {
        matches!(self, Error::Authentication(_))
    }

    /// Failure reported by the remote service
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Error::Beeswax(_)
                | Error::QueryNotFound
                | Error::Application(_)
                | Error::Status(_)
                | Error::QueryFailed(_)
        )
    }

    /// Stable category label, used for metrics
    pub fn category(&self) -> &'static str {
        match self {
            Error::Io(_) => "io",
            Error::ConnectTimeout { .. } => "connect_timeout",
            Error::Authentication(_) => "authentication",
            Error::Beeswax(_) => "beeswax",
            Error::QueryNotFound => "query_not_found",
            Error::Application(_) => "application",
            Error::Status(_) => "status",
            Error::Protocol(_) => "protocol",
            Error::Config(_) => "config",
            Error::ConnectionClosed => "connection_closed",
            Error::ConnectionBusy(_) => "connection_busy",
            Error::InvalidState { .. } => "invalid_state",
            Error::Cancelled => "cancelled",
            Error::QueryFailed(_) => "query_failed",
        }
    }
}
