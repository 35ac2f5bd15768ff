//! Error types for the Gremlin client.
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use gremlin_ws::{Pool, Result};
//!
//! async fn example(pool: &Pool) -> Result<()> {
//!     let responses = pool.execute("g.V().limit(1)", None, None).await?;
//!     println!("{} response(s)", responses.len());
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Connection | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionDisposed`] |
//! | Protocol | [`Error::Protocol`], [`Error::Server`], [`Error::Unauthorized`], [`Error::Authentication`] |
//! | Pool | [`Error::PoolClosed`] |
//! | Query building | [`Error::NoGraphTags`] |
//! | GraphSON | [`Error::PropertyNotFound`], [`Error::PropertyIsMulti`], [`Error::PropertyIsMeta`], [`Error::UnexpectedType`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Transport failure: dial, read, or write.
    ///
    /// Fatal for the connection; the owning pool purges it.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the transport failure.
        message: String,
    },

    /// Connection attempt exceeded the dial timeout.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Attempted use of a connection after close or fatal error.
    #[error("cannot write on a disposed connection")]
    ConnectionDisposed,

    /// Operation timeout.
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Malformed response or protocol violation.
    ///
    /// Terminal for the originating request; other requests on the same
    /// connection proceed.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// Server-reported failure status (498/499/500/597/598/599).
    #[error("{} - Response Message: {message}", server_label(*code))]
    Server {
        /// Gremlin Server status code.
        code: u16,
        /// Server-supplied message.
        message: String,
    },

    /// Credentials rejected (status 401).
    #[error("UNAUTHORIZED - Response Message: {message}")]
    Unauthorized {
        /// Server-supplied message.
        message: String,
    },

    /// Authentication sub-protocol failed (repeated 407 challenge, or
    /// no credentials configured for a challenging server).
    #[error("AUTHENTICATE - Response Message: {message}")]
    Authentication {
        /// Description of the authentication failure.
        message: String,
    },

    // ========================================================================
    // Pool Errors
    // ========================================================================
    /// The pool has been closed; no further connections are handed out.
    #[error("pool is closed")]
    PoolClosed,

    // ========================================================================
    // Query Building Errors
    // ========================================================================
    /// A record was converted to Gremlin but carried no graph fields.
    #[error("record does not contain any graph fields")]
    NoGraphTags,

    // ========================================================================
    // GraphSON Errors
    // ========================================================================
    /// Vertex property lookup found nothing under the key.
    #[error("property not found: {key}")]
    PropertyNotFound {
        /// The property key requested.
        key: String,
    },

    /// Single-value property lookup hit a multi-valued property.
    #[error("property has multiple values: {key}")]
    PropertyIsMulti {
        /// The property key requested.
        key: String,
    },

    /// Plain property lookup hit a meta property (sub-labelled values).
    #[error("property is a meta property: {key}")]
    PropertyIsMeta {
        /// The property key requested.
        key: String,
    },

    /// A GraphSON value did not carry the expected `@type`.
    #[error("unexpected GraphSON type: expected {expected}")]
    UnexpectedType {
        /// The `@type` that was required.
        expected: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

/// Human label for a server failure code, matching Gremlin Server usage.
fn server_label(code: u16) -> &'static str {
    match code {
        498 => "MALFORMED REQUEST",
        499 => "INVALID REQUEST ARGUMENTS",
        500 => "SERVER ERROR",
        597 => "SCRIPT EVALUATION ERROR",
        598 => "SERVER TIMEOUT",
        599 => "SERVER SERIALIZATION ERROR",
        _ => "UNKNOWN ERROR",
    }
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates an operation timeout error.
    #[inline]
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a server status error.
    #[inline]
    pub fn server(code: u16, message: impl Into<String>) -> Self {
        Self::Server {
            code,
            message: message.into(),
        }
    }

    /// Creates an authentication failure error.
    #[inline]
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Creates a property-not-found error.
    #[inline]
    pub fn property_not_found(key: impl Into<String>) -> Self {
        Self::PropertyNotFound { key: key.into() }
    }

    /// Creates an unexpected-GraphSON-type error.
    #[inline]
    pub fn unexpected_type(expected: impl Into<String>) -> Self {
        Self::UnexpectedType {
            expected: expected.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this error is fatal for its connection.
    ///
    /// Request-scoped errors ([`Error::Server`], [`Error::Protocol`]) leave
    /// the connection usable; connection errors do not.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionDisposed
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this is a server-reported status error.
    #[inline]
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Server { .. })
    }

    /// Returns `true` if this is an authentication-related error.
    #[inline]
    #[must_use]
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::Unauthorized { .. } | Self::Authentication { .. })
    }

    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ConnectionTimeout { .. } | Self::Timeout { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_display() {
        let err = Error::server(500, "SPLAT");
        assert_eq!(err.to_string(), "SERVER ERROR - Response Message: SPLAT");

        let err = Error::server(597, "bad script");
        assert_eq!(
            err.to_string(),
            "SCRIPT EVALUATION ERROR - Response Message: bad script"
        );

        let err = Error::server(777, "what");
        assert_eq!(err.to_string(), "UNKNOWN ERROR - Response Message: what");
    }

    #[test]
    fn test_disposed_display() {
        assert_eq!(
            Error::ConnectionDisposed.to_string(),
            "cannot write on a disposed connection"
        );
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::connection("boom").is_connection_error());
        assert!(Error::ConnectionDisposed.is_connection_error());
        assert!(!Error::server(500, "x").is_connection_error());
        assert!(!Error::protocol("x").is_connection_error());
    }

    #[test]
    fn test_is_auth_error() {
        assert!(
            Error::Unauthorized {
                message: "no".into()
            }
            .is_auth_error()
        );
        assert!(Error::authentication("again").is_auth_error());
        assert!(!Error::PoolClosed.is_auth_error());
    }

    #[test]
    fn test_is_timeout() {
        assert!(Error::connection_timeout(5000).is_timeout());
        assert!(Error::timeout("execute", 100).is_timeout());
        assert!(!Error::NoGraphTags.is_timeout());
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
