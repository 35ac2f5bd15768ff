//! Message transport layer.
//!
//! The client core talks to Gremlin Server through the [`Transport`] trait:
//! a full-duplex, message-oriented byte channel. Production code uses
//! [`WsTransport`] (tokio-tungstenite); tests drive the same client with a
//! scripted in-memory transport.
//!
//! # Contract
//!
//! Writing and reading are independent, but neither side may be called
//! concurrently with itself: the client runs exactly one writing task
//! (requests and keepalives) and one reading task per connection.

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket transport implementation.
pub mod ws;

#[cfg(test)]
pub(crate) mod mock;

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;

use crate::config::Credentials;
use crate::error::Result;

// ============================================================================
// Transport
// ============================================================================

/// A connected, full-duplex message channel to the server.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one framed request as a single message.
    ///
    /// # Errors
    ///
    /// Fails on I/O error or when the transport is disposed; either is
    /// fatal for the connection.
    async fn send_message(&self, payload: Vec<u8>) -> Result<()>;

    /// Waits for the next data message.
    ///
    /// Returns `Ok(None)` when the remote end closed the connection
    /// cleanly.
    ///
    /// # Errors
    ///
    /// Fails on I/O error; fatal for the connection.
    async fn receive_message(&self) -> Result<Option<Vec<u8>>>;

    /// Sends a keepalive frame through the writing side.
    ///
    /// # Errors
    ///
    /// Fails on I/O error; treated as connection death by the keepalive
    /// worker.
    async fn send_ping(&self) -> Result<()>;

    /// Initiates a graceful close. Idempotent.
    ///
    /// # Errors
    ///
    /// Close-handshake failures are reported but the transport is disposed
    /// regardless.
    async fn close(&self) -> Result<()>;

    /// Returns `true` once closed or after a fatal error.
    fn is_disposed(&self) -> bool;

    /// SASL PLAIN credentials configured for this connection, if any.
    fn credentials(&self) -> Option<Credentials>;

    /// Interval between keepalive pings. Zero disables keepalives.
    fn ping_interval(&self) -> Duration;
}

// ============================================================================
// Re-exports
// ============================================================================

pub use ws::WsTransport;
