//! Gremlin Server client over WebSocket, with pooled multiplexed
//! connections.
//!
//! This library speaks the Gremlin Server protocol (GraphSON v3) over a
//! full-duplex WebSocket. Each connection multiplexes any number of
//! concurrent queries, correlating interleaved, possibly chunked responses
//! back to their callers by request id; a pool manages connection
//! lifetimes, health, and reuse under concurrent demand.
//!
//! # Architecture
//!
//! ```text
//! caller ──► Pool::execute ──► Client ──► write worker ──► WebSocket
//!                                ▲                             │
//!                                │    read worker ◄────────────┘
//!                  correlation table ◄── dispatch worker
//! ```
//!
//! Key design points:
//!
//! - One writing task and one reading task per connection; callers
//!   rendezvous with them through bounded channels.
//! - Responses are correlated by UUID; chunked results (status 206) either
//!   accumulate for a single delivery or stream through a [`Cursor`].
//! - A connection that observes a transport error is purged; the pool
//!   dials a replacement on demand.
//! - SASL PLAIN authentication challenges (status 407) are answered
//!   transparently.
//!
//! # Quick Start
//!
//! ```no_run
//! use gremlin_ws::{Options, Pool, PoolOptions, Result};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let (errs, mut errs_rx) = mpsc::unbounded_channel();
//!     tokio::spawn(async move {
//!         while let Some(e) = errs_rx.recv().await {
//!             eprintln!("lost connection: {e}");
//!         }
//!     });
//!
//!     let pool = Pool::with_dialer(
//!         Options::new("ws://127.0.0.1:8182/gremlin"),
//!         PoolOptions::new().with_max_open(4),
//!         errs,
//!     );
//!
//!     let vertices = pool.get_vertices("g.V().limit(10)", None, None).await?;
//!     println!("{} vertices", vertices.len());
//!
//!     pool.close().await;
//!     Ok(())
//! }
//! ```
//!
//! Streaming large result sets through a cursor:
//!
//! ```no_run
//! # use gremlin_ws::{Options, Pool, PoolOptions, Result};
//! # async fn example(pool: &Pool) -> Result<()> {
//! let cursor = pool.open_cursor("g.V()", None, None).await?;
//! loop {
//!     let (vertices, done) = pool.read_cursor(&cursor).await?;
//!     for vertex in &vertices {
//!         println!("{}", vertex.id());
//!     }
//!     if done {
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Per-connection request multiplexing |
//! | [`config`] | Connection and pool configuration |
//! | [`cursor`] | Cursor handles and row streaming |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`graphson`] | GraphSON v3 result decoding |
//! | [`identifiers`] | Request id newtype |
//! | [`pool`] | Connection pool and query façade |
//! | [`protocol`] | Wire envelopes and framing (internal) |
//! | [`query`] | Record-to-Gremlin conversion |
//! | [`transport`] | Transport trait and WebSocket implementation |

// ============================================================================
// Modules
// ============================================================================

/// Per-connection request multiplexing.
pub mod client;

/// Connection and pool configuration.
pub mod config;

/// Cursor handles and row streaming.
pub mod cursor;

/// Error types and result aliases.
pub mod error;

/// GraphSON v3 result decoding.
pub mod graphson;

/// Type-safe request identifier.
pub mod identifiers;

/// Connection pool and query façade.
pub mod pool;

/// Gremlin Server protocol message types.
pub mod protocol;

/// Gremlin query construction from typed records.
pub mod query;

/// Message transport layer.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Core surface
pub use client::{Client, ErrorSink};
pub use pool::{DialFn, DialFuture, Pool};

// Configuration
pub use config::{Credentials, Options, PoolOptions};

// Cursors and streaming
pub use cursor::{Cursor, Retriever, Stream};

// Error types
pub use error::{Error, Result};

// Identifiers
pub use identifiers::RequestId;

// Protocol surface callers see through responses
pub use protocol::{Bindings, Response, ResultPayload, Status};

// GraphSON results
pub use graphson::{Edge, Edges, Vertex};

// Query construction
pub use query::{FieldKind, GraphField, GraphRecord, gremlin_for_vertex};

// Transport seam
pub use transport::{Transport, WsTransport};
