//! Gremlin Server protocol message types and framing.
//!
//! # Protocol Overview
//!
//! | Message | Direction | Purpose |
//! |---------|-----------|---------|
//! | [`Request`] (`op: eval`) | Client → Server | Evaluate a Gremlin script |
//! | [`Request`] (`op: authentication`) | Client → Server | SASL reply to a 407 challenge |
//! | [`Response`] | Server → Client | One result message; several may share a request id |
//!
//! A query is answered by one or more responses with the same `requestId`.
//! All but the last carry status 206; the last carries a terminal status
//! (200, 204, or a failure code).
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `codec` | MIME-prefixed binary framing |
//! | `request` | Request envelope and builders |
//! | `response` | Response envelope, status codes, error classification |

// ============================================================================
// Submodules
// ============================================================================

/// Wire framing for requests and responses.
pub mod codec;

/// Request envelope and builders.
pub mod request;

/// Response envelope and status classification.
pub mod response;

// ============================================================================
// Re-exports
// ============================================================================

pub use codec::{MIME_TYPE, decode_response, encode_request};
pub use request::{Bindings, Op, Request, RequestArgs};
pub use response::{Response, ResultPayload, Status};
