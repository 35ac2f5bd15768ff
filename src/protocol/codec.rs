//! Wire framing for requests and responses.
//!
//! Outbound frames are a length-prefixed MIME identifier followed by the
//! JSON request body, sent as one binary WebSocket message:
//!
//! ```text
//! [len: u8][application/vnd.gremlin-v3.0+json][json body]
//! ```
//!
//! `len` is the octet length of the MIME string (0x21 for the default).
//! Inbound messages are bare JSON with no MIME prefix.

// ============================================================================
// Imports
// ============================================================================

use crate::error::{Error, Result};
use crate::protocol::{Request, Response};

// ============================================================================
// Constants
// ============================================================================

/// Serialization format announced on every request.
pub const MIME_TYPE: &str = "application/vnd.gremlin-v3.0+json";

// ============================================================================
// Encoding / Decoding
// ============================================================================

/// Encodes a request into its framed wire form.
///
/// # Errors
///
/// Returns [`Error::Json`] if the request fails to serialize.
pub fn encode_request(request: &Request) -> Result<Vec<u8>> {
    let body = serde_json::to_vec(request)?;

    let mut frame = Vec::with_capacity(1 + MIME_TYPE.len() + body.len());
    frame.push(MIME_TYPE.len() as u8);
    frame.extend_from_slice(MIME_TYPE.as_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Decodes a raw inbound message into a [`Response`].
///
/// # Errors
///
/// Returns [`Error::Protocol`] if the payload is not a valid response
/// envelope.
pub fn decode_response(payload: &[u8]) -> Result<Response> {
    serde_json::from_slice(payload)
        .map_err(|e| Error::protocol(format!("invalid response JSON: {e}")))
}

// ============================================================================
// Tests
// ============================================================================
