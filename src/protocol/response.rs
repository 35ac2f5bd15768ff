//! Response envelope and status classification.
//!
//! Gremlin Server answers a request with one or more responses sharing the
//! request id. Non-terminal responses carry status 206 (partial content);
//! the final response carries 200, 204, or a failure status.
//!
//! `result.data` is opaque here: it stays raw JSON until a caller hands it
//! to the GraphSON layer.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_json::value::RawValue;

use crate::error::Error;
use crate::identifiers::RequestId;

// ============================================================================
// Status Codes
// ============================================================================

/// Terminal success.
pub const SUCCESS: u16 = 200;
/// Terminal success with no result data.
pub const NO_CONTENT: u16 = 204;
/// Non-terminal chunk of a larger result set.
pub const PARTIAL_CONTENT: u16 = 206;
/// Credentials rejected.
pub const UNAUTHORIZED: u16 = 401;
/// Server demands SASL authentication for this request.
pub const AUTHENTICATE: u16 = 407;
/// Request envelope could not be parsed by the server.
pub const MALFORMED_REQUEST: u16 = 498;
/// Request arguments rejected.
pub const INVALID_REQUEST_ARGUMENTS: u16 = 499;
/// General server failure.
pub const SERVER_ERROR: u16 = 500;
/// Script evaluation failed.
pub const SCRIPT_EVALUATION_ERROR: u16 = 597;
/// Server-side timeout.
pub const SERVER_TIMEOUT: u16 = 598;
/// Server failed to serialize the result.
pub const SERVER_SERIALIZATION_ERROR: u16 = 599;

// ============================================================================
// Status
// ============================================================================

/// Status block of a response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Status {
    /// Server-supplied message, usually empty on success.
    #[serde(default)]
    pub message: String,

    /// Status code, see the constants in this module.
    pub code: u16,

    /// Free-form status attributes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<FxHashMap<String, Value>>,
}

impl Status {
    /// Classifies this status into an error, or `None` for the
    /// non-error codes 200, 204 and 206.
    ///
    /// 407 classifies as [`Error::Authentication`]; the dispatcher
    /// intercepts the first challenge, so this only surfaces when a
    /// challenge repeats after credentials were already sent.
    #[must_use]
    pub fn as_error(&self) -> Option<Error> {
        match self.code {
            SUCCESS | NO_CONTENT | PARTIAL_CONTENT => None,
            UNAUTHORIZED => Some(Error::Unauthorized {
                message: self.message.clone(),
            }),
            AUTHENTICATE => Some(Error::authentication(self.message.clone())),
            code => Some(Error::server(code, self.message.clone())),
        }
    }
}

// ============================================================================
// ResultPayload
// ============================================================================

/// Result block of a response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultPayload {
    /// Raw GraphSON result data; absent on errors and 204.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Box<RawValue>>,

    /// Result metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<FxHashMap<String, Value>>,
}

// ============================================================================
// Response
// ============================================================================

/// A response envelope from Gremlin Server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Request id this response answers.
    #[serde(rename = "requestId")]
    pub request_id: RequestId,

    /// Status block.
    pub status: Status,

    /// Result block.
    #[serde(default)]
    pub result: ResultPayload,
}

impl Response {
    /// Returns `true` for a non-terminal chunk (status 206).
    #[inline]
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.status.code == PARTIAL_CONTENT
    }

    /// Returns `true` for a terminal empty result (status 204).
    #[inline]
    #[must_use]
    pub fn is_no_content(&self) -> bool {
        self.status.code == NO_CONTENT
    }

    /// Returns the raw result data, if any.
    #[inline]
    #[must_use]
    pub fn data(&self) -> Option<&RawValue> {
        self.result.data.as_deref()
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Response {{ requestId: {}, code: {}, message: {:?}, data: {} bytes }}",
            self.request_id,
            self.status.code,
            self.status.message,
            self.data().map_or(0, |d| d.get().len()),
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
