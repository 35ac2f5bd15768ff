//! Request envelope and builders.
//!
//! Every message submitted to Gremlin Server is a [`Request`]:
//!
//! ```json
//! {
//!   "requestId": "uuid",
//!   "op": "eval",
//!   "processor": "",
//!   "args": { "gremlin": "g.V()", "language": "gremlin-groovy" }
//! }
//! ```
//!
//! Two operations exist: `eval` for queries, and `authentication` for the
//! SASL reply to a 407 challenge. An authentication request reuses the
//! request id of the challenged query so the server can resume it.

// ============================================================================
// Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64Standard;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::config::Credentials;
use crate::identifiers::RequestId;

// ============================================================================
// Types
// ============================================================================

/// Query parameter bindings, sent verbatim in the request args.
pub type Bindings = FxHashMap<String, String>;

/// Gremlin script language identifier sent with every eval request.
const LANGUAGE: &str = "gremlin-groovy";

/// SASL mechanism used for authentication replies.
const SASL_MECHANISM: &str = "PLAIN";

// ============================================================================
// Op
// ============================================================================

/// Request operation discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    /// Evaluate a Gremlin script.
    Eval,
    /// Answer a SASL authentication challenge.
    Authentication,
}

// ============================================================================
// Request
// ============================================================================

/// A request envelope addressed to Gremlin Server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Correlation key echoed by every response for this request.
    #[serde(rename = "requestId")]
    pub request_id: RequestId,

    /// Operation kind.
    pub op: Op,

    /// Server-side processor; empty for eval, `trampoline` for auth.
    pub processor: String,

    /// Operation arguments.
    pub args: RequestArgs,
}

/// Arguments carried by a [`Request`].
///
/// Field presence depends on the operation: eval requests carry `gremlin`
/// and `language` (plus optional bindings); authentication requests carry
/// `sasl` and `saslMechanism`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestArgs {
    /// Gremlin script text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gremlin: Option<String>,

    /// Script language, always `gremlin-groovy` for eval.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Parameter bindings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bindings: Option<Bindings>,

    /// Parameter rebindings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rebindings: Option<Bindings>,

    /// Base64-encoded SASL PLAIN payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sasl: Option<String>,

    /// SASL mechanism name.
    #[serde(rename = "saslMechanism", skip_serializing_if = "Option::is_none")]
    pub sasl_mechanism: Option<String>,
}

impl Request {
    /// Builds an eval request with a fresh request id.
    #[must_use]
    pub fn eval(
        query: impl Into<String>,
        bindings: Option<Bindings>,
        rebindings: Option<Bindings>,
    ) -> (Self, RequestId) {
        let request_id = RequestId::generate();
        let request = Self {
            request_id,
            op: Op::Eval,
            processor: String::new(),
            args: RequestArgs {
                gremlin: Some(query.into()),
                language: Some(LANGUAGE.to_string()),
                bindings,
                rebindings,
                ..RequestArgs::default()
            },
        };
        (request, request_id)
    }

    /// Builds the SASL PLAIN reply to a 407 challenge.
    ///
    /// Reuses `request_id` of the challenged query. The SASL payload is
    /// `\0username\0password`, base64-encoded.
    #[must_use]
    pub fn authentication(request_id: RequestId, credentials: &Credentials) -> Self {
        let payload = format!("\0{}\0{}", credentials.username, credentials.password);
        Self {
            request_id,
            op: Op::Authentication,
            processor: "trampoline".to_string(),
            args: RequestArgs {
                sasl: Some(Base64Standard.encode(payload)),
                sasl_mechanism: Some(SASL_MECHANISM.to_string()),
                ..RequestArgs::default()
            },
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
