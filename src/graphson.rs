//! GraphSON v3 result decoding.
//!
//! The client core treats `result.data` as opaque bytes; this module is the
//! decoding layer callers (and the pool façade) use to turn that data into
//! vertices, edges, or rows of strings.
//!
//! GraphSON v3 wraps every non-trivial value in a `{"@type": ..., "@value": ...}`
//! envelope. Result data for a query is a `g:List` of such values.

// ============================================================================
// Imports
// ============================================================================

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_json::value::RawValue;

use crate::error::{Error, Result};
use crate::protocol::Response;

// ============================================================================
// Typed Wrappers
// ============================================================================

/// A `g:List` envelope.
#[derive(Debug, Deserialize)]
struct GList<T> {
    #[serde(rename = "@type")]
    kind: String,
    #[serde(rename = "@value")]
    value: Vec<T>,
}

/// Unwraps `{"@type": ..., "@value": ...}` envelopes down to the inner value.
fn flatten(value: &Value) -> &Value {
    let mut current = value;
    while let Some(inner) = current.get("@value") {
        if current.get("@type").is_none() {
            break;
        }
        current = inner;
    }
    current
}

/// Renders a (possibly typed) scalar as a string.
fn scalar_string(value: &Value) -> String {
    match flatten(value) {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ============================================================================
// Vertex
// ============================================================================

/// A GraphSON vertex.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vertex {
    /// Type tag, `g:Vertex`.
    #[serde(rename = "@type")]
    pub kind: String,

    /// Vertex payload.
    #[serde(rename = "@value")]
    pub value: VertexValue,
}

/// Payload of a [`Vertex`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VertexValue {
    /// Vertex id; plain or typed scalar.
    pub id: Value,

    /// Vertex label.
    pub label: String,

    /// Properties keyed by name; each key may hold several values.
    #[serde(default)]
    pub properties: FxHashMap<String, Vec<VertexProperty>>,
}

/// One property value attached to a vertex.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VertexProperty {
    /// Type tag, `g:VertexProperty`.
    #[serde(rename = "@type")]
    pub kind: String,

    /// Property payload.
    #[serde(rename = "@value")]
    pub value: VertexPropertyValue,
}

/// Payload of a [`VertexProperty`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VertexPropertyValue {
    /// Property value id.
    #[serde(default)]
    pub id: Value,

    /// The value itself; plain or typed scalar.
    pub value: Value,

    /// Property label. Equals the property key for plain values; a
    /// sub-label marks a meta property.
    pub label: String,
}

impl Vertex {
    /// Returns the vertex id rendered as a string.
    #[must_use]
    pub fn id(&self) -> String {
        scalar_string(&self.value.id)
    }

    /// Returns the vertex label.
    #[inline]
    #[must_use]
    pub fn label(&self) -> &str {
        &self.value.label
    }

    /// Returns the single plain value stored under `key`.
    ///
    /// # Errors
    ///
    /// - [`Error::PropertyNotFound`] if the key is absent or empty.
    /// - [`Error::PropertyIsMulti`] if the key holds several plain values.
    /// - [`Error::PropertyIsMeta`] if the key holds only sub-labelled values.
    pub fn property(&self, key: &str) -> Result<String> {
        let values = self.multi_property(key)?;
        match values.len() {
            1 => Ok(values.into_iter().next().expect("one value")),
            _ => Err(Error::PropertyIsMulti {
                key: key.to_string(),
            }),
        }
    }

    /// Returns all plain values stored under `key`, in server order.
    ///
    /// # Errors
    ///
    /// - [`Error::PropertyNotFound`] if the key is absent or empty.
    /// - [`Error::PropertyIsMeta`] if the key holds only sub-labelled values.
    pub fn multi_property(&self, key: &str) -> Result<Vec<String>> {
        let entries = self
            .value
            .properties
            .get(key)
            .filter(|entries| !entries.is_empty())
            .ok_or_else(|| Error::property_not_found(key))?;

        let plain: Vec<String> = entries
            .iter()
            .filter(|p| p.value.label == key)
            .map(|p| scalar_string(&p.value.value))
            .collect();

        if plain.is_empty() {
            return Err(Error::PropertyIsMeta {
                key: key.to_string(),
            });
        }
        Ok(plain)
    }

    /// Returns the sub-labelled values stored under `key`, grouped by
    /// sub-label.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PropertyNotFound`] if the key is absent or empty.
    pub fn meta_property(&self, key: &str) -> Result<FxHashMap<String, Vec<String>>> {
        let entries = self
            .value
            .properties
            .get(key)
            .filter(|entries| !entries.is_empty())
            .ok_or_else(|| Error::property_not_found(key))?;

        let mut grouped: FxHashMap<String, Vec<String>> = FxHashMap::default();
        for property in entries {
            grouped
                .entry(property.value.label.clone())
                .or_default()
                .push(scalar_string(&property.value.value));
        }
        Ok(grouped)
    }
}

// ============================================================================
// Edge
// ============================================================================

/// A GraphSON edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    /// Type tag, `g:Edge`.
    #[serde(rename = "@type")]
    pub kind: String,

    /// Edge payload.
    #[serde(rename = "@value")]
    pub value: EdgeValue,
}

/// Payload of an [`Edge`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeValue {
    /// Edge id; plain or typed scalar.
    pub id: Value,

    /// Edge label.
    pub label: String,

    /// Head vertex id.
    #[serde(rename = "inV")]
    pub in_v: Value,

    /// Tail vertex id.
    #[serde(rename = "outV")]
    pub out_v: Value,

    /// Head vertex label.
    #[serde(rename = "inVLabel", default)]
    pub in_v_label: String,

    /// Tail vertex label.
    #[serde(rename = "outVLabel", default)]
    pub out_v_label: String,
}

/// A list of edges.
pub type Edges = Vec<Edge>;

impl Edge {
    /// Returns the edge id rendered as a string.
    #[must_use]
    pub fn id(&self) -> String {
        scalar_string(&self.value.id)
    }

    /// Returns the edge label.
    #[inline]
    #[must_use]
    pub fn label(&self) -> &str {
        &self.value.label
    }
}

// ============================================================================
// List Deserializers
// ============================================================================

fn glist<T: serde::de::DeserializeOwned>(raw: &RawValue) -> Result<Vec<T>> {
    let list: GList<T> = serde_json::from_str(raw.get())
        .map_err(|e| Error::protocol(format!("invalid GraphSON list: {e}")))?;
    if list.kind != "g:List" {
        return Err(Error::unexpected_type("g:List"));
    }
    Ok(list.value)
}

/// Decodes a `g:List` of vertices.
///
/// # Errors
///
/// Returns [`Error::Protocol`] on malformed data and
/// [`Error::UnexpectedType`] when the envelope is not a `g:List`.
pub fn vertex_list(raw: &RawValue) -> Result<Vec<Vertex>> {
    glist(raw)
}

/// Decodes a `g:List` of edges.
///
/// # Errors
///
/// Same as [`vertex_list`].
pub fn edge_list(raw: &RawValue) -> Result<Edges> {
    glist(raw)
}

/// Decodes a `g:List` of strings, one per result row.
///
/// # Errors
///
/// Returns [`Error::Protocol`] on malformed data or non-string elements,
/// [`Error::UnexpectedType`] when the envelope is not a `g:List`.
pub fn string_list(raw: &RawValue) -> Result<Vec<String>> {
    let values: Vec<Value> = glist(raw)?;
    values
        .iter()
        .map(|v| match flatten(v) {
            Value::String(s) => Ok(s.clone()),
            other => Err(Error::protocol(format!(
                "expected string in g:List, got: {other}"
            ))),
        })
        .collect()
}

// ============================================================================
// Response Helpers
// ============================================================================

/// Decodes and concatenates the vertices carried by a batch of responses.
///
/// An empty batch, or a batch whose first response is 204 no-content,
/// yields an empty vec.
pub fn vertices_from_responses(responses: &[Response]) -> Result<Vec<Vertex>> {
    if responses.is_empty() || responses[0].is_no_content() {
        return Ok(Vec::new());
    }

    let mut vertices = Vec::new();
    for response in responses {
        if let Some(data) = response.data() {
            vertices.extend(vertex_list(data)?);
        }
    }
    Ok(vertices)
}

/// Decodes and concatenates the edges carried by a batch of responses.
pub fn edges_from_responses(responses: &[Response]) -> Result<Edges> {
    if responses.is_empty() || responses[0].is_no_content() {
        return Ok(Edges::new());
    }

    let mut edges = Edges::new();
    for response in responses {
        if let Some(data) = response.data() {
            edges.extend(edge_list(data)?);
        }
    }
    Ok(edges)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX_LIST: &str = r#"{"@type":"g:List","@value":[
        {"@type":"g:Vertex","@value":{"id":"test-id","label":"my-label",
        "properties":{
        "health":[
        {"@type":"g:VertexProperty","@value":{"id":{"@type":"Type","@value":1},"value":"1212","label":"health"}}
        ],
        "p2":[
        {"@type":"g:VertexProperty","@value":{"id":{"@type":"Type","@value":1},"value":"1212","label":"p2"}},
        {"@type":"g:VertexProperty","@value":{"id":{"@type":"Type","@value":2},"value":"3131","label":"p2"}}
        ],
        "mapkey":[
        {"@type":"g:VertexProperty","@value":{"id":{"@type":"Type","@value":1},"value":"mapkey-val1","label":"mapkey-sub1"}},
        {"@type":"g:VertexProperty","@value":{"id":{"@type":"Type","@value":2},"value":"mapkey-val2","label":"mapkey-sub2"}}
        ],
        "num":[
        {"@type":"g:VertexProperty","@value":{"id":{"@type":"Type","@value":1},"value":{"@type":"g:Int32","@value":1234},"label":"num"}}
        ]}}}]}"#;

    fn raw(json: &str) -> Box<RawValue> {
        RawValue::from_string(json.to_string()).expect("raw value")
    }

    #[test]
    fn test_vertex_list() {
        let vertices = vertex_list(&raw(VERTEX_LIST)).expect("decode");
        assert_eq!(vertices.len(), 1);

        let vertex = &vertices[0];
        assert_eq!(vertex.id(), "test-id");
        assert_eq!(vertex.label(), "my-label");
    }

    #[test]
    fn test_single_property() {
        let vertices = vertex_list(&raw(VERTEX_LIST)).expect("decode");
        let vertex = &vertices[0];

        assert_eq!(vertex.property("health").expect("health"), "1212");
        assert!(matches!(
            vertex.property("not-a-prop"),
            Err(Error::PropertyNotFound { .. })
        ));
        assert!(matches!(
            vertex.property("p2"),
            Err(Error::PropertyIsMulti { .. })
        ));
        assert!(matches!(
            vertex.property("mapkey"),
            Err(Error::PropertyIsMeta { .. })
        ));
    }

    #[test]
    fn test_multi_property() {
        let vertices = vertex_list(&raw(VERTEX_LIST)).expect("decode");
        let vertex = &vertices[0];

        assert_eq!(vertex.multi_property("p2").expect("p2"), vec!["1212", "3131"]);
        assert_eq!(vertex.multi_property("health").expect("health"), vec!["1212"]);
    }

    #[test]
    fn test_typed_scalar_property() {
        let vertices = vertex_list(&raw(VERTEX_LIST)).expect("decode");
        // g:Int32-wrapped value renders as its inner number
        assert_eq!(vertices[0].property("num").expect("num"), "1234");
    }

    #[test]
    fn test_meta_property() {
        let vertices = vertex_list(&raw(VERTEX_LIST)).expect("decode");
        let grouped = vertices[0].meta_property("mapkey").expect("mapkey");

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped["mapkey-sub1"], vec!["mapkey-val1"]);
        assert_eq!(grouped["mapkey-sub2"], vec!["mapkey-val2"]);
    }

    #[test]
    fn test_string_list() {
        let rows =
            string_list(&raw(r#"{"@type":"g:List","@value":["row-one","row-two"]}"#)).expect("rows");
        assert_eq!(rows, vec!["row-one", "row-two"]);
    }

    #[test]
    fn test_not_a_list() {
        let err = vertex_list(&raw(r#"{"@type":"g:Map","@value":[]}"#)).expect_err("must fail");
        assert!(matches!(err, Error::UnexpectedType { .. }));
    }

    #[test]
    fn test_edge_list() {
        let edges = edge_list(&raw(
            r#"{"@type":"g:List","@value":[
            {"@type":"g:Edge","@value":{"id":"e-1","label":"knows",
            "inV":"v-2","outV":"v-1","inVLabel":"person","outVLabel":"person"}}]}"#,
        ))
        .expect("decode");

        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].id(), "e-1");
        assert_eq!(edges[0].label(), "knows");
        assert_eq!(edges[0].value.in_v_label, "person");
    }
}
