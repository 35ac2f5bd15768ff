//! Gremlin query construction from typed records.
//!
//! A record is described by an ordered list of [`GraphField`]s, each pairing
//! a property name with a [`FieldKind`] that controls quoting. From those,
//! [`gremlin_for_vertex`] builds the two traversal fragments for a vertex:
//!
//! - add form: `addV('label').property(id,'...').property('name',value)...`
//! - get form: `V('label').hasId('...').has('name',value)...`
//!
//! Neither fragment starts with `g.`; callers prepend it.
//!
//! # Example
//!
//! ```ignore
//! use gremlin_ws::query::{GraphField, gremlin_for_vertex};
//!
//! let fields = vec![
//!     GraphField::id("simple-id"),
//!     GraphField::string("prop", "prop-val"),
//! ];
//! let (add, get) = gremlin_for_vertex("laybull", &fields)?;
//! assert_eq!(add, "addV('laybull').property(id,'simple-id').property('prop','prop-val')");
//! assert_eq!(get, "V('laybull').hasId('simple-id').has('prop','prop-val')");
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt::Write as _;

use crate::error::{Error, Result};

// ============================================================================
// FieldKind
// ============================================================================

/// How a field's values are rendered into Gremlin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// The vertex id; quoted, addressed via `property(id, ...)` / `hasId(...)`.
    Id,
    /// A string property; quoted, with single quotes escaped.
    Str,
    /// A boolean property; rendered verbatim.
    Bool,
    /// A numeric property; rendered verbatim.
    Number,
    /// Any other scalar; rendered verbatim.
    Other,
    /// A list of strings; one quoted call per element.
    StrList,
    /// A list of booleans; one verbatim call per element.
    BoolList,
    /// A list of numbers; one verbatim call per element.
    NumberList,
    /// A list of other scalars; one verbatim call per element.
    OtherList,
}

impl FieldKind {
    /// Returns `true` when values of this kind are single-quoted.
    #[inline]
    #[must_use]
    const fn is_quoted(self) -> bool {
        matches!(self, Self::Id | Self::Str | Self::StrList)
    }
}

// ============================================================================
// GraphField
// ============================================================================

/// One named field of a record, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphField {
    /// Property name; ignored for [`FieldKind::Id`].
    pub name: String,

    /// Rendering kind.
    pub kind: FieldKind,

    /// Pre-rendered values. Scalar kinds use the first element; list kinds
    /// emit one call per element.
    pub values: Vec<String>,
}

impl GraphField {
    /// The vertex id field.
    #[must_use]
    pub fn id(value: impl Into<String>) -> Self {
        Self {
            name: "id".to_string(),
            kind: FieldKind::Id,
            values: vec![value.into()],
        }
    }

    /// A string property.
    #[must_use]
    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Str,
            values: vec![value.into()],
        }
    }

    /// A boolean property.
    #[must_use]
    pub fn boolean(name: impl Into<String>, value: bool) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Bool,
            values: vec![value.to_string()],
        }
    }

    /// A numeric property.
    #[must_use]
    pub fn number(name: impl Into<String>, value: impl ToString) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Number,
            values: vec![value.to_string()],
        }
    }

    /// An untyped scalar property, rendered verbatim.
    #[must_use]
    pub fn other(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Other,
            values: vec![value.into()],
        }
    }

    /// A list-of-strings property.
    #[must_use]
    pub fn strings<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            kind: FieldKind::StrList,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// A list-of-numbers property.
    #[must_use]
    pub fn numbers<I, N>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: ToString,
    {
        Self {
            name: name.into(),
            kind: FieldKind::NumberList,
            values: values.into_iter().map(|n| n.to_string()).collect(),
        }
    }

    /// A list-of-booleans property.
    #[must_use]
    pub fn booleans(name: impl Into<String>, values: impl IntoIterator<Item = bool>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::BoolList,
            values: values.into_iter().map(|b| b.to_string()).collect(),
        }
    }
}

// ============================================================================
// GraphRecord
// ============================================================================

/// A record convertible to Gremlin vertex traversals.
///
/// Implement on domain types to use [`crate::Pool::add_vertex`] directly;
/// a plain `&[GraphField]` slice also works.
pub trait GraphRecord {
    /// The record's fields, in declaration order.
    fn graph_fields(&self) -> Vec<GraphField>;
}

impl GraphRecord for [GraphField] {
    fn graph_fields(&self) -> Vec<GraphField> {
        self.to_vec()
    }
}

impl GraphRecord for Vec<GraphField> {
    fn graph_fields(&self) -> Vec<GraphField> {
        self.clone()
    }
}

// ============================================================================
// Conversion
// ============================================================================

/// Escapes single quotes for embedding in a single-quoted Gremlin string.
pub(crate) fn escape(value: &str) -> String {
    value.replace('\'', "\\'")
}

/// Builds the `addV` and `V` traversal fragments for a labelled record.
///
/// Field order follows the record's declaration order, so conversion is
/// deterministic. Scalar `id`/`string` fields with empty values are
/// omitted.
///
/// # Errors
///
/// Returns [`Error::NoGraphTags`] when the record has no fields at all.
pub fn gremlin_for_vertex<R: GraphRecord + ?Sized>(
    label: &str,
    record: &R,
) -> Result<(String, String)> {
    let fields = record.graph_fields();
    if fields.is_empty() {
        return Err(Error::NoGraphTags);
    }

    let mut add = format!("addV('{}')", escape(label));
    let mut get = format!("V('{}')", escape(label));

    for field in &fields {
        match field.kind {
            FieldKind::Id => {
                let Some(value) = field.values.first() else {
                    continue;
                };
                if value.is_empty() {
                    continue;
                }
                let value = escape(value);
                let _ = write!(add, ".property(id,'{value}')");
                let _ = write!(get, ".hasId('{value}')");
            }
            FieldKind::Str => {
                let Some(value) = field.values.first() else {
                    continue;
                };
                if value.is_empty() {
                    continue;
                }
                push_property(&mut add, &mut get, &field.name, value, true);
            }
            FieldKind::Bool | FieldKind::Number | FieldKind::Other => {
                let Some(value) = field.values.first() else {
                    continue;
                };
                push_property(&mut add, &mut get, &field.name, value, false);
            }
            FieldKind::StrList | FieldKind::BoolList | FieldKind::NumberList
            | FieldKind::OtherList => {
                for value in &field.values {
                    push_property(&mut add, &mut get, &field.name, value, field.kind.is_quoted());
                }
            }
        }
    }

    Ok((add, get))
}

fn push_property(add: &mut String, get: &mut String, name: &str, value: &str, quoted: bool) {
    let name = escape(name);
    if quoted {
        let value = escape(value);
        let _ = write!(add, ".property('{name}','{value}')");
        let _ = write!(get, ".has('{name}','{value}')");
    } else {
        let _ = write!(add, ".property('{name}',{value})");
        let _ = write!(get, ".has('{name}',{value})");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple() {
        let fields = vec![
            GraphField::id("simple-id"),
            GraphField::string("prop", "prop-val"),
        ];
        let (add, get) = gremlin_for_vertex("laybull", &fields).expect("convert");

        assert_eq!(
            add,
            "addV('laybull').property(id,'simple-id').property('prop','prop-val')"
        );
        assert_eq!(get, "V('laybull').hasId('simple-id').has('prop','prop-val')");
    }

    #[test]
    fn test_escaped_quote() {
        let fields = vec![GraphField::string("prop", "prop-o'val")];
        let (add, get) = gremlin_for_vertex("escapee", &fields).expect("convert");

        assert_eq!(add, r"addV('escapee').property('prop','prop-o\'val')");
        assert_eq!(get, r"V('escapee').has('prop','prop-o\'val')");
    }

    #[test]
    fn test_no_id() {
        let fields = vec![GraphField::string("prop", "prop-val")];
        let (add, get) = gremlin_for_vertex("no-eye-dee", &fields).expect("convert");

        assert_eq!(add, "addV('no-eye-dee').property('prop','prop-val')");
        assert_eq!(get, "V('no-eye-dee').has('prop','prop-val')");
    }

    #[test]
    fn test_bool_and_string_array() {
        let fields = vec![
            GraphField::boolean("prop", true),
            GraphField::strings("ps", ["ook", "foo"]),
        ];
        let (add, get) = gremlin_for_vertex("typer", &fields).expect("convert");

        assert_eq!(
            add,
            "addV('typer').property('prop',true).property('ps','ook').property('ps','foo')"
        );
        assert_eq!(
            get,
            "V('typer').has('prop',true).has('ps','ook').has('ps','foo')"
        );
    }

    #[test]
    fn test_number_and_number_list() {
        let fields = vec![
            GraphField::id("eye-dee2"),
            GraphField::strings("val", ["my-val1", "my-val2"]),
            GraphField::number("num", 1234),
        ];
        let (add, _) = gremlin_for_vertex("laybull2", &fields).expect("convert");

        assert_eq!(
            add,
            "addV('laybull2').property(id,'eye-dee2').property('val','my-val1')\
             .property('val','my-val2').property('num',1234)"
        );
    }

    #[test]
    fn test_empty_scalars_omitted() {
        let fields = vec![
            GraphField::id(""),
            GraphField::string("prop", ""),
            GraphField::string("kept", "v"),
        ];
        let (add, get) = gremlin_for_vertex("sparse", &fields).expect("convert");

        assert_eq!(add, "addV('sparse').property('kept','v')");
        assert_eq!(get, "V('sparse').has('kept','v')");
    }

    #[test]
    fn test_no_fields_is_error() {
        let fields: Vec<GraphField> = Vec::new();
        let err = gremlin_for_vertex("no-tags", &fields).expect_err("must fail");
        assert!(matches!(err, Error::NoGraphTags));
    }

    #[test]
    fn test_deterministic() {
        let fields = vec![
            GraphField::id("i"),
            GraphField::boolean("b", false),
            GraphField::numbers("ns", [1, 2, 3]),
        ];
        let first = gremlin_for_vertex("same", &fields).expect("convert");
        let second = gremlin_for_vertex("same", &fields).expect("convert");
        assert_eq!(first, second);
    }
}
