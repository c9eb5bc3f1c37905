//! Search results as exported records
//!
//! This module models what the search backend hands back and the shapes the
//! format writers consume:
//! - [`SearchHit`]: one result with its nested source document
//! - [`FlatRecord`]: a source flattened to dotted-path keys
//! - [`FieldSet`]: the ordered set of output columns
//! - [`path`]: `a.b[2].c` style lookups used by the geometry extractor

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub mod fields;
pub mod flatten;
pub mod path;

pub use fields::FieldSet;
pub use flatten::{FlatRecord, flatten, flatten_source};

/// Nested source document of a hit.
pub type Record = Map<String, Value>;

/// One search result as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Index (collection) the hit comes from
    #[serde(rename = "_index")]
    pub index: String,

    /// Document type, when the backend still has one
    #[serde(rename = "_type", default, skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,

    /// Document id
    #[serde(rename = "_id")]
    pub id: String,

    /// Source document
    #[serde(rename = "_source", default)]
    pub source: Record,
}

impl SearchHit {
    /// Create a new hit
    ///
    /// # Arguments
    /// * `index` - Index name
    /// * `id` - Document id
    /// * `source` - Source document
    pub fn new(index: impl Into<String>, id: impl Into<String>, source: Record) -> Self {
        Self {
            index: index.into(),
            doc_type: None,
            id: id.into(),
            source,
        }
    }

    /// Set the document type
    pub fn with_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = Some(doc_type.into());
        self
    }
}

/// Render a leaf value as text.
///
/// `null` stays `None` so each writer can decide how to render it. Lists
/// and objects that are not flattened (lists of objects, for example) are
/// written as compact JSON.
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}
