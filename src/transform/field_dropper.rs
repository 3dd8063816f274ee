//! Field dropper transformer
//!
//! Strips named top-level keys from JSON records, e.g. columns a converted
//! CSV file should not carry into its NDJSON output.

use crate::etl::Transformer;
use eyre::Result;
use serde_json::Value;

/// Transformer that removes named keys from JSON objects
///
/// Arrays, strings and other non-object records pass through as they are.
///
/// # Example
/// ```
/// use plumber::etl::Transformer;
/// use plumber::transform::FieldDropper;
/// use serde_json::json;
///
/// let keep_counts = FieldDropper::new(["description"]);
/// let repo = json!({"host": "Github", "description": "Super git repos", "stars": 1});
///
/// assert_eq!(
///     keep_counts.transform(repo).unwrap(),
///     json!({"host": "Github", "stars": 1})
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct FieldDropper {
    fields: Vec<String>,
}

impl FieldDropper {
    pub fn new<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

impl Transformer for FieldDropper {
    type Input = Value;
    type Output = Value;

    fn transform(&self, mut record: Value) -> Result<Value> {
        if let Value::Object(map) = &mut record {
            map.retain(|key, _| !self.fields.contains(key));
        }
        Ok(record)
    }
}
