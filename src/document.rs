use serde::Serialize;
use serde_json::{Map, Value};

/// Field every stored document carries; its value names the backing file.
pub const DOCUMENT_ID: &str = "documentId";

/// A JSON object with fields kept in insertion order.
pub type Document = Map<String, Value>;

/// A decoded document together with the name of the file it was read from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredDocument {
    pub file_name: String,
    pub document: Document,
}

impl StoredDocument {
    pub fn new(file_name: impl Into<String>, document: Document) -> Self {
        Self {
            file_name: file_name.into(),
            document,
        }
    }
}

/// Interprets `value` as a document, rejecting anything that is not an object.
pub fn into_document(value: Value, what: &str) -> crate::Result<Document> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(crate::Error::Validation(format!(
            "{} must be an object, got {}",
            what,
            type_name(&other)
        ))),
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
