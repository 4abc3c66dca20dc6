//! Search document handed to the search engine.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors building a [`SearchDocument`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("Document is not a JSON object")]
    NotAnObject,

    #[error("Document has no usable 'id' field")]
    MissingId,

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// A schema-conformant document keyed by a stable identifier.
///
/// Imports are upserts keyed by `id`, so re-importing the same document
/// converges instead of duplicating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchDocument {
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl SearchDocument {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        let mut fields = fields;
        fields.remove("id");
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Build a document from any serializable value with an `id` field.
    ///
    /// Numeric ids are converted to strings; `null` optional fields are
    /// dropped so the engine sees them as absent.
    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Self, DocumentError> {
        let value =
            serde_json::to_value(value).map_err(|e| DocumentError::Serialization(e.to_string()))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, DocumentError> {
        let Value::Object(mut fields) = value else {
            return Err(DocumentError::NotAnObject);
        };

        let id = match fields.remove("id") {
            Some(Value::String(s)) if !s.is_empty() => s,
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(DocumentError::MissingId),
        };

        fields.retain(|_, v| !v.is_null());

        Ok(Self { id, fields })
    }

    /// The full JSON object, `id` included.
    pub fn to_value(&self) -> Value {
        let mut object = Map::with_capacity(self.fields.len() + 1);
        object.insert("id".to_string(), Value::String(self.id.clone()));
        for (key, value) in &self.fields {
            object.insert(key.clone(), value.clone());
        }
        Value::Object(object)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        if field == "id" {
            return None;
        }
        self.fields.get(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Thing {
        id: u64,
        display_name: String,
        subtitle: Option<String>,
    }

    #[test]
    fn test_from_serializable_numeric_id() {
        let doc = SearchDocument::from_serializable(&Thing {
            id: 42,
            display_name: "Mug".to_string(),
            subtitle: None,
        })
        .unwrap();

        assert_eq!(doc.id, "42");
        assert_eq!(doc.get("displayName"), Some(&json!("Mug")));
        assert!(doc.get("subtitle").is_none());
    }

    #[test]
    fn test_missing_id() {
        let err = SearchDocument::from_value(json!({"name": "no id"})).unwrap_err();
        assert_eq!(err, DocumentError::MissingId);

        let err = SearchDocument::from_value(json!({"id": ""})).unwrap_err();
        assert_eq!(err, DocumentError::MissingId);
    }

    #[test]
    fn test_not_an_object() {
        let err = SearchDocument::from_value(json!([1, 2])).unwrap_err();
        assert_eq!(err, DocumentError::NotAnObject);
    }

    #[test]
    fn test_to_value_includes_id() {
        let doc = SearchDocument::from_value(json!({"id": "p-1", "price": 9.5})).unwrap();
        assert_eq!(doc.to_value(), json!({"id": "p-1", "price": 9.5}));
    }
}
