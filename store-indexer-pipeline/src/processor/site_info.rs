//! Site configuration documents, one per setting.

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use store_indexer_shared::{CollectionSchema, EntityType, FieldSpec, FieldType, SearchDocument};

use super::{integer, serialize_document, text, DocumentProcessor};
use crate::errors::PipelineError;
use crate::source::RawRecord;

#[derive(Debug, Serialize)]
struct SiteInfoDocument {
    id: String,
    name: String,
    value: String,
    updated_at: i64,
}

/// Builds documents from `{name, value}` setting records.
#[derive(Debug, Clone, Copy, Default)]
pub struct SiteInfoProcessor;

impl DocumentProcessor for SiteInfoProcessor {
    fn entity_type(&self) -> EntityType {
        EntityType::SiteInfo
    }

    fn schema(&self) -> CollectionSchema {
        CollectionSchema::new(vec![
            FieldSpec::new("name", FieldType::String),
            FieldSpec::new(".*", FieldType::Auto),
            FieldSpec::new("updated_at", FieldType::Int64),
        ])
        .with_default_sorting_field("updated_at")
    }

    fn transform(&self, record: &RawRecord) -> Result<SearchDocument, PipelineError> {
        let name = text(record, "name")
            .filter(|n| !n.is_empty())
            .ok_or_else(|| PipelineError::transform("site_info record has no name"))?;

        // Values are stored as strings; structured settings are JSON-encoded.
        let value = match record.get("value") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };

        let document = SiteInfoDocument {
            id: name.clone(),
            updated_at: integer(record, "updated_at").unwrap_or_else(|| Utc::now().timestamp()),
            name,
            value,
        };

        serialize_document(EntityType::SiteInfo, &document)
    }
}
