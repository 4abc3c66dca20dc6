//! Navigation block documents.

use serde::Serialize;
use store_indexer_shared::{CollectionSchema, EntityType, FieldSpec, FieldType, SearchDocument};

use super::{
    gmt_timestamp, raw, record_id, rendered, serialize_document, text, DocumentProcessor,
};
use crate::errors::PipelineError;
use crate::source::RawRecord;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NavigationDocument {
    id: String,
    object_id: String,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    status: String,
    updated_at: i64,
    created_at: i64,
}

/// Builds documents for `wp_navigation` posts.
#[derive(Debug, Clone, Copy, Default)]
pub struct NavigationProcessor;

impl DocumentProcessor for NavigationProcessor {
    fn entity_type(&self) -> EntityType {
        EntityType::Navigation
    }

    fn schema(&self) -> CollectionSchema {
        CollectionSchema::new(vec![
            FieldSpec::new("objectId", FieldType::String),
            FieldSpec::new("name", FieldType::String),
            FieldSpec::new("content", FieldType::String).optional(),
            FieldSpec::new("status", FieldType::String).facet(),
            FieldSpec::new("updatedAt", FieldType::Int64),
            FieldSpec::new("createdAt", FieldType::Int64),
        ])
        .with_default_sorting_field("updatedAt")
    }

    fn transform(&self, record: &RawRecord) -> Result<SearchDocument, PipelineError> {
        let id = record_id(EntityType::Navigation, record)?;
        let created_at = gmt_timestamp(record, "date_gmt").unwrap_or_default();

        // Block markup is only available raw; rendered output is the fallback.
        let content = raw(record, "content").or_else(|| rendered(record, "content"));

        let document = NavigationDocument {
            object_id: id.clone(),
            name: rendered(record, "title").unwrap_or_default(),
            status: text(record, "status").unwrap_or_else(|| "publish".to_string()),
            updated_at: gmt_timestamp(record, "modified_gmt").unwrap_or(created_at),
            created_at,
            content,
            id,
        };

        serialize_document(EntityType::Navigation, &document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_transform_navigation() {
        let record = json!({
            "id": 77,
            "title": {"rendered": "Header navigation"},
            "content": {"raw": "<!-- wp:navigation-link /-->", "rendered": ""},
            "status": "publish",
            "date_gmt": "2024-01-01T00:00:00",
            "modified_gmt": "2024-01-01T00:00:10"
        });

        let document = NavigationProcessor.transform(&record).unwrap();

        assert_eq!(document.id, "77");
        assert_eq!(document.get("objectId"), Some(&json!("77")));
        assert_eq!(document.get("content"), Some(&json!("<!-- wp:navigation-link /-->")));
        assert_eq!(document.get("updatedAt"), Some(&json!(1_704_067_210)));
    }

    #[test]
    fn test_content_is_optional() {
        let document = NavigationProcessor.transform(&json!({"id": 1})).unwrap();

        assert!(document.get("content").is_none());
        assert_eq!(document.get("status"), Some(&json!("publish")));
    }
}
