//! Processor module for the store indexer pipeline.
//!
//! Transforms raw content-store records into search documents. Each entity
//! type has one processor which also declares the collection schema its
//! documents conform to.

mod menu;
mod navigation;
mod page;
mod product;
mod site_info;
mod taxonomy;

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::Value;
use store_indexer_shared::{CollectionSchema, EntityType, SearchDocument};

use crate::errors::PipelineError;
use crate::source::RawRecord;

pub use menu::MenuProcessor;
pub use navigation::NavigationProcessor;
pub use page::PageProcessor;
pub use product::ProductProcessor;
pub use site_info::SiteInfoProcessor;
pub use taxonomy::TaxonomyProcessor;

/// Turns raw records of one entity type into search documents.
pub trait DocumentProcessor: Send + Sync {
    fn entity_type(&self) -> EntityType;

    /// Schema of the collection the documents are imported into.
    fn schema(&self) -> CollectionSchema;

    /// Transform one raw record.
    ///
    /// # Returns
    ///
    /// * `Ok(document)` - A document carrying every non-optional schema field
    /// * `Err(PipelineError::TransformError)` - The record cannot be indexed
    fn transform(&self, record: &RawRecord) -> Result<SearchDocument, PipelineError>;
}

/// Options shared by the processors.
#[derive(Debug, Clone)]
pub struct ProcessorOptions {
    /// Currency key used for product price objects.
    pub currency: String,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            currency: "USD".to_string(),
        }
    }
}

/// The processor for `entity_type`.
pub fn processor_for(entity_type: EntityType, options: &ProcessorOptions) -> Arc<dyn DocumentProcessor> {
    match entity_type {
        EntityType::SiteInfo => Arc::new(SiteInfoProcessor),
        EntityType::Product => Arc::new(ProductProcessor::new(options.currency.clone())),
        EntityType::Taxonomy => Arc::new(TaxonomyProcessor),
        EntityType::Menu => Arc::new(MenuProcessor),
        EntityType::PageAndPost => Arc::new(PageProcessor),
        EntityType::Navigation => Arc::new(NavigationProcessor),
    }
}

/// Image reference shared by several document types.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Image {
    pub id: String,
    pub title: String,
    pub alt_text: String,
    pub src: String,
}

impl Image {
    /// Parse a REST image object (`{id, src, name|title, alt|alt_text}`).
    pub fn from_record(value: &Value) -> Option<Self> {
        let src = text(value, "src").or_else(|| text(value, "source_url"))?;
        Some(Self {
            id: text(value, "id").unwrap_or_default(),
            title: text(value, "name")
                .or_else(|| rendered(value, "title"))
                .unwrap_or_default(),
            alt_text: text(value, "alt")
                .or_else(|| text(value, "alt_text"))
                .unwrap_or_default(),
            src,
        })
    }
}

pub(crate) fn serialize_document<T: Serialize>(
    entity_type: EntityType,
    document: &T,
) -> Result<SearchDocument, PipelineError> {
    SearchDocument::from_serializable(document)
        .map_err(|e| PipelineError::transform(format!("{}: {}", entity_type, e)))
}

/// The record's identifier as a string.
pub(crate) fn record_id(entity_type: EntityType, record: &Value) -> Result<String, PipelineError> {
    text(record, "id")
        .filter(|id| !id.is_empty())
        .ok_or_else(|| PipelineError::transform(format!("{} record has no id", entity_type)))
}

/// A scalar field as a string. Numbers and booleans are stringified.
pub(crate) fn text(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A WordPress `{ "rendered": ... }` field, or a plain string.
pub(crate) fn rendered(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::Object(inner) => inner.get("rendered").and_then(|r| r.as_str()).map(String::from),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

/// A WordPress `{ "raw": ... }` field, only present in edit context.
pub(crate) fn raw(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)?
        .get("raw")
        .and_then(|r| r.as_str())
        .map(String::from)
}

pub(crate) fn integer(value: &Value, key: &str) -> Option<i64> {
    match value.get(key)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn float(value: &Value, key: &str) -> Option<f64> {
    match value.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn flag(value: &Value, key: &str) -> bool {
    match value.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.as_str(), "1" | "true" | "yes"),
        Some(Value::Number(n)) => n.as_i64().is_some_and(|n| n != 0),
        _ => false,
    }
}

/// Unix seconds of a WordPress GMT date field (`2024-03-01T10:00:00`).
pub(crate) fn gmt_timestamp(value: &Value, key: &str) -> Option<i64> {
    let raw = value.get(key)?.as_str()?;
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|dt| dt.and_utc().timestamp())
}

/// Site-relative form of an absolute link.
pub(crate) fn relative_link(link: &str) -> String {
    match url::Url::parse(link) {
        Ok(url) => {
            let mut relative = url.path().to_string();
            if let Some(query) = url.query() {
                relative.push('?');
                relative.push_str(query);
            }
            relative
        }
        Err(_) => link.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_every_entity_has_a_processor() {
        let options = ProcessorOptions::default();
        for entity in EntityType::all() {
            let processor = processor_for(*entity, &options);
            assert_eq!(processor.entity_type(), *entity);
            assert!(!processor.schema().fields.is_empty());
        }
    }

    #[test]
    fn test_gmt_timestamp() {
        let record = json!({"date_gmt": "2024-01-01T00:00:00", "bad": "yesterday"});

        assert_eq!(gmt_timestamp(&record, "date_gmt"), Some(1_704_067_200));
        assert_eq!(gmt_timestamp(&record, "bad"), None);
        assert_eq!(gmt_timestamp(&record, "missing"), None);
    }

    #[test]
    fn test_relative_link() {
        assert_eq!(relative_link("https://shop.example.com/product/hat/"), "/product/hat/");
        assert_eq!(relative_link("https://shop.example.com/?p=12"), "/?p=12");
        assert_eq!(relative_link("/already/relative"), "/already/relative");
    }

    #[test]
    fn test_scalar_helpers() {
        let record = json!({
            "id": 42,
            "price": "19.90",
            "featured": true,
            "title": {"rendered": "Hello"},
            "count": "7"
        });

        assert_eq!(record_id(EntityType::Product, &record).unwrap(), "42");
        assert_eq!(float(&record, "price"), Some(19.9));
        assert!(flag(&record, "featured"));
        assert_eq!(rendered(&record, "title").as_deref(), Some("Hello"));
        assert_eq!(integer(&record, "count"), Some(7));
        assert!(record_id(EntityType::Product, &json!({"name": "x"})).is_err());
    }
}
