//! Taxonomy term documents.

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use store_indexer_shared::{CollectionSchema, EntityType, FieldSpec, FieldType, SearchDocument};

use super::{integer, record_id, serialize_document, text, DocumentProcessor, Image};
use crate::errors::PipelineError;
use crate::source::RawRecord;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TaxonomyDocument {
    id: String,
    slug: String,
    name: String,
    description: String,
    #[serde(rename = "type")]
    kind: String,
    seo_full_head: String,
    permalink: String,
    updated_at: i64,
    banner_thumbnail: String,
    banner_text: String,
    parent_term: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    thumbnail: Option<Image>,
}

/// Builds term documents from product category records.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaxonomyProcessor;

impl DocumentProcessor for TaxonomyProcessor {
    fn entity_type(&self) -> EntityType {
        EntityType::Taxonomy
    }

    fn schema(&self) -> CollectionSchema {
        CollectionSchema::new(vec![
            FieldSpec::new("id", FieldType::String).facet(),
            FieldSpec::new("slug", FieldType::String).facet(),
            FieldSpec::new("name", FieldType::String).facet().infix().sort(),
            FieldSpec::new("description", FieldType::String),
            FieldSpec::new("type", FieldType::String).facet().infix(),
            FieldSpec::new("seoFullHead", FieldType::String).facet().infix(),
            FieldSpec::new("permalink", FieldType::String),
            FieldSpec::new("updatedAt", FieldType::Int64),
            FieldSpec::new("bannerThumbnail", FieldType::String),
            FieldSpec::new("bannerText", FieldType::String),
            FieldSpec::new("parentTerm", FieldType::String),
        ])
        .with_default_sorting_field("updatedAt")
    }

    fn transform(&self, record: &RawRecord) -> Result<SearchDocument, PipelineError> {
        let id = record_id(EntityType::Taxonomy, record)?;
        let name = text(record, "name").ok_or_else(|| {
            PipelineError::transform(format!("taxonomy term {} has no name", id))
        })?;
        let slug = text(record, "slug").unwrap_or_default();
        let kind = text(record, "taxonomy").unwrap_or_else(|| "product_cat".to_string());

        let parent_term = match integer(record, "parent") {
            Some(0) | None => String::new(),
            Some(parent) => parent.to_string(),
        };

        let permalink = match kind.as_str() {
            "product_cat" => format!("/product-category/{}/", slug),
            "product_tag" => format!("/product-tag/{}/", slug),
            other => format!("/{}/{}/", other, slug),
        };

        let document = TaxonomyDocument {
            description: text(record, "description").unwrap_or_default(),
            seo_full_head: text(record, "yoast_head").unwrap_or_default(),
            updated_at: Utc::now().timestamp(),
            banner_thumbnail: text(record, "banner_thumbnail").unwrap_or_default(),
            banner_text: text(record, "banner_text").unwrap_or_default(),
            thumbnail: record.get("image").and_then(Image::from_record),
            parent_term,
            permalink,
            kind,
            slug,
            name,
            id,
        };

        serialize_document(EntityType::Taxonomy, &document)
    }
}
