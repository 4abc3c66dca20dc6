//! Page and post documents.

use serde::Serialize;
use serde_json::Value;
use store_indexer_shared::{CollectionSchema, EntityType, FieldSpec, FieldType, SearchDocument};

use super::{
    gmt_timestamp, integer, raw, record_id, relative_link, rendered, serialize_document, text,
    DocumentProcessor, Image,
};
use crate::errors::PipelineError;
use crate::source::RawRecord;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PageTerm {
    term_id: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Serialize)]
struct Author {
    id: String,
}

#[derive(Debug, Serialize)]
struct Breadcrumb {
    title: String,
    url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PageDocument {
    id: String,
    name: String,
    slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    seo_full_head: Option<String>,
    permalink: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    thumbnail: Option<Image>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    taxonomies: Vec<PageTerm>,
    updated_at: i64,
    created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    published_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    author: Option<Author>,
    template: String,
    breadcrumbs: Vec<Breadcrumb>,
}

/// Builds documents for WordPress pages and posts.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageProcessor;

impl PageProcessor {
    fn terms(record: &Value, key: &str, kind: &str) -> Vec<PageTerm> {
        match record.get(key) {
            Some(Value::Array(ids)) => ids
                .iter()
                .filter_map(|id| id.as_i64())
                .map(|id| PageTerm {
                    term_id: id.to_string(),
                    kind: kind.to_string(),
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl DocumentProcessor for PageProcessor {
    fn entity_type(&self) -> EntityType {
        EntityType::PageAndPost
    }

    fn schema(&self) -> CollectionSchema {
        CollectionSchema::new(vec![
            FieldSpec::new("id", FieldType::String).facet(),
            FieldSpec::new("name", FieldType::String),
            FieldSpec::new("slug", FieldType::String).facet(),
            FieldSpec::new("seoFullHead", FieldType::String).optional(),
            FieldSpec::new("permalink", FieldType::String).facet(),
            FieldSpec::new("type", FieldType::String).facet(),
            FieldSpec::new("thumbnail", FieldType::Object).optional(),
            FieldSpec::new("taxonomies", FieldType::ObjectArray).facet().optional(),
            FieldSpec::new("taxonomies.termId", FieldType::StringArray).facet().optional(),
            FieldSpec::new("taxonomies.type", FieldType::StringArray).facet().optional(),
            FieldSpec::new("updatedAt", FieldType::Int64),
            FieldSpec::new("createdAt", FieldType::Int64),
            FieldSpec::new("publishedAt", FieldType::Int64).optional().facet(),
            FieldSpec::new("content", FieldType::String).optional().facet(),
            FieldSpec::new("rawContent", FieldType::String).optional(),
            FieldSpec::new("author", FieldType::Object).optional(),
            FieldSpec::new("template", FieldType::String).facet(),
            FieldSpec::new("breadcrumbs", FieldType::ObjectArray).optional(),
        ])
        .with_default_sorting_field("updatedAt")
    }

    fn transform(&self, record: &RawRecord) -> Result<SearchDocument, PipelineError> {
        let id = record_id(EntityType::PageAndPost, record)?;
        let kind = text(record, "type").ok_or_else(|| {
            PipelineError::transform(format!("page_and_post {} has no type", id))
        })?;
        let name = rendered(record, "title").unwrap_or_default();
        let permalink = text(record, "link")
            .map(|link| relative_link(&link))
            .unwrap_or_default();

        let created_at = gmt_timestamp(record, "date_gmt").unwrap_or_default();
        let published = text(record, "status").as_deref() == Some("publish");

        let mut taxonomies = Self::terms(record, "categories", "category");
        taxonomies.extend(Self::terms(record, "tags", "post_tag"));

        let template = text(record, "template")
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "default".to_string());

        let breadcrumbs = vec![
            Breadcrumb {
                title: "Home".to_string(),
                url: Some("/".to_string()),
            },
            Breadcrumb {
                title: name.clone(),
                url: None,
            },
        ];

        let document = PageDocument {
            slug: text(record, "slug").unwrap_or_default(),
            seo_full_head: text(record, "yoast_head"),
            thumbnail: record.get("featured_image").and_then(Image::from_record),
            updated_at: gmt_timestamp(record, "modified_gmt").unwrap_or(created_at),
            published_at: published.then_some(created_at),
            created_at,
            content: rendered(record, "content"),
            raw_content: raw(record, "content"),
            author: integer(record, "author")
                .filter(|author| *author > 0)
                .map(|author| Author {
                    id: author.to_string(),
                }),
            taxonomies,
            template,
            breadcrumbs,
            permalink,
            kind,
            name,
            id,
        };

        serialize_document(EntityType::PageAndPost, &document)
    }
}
