//! Product documents.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use store_indexer_shared::{CollectionSchema, EntityType, FieldSpec, FieldType, SearchDocument};

use super::{
    flag, float, gmt_timestamp, integer, record_id, relative_link, rendered, serialize_document,
    text, DocumentProcessor, Image,
};
use crate::errors::PipelineError;
use crate::source::RawRecord;

/// A product term reference (category or tag).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProductTerm {
    name: String,
    url: String,
    #[serde(rename = "type")]
    kind: String,
    slug: String,
    name_and_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProductDocument {
    id: String,
    product_id: String,
    description: String,
    name: String,
    permalink: String,
    slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    seo_full_head: Option<String>,
    sku: String,
    price: BTreeMap<String, f64>,
    regular_price: BTreeMap<String, f64>,
    sale_price: BTreeMap<String, f64>,
    on_sale: bool,
    stock_quantity: i64,
    stock_status: String,
    updated_at: i64,
    created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    published_at: Option<i64>,
    is_featured: bool,
    total_sales: i64,
    product_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_id: Option<String>,
    taxonomies: Vec<ProductTerm>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thumbnail: Option<Image>,
    gallery_images: Vec<Image>,
}

/// Builds product documents from WooCommerce REST product records.
#[derive(Debug, Clone)]
pub struct ProductProcessor {
    currency: String,
}

impl ProductProcessor {
    pub fn new(currency: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
        }
    }

    fn price_map(&self, amount: Option<f64>) -> BTreeMap<String, f64> {
        amount
            .map(|value| BTreeMap::from([(self.currency.clone(), value)]))
            .unwrap_or_default()
    }

    fn terms(record: &Value, key: &str, kind: &str, base: &str) -> Vec<ProductTerm> {
        let Some(Value::Array(items)) = record.get(key) else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(|item| {
                let name = text(item, "name")?;
                let slug = text(item, "slug").unwrap_or_default();
                Some(ProductTerm {
                    url: format!("/{}/{}/", base, slug),
                    kind: kind.to_string(),
                    name_and_type: format!("{}|{}", name, kind),
                    name,
                    slug,
                })
            })
            .collect()
    }
}

impl DocumentProcessor for ProductProcessor {
    fn entity_type(&self) -> EntityType {
        EntityType::Product
    }

    fn schema(&self) -> CollectionSchema {
        let currency = &self.currency;
        CollectionSchema::new(vec![
            FieldSpec::new("id", FieldType::String).facet(),
            FieldSpec::new("productId", FieldType::String).facet(),
            FieldSpec::new("description", FieldType::String),
            FieldSpec::new("name", FieldType::String).facet().sort(),
            FieldSpec::new("permalink", FieldType::String),
            FieldSpec::new("slug", FieldType::String).facet(),
            FieldSpec::new("seoFullHead", FieldType::String).optional(),
            FieldSpec::new("sku", FieldType::String),
            FieldSpec::new("price", FieldType::Object).facet(),
            FieldSpec::new(format!("price.{}", currency), FieldType::Float).optional(),
            FieldSpec::new("regularPrice", FieldType::Object),
            FieldSpec::new(format!("regularPrice.{}", currency), FieldType::Float).optional(),
            FieldSpec::new("salePrice", FieldType::Object),
            FieldSpec::new(format!("salePrice.{}", currency), FieldType::Float).optional(),
            FieldSpec::new("onSale", FieldType::Bool).facet(),
            FieldSpec::new("stockQuantity", FieldType::Int64),
            FieldSpec::new("stockStatus", FieldType::String).sort(),
            FieldSpec::new("updatedAt", FieldType::Int64),
            FieldSpec::new("createdAt", FieldType::Int64),
            FieldSpec::new("publishedAt", FieldType::Int64).optional(),
            FieldSpec::new("isFeatured", FieldType::Bool).facet(),
            FieldSpec::new("totalSales", FieldType::Int64),
            FieldSpec::new("productType", FieldType::String).facet(),
            FieldSpec::new("parentId", FieldType::String).facet().optional(),
            FieldSpec::new("taxonomies", FieldType::ObjectArray).facet().optional(),
            FieldSpec::new("taxonomies.name", FieldType::StringArray).facet().optional(),
            FieldSpec::new("taxonomies.url", FieldType::StringArray).optional(),
            FieldSpec::new("taxonomies.type", FieldType::StringArray).facet().optional(),
            FieldSpec::new("taxonomies.slug", FieldType::StringArray).facet().optional(),
            FieldSpec::new("taxonomies.nameAndType", FieldType::StringArray).facet().optional(),
        ])
        .with_default_sorting_field("updatedAt")
    }

    fn transform(&self, record: &RawRecord) -> Result<SearchDocument, PipelineError> {
        let id = record_id(EntityType::Product, record)?;

        let name = text(record, "name").ok_or_else(|| {
            PipelineError::transform(format!("product {} has no name", id))
        })?;

        // Variations carry a single `image` instead of an `images` list.
        let mut images: Vec<Image> = match (record.get("images"), record.get("image")) {
            (Some(Value::Array(items)), _) => items.iter().filter_map(Image::from_record).collect(),
            (_, Some(image)) => Image::from_record(image).into_iter().collect(),
            _ => Vec::new(),
        };
        let thumbnail = if images.is_empty() {
            None
        } else {
            Some(images.remove(0))
        };

        let mut taxonomies = Self::terms(record, "categories", "product_cat", "product-category");
        taxonomies.extend(Self::terms(record, "tags", "product_tag", "product-tag"));

        let created_at = gmt_timestamp(record, "date_created_gmt").unwrap_or_default();
        let price = float(record, "price");

        let document = ProductDocument {
            product_id: id.clone(),
            description: rendered(record, "description").unwrap_or_default(),
            permalink: text(record, "permalink")
                .map(|link| relative_link(&link))
                .unwrap_or_default(),
            slug: text(record, "slug").unwrap_or_default(),
            seo_full_head: text(record, "yoast_head"),
            sku: text(record, "sku").unwrap_or_default(),
            price: self.price_map(price),
            regular_price: self.price_map(float(record, "regular_price").or(price)),
            sale_price: self.price_map(float(record, "sale_price")),
            on_sale: flag(record, "on_sale"),
            stock_quantity: integer(record, "stock_quantity").unwrap_or(0),
            stock_status: text(record, "stock_status").unwrap_or_else(|| "instock".to_string()),
            updated_at: gmt_timestamp(record, "date_modified_gmt").unwrap_or(created_at),
            created_at,
            published_at: gmt_timestamp(record, "date_on_sale_from_gmt")
                .or_else(|| gmt_timestamp(record, "date_created_gmt")),
            is_featured: flag(record, "featured"),
            total_sales: integer(record, "total_sales").unwrap_or(0),
            product_type: text(record, "type").unwrap_or_else(|| "simple".to_string()),
            parent_id: integer(record, "parent_id")
                .filter(|id| *id > 0)
                .map(|id| id.to_string()),
            taxonomies,
            thumbnail,
            gallery_images: images,
            name,
            id,
        };

        serialize_document(EntityType::Product, &document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn product_record() -> Value {
        json!({
            "id": 101,
            "name": "Linen Shirt",
            "slug": "linen-shirt",
            "permalink": "https://shop.example.com/product/linen-shirt/",
            "description": "<p>Breathable.</p>",
            "sku": "LS-01",
            "price": "45.00",
            "regular_price": "60.00",
            "sale_price": "45.00",
            "on_sale": true,
            "stock_quantity": null,
            "stock_status": "instock",
            "date_created_gmt": "2024-01-01T00:00:00",
            "date_modified_gmt": "2024-02-01T00:00:00",
            "featured": false,
            "total_sales": 12,
            "type": "simple",
            "categories": [{"id": 7, "name": "Shirts", "slug": "shirts"}],
            "tags": [{"id": 9, "name": "Summer", "slug": "summer"}],
            "images": [
                {"id": 1, "src": "https://cdn.example.com/a.jpg", "name": "front", "alt": "Front"},
                {"id": 2, "src": "https://cdn.example.com/b.jpg", "name": "back", "alt": ""}
            ]
        })
    }

    #[test]
    fn test_transform_product() {
        let processor = ProductProcessor::new("AUD");
        let document = processor.transform(&product_record()).unwrap();

        assert_eq!(document.id, "101");
        assert_eq!(document.get("productId"), Some(&json!("101")));
        assert_eq!(document.get("permalink"), Some(&json!("/product/linen-shirt/")));
        assert_eq!(document.get("price"), Some(&json!({"AUD": 45.0})));
        assert_eq!(document.get("regularPrice"), Some(&json!({"AUD": 60.0})));
        assert_eq!(document.get("stockQuantity"), Some(&json!(0)));
        assert_eq!(document.get("updatedAt"), Some(&json!(1_706_745_600)));
        assert_eq!(document.get("thumbnail").unwrap()["altText"], "Front");
        assert_eq!(document.get("galleryImages").unwrap().as_array().unwrap().len(), 1);

        let taxonomies = document.get("taxonomies").unwrap().as_array().unwrap();
        assert_eq!(taxonomies.len(), 2);
        assert_eq!(taxonomies[0]["nameAndType"], "Shirts|product_cat");
        assert_eq!(taxonomies[1]["url"], "/product-tag/summer/");
    }

    #[test]
    fn test_required_fields_always_present() {
        let processor = ProductProcessor::new("USD");
        let document = processor
            .transform(&json!({"id": 5, "name": "Bare"}))
            .unwrap();

        let schema = processor.schema();
        for field in schema.fields.iter().filter(|f| !f.optional && f.name != "id") {
            assert!(document.get(&field.name).is_some(), "missing {}", field.name);
        }
    }

    #[test]
    fn test_transform_variation() {
        let processor = ProductProcessor::new("USD");
        let document = processor
            .transform(&json!({
                "id": 202,
                "name": "Linen Shirt - Blue",
                "type": "variation",
                "parent_id": 101,
                "price": "50.00",
                "image": {"id": 3, "src": "https://cdn.example.com/blue.jpg", "name": "blue", "alt": "Blue"}
            }))
            .unwrap();

        assert_eq!(document.get("productType"), Some(&json!("variation")));
        assert_eq!(document.get("parentId"), Some(&json!("101")));
        assert_eq!(document.get("thumbnail").unwrap()["altText"], "Blue");
        assert!(document.get("galleryImages").unwrap().as_array().unwrap().is_empty());
    }

    #[test]
    fn test_nameless_product_rejected() {
        let processor = ProductProcessor::new("USD");
        let err = processor.transform(&json!({"id": 5})).unwrap_err();

        assert!(matches!(err, PipelineError::TransformError(_)));
    }
}
