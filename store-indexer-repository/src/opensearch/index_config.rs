//! OpenSearch index configuration and mappings.
//!
//! Translates a [`CollectionSchema`] into index settings and mappings.

use serde_json::{json, Map, Value};
use store_indexer_shared::{CollectionSchema, FieldSpec, FieldType};

/// Shard layout for newly created indices.
#[derive(Debug, Clone, Copy)]
pub struct IndexSettings {
    pub number_of_shards: u32,
    pub number_of_replicas: u32,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            number_of_shards: 1,
            number_of_replicas: 1,
        }
    }
}

/// Mapping for a single field, or `None` when the engine should infer it.
///
/// Faceted and sortable strings get a `raw` keyword subfield for
/// aggregations and sorting.
pub fn field_mapping(field: &FieldSpec) -> Option<Value> {
    let mapping = match field.field_type {
        FieldType::String | FieldType::StringArray if field.facet || field.sort => json!({
            "type": "text",
            "fields": {
                "raw": { "type": "keyword" }
            }
        }),
        FieldType::String | FieldType::StringArray => json!({ "type": "text" }),
        FieldType::Int32 => json!({ "type": "integer" }),
        FieldType::Int64 => json!({ "type": "long" }),
        FieldType::Float => json!({ "type": "float" }),
        FieldType::Bool => json!({ "type": "boolean" }),
        FieldType::Object | FieldType::ObjectArray => json!({ "type": "object" }),
        FieldType::Auto => return None,
    };
    Some(mapping)
}

/// Get the index settings and mappings for a collection.
///
/// Wildcard (`.*`) and `auto` fields are left to dynamic mapping.
pub fn index_body(schema: &CollectionSchema, settings: IndexSettings) -> Value {
    let mut properties = Map::new();
    for field in &schema.fields {
        if field.name == ".*" || field.name == "id" {
            continue;
        }
        if let Some(mapping) = field_mapping(field) {
            properties.insert(field.name.clone(), mapping);
        }
    }

    json!({
        "settings": {
            "number_of_shards": settings.number_of_shards,
            "number_of_replicas": settings.number_of_replicas
        },
        "mappings": {
            "dynamic": true,
            "properties": properties
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_body_structure() {
        let schema = CollectionSchema::new(vec![
            FieldSpec::new("name", FieldType::String).sort(),
            FieldSpec::new("description", FieldType::String).optional(),
            FieldSpec::new("updatedAt", FieldType::Int64),
            FieldSpec::new("onSale", FieldType::Bool).facet(),
            FieldSpec::new(".*", FieldType::Auto),
        ]);

        let body = index_body(&schema, IndexSettings::default());
        let properties = &body["mappings"]["properties"];

        assert!(body["settings"]["number_of_shards"].is_number());
        assert_eq!(properties["name"]["fields"]["raw"]["type"], "keyword");
        assert_eq!(properties["description"]["type"], "text");
        assert_eq!(properties["updatedAt"]["type"], "long");
        assert_eq!(properties["onSale"]["type"], "boolean");
        assert!(properties.get(".*").is_none());
    }

    #[test]
    fn test_auto_field_has_no_mapping() {
        assert!(field_mapping(&FieldSpec::new("meta", FieldType::Auto)).is_none());
    }
}
