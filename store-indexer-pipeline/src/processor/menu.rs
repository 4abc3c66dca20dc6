//! Menu documents.
//!
//! The menu tree is stored as a JSON string in `items`; storefronts parse it
//! client-side.

use std::collections::{BTreeMap, HashSet};

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use store_indexer_shared::{CollectionSchema, EntityType, FieldSpec, FieldType, SearchDocument};

use super::{integer, record_id, relative_link, rendered, serialize_document, text, DocumentProcessor};
use crate::errors::PipelineError;
use crate::source::RawRecord;

#[derive(Debug, Clone, PartialEq, Serialize)]
struct MenuItem {
    title: String,
    url: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<MenuItem>,
}

#[derive(Debug, Serialize)]
struct MenuDocument {
    id: String,
    name: String,
    wp_menu_id: i64,
    items: String,
    updated_at: i64,
}

struct FlatItem {
    id: i64,
    parent: i64,
    order: i64,
    item: MenuItem,
}

/// Builds one document per navigation menu.
#[derive(Debug, Clone, Copy, Default)]
pub struct MenuProcessor;

impl MenuProcessor {
    fn flatten(record: &Value) -> Vec<FlatItem> {
        let Some(Value::Array(items)) = record.get("items") else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(|item| {
                Some(FlatItem {
                    id: integer(item, "id")?,
                    parent: integer(item, "parent").unwrap_or(0),
                    order: integer(item, "menu_order").unwrap_or(0),
                    item: MenuItem {
                        title: rendered(item, "title").unwrap_or_default(),
                        url: text(item, "url").map(|u| relative_link(&u)).unwrap_or_default(),
                        children: Vec::new(),
                    },
                })
            })
            .collect()
    }

    /// Nest items under their parents, ordered by `menu_order`.
    ///
    /// Items whose parent is not part of the menu are treated as top level.
    fn build_tree(mut flat: Vec<FlatItem>) -> Vec<MenuItem> {
        flat.sort_by_key(|f| f.order);
        let known: HashSet<i64> = flat.iter().map(|f| f.id).collect();

        let mut by_parent: BTreeMap<i64, Vec<(i64, MenuItem)>> = BTreeMap::new();
        for f in flat {
            let parent = if known.contains(&f.parent) && f.parent != f.id {
                f.parent
            } else {
                0
            };
            by_parent.entry(parent).or_default().push((f.id, f.item));
        }

        fn attach(parent: i64, by_parent: &mut BTreeMap<i64, Vec<(i64, MenuItem)>>) -> Vec<MenuItem> {
            let Some(children) = by_parent.remove(&parent) else {
                return Vec::new();
            };
            children
                .into_iter()
                .map(|(id, mut item)| {
                    item.children = attach(id, by_parent);
                    item
                })
                .collect()
        }

        attach(0, &mut by_parent)
    }
}

impl DocumentProcessor for MenuProcessor {
    fn entity_type(&self) -> EntityType {
        EntityType::Menu
    }

    fn schema(&self) -> CollectionSchema {
        CollectionSchema::new(vec![
            FieldSpec::new("name", FieldType::String),
            FieldSpec::new("wp_menu_id", FieldType::Int32),
            FieldSpec::new("items", FieldType::String),
            FieldSpec::new("updated_at", FieldType::Int64),
        ])
        .with_default_sorting_field("wp_menu_id")
    }

    fn transform(&self, record: &RawRecord) -> Result<SearchDocument, PipelineError> {
        let id = record_id(EntityType::Menu, record)?;
        let wp_menu_id = integer(record, "id").ok_or_else(|| {
            PipelineError::transform(format!("menu id '{}' is not numeric", id))
        })?;

        let tree = Self::build_tree(Self::flatten(record));
        let items = serde_json::to_string(&tree)
            .map_err(|e| PipelineError::transform(format!("menu {}: {}", id, e)))?;

        let document = MenuDocument {
            name: text(record, "name").unwrap_or_default(),
            updated_at: Utc::now().timestamp(),
            wp_menu_id,
            items,
            id,
        };

        serialize_document(EntityType::Menu, &document)
    }
}
