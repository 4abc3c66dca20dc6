//! The fixed set of synchronizable entity types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One synchronizable domain collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    SiteInfo,
    Product,
    Taxonomy,
    Menu,
    PageAndPost,
    Navigation,
}

/// Dependency order of a full run.
///
/// Taxonomy and menu documents carry breadcrumb and URL data that reference
/// products and pages, so those are indexed first. Site info has no
/// dependencies and goes first.
pub const SYNC_ORDER: [EntityType; 6] = [
    EntityType::SiteInfo,
    EntityType::Product,
    EntityType::Taxonomy,
    EntityType::Menu,
    EntityType::PageAndPost,
    EntityType::Navigation,
];

impl EntityType {
    /// Stable key used in collection names, aliases and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::SiteInfo => "site_info",
            EntityType::Product => "product",
            EntityType::Taxonomy => "taxonomy",
            EntityType::Menu => "menu",
            EntityType::PageAndPost => "page_and_post",
            EntityType::Navigation => "navigation",
        }
    }

    /// Human readable name used in headers and the summary table.
    pub fn display_name(&self) -> &'static str {
        match self {
            EntityType::SiteInfo => "Site Info",
            EntityType::Product => "Products",
            EntityType::Taxonomy => "Taxonomy",
            EntityType::Menu => "Menu",
            EntityType::PageAndPost => "Pages and Posts",
            EntityType::Navigation => "Navigation",
        }
    }

    /// Upper-case key used for `SYNC_<ENTITY>_*` environment variables.
    pub fn env_key(&self) -> String {
        self.as_str().to_ascii_uppercase()
    }

    pub fn all() -> &'static [EntityType] {
        &SYNC_ORDER
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a known entity type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown entity type '{0}'")]
pub struct UnknownEntityType(pub String);

impl FromStr for EntityType {
    type Err = UnknownEntityType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "site_info" => Ok(EntityType::SiteInfo),
            "product" | "products" => Ok(EntityType::Product),
            "taxonomy" | "taxonomies" => Ok(EntityType::Taxonomy),
            "menu" | "menus" => Ok(EntityType::Menu),
            "page_and_post" | "page" | "pages" => Ok(EntityType::PageAndPost),
            "navigation" => Ok(EntityType::Navigation),
            _ => Err(UnknownEntityType(s.to_string())),
        }
    }
}
