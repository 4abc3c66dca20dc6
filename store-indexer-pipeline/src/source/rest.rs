//! Content store REST source.
//!
//! Reads products, categories, pages, posts, navigation, menus and site
//! settings from the store's WordPress/WooCommerce REST API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::errors::PipelineError;
use crate::registry::{IdMethod, QueryMethod};
use crate::source::{RawRecord, RecordSource};

/// Error code WordPress answers with when a page is past the last one.
const INVALID_PAGE_CODE: &str = "rest_post_invalid_page_number";

/// Page size for routes read to exhaustion (menus, menu items, variations).
const FULL_READ_PER_PAGE: usize = 100;

/// Characters of a non-JSON error body kept in the error message.
const ERROR_BODY_SNIPPET: usize = 200;

/// Connection settings for the content store.
#[derive(Debug, Clone)]
pub struct StoreConnection {
    /// Site root, e.g. `https://shop.example.com`.
    pub url: String,
    pub consumer_key: Option<String>,
    pub consumer_secret: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl StoreConnection {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            consumer_key: None,
            consumer_secret: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_credentials(mut self, key: impl Into<String>, secret: impl Into<String>) -> Self {
        self.consumer_key = Some(key.into());
        self.consumer_secret = Some(secret.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Thin JSON client for the content store's REST API.
pub struct StoreClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Option<(String, String)>,
}

impl StoreClient {
    pub fn new(connection: &StoreConnection) -> Result<Self, PipelineError> {
        let parsed_url = Url::parse(&connection.url)
            .map_err(|e| PipelineError::source(format!("Invalid store URL: {}", e)))?;

        let http = reqwest::Client::builder()
            .timeout(connection.timeout)
            .build()
            .map_err(|e| PipelineError::source(e.to_string()))?;

        let credentials = match (&connection.consumer_key, &connection.consumer_secret) {
            (Some(key), Some(secret)) => Some((key.clone(), secret.clone())),
            _ => None,
        };

        info!(
            url = %parsed_url,
            authenticated = credentials.is_some(),
            "Created content store client"
        );

        Ok(Self {
            http,
            base_url: parsed_url.as_str().trim_end_matches('/').to_string(),
            credentials,
        })
    }

    /// GET `wp-json/<route>` and decode the JSON body.
    ///
    /// A "page number out of range" answer yields an empty array.
    pub async fn get_json(&self, route: &str, query: &[(&str, String)]) -> Result<Value, PipelineError> {
        let url = format!("{}/wp-json/{}", self.base_url, route.trim_start_matches('/'));
        let mut request = self.http.get(&url).query(query);
        if let Some((key, secret)) = &self.credentials {
            request = request.basic_auth(key, Some(secret));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                PipelineError::source(format!("GET {} timed out: {}", route, e))
            } else {
                PipelineError::source(format!("GET {} failed: {}", route, e))
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| PipelineError::source(format!("GET {}: invalid JSON: {}", route, e)));
        }

        // Error bodies are not always JSON (proxies answer with HTML).
        let text = response.text().await.unwrap_or_default();
        let body: Option<Value> = serde_json::from_str(&text).ok();
        let field = |key: &str| {
            body.as_ref()
                .and_then(|b| b.get(key))
                .and_then(|v| v.as_str())
                .map(String::from)
        };

        if status == StatusCode::BAD_REQUEST && field("code").as_deref() == Some(INVALID_PAGE_CODE) {
            debug!(route = %route, "Page out of range, treating as empty");
            return Ok(json!([]));
        }

        let message = field("message")
            .unwrap_or_else(|| text.trim().chars().take(ERROR_BODY_SNIPPET).collect());
        Err(PipelineError::source(format!(
            "GET {} returned {}: {}",
            route, status, message
        )))
    }

    /// Every item of a paged collection route, `per_page` at a time, until a
    /// short page.
    pub async fn get_all_pages(
        &self,
        route: &str,
        query: &[(&str, String)],
        per_page: usize,
    ) -> Result<Vec<Value>, PipelineError> {
        let mut items = Vec::new();
        let mut page = 1;
        loop {
            let mut paged = query.to_vec();
            paged.extend(page_query(page, per_page));
            let batch = self.get_array(route, &paged).await?;
            let exhausted = batch.len() < per_page;
            items.extend(batch);
            if exhausted {
                return Ok(items);
            }
            page += 1;
        }
    }

    async fn get_array(&self, route: &str, query: &[(&str, String)]) -> Result<Vec<Value>, PipelineError> {
        match self.get_json(route, query).await? {
            Value::Array(items) => Ok(items),
            other => Err(PipelineError::source(format!(
                "GET {}: expected an array, got {}",
                route,
                type_name(&other)
            ))),
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn id_of(record: &Value) -> Option<String> {
    match record.get("id")? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn page_query(page: usize, batch_size: usize) -> Vec<(&'static str, String)> {
    vec![
        ("page", page.to_string()),
        ("per_page", batch_size.to_string()),
    ]
}

/// Shape a WooCommerce variation as a product record of its parent.
///
/// Unnamed variations are named after the parent and their attribute
/// options; categories and tags come from the parent when absent.
fn inherit_parent(mut variation: Value, parent: &Value) -> Value {
    let parent_name = parent.get("name").and_then(|n| n.as_str()).unwrap_or_default();
    let own_name = variation
        .get("name")
        .and_then(|n| n.as_str())
        .filter(|n| !n.is_empty())
        .map(String::from);
    let options: Vec<&str> = variation
        .get("attributes")
        .and_then(|a| a.as_array())
        .map(|attributes| {
            attributes
                .iter()
                .filter_map(|a| a.get("option").and_then(|o| o.as_str()))
                .collect()
        })
        .unwrap_or_default();
    let name = own_name.unwrap_or_else(|| {
        if options.is_empty() {
            parent_name.to_string()
        } else {
            format!("{} - {}", parent_name, options.join(", "))
        }
    });

    let Some(object) = variation.as_object_mut() else {
        return variation;
    };
    object.insert("name".to_string(), Value::String(name));
    object.insert("type".to_string(), json!("variation"));
    if let Some(id) = parent.get("id") {
        object.insert("parent_id".to_string(), id.clone());
    }
    for field in ["categories", "tags"] {
        if let Some(value) = parent.get(field) {
            object.entry(field).or_insert_with(|| value.clone());
        }
    }
    variation
}

/// Store resources exposed as record sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestResource {
    Products,
    ProductCategories,
    PagesAndPosts,
    Navigation,
    Menus,
    SiteSettings,
}

impl RestResource {
    pub fn all() -> &'static [RestResource] {
        &[
            RestResource::Products,
            RestResource::ProductCategories,
            RestResource::PagesAndPosts,
            RestResource::Navigation,
            RestResource::Menus,
            RestResource::SiteSettings,
        ]
    }

    /// Name descriptors use to refer to this source.
    pub fn source_name(&self) -> &'static str {
        match self {
            RestResource::Products => "products",
            RestResource::ProductCategories => "product_categories",
            RestResource::PagesAndPosts => "pages_and_posts",
            RestResource::Navigation => "navigation",
            RestResource::Menus => "menus",
            RestResource::SiteSettings => "site_settings",
        }
    }
}

/// One store resource read over REST.
pub struct RestSource {
    client: Arc<StoreClient>,
    resource: RestResource,
}

impl RestSource {
    pub fn new(client: Arc<StoreClient>, resource: RestResource) -> Self {
        Self { client, resource }
    }

    async fn ids_from(&self, route: &str, mut query: Vec<(&str, String)>) -> Result<Vec<String>, PipelineError> {
        query.push(("_fields", "id".to_string()));
        let items = self.client.get_array(route, &query).await?;
        Ok(items.iter().filter_map(id_of).collect())
    }

    async fn include(&self, route: &str, ids: &[String]) -> Result<Vec<Value>, PipelineError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = vec![
            ("include", ids.join(",")),
            ("per_page", ids.len().to_string()),
            ("orderby", "include".to_string()),
        ];
        self.client.get_array(route, &query).await
    }

    async fn menus_with_items(&self) -> Result<Vec<Value>, PipelineError> {
        let mut menus = self
            .client
            .get_all_pages("wp/v2/menus", &[], FULL_READ_PER_PAGE)
            .await?;

        for menu in menus.iter_mut() {
            let Some(menu_id) = id_of(menu) else {
                continue;
            };
            let items = self
                .client
                .get_all_pages("wp/v2/menu-items", &[("menus", menu_id)], FULL_READ_PER_PAGE)
                .await?;
            if let Some(object) = menu.as_object_mut() {
                object.insert("items".to_string(), Value::Array(items));
            }
        }
        Ok(menus)
    }

    async fn variations_of(&self, parent: &Value) -> Result<Vec<Value>, PipelineError> {
        let parent_id = id_of(parent)
            .ok_or_else(|| PipelineError::source("variable product has no id"))?;
        let route = format!("wc/v3/products/{}/variations", parent_id);
        let variations = self
            .client
            .get_all_pages(&route, &[], FULL_READ_PER_PAGE)
            .await?;
        debug!(parent_id = %parent_id, count = variations.len(), "Fetched product variations");
        Ok(variations
            .into_iter()
            .map(|variation| inherit_parent(variation, parent))
            .collect())
    }

    /// Site-wide settings as `{name, value}` records.
    async fn site_settings(&self) -> Result<Vec<Value>, PipelineError> {
        let root = self.client.get_json("", &[]).await?;

        let mut records = Vec::new();
        let root_fields = [
            ("name", "site_title"),
            ("description", "site_tagline"),
            ("url", "wordpress_address_url"),
            ("home", "home_url"),
            ("gmt_offset", "gmt_offset"),
            ("timezone_string", "time_zone"),
            ("site_icon_url", "site_icon_url"),
            ("site_logo", "site_logo"),
        ];
        for (field, name) in root_fields {
            if let Some(value) = root.get(field) {
                records.push(json!({ "name": name, "value": value }));
            }
        }

        match self.client.get_array("wc/v3/settings/general", &[]).await {
            Ok(settings) => {
                for setting in settings {
                    if let (Some(name), Some(value)) = (
                        setting.get("id").and_then(|i| i.as_str()),
                        setting.get("value"),
                    ) {
                        records.push(json!({ "name": name, "value": value }));
                    }
                }
            }
            Err(e) => warn!(error = %e, "Store settings unavailable, indexing site root only"),
        }

        Ok(records)
    }
}

#[async_trait]
impl RecordSource for RestSource {
    fn name(&self) -> &str {
        self.resource.source_name()
    }

    fn supports_single_batch(&self) -> bool {
        matches!(self.resource, RestResource::Menus | RestResource::SiteSettings)
    }

    fn supports_query(&self, method: QueryMethod) -> bool {
        matches!(
            (self.resource, method),
            (RestResource::ProductCategories, QueryMethod::TermQuery)
        )
    }

    fn supports_ids(&self, method: IdMethod) -> bool {
        matches!(
            (self.resource, method),
            (RestResource::Products, IdMethod::ProductIds)
                | (RestResource::PagesAndPosts, IdMethod::PostIds)
                | (RestResource::Navigation, IdMethod::NavigationIds)
        )
    }

    fn supports_variations(&self) -> bool {
        self.resource == RestResource::Products
    }

    #[instrument(skip(self, parent), fields(source = self.name()))]
    async fn fetch_variations(&self, parent: &RawRecord) -> Result<Vec<RawRecord>, PipelineError> {
        match self.resource {
            RestResource::Products => self.variations_of(parent).await,
            _ => Err(PipelineError::source(format!(
                "source '{}' does not support product variations",
                self.name()
            ))),
        }
    }

    #[instrument(skip(self), fields(source = self.name()))]
    async fn fetch_all(&self) -> Result<Vec<RawRecord>, PipelineError> {
        match self.resource {
            RestResource::Menus => self.menus_with_items().await,
            RestResource::SiteSettings => self.site_settings().await,
            _ => Err(PipelineError::source(format!(
                "source '{}' does not support single batch fetches",
                self.name()
            ))),
        }
    }

    #[instrument(skip(self), fields(source = self.name()))]
    async fn query_page(
        &self,
        method: QueryMethod,
        page: usize,
        batch_size: usize,
    ) -> Result<Vec<RawRecord>, PipelineError> {
        if !self.supports_query(method) {
            return Err(PipelineError::source(format!(
                "source '{}' does not support {}",
                self.name(),
                method
            )));
        }
        let mut query = page_query(page, batch_size);
        query.push(("hide_empty", "false".to_string()));
        query.push(("orderby", "id".to_string()));
        self.client
            .get_array("wc/v3/products/categories", &query)
            .await
    }

    #[instrument(skip(self), fields(source = self.name()))]
    async fn resolve_ids(
        &self,
        method: IdMethod,
        page: usize,
        batch_size: usize,
    ) -> Result<Vec<String>, PipelineError> {
        let mut query = page_query(page, batch_size);
        match (self.resource, method) {
            (RestResource::Products, IdMethod::ProductIds) => {
                query.push(("status", "publish".to_string()));
                query.push(("orderby", "id".to_string()));
                query.push(("order", "asc".to_string()));
                self.ids_from("wc/v3/products", query).await
            }
            (RestResource::PagesAndPosts, IdMethod::PostIds) => {
                query.push(("type", "post".to_string()));
                query.push(("subtype", "page,post".to_string()));
                query.push(("_fields", "id,subtype".to_string()));
                let hits = self.client.get_array("wp/v2/search", &query).await?;
                Ok(hits
                    .iter()
                    .filter_map(|hit| {
                        let id = id_of(hit)?;
                        let subtype = hit.get("subtype").and_then(|s| s.as_str())?;
                        Some(format!("{}:{}", subtype, id))
                    })
                    .collect())
            }
            (RestResource::Navigation, IdMethod::NavigationIds) => {
                query.push(("status", "publish".to_string()));
                self.ids_from("wp/v2/navigation", query).await
            }
            _ => Err(PipelineError::source(format!(
                "source '{}' does not support {}",
                self.name(),
                method
            ))),
        }
    }

    #[instrument(skip(self, ids), fields(source = self.name(), count = ids.len()))]
    async fn fetch_by_ids(
        &self,
        method: IdMethod,
        ids: &[String],
    ) -> Result<Vec<RawRecord>, PipelineError> {
        match (self.resource, method) {
            (RestResource::Products, IdMethod::ProductIds) => {
                self.include("wc/v3/products", ids).await
            }
            (RestResource::PagesAndPosts, IdMethod::PostIds) => {
                let mut pages = Vec::new();
                let mut posts = Vec::new();
                for id in ids {
                    match id.split_once(':') {
                        Some(("page", raw)) => pages.push(raw.to_string()),
                        Some(("post", raw)) => posts.push(raw.to_string()),
                        _ => warn!(id = %id, "Skipping id with unknown post type"),
                    }
                }
                let mut records = self.include("wp/v2/pages", &pages).await?;
                records.extend(self.include("wp/v2/posts", &posts).await?);
                Ok(records)
            }
            (RestResource::Navigation, IdMethod::NavigationIds) => {
                self.include("wp/v2/navigation", ids).await
            }
            _ => Err(PipelineError::source(format!(
                "source '{}' does not support {}",
                self.name(),
                method
            ))),
        }
    }
}
