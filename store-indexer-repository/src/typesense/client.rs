//! Typesense client implementation.
//!
//! This module provides the concrete implementation of `SearchIndexProvider`
//! on top of the Typesense HTTP API.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::config::BackendConnection;
use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::types::{
    AliasInfo, CollectionInfo, DocumentImportResult, ImportAction, ImportSummary,
};
use store_indexer_shared::{CollectionSchema, FieldType, SearchDocument};

const API_KEY_HEADER: &str = "X-TYPESENSE-API-KEY";

#[derive(Debug, Deserialize)]
struct CollectionResponse {
    name: String,
    #[serde(default)]
    num_documents: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct AliasResponse {
    name: String,
    collection_name: String,
}

#[derive(Debug, Deserialize)]
struct AliasListResponse {
    #[serde(default)]
    aliases: Vec<AliasResponse>,
}

#[derive(Debug, Deserialize)]
struct ImportLine {
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Typesense client implementation.
///
/// # Example
///
/// ```ignore
/// use store_indexer_repository::config::BackendConnection;
/// let connection = BackendConnection::new("http://localhost:8108").with_api_key("xyz");
/// let client = TypesenseClient::new(&connection)?;
/// client.upsert_alias("product_alias", "product_1718000000000000").await?;
/// ```
pub struct TypesenseClient {
    http: reqwest::Client,
    base_url: String,
}

impl TypesenseClient {
    /// Create a new Typesense client for the given connection settings.
    ///
    /// # Arguments
    ///
    /// * `connection` - Base URL, API key and request timeout
    ///
    /// # Returns
    ///
    /// * `Ok(TypesenseClient)` - A new client instance
    /// * `Err(SearchIndexError)` - If the URL or API key is invalid
    pub fn new(connection: &BackendConnection) -> Result<Self, SearchIndexError> {
        let parsed_url =
            Url::parse(&connection.url).map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let mut headers = HeaderMap::new();
        if let Some(api_key) = &connection.api_key {
            let value = HeaderValue::from_str(api_key)
                .map_err(|e| SearchIndexError::validation(format!("Invalid API key: {}", e)))?;
            headers.insert(API_KEY_HEADER, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(connection.timeout)
            .build()
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        info!(
            url = %parsed_url,
            timeout_secs = connection.timeout.as_secs(),
            "Created Typesense client"
        );

        Ok(Self {
            http,
            base_url: parsed_url.as_str().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Body of a create-collection request.
    pub(crate) fn collection_body(name: &str, schema: &CollectionSchema) -> Value {
        let nested = schema
            .fields
            .iter()
            .any(|f| matches!(f.field_type, FieldType::Object | FieldType::ObjectArray));

        let mut body = json!({
            "name": name,
            "fields": schema.fields,
        });
        if let Some(sort_field) = &schema.default_sorting_field {
            body["default_sorting_field"] = json!(sort_field);
        }
        if nested {
            body["enable_nested_fields"] = json!(true);
        }
        body
    }

    /// Match JSONL import result lines to the documents that were sent.
    pub(crate) fn parse_import_response(
        documents: &[SearchDocument],
        body: &str,
    ) -> Result<ImportSummary, SearchIndexError> {
        let lines: Vec<&str> = body.lines().filter(|l| !l.trim().is_empty()).collect();
        if lines.len() != documents.len() {
            warn!(
                expected = documents.len(),
                received = lines.len(),
                "Import response line count does not match batch size"
            );
        }

        let mut results = Vec::with_capacity(documents.len());
        for (index, document) in documents.iter().enumerate() {
            let result = match lines.get(index) {
                Some(line) => {
                    let parsed: ImportLine = serde_json::from_str(line)
                        .map_err(|e| SearchIndexError::parse(format!("import line {}: {}", index, e)))?;
                    if parsed.success {
                        DocumentImportResult::succeeded(&document.id)
                    } else {
                        DocumentImportResult::failed(
                            &document.id,
                            SearchIndexError::import(
                                parsed.error.unwrap_or_else(|| "rejected".to_string()),
                            ),
                        )
                    }
                }
                None => DocumentImportResult::failed(
                    &document.id,
                    SearchIndexError::import("no import result returned"),
                ),
            };
            results.push(result);
        }

        Ok(ImportSummary::from_results(results))
    }
}

fn transport_error(e: reqwest::Error) -> SearchIndexError {
    if e.is_timeout() {
        SearchIndexError::timeout(e.to_string())
    } else if e.is_connect() {
        SearchIndexError::connection(e.to_string())
    } else {
        SearchIndexError::unknown(e.to_string())
    }
}

/// Turn a non-success response into an error, keeping the engine's message.
async fn check_status(response: Response, what: &str) -> Result<Response, SearchIndexError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or(body);

    if status == StatusCode::NOT_FOUND {
        return Err(SearchIndexError::not_found(format!("{}: {}", what, message)));
    }

    error!(status = %status, what = %what, message = %message, "Typesense request failed");
    Err(SearchIndexError::response(status.as_u16(), message))
}

#[async_trait]
impl SearchIndexProvider for TypesenseClient {
    fn backend_name(&self) -> &'static str {
        "typesense"
    }

    #[instrument(skip(self, schema))]
    async fn create_collection(
        &self,
        name: &str,
        schema: &CollectionSchema,
    ) -> Result<(), SearchIndexError> {
        let response = self
            .http
            .post(self.endpoint("collections"))
            .json(&Self::collection_body(name, schema))
            .send()
            .await
            .map_err(transport_error)?;

        check_status(response, &format!("collection {}", name))
            .await
            .map_err(|e| match e {
                SearchIndexError::ResponseError { status, message } => {
                    SearchIndexError::collection(format!("{} ({})", message, status))
                }
                other => other,
            })?;

        debug!(collection = %name, "Collection created");
        Ok(())
    }

    async fn retrieve_collection(&self, name: &str) -> Result<CollectionInfo, SearchIndexError> {
        let response = self
            .http
            .get(self.endpoint(&format!("collections/{}", name)))
            .send()
            .await
            .map_err(transport_error)?;

        let collection: CollectionResponse = check_status(response, &format!("collection {}", name))
            .await?
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;

        Ok(CollectionInfo {
            name: collection.name,
            num_documents: collection.num_documents,
        })
    }

    #[instrument(skip(self))]
    async fn delete_collection(&self, name: &str) -> Result<(), SearchIndexError> {
        let response = self
            .http
            .delete(self.endpoint(&format!("collections/{}", name)))
            .send()
            .await
            .map_err(transport_error)?;

        check_status(response, &format!("collection {}", name)).await?;
        debug!(collection = %name, "Collection deleted");
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>, SearchIndexError> {
        let response = self
            .http
            .get(self.endpoint("collections"))
            .send()
            .await
            .map_err(transport_error)?;

        let collections: Vec<CollectionResponse> = check_status(response, "collections")
            .await?
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;

        Ok(collections
            .into_iter()
            .map(|c| CollectionInfo {
                name: c.name,
                num_documents: c.num_documents,
            })
            .collect())
    }

    #[instrument(skip(self, documents), fields(count = documents.len()))]
    async fn import_documents(
        &self,
        collection: &str,
        documents: &[SearchDocument],
        action: ImportAction,
    ) -> Result<ImportSummary, SearchIndexError> {
        let mut body = String::new();
        for document in documents {
            let line = serde_json::to_string(&document.to_value())
                .map_err(|e| SearchIndexError::import(e.to_string()))?;
            body.push_str(&line);
            body.push('\n');
        }

        let response = self
            .http
            .post(self.endpoint(&format!("collections/{}/documents/import", collection)))
            .query(&[("action", action.as_str())])
            .header(CONTENT_TYPE, "text/plain")
            .body(body)
            .send()
            .await
            .map_err(transport_error)?;

        let text = check_status(response, &format!("collection {}", collection))
            .await?
            .text()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;

        let summary = Self::parse_import_response(documents, &text)?;
        debug!(
            collection = %collection,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Import completed"
        );
        Ok(summary)
    }

    #[instrument(skip(self))]
    async fn upsert_alias(&self, alias: &str, collection: &str) -> Result<(), SearchIndexError> {
        let response = self
            .http
            .put(self.endpoint(&format!("aliases/{}", alias)))
            .json(&json!({ "collection_name": collection }))
            .send()
            .await
            .map_err(transport_error)?;

        check_status(response, &format!("alias {}", alias))
            .await
            .map_err(|e| match e {
                SearchIndexError::ResponseError { status, message } => {
                    SearchIndexError::alias(format!("{} ({})", message, status))
                }
                other => other,
            })?;
        Ok(())
    }

    async fn retrieve_alias(&self, alias: &str) -> Result<String, SearchIndexError> {
        let response = self
            .http
            .get(self.endpoint(&format!("aliases/{}", alias)))
            .send()
            .await
            .map_err(transport_error)?;

        let resolved: AliasResponse = check_status(response, &format!("alias {}", alias))
            .await?
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;

        Ok(resolved.collection_name)
    }

    async fn list_aliases(&self) -> Result<Vec<AliasInfo>, SearchIndexError> {
        let response = self
            .http
            .get(self.endpoint("aliases"))
            .send()
            .await
            .map_err(transport_error)?;

        let list: AliasListResponse = check_status(response, "aliases")
            .await?
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;

        Ok(list
            .aliases
            .into_iter()
            .map(|a| AliasInfo {
                name: a.name,
                collection_name: a.collection_name,
            })
            .collect())
    }

    async fn delete_alias(&self, alias: &str) -> Result<(), SearchIndexError> {
        let response = self
            .http
            .delete(self.endpoint(&format!("aliases/{}", alias)))
            .send()
            .await
            .map_err(transport_error)?;

        check_status(response, &format!("alias {}", alias)).await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, SearchIndexError> {
        let response = self
            .http
            .get(self.endpoint("health"))
            .send()
            .await
            .map_err(transport_error)?;

        let body: Value = check_status(response, "health")
            .await?
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;

        Ok(body.get("ok").and_then(|v| v.as_bool()).unwrap_or(false))
    }
}
