//! OpenSearch client implementation.
//!
//! This module provides the concrete implementation of `SearchIndexProvider`
//! using the OpenSearch Rust client. Collections map to indices and aliases
//! map to index aliases.

use async_trait::async_trait;
use opensearch::{
    cat::CatIndicesParts,
    cluster::ClusterHealthParts,
    http::request::JsonBody,
    http::response::Response,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesCreateParts, IndicesDeleteAliasParts, IndicesDeleteParts, IndicesGetAliasParts},
    BulkParts, OpenSearch,
};
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::config::BackendConnection;
use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::opensearch::index_config::{index_body, IndexSettings};
use crate::types::{
    AliasInfo, CollectionInfo, DocumentImportResult, ImportAction, ImportSummary,
};
use store_indexer_shared::{CollectionSchema, SearchDocument};

/// OpenSearch client implementation.
///
/// # Example
///
/// ```ignore
/// use store_indexer_repository::config::BackendConnection;
/// let client = OpenSearchClient::new(&BackendConnection::new("http://localhost:9200")).await?;
/// client.upsert_alias("product_alias", "product_1718000000000000").await?;
/// ```
pub struct OpenSearchClient {
    client: OpenSearch,
    settings: IndexSettings,
}

impl OpenSearchClient {
    /// Create a new OpenSearch client connected to the specified URL.
    ///
    /// # Arguments
    ///
    /// * `connection` - The OpenSearch server URL (e.g., "http://localhost:9200") and timeout
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchClient)` - A new client instance
    /// * `Err(SearchIndexError)` - If connection setup fails
    pub async fn new(connection: &BackendConnection) -> Result<Self, SearchIndexError> {
        let parsed_url =
            Url::parse(&connection.url).map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .timeout(connection.timeout)
            .build()
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let client = OpenSearch::new(transport);

        info!(
            url = %connection.url,
            timeout_secs = connection.timeout.as_secs(),
            "Created OpenSearch client"
        );

        Ok(Self {
            client,
            settings: IndexSettings::default(),
        })
    }

    pub fn with_settings(mut self, settings: IndexSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Bulk operation name for an import action.
    fn bulk_operation(action: ImportAction) -> &'static str {
        match action {
            ImportAction::Insert => "create",
            ImportAction::Upsert => "index",
            ImportAction::Update => "update",
        }
    }

    /// Action/source line pairs for a bulk request.
    pub(crate) fn bulk_lines(
        collection: &str,
        documents: &[SearchDocument],
        action: ImportAction,
    ) -> Vec<Value> {
        let operation = Self::bulk_operation(action);
        let mut lines = Vec::with_capacity(documents.len() * 2);
        for doc in documents {
            lines.push(json!({ operation: { "_index": collection, "_id": doc.id } }));
            let source = Value::Object(doc.fields.clone());
            match action {
                ImportAction::Update => lines.push(json!({ "doc": source })),
                ImportAction::Insert | ImportAction::Upsert => lines.push(source),
            }
        }
        lines
    }

    /// Match bulk response items to the documents that were sent.
    pub(crate) fn parse_bulk_response(
        documents: &[SearchDocument],
        action: ImportAction,
        response_body: &Value,
    ) -> ImportSummary {
        let operation = Self::bulk_operation(action);
        let empty_vec = Vec::<Value>::new();
        let items = response_body
            .get("items")
            .and_then(|i| i.as_array())
            .unwrap_or(&empty_vec);

        let results = documents
            .iter()
            .enumerate()
            .map(|(index, doc)| {
                let item = items.get(index).and_then(|i| i.get(operation));
                match item {
                    Some(item) => match item.get("error") {
                        Some(err) => {
                            let reason = err
                                .get("reason")
                                .and_then(|r| r.as_str())
                                .map(String::from)
                                .unwrap_or_else(|| err.to_string());
                            DocumentImportResult::failed(&doc.id, SearchIndexError::import(reason))
                        }
                        None => DocumentImportResult::succeeded(&doc.id),
                    },
                    None => DocumentImportResult::failed(
                        &doc.id,
                        SearchIndexError::import("no bulk item returned"),
                    ),
                }
            })
            .collect();

        ImportSummary::from_results(results)
    }

    /// Index names carrying `alias`, from a `GET _alias/<name>` body.
    pub(crate) fn parse_alias_targets(body: &Value) -> Vec<String> {
        let mut targets: Vec<String> = body
            .as_object()
            .map(|indices| indices.keys().cloned().collect())
            .unwrap_or_default();
        targets.sort();
        targets
    }

    /// Turn a non-success response into an error, keeping the body.
    async fn check_status(response: Response, what: &str) -> Result<Response, SearchIndexError> {
        let status = response.status_code();
        if status.is_success() {
            return Ok(response);
        }

        let error_body = response.text().await.unwrap_or_default();
        if status.as_u16() == 404 {
            return Err(SearchIndexError::not_found(format!("{}: {}", what, error_body)));
        }

        error!(status = %status, what = %what, body = %error_body, "OpenSearch request failed");
        Err(SearchIndexError::response(status.as_u16(), error_body))
    }

    async fn read_json(response: Response) -> Result<Value, SearchIndexError> {
        response
            .json::<Value>()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))
    }

    /// Indices the alias currently points to; empty if the alias does not exist.
    async fn alias_targets(&self, alias: &str) -> Result<Vec<String>, SearchIndexError> {
        let response = self
            .client
            .indices()
            .get_alias(IndicesGetAliasParts::Name(&[alias]))
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        match Self::check_status(response, &format!("alias {}", alias)).await {
            Ok(response) => Ok(Self::parse_alias_targets(&Self::read_json(response).await?)),
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    fn parse_cat_indices(body: &Value) -> Vec<CollectionInfo> {
        body.as_array()
            .map(|rows| {
                rows.iter()
                    .filter_map(|row| {
                        let name = row.get("index")?.as_str()?;
                        if name.starts_with('.') {
                            return None;
                        }
                        let num_documents = row
                            .get("docs.count")
                            .and_then(|c| c.as_str())
                            .and_then(|c| c.parse::<u64>().ok());
                        Some(CollectionInfo {
                            name: name.to_string(),
                            num_documents,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl SearchIndexProvider for OpenSearchClient {
    fn backend_name(&self) -> &'static str {
        "opensearch"
    }

    #[instrument(skip(self, schema))]
    async fn create_collection(
        &self,
        name: &str,
        schema: &CollectionSchema,
    ) -> Result<(), SearchIndexError> {
        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(name))
            .body(index_body(schema, self.settings))
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        Self::check_status(response, &format!("index {}", name))
            .await
            .map_err(|e| match e {
                SearchIndexError::ResponseError { status, message } => {
                    SearchIndexError::collection(format!("{} ({})", message, status))
                }
                other => other,
            })?;

        debug!(index = %name, "Index created");
        Ok(())
    }

    async fn retrieve_collection(&self, name: &str) -> Result<CollectionInfo, SearchIndexError> {
        let response = self
            .client
            .cat()
            .indices(CatIndicesParts::Index(&[name]))
            .format("json")
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let body = Self::read_json(Self::check_status(response, &format!("index {}", name)).await?)
            .await?;

        Self::parse_cat_indices(&body)
            .into_iter()
            .find(|c| c.name == name)
            .ok_or_else(|| SearchIndexError::not_found(format!("index {}", name)))
    }

    #[instrument(skip(self))]
    async fn delete_collection(&self, name: &str) -> Result<(), SearchIndexError> {
        let response = self
            .client
            .indices()
            .delete(IndicesDeleteParts::Index(&[name]))
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        Self::check_status(response, &format!("index {}", name)).await?;
        debug!(index = %name, "Index deleted");
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>, SearchIndexError> {
        let response = self
            .client
            .cat()
            .indices(CatIndicesParts::None)
            .format("json")
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let body = Self::read_json(Self::check_status(response, "indices").await?).await?;
        Ok(Self::parse_cat_indices(&body))
    }

    #[instrument(skip(self, documents), fields(count = documents.len()))]
    async fn import_documents(
        &self,
        collection: &str,
        documents: &[SearchDocument],
        action: ImportAction,
    ) -> Result<ImportSummary, SearchIndexError> {
        let body: Vec<JsonBody<Value>> = Self::bulk_lines(collection, documents, action)
            .into_iter()
            .map(Into::into)
            .collect();

        let response = self
            .client
            .bulk(BulkParts::Index(collection))
            .body(body)
            .send()
            .await
            .map_err(|e| SearchIndexError::import(e.to_string()))?;

        let response_body =
            Self::read_json(Self::check_status(response, &format!("index {}", collection)).await?)
                .await?;

        let summary = Self::parse_bulk_response(documents, action, &response_body);
        if summary.failed > 0 {
            warn!(
                index = %collection,
                failed = summary.failed,
                "Bulk import completed with rejected documents"
            );
        }
        Ok(summary)
    }

    /// Repoint the alias with a single `_aliases` request.
    ///
    /// The request removes the alias from every index it currently marks and adds
    /// it to `collection`; OpenSearch applies all actions atomically.
    #[instrument(skip(self))]
    async fn upsert_alias(&self, alias: &str, collection: &str) -> Result<(), SearchIndexError> {
        let current = self.alias_targets(alias).await?;

        let mut actions: Vec<Value> = current
            .iter()
            .filter(|index| index.as_str() != collection)
            .map(|index| json!({ "remove": { "index": index, "alias": alias } }))
            .collect();
        actions.push(json!({ "add": { "index": collection, "alias": alias } }));

        let response = self
            .client
            .indices()
            .update_aliases()
            .body(json!({ "actions": actions }))
            .send()
            .await
            .map_err(|e| SearchIndexError::alias(e.to_string()))?;

        Self::check_status(response, &format!("alias {}", alias))
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
        let targets = self.alias_targets(alias).await?;
        if targets.len() > 1 {
            warn!(alias = %alias, targets = ?targets, "Alias points to more than one index");
        }
        targets
            .into_iter()
            .next()
            .ok_or_else(|| SearchIndexError::not_found(format!("alias {}", alias)))
    }

    async fn list_aliases(&self) -> Result<Vec<AliasInfo>, SearchIndexError> {
        let response = self
            .client
            .indices()
            .get_alias(IndicesGetAliasParts::None)
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let body = Self::read_json(Self::check_status(response, "aliases").await?).await?;

        let mut aliases = Vec::new();
        if let Some(indices) = body.as_object() {
            for (index, entry) in indices {
                if index.starts_with('.') {
                    continue;
                }
                if let Some(names) = entry.get("aliases").and_then(|a| a.as_object()) {
                    for name in names.keys() {
                        aliases.push(AliasInfo {
                            name: name.clone(),
                            collection_name: index.clone(),
                        });
                    }
                }
            }
        }
        aliases.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(aliases)
    }

    async fn delete_alias(&self, alias: &str) -> Result<(), SearchIndexError> {
        let targets = self.alias_targets(alias).await?;
        if targets.is_empty() {
            return Err(SearchIndexError::not_found(format!("alias {}", alias)));
        }
        let indices: Vec<&str> = targets.iter().map(String::as_str).collect();

        let response = self
            .client
            .indices()
            .delete_alias(IndicesDeleteAliasParts::IndexName(&indices, &[alias]))
            .send()
            .await
            .map_err(|e| SearchIndexError::alias(e.to_string()))?;

        Self::check_status(response, &format!("alias {}", alias)).await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, SearchIndexError> {
        let response = self
            .client
            .cluster()
            .health(ClusterHealthParts::None)
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let body = Self::read_json(Self::check_status(response, "cluster health").await?).await?;
        let status = body.get("status").and_then(|s| s.as_str()).unwrap_or("red");
        Ok(status == "green" || status == "yellow")
    }
}
