//! Blue/green alias lifecycle for entity collections.
//!
//! Every entity type has a stable alias (`<base>_alias`) that readers query,
//! and a series of timestamped physical collections (`<base>_<epoch_micros>`).
//! A rebuild writes into a fresh collection, then repoints the alias in one
//! call, then removes the collections that are no longer referenced.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::client::SearchIndexClient;
use crate::errors::SearchIndexError;
use store_indexer_shared::{CollectionSchema, EntityType};

/// Alias state of one entity type, as reported by the `alias status` command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AliasStatus {
    pub entity_type: EntityType,
    pub alias: String,
    /// Collection the alias currently resolves to.
    pub target: Option<String>,
    /// Every collection of this entity type, newest first.
    pub collections: Vec<String>,
}

impl AliasStatus {
    /// Collections that exist but are not the alias target.
    pub fn stale(&self) -> impl Iterator<Item = &String> {
        self.collections
            .iter()
            .filter(move |c| Some(c.as_str()) != self.target.as_deref())
    }
}

/// Manages aliases and physical collections for every entity type.
///
/// Lookup failures are logged and reported as absence (`None`, `false`, empty
/// list) so a single backend hiccup does not abort the caller. Destructive
/// operations refuse to act when the alias state cannot be read.
pub struct AliasManager {
    client: Arc<SearchIndexClient>,
    namespace: Option<String>,
    last_issued: AtomicI64,
}

impl AliasManager {
    pub fn new(client: Arc<SearchIndexClient>) -> Self {
        Self {
            client,
            namespace: None,
            last_issued: AtomicI64::new(0),
        }
    }

    /// Prefix every name with `namespace_`, for engines shared between stores.
    pub fn with_namespace(client: Arc<SearchIndexClient>, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        Self {
            client,
            namespace: (!namespace.is_empty()).then_some(namespace),
            last_issued: AtomicI64::new(0),
        }
    }

    pub fn client(&self) -> &Arc<SearchIndexClient> {
        &self.client
    }

    fn base_name(&self, entity_type: EntityType) -> String {
        match &self.namespace {
            Some(namespace) => format!("{}_{}", namespace, entity_type.as_str()),
            None => entity_type.as_str().to_string(),
        }
    }

    /// Stable, reader-facing name of the entity type's alias.
    pub fn alias_name(&self, entity_type: EntityType) -> String {
        format!("{}_alias", self.base_name(entity_type))
    }

    /// Every alias name, in sync order.
    pub fn all_alias_names(&self) -> Vec<(EntityType, String)> {
        EntityType::all()
            .iter()
            .map(|e| (*e, self.alias_name(*e)))
            .collect()
    }

    /// Collection written to when no alias exists yet and the run is in place.
    pub fn default_collection_name(&self, entity_type: EntityType) -> String {
        self.base_name(entity_type)
    }

    /// Deterministic physical collection name for a creation timestamp.
    pub fn collection_name(&self, entity_type: EntityType, epoch_micros: i64) -> String {
        format!("{}_{}", self.base_name(entity_type), epoch_micros)
    }

    /// A fresh collection name, strictly newer than any issued before by this manager.
    pub fn next_collection_name(&self, entity_type: EntityType) -> String {
        let now = Utc::now().timestamp_micros();
        let mut previous = self.last_issued.load(Ordering::SeqCst);
        loop {
            let candidate = now.max(previous + 1);
            match self.last_issued.compare_exchange(
                previous,
                candidate,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return self.collection_name(entity_type, candidate),
                Err(actual) => previous = actual,
            }
        }
    }

    /// Creation stamp of `name` if it is one of this entity type's timestamped collections.
    pub fn collection_stamp(&self, entity_type: EntityType, name: &str) -> Option<i64> {
        let prefix = format!("{}_", self.base_name(entity_type));
        let suffix = name.strip_prefix(&prefix)?;
        if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        suffix.parse().ok()
    }

    fn is_managed_collection(&self, entity_type: EntityType, name: &str) -> bool {
        name == self.default_collection_name(entity_type)
            || self.collection_stamp(entity_type, name).is_some()
    }

    async fn resolve_alias(
        &self,
        entity_type: EntityType,
    ) -> Result<Option<String>, SearchIndexError> {
        self.client.get_alias(&self.alias_name(entity_type)).await
    }

    /// Physical collection the entity type's alias resolves to, if any.
    pub async fn current_collection(&self, entity_type: EntityType) -> Option<String> {
        match self.resolve_alias(entity_type).await {
            Ok(target) => target,
            Err(e) => {
                error!(
                    entity_type = %entity_type,
                    alias = %self.alias_name(entity_type),
                    error = %e,
                    "Failed to resolve alias"
                );
                None
            }
        }
    }

    async fn list_managed(&self, entity_type: EntityType) -> Result<Vec<String>, SearchIndexError> {
        let mut stamped: Vec<(i64, String)> = self
            .client
            .list_collections()
            .await?
            .into_iter()
            .filter_map(|c| {
                self.collection_stamp(entity_type, &c.name)
                    .map(|stamp| (stamp, c.name))
            })
            .collect();
        stamped.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(stamped.into_iter().map(|(_, name)| name).collect())
    }

    /// Every timestamped collection of this entity type, newest first.
    pub async fn all_collections(&self, entity_type: EntityType) -> Vec<String> {
        match self.list_managed(entity_type).await {
            Ok(collections) => collections,
            Err(e) => {
                error!(entity_type = %entity_type, error = %e, "Failed to list collections");
                Vec::new()
            }
        }
    }

    /// Create a fresh timestamped collection. Returns its name, or `None` on failure.
    #[instrument(skip(self, schema))]
    pub async fn create_collection(
        &self,
        entity_type: EntityType,
        schema: &CollectionSchema,
    ) -> Option<String> {
        let name = self.next_collection_name(entity_type);
        match self.client.create_collection(&name, schema).await {
            Ok(()) => {
                info!(entity_type = %entity_type, collection = %name, "Created collection");
                Some(name)
            }
            Err(e) => {
                error!(
                    entity_type = %entity_type,
                    collection = %name,
                    error = %e,
                    "Failed to create collection"
                );
                None
            }
        }
    }

    /// Make sure `name` exists, creating it with `schema` when missing.
    pub async fn ensure_collection(
        &self,
        entity_type: EntityType,
        name: &str,
        schema: &CollectionSchema,
    ) -> Result<(), SearchIndexError> {
        if self.client.collection_exists(name).await? {
            return Ok(());
        }
        self.client.create_collection(name, schema).await?;
        info!(entity_type = %entity_type, collection = %name, "Created collection");
        Ok(())
    }

    /// Repoint the alias at `new_collection`.
    ///
    /// The collection must exist. The switch is one alias write; readers never
    /// observe a missing alias. Returns whether the alias now points at
    /// `new_collection`.
    #[instrument(skip(self))]
    pub async fn promote(&self, entity_type: EntityType, new_collection: &str) -> bool {
        let alias = self.alias_name(entity_type);

        match self.client.collection_exists(new_collection).await {
            Ok(true) => {}
            Ok(false) => {
                error!(
                    alias = %alias,
                    collection = %new_collection,
                    "Refusing to promote a collection that does not exist"
                );
                return false;
            }
            Err(e) => {
                error!(alias = %alias, collection = %new_collection, error = %e, "Failed to verify collection");
                return false;
            }
        }

        match self.client.set_alias(&alias, new_collection).await {
            Ok(()) => {
                info!(alias = %alias, collection = %new_collection, "Alias promoted");
                true
            }
            Err(e) => {
                error!(alias = %alias, collection = %new_collection, error = %e, "Failed to promote alias");
                false
            }
        }
    }

    /// Delete `old_collection`, unless the alias currently points to it.
    ///
    /// Refuses when the alias cannot be resolved, and never touches collections
    /// that do not belong to this entity type. Returns whether a collection was
    /// deleted.
    #[instrument(skip(self))]
    pub async fn retire(&self, entity_type: EntityType, old_collection: &str) -> bool {
        if !self.is_managed_collection(entity_type, old_collection) {
            warn!(
                entity_type = %entity_type,
                collection = %old_collection,
                "Refusing to retire a collection of another entity type"
            );
            return false;
        }

        let target = match self.resolve_alias(entity_type).await {
            Ok(target) => target,
            Err(e) => {
                error!(
                    entity_type = %entity_type,
                    collection = %old_collection,
                    error = %e,
                    "Alias state unknown, refusing to retire collection"
                );
                return false;
            }
        };

        if target.as_deref() == Some(old_collection) {
            warn!(
                alias = %self.alias_name(entity_type),
                collection = %old_collection,
                "Refusing to retire the collection the alias points to"
            );
            return false;
        }

        match self.client.delete_collection(old_collection).await {
            Ok(true) => {
                info!(entity_type = %entity_type, collection = %old_collection, "Retired collection");
                true
            }
            Ok(false) => {
                debug!(collection = %old_collection, "Collection already gone");
                false
            }
            Err(e) => {
                error!(collection = %old_collection, error = %e, "Failed to retire collection");
                false
            }
        }
    }

    /// Retire every timestamped collection the alias does not point to.
    ///
    /// Does nothing when the alias does not exist: without a live target there
    /// is no way to tell which collection readers depend on.
    pub async fn cleanup_stale(&self, entity_type: EntityType) -> Vec<String> {
        let target = match self.resolve_alias(entity_type).await {
            Ok(Some(target)) => target,
            Ok(None) => {
                warn!(
                    alias = %self.alias_name(entity_type),
                    "No alias found, skipping cleanup"
                );
                return Vec::new();
            }
            Err(e) => {
                error!(entity_type = %entity_type, error = %e, "Alias state unknown, skipping cleanup");
                return Vec::new();
            }
        };

        // The bootstrap collection goes stale once a rebuild moves the alias off it.
        let mut candidates = self.all_collections(entity_type).await;
        let default = self.default_collection_name(entity_type);
        match self.client.collection_exists(&default).await {
            Ok(true) => candidates.push(default),
            Ok(false) => {}
            Err(e) => warn!(collection = %default, error = %e, "Failed to check default collection"),
        }

        let mut retired = Vec::new();
        for collection in candidates {
            if collection == target {
                continue;
            }
            if self.retire(entity_type, &collection).await {
                retired.push(collection);
            }
        }

        if !retired.is_empty() {
            info!(entity_type = %entity_type, count = retired.len(), "Cleaned up stale collections");
        }
        retired
    }

    /// Point the alias at the newest timestamped collection.
    ///
    /// Recovery path after a rebuild that imported data but never promoted.
    pub async fn promote_latest(&self, entity_type: EntityType) -> Option<String> {
        let newest = self.all_collections(entity_type).await.into_iter().next()?;
        if self.promote(entity_type, &newest).await {
            Some(newest)
        } else {
            None
        }
    }

    /// Alias target and collections of one entity type.
    pub async fn status(&self, entity_type: EntityType) -> Result<AliasStatus, SearchIndexError> {
        Ok(AliasStatus {
            entity_type,
            alias: self.alias_name(entity_type),
            target: self.resolve_alias(entity_type).await?,
            collections: self.list_managed(entity_type).await?,
        })
    }
}
