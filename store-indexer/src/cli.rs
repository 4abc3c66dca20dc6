//! Command line surface.
//!
//! `sync collections --all` runs every entity type through the orchestrator.
//! `sync <entity> --all` syncs a single entity type. The `alias` commands
//! inspect and repair alias state, and `validate` checks the descriptor
//! configuration without touching the network.

use std::io::Write;

use clap::{Parser, Subcommand};
use tracing::info;

use crate::config::{Dependencies, SearchBackend, SyncConfig};
use crate::IndexingError;
use store_indexer_pipeline::report::render_stats;
use store_indexer_pipeline::SyncMode;
use store_indexer_shared::EntityType;

/// Target of `sync` that runs every entity type.
pub const ALL_COLLECTIONS: &str = "collections";

#[derive(Parser, Debug)]
#[command(name = "store-indexer")]
#[command(about = "Reindex storefront content into search collections", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Override SYNC_MODE (rebuild | in_place)
    #[arg(long, global = true)]
    pub mode: Option<SyncMode>,

    /// Override SEARCH_BACKEND (typesense | opensearch | memory)
    #[arg(long, global = true)]
    pub backend: Option<SearchBackend>,

    /// Override SEARCH_NAMESPACE
    #[arg(long, global = true)]
    pub namespace: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sync `collections` (every entity type) or a single entity type
    Sync {
        /// `collections`, or an entity type such as `product`
        target: String,

        /// Required confirmation that a full reindex is intended
        #[arg(long)]
        all: bool,

        /// Print the run report as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Inspect and repair aliases
    Alias {
        #[command(subcommand)]
        command: AliasCommand,
    },
    /// Validate the collection configuration and exit
    Validate,
}

#[derive(Subcommand, Debug)]
pub enum AliasCommand {
    /// Print the alias name of every entity type
    Names,
    /// List every alias on the backend
    List,
    /// Show alias targets and stale collections
    Status,
    /// Retire collections the alias does not point to
    Cleanup { entity: String },
    /// Point the alias at the newest existing collection
    PromoteLatest { entity: String },
}

impl Cli {
    /// Apply command line overrides on top of the environment.
    pub fn apply(&self, config: &mut SyncConfig) {
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(namespace) = &self.namespace {
            config.namespace = Some(namespace.clone());
        }
    }
}

/// Run a parsed command.
///
/// # Returns
///
/// * `Ok(true)` - The command succeeded
/// * `Ok(false)` - The command ran but reported a failure or a usage error
/// * `Err(IndexingError)` - Configuration or initialization failed
pub async fn run(command: &Commands, config: &SyncConfig, out: &mut dyn Write) -> Result<bool, IndexingError> {
    match command {
        Commands::Sync { target, all, json } => sync(target, *all, *json, config, out).await,
        Commands::Alias { command } => alias(command, config, out).await,
        Commands::Validate => validate(config, out),
    }
}

async fn sync(
    target: &str,
    all: bool,
    json: bool,
    config: &SyncConfig,
    out: &mut dyn Write,
) -> Result<bool, IndexingError> {
    let entity_type = if target == ALL_COLLECTIONS {
        None
    } else {
        match target.parse::<EntityType>() {
            Ok(entity_type) => Some(entity_type),
            Err(_) => {
                writeln!(out, "Unknown sync type: {}", target)?;
                return Ok(false);
            }
        }
    };

    if !all {
        match entity_type {
            None => writeln!(out, "Please specify --all to sync all collections.")?,
            Some(e) => writeln!(out, "Please specify --all to sync all {} records.", e)?,
        }
        return Ok(false);
    }

    // Configuration errors surface before the backend is contacted.
    let sources = Dependencies::sources(config)?;
    let descriptors = Dependencies::descriptors(config, &sources)?;
    let deps = Dependencies::new(config, sources).await?;
    let orchestrator = deps.orchestrator(config, descriptors);

    match entity_type {
        None => {
            let report = orchestrator.run_all().await;
            if json {
                let rendered = serde_json::to_string_pretty(&report)
                    .map_err(|e| IndexingError::config(format!("Failed to render report: {}", e)))?;
                writeln!(out, "{}", rendered)?;
            } else {
                write!(out, "{}", report.render_summary())?;
            }
            Ok(report.is_success())
        }
        Some(entity_type) => {
            let Some(result) = orchestrator.run_one(entity_type).await else {
                writeln!(out, "Unknown sync type: {}", target)?;
                return Ok(false);
            };
            if json {
                let rendered = serde_json::to_string_pretty(&result)
                    .map_err(|e| IndexingError::config(format!("Failed to render result: {}", e)))?;
                writeln!(out, "{}", rendered)?;
            } else {
                write!(out, "{}", render_stats(&result))?;
                if let Some(error) = result.error() {
                    writeln!(out, "Error: {}", error)?;
                }
            }
            Ok(!result.is_failed())
        }
    }
}

async fn alias(command: &AliasCommand, config: &SyncConfig, out: &mut dyn Write) -> Result<bool, IndexingError> {
    let entity_arg = match command {
        AliasCommand::Cleanup { entity } | AliasCommand::PromoteLatest { entity } => Some(entity),
        _ => None,
    };
    let entity_type = match entity_arg.map(|e| e.parse::<EntityType>()) {
        Some(Err(e)) => {
            writeln!(out, "{}", e)?;
            return Ok(false);
        }
        Some(Ok(entity_type)) => Some(entity_type),
        None => None,
    };

    let deps = Dependencies::new(config, Dependencies::sources(config)?).await?;
    let aliases = &deps.aliases;

    match (command, entity_type) {
        (AliasCommand::Names, _) => {
            for (entity_type, alias) in aliases.all_alias_names() {
                writeln!(out, "{:<16} {}", entity_type.as_str(), alias)?;
            }
            Ok(true)
        }
        (AliasCommand::List, _) => {
            let mut listed = aliases.client().list_aliases().await?;
            listed.sort_by(|a, b| a.name.cmp(&b.name));
            if listed.is_empty() {
                writeln!(out, "No aliases found.")?;
            }
            for alias in listed {
                writeln!(out, "{} -> {}", alias.name, alias.collection_name)?;
            }
            Ok(true)
        }
        (AliasCommand::Status, _) => {
            for entity_type in EntityType::all() {
                let status = aliases.status(*entity_type).await?;
                writeln!(
                    out,
                    "{} -> {}",
                    status.alias,
                    status.target.as_deref().unwrap_or("(none)")
                )?;
                for collection in &status.collections {
                    let marker = if Some(collection) == status.target.as_ref() { "*" } else { " " };
                    writeln!(out, "  {} {}", marker, collection)?;
                }
                let stale = status.stale().count();
                if stale > 0 {
                    writeln!(out, "  {} stale collection(s)", stale)?;
                }
            }
            Ok(true)
        }
        (AliasCommand::Cleanup { .. }, Some(entity_type)) => {
            let retired = aliases.cleanup_stale(entity_type).await;
            info!(entity_type = %entity_type, retired = retired.len(), "Alias cleanup finished");
            if retired.is_empty() {
                writeln!(out, "No stale {} collections.", entity_type)?;
            }
            for collection in retired {
                writeln!(out, "Retired {}", collection)?;
            }
            Ok(true)
        }
        (AliasCommand::PromoteLatest { .. }, Some(entity_type)) => match aliases.promote_latest(entity_type).await {
            Some(collection) => {
                writeln!(out, "{} -> {}", aliases.alias_name(entity_type), collection)?;
                Ok(true)
            }
            None => {
                writeln!(out, "No {} collection to promote.", entity_type)?;
                Ok(false)
            }
        },
        (AliasCommand::Cleanup { .. } | AliasCommand::PromoteLatest { .. }, None) => Ok(false),
    }
}

fn validate(config: &SyncConfig, out: &mut dyn Write) -> Result<bool, IndexingError> {
    let sources = Dependencies::sources(config)?;
    let descriptors = Dependencies::descriptors(config, &sources)?;

    for descriptor in &descriptors {
        let enabled = config.flags.allows(descriptor);
        writeln!(
            out,
            "{:<16} {:<36} batch={:<4} limit={:<5}{}",
            descriptor.entity_type.as_str(),
            descriptor.strategy.to_string(),
            descriptor.batch_size,
            descriptor.safety_limit,
            if enabled { "" } else { " (disabled)" }
        )?;
    }
    writeln!(out, "Configuration is valid ({} collections).", descriptors.len())?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use store_indexer_pipeline::PipelineError;

    fn memory_config() -> SyncConfig {
        SyncConfig {
            backend: SearchBackend::Memory,
            ..SyncConfig::default()
        }
    }

    /// A Typesense endpoint nothing listens on; any backend call would fail.
    fn unreachable_config() -> SyncConfig {
        SyncConfig {
            typesense_url: "http://127.0.0.1:9".to_string(),
            ..SyncConfig::default()
        }
    }

    async fn run_args(args: &[&str], config: &SyncConfig) -> (Result<bool, IndexingError>, String) {
        let cli = Cli::try_parse_from(args).unwrap();
        let mut out = Vec::new();
        let result = run(&cli.command, config, &mut out).await;
        (result, String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn test_sync_without_all_has_no_side_effects() {
        let (result, out) = run_args(&["store-indexer", "sync", "collections"], &unreachable_config()).await;

        assert!(!result.unwrap());
        assert_eq!(out, "Please specify --all to sync all collections.\n");
    }

    #[tokio::test]
    async fn test_unknown_sync_type() {
        let (result, out) = run_args(&["store-indexer", "sync", "widgets", "--all"], &unreachable_config()).await;

        assert!(!result.unwrap());
        assert_eq!(out, "Unknown sync type: widgets\n");
    }

    #[tokio::test]
    async fn test_invalid_batch_size_fails_before_backend_contact() {
        let mut config = unreachable_config();
        config.batch_sizes.insert(EntityType::Product, 0);

        let (result, out) = run_args(&["store-indexer", "sync", "collections", "--all"], &config).await;

        let err = result.unwrap_err();
        assert!(
            matches!(err, IndexingError::PipelineError(PipelineError::Configuration { .. })),
            "{:?}",
            err
        );
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_validate_lists_every_collection() {
        let mut config = memory_config();
        config.flags.set("SYNC_MENU_ENABLED", false);

        let (result, out) = run_args(&["store-indexer", "validate"], &config).await;

        assert!(result.unwrap());
        assert!(out.contains("Configuration is valid (6 collections)."));
        assert!(out.contains("batch_with_ids(product_ids)"));
        assert!(out.lines().any(|l| l.starts_with("menu") && l.ends_with("(disabled)")));
    }

    #[tokio::test]
    async fn test_alias_names_use_namespace() {
        let mut config = memory_config();
        let cli = Cli::try_parse_from(["store-indexer", "--namespace", "shop_eu", "alias", "names"]).unwrap();
        cli.apply(&mut config);

        let mut out = Vec::new();
        assert!(run(&cli.command, &config, &mut out).await.unwrap());

        let out = String::from_utf8(out).unwrap();
        assert_eq!(out.lines().count(), 6);
        assert!(out.lines().all(|l| l.contains("shop_eu")));
    }

    #[tokio::test]
    async fn test_alias_status_on_empty_backend() {
        let (result, out) = run_args(&["store-indexer", "alias", "status"], &memory_config()).await;

        assert!(result.unwrap());
        assert_eq!(out.matches("(none)").count(), 6);
    }

    #[tokio::test]
    async fn test_promote_latest_without_collections() {
        let (result, out) = run_args(&["store-indexer", "alias", "promote-latest", "product"], &memory_config()).await;

        assert!(!result.unwrap());
        assert_eq!(out, "No product collection to promote.\n");
    }

    #[tokio::test]
    async fn test_alias_cleanup_rejects_unknown_entity() {
        let (result, out) = run_args(&["store-indexer", "alias", "cleanup", "widgets"], &unreachable_config()).await;

        assert!(!result.unwrap());
        assert!(out.contains("widgets"));
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::try_parse_from(["store-indexer", "sync", "collections", "--all", "--mode", "in_place"]).unwrap();
        let mut config = SyncConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.mode, SyncMode::InPlace);
        assert!(matches!(cli.command, Commands::Sync { all: true, .. }));
    }
}
