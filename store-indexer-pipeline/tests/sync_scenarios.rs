//! End-to-end sync scenarios against the in-memory search backend.
//!
//! Key scenarios tested:
//! - Disabled entity types are skipped with a reason
//! - A short source is imported in one batch and the loop stops on the empty page
//! - Malformed descriptors fail before any source or backend call
//! - A failing or panicking entity type does not stop the others
//! - Rebuilds promote atomically and never expose partial collections
//! - Variations of variable products land in the promoted product collection

mod common;

use common::{page, record, Harness, Script};
use serde_json::json;
use store_indexer_pipeline::{
    default_descriptor_specs, validate_collections_configuration, DescriptorSpec, FeatureFlags,
    PipelineError, SyncMode,
};
use store_indexer_shared::{EntityType, SkipReason, SYNC_ORDER};

#[tokio::test]
async fn disabled_taxonomy_is_skipped() {
    let harness = Harness::new();
    let flags = FeatureFlags::new().with("SYNC_TAXONOMY_ENABLED", false);
    let orchestrator = harness.orchestrator(&default_descriptor_specs(), &flags, SyncMode::Rebuild);

    let report = orchestrator.run_all().await;

    let taxonomy = report
        .results
        .iter()
        .find(|r| r.entity_type == EntityType::Taxonomy)
        .unwrap();
    assert_eq!(taxonomy.collection, "taxonomy");
    assert!(taxonomy.is_skipped());
    assert_eq!(taxonomy.skip_reason(), Some(SkipReason::DisabledByFilter));
    assert_eq!(taxonomy.total_imports, 0);

    assert_eq!(harness.source(EntityType::Taxonomy).calls(), 0);
    assert!(harness.aliases.all_collections(EntityType::Taxonomy).await.is_empty());
    assert!(report.is_success());
}

#[tokio::test]
async fn two_record_page_is_one_import_call() {
    let harness = Harness::new().script(
        EntityType::Menu,
        Script::Pages(vec![page(EntityType::Menu, 1, 2)]),
    );
    let specs = vec![DescriptorSpec::new("menu", "menus", "batch_with_query")
        .with_query_method("term_query")
        .with_batch_size(2)];
    let orchestrator = harness.orchestrator(&specs, &FeatureFlags::new(), SyncMode::InPlace);

    let result = orchestrator.run_one(EntityType::Menu).await.unwrap();

    assert!(result.is_completed());
    assert_eq!(result.total_imports, 2);
    assert_eq!(result.iterations, 1);
    assert_eq!(harness.imports.batches(), vec![("menu".to_string(), 2)]);
    assert_eq!(harness.source(EntityType::Menu).calls(), 2);
}

#[tokio::test]
async fn invalid_sync_type_fails_before_any_call() {
    let harness = Harness::new();
    let mut specs = default_descriptor_specs();
    specs[2].sync_type = "invalid_type".to_string();

    let err = validate_collections_configuration(&specs, &harness.registry()).unwrap_err();

    match err {
        PipelineError::Configuration { entity, field, message } => {
            assert_eq!(entity, "taxonomy");
            assert_eq!(field, "sync_type");
            assert!(message.contains("invalid_type"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    for entity_type in EntityType::all() {
        assert_eq!(harness.source(*entity_type).calls(), 0);
    }
    assert!(harness.memory.collection_names().await.is_empty());
    assert!(harness.imports.batches().is_empty());
}

#[tokio::test]
async fn failing_products_do_not_stop_other_entities() {
    let harness = Harness::new().script(
        EntityType::Product,
        Script::FailAfterFirst(page(EntityType::Product, 1, 2)),
    );
    let orchestrator = harness.default_orchestrator(SyncMode::Rebuild);

    let report = orchestrator.run_all().await;

    let order: Vec<EntityType> = report.results.iter().map(|r| r.entity_type).collect();
    assert_eq!(order, SYNC_ORDER.to_vec());

    for result in &report.results {
        if result.entity_type == EntityType::Product {
            assert!(result.is_failed());
            assert!(result.error().unwrap_or_default().contains("upstream returned 500"));
        } else {
            assert!(result.is_completed() || result.is_skipped(), "{:?}", result);
        }
    }
    assert_eq!(report.failed(), 1);
    assert!(!report.is_success());

    assert_eq!(harness.aliases.current_collection(EntityType::Product).await, None);
    assert!(harness.aliases.all_collections(EntityType::Product).await.is_empty());
    assert!(harness.aliases.current_collection(EntityType::Navigation).await.is_some());
}

#[tokio::test]
async fn panicking_entity_is_isolated() {
    let harness = Harness::new().script(EntityType::Taxonomy, Script::Panic);
    let orchestrator = harness.default_orchestrator(SyncMode::Rebuild);

    let report = orchestrator.run_all().await;

    let taxonomy = &report.results[2];
    assert_eq!(taxonomy.entity_type, EntityType::Taxonomy);
    assert!(taxonomy.is_failed());
    assert!(taxonomy.error().unwrap_or_default().contains("panic"));

    let product = &report.results[1];
    assert!(product.is_completed());
    assert_eq!(product.successful_imports, 2);

    let navigation = &report.results[5];
    assert!(navigation.is_completed());
}

#[tokio::test]
async fn rebuild_promotes_and_retires_previous_collection() {
    let harness = Harness::new();
    let orchestrator = harness.default_orchestrator(SyncMode::Rebuild);

    let first = orchestrator.run_all().await;
    assert!(first.is_success());
    assert_eq!(harness.memory.alias_writes().await, SYNC_ORDER.len());

    let first_products = first.results[1].target_collection.clone().unwrap();
    assert!(first.results[1].promoted);
    assert_eq!(
        harness.aliases.current_collection(EntityType::Product).await,
        Some(first_products.clone())
    );

    let second = orchestrator.run_all().await;
    let second_products = second.results[1].target_collection.clone().unwrap();

    assert_ne!(first_products, second_products);
    assert_eq!(
        harness.aliases.current_collection(EntityType::Product).await,
        Some(second_products.clone())
    );
    assert_eq!(
        harness.aliases.all_collections(EntityType::Product).await,
        vec![second_products]
    );
    assert_eq!(harness.memory.alias_writes().await, 2 * SYNC_ORDER.len());
}

#[tokio::test]
async fn failed_rebuild_keeps_serving_previous_collection() {
    let healthy = Harness::new();
    let orchestrator = healthy.default_orchestrator(SyncMode::Rebuild);
    let first = orchestrator.run_all().await;
    let live = first.results[1].target_collection.clone().unwrap();

    // Same backend, products source now fails mid-run.
    let broken = Harness {
        sources: Harness::new()
            .script(
                EntityType::Product,
                Script::FailAfterFirst(page(EntityType::Product, 10, 2)),
            )
            .sources,
        ..healthy
    };
    let report = broken.default_orchestrator(SyncMode::Rebuild).run_all().await;

    assert!(report.results[1].is_failed());
    assert_eq!(
        broken.aliases.current_collection(EntityType::Product).await,
        Some(live.clone())
    );
    assert_eq!(broken.aliases.all_collections(EntityType::Product).await, vec![live.clone()]);
    assert_eq!(broken.memory.documents(&live).await.len(), 2);
}

#[tokio::test]
async fn safety_limit_truncates_without_promoting() {
    let harness = Harness::new().script(
        EntityType::Product,
        Script::Endless(page(EntityType::Product, 1, 2)),
    );
    let mut specs = default_descriptor_specs();
    specs[1].safety_limit = Some(3);
    let orchestrator = harness.orchestrator(&specs, &FeatureFlags::new(), SyncMode::Rebuild);

    let result = orchestrator.run_one(EntityType::Product).await.unwrap();

    assert!(result.is_completed());
    assert!(result.truncated);
    assert!(!result.promoted);
    assert_eq!(result.iterations, 3);
    assert_eq!(harness.aliases.current_collection(EntityType::Product).await, None);
    assert!(harness.aliases.all_collections(EntityType::Product).await.is_empty());
}

#[tokio::test]
async fn source_ending_at_safety_limit_is_promoted() {
    let harness = Harness::new().script(
        EntityType::Product,
        Script::Pages(vec![page(EntityType::Product, 1, 2), page(EntityType::Product, 3, 2)]),
    );
    let mut specs = default_descriptor_specs();
    specs[1].safety_limit = Some(2);
    let orchestrator = harness.orchestrator(&specs, &FeatureFlags::new(), SyncMode::Rebuild);

    let result = orchestrator.run_one(EntityType::Product).await.unwrap();

    assert!(result.is_completed());
    assert!(!result.truncated);
    assert!(result.promoted);
    assert_eq!(result.iterations, 2);
    let live = harness.aliases.current_collection(EntityType::Product).await.unwrap();
    assert_eq!(harness.memory.documents(&live).await.len(), 4);
}

#[tokio::test]
async fn rebuild_keeps_product_variations() {
    let harness = Harness::new().variations(
        EntityType::Product,
        Script::Pages(vec![vec![
            record(EntityType::Product, 1),
            json!({"id": 2, "name": "Tee", "type": "variable"}),
        ]]),
    );
    let orchestrator = harness.default_orchestrator(SyncMode::Rebuild);

    let result = orchestrator.run_one(EntityType::Product).await.unwrap();

    assert!(result.is_completed());
    assert!(result.promoted);
    assert_eq!(result.successful_imports, 4);
    let live = harness.aliases.current_collection(EntityType::Product).await.unwrap();
    let documents = harness.memory.documents(&live).await;
    let variation = documents.iter().find(|d| d.id == "201").unwrap();
    assert_eq!(variation.get("parentId"), Some(&json!("2")));
    assert_eq!(variation.get("productType"), Some(&json!("variation")));
    assert!(documents.iter().any(|d| d.id == "202"));
}

#[tokio::test]
async fn in_place_sync_writes_through_alias() {
    let harness = Harness::new();
    let rebuild = harness.default_orchestrator(SyncMode::Rebuild);
    rebuild.run_all().await;
    let live = harness
        .aliases
        .current_collection(EntityType::Taxonomy)
        .await
        .unwrap();

    let in_place = harness.default_orchestrator(SyncMode::InPlace);
    let result = in_place.run_one(EntityType::Taxonomy).await.unwrap();

    assert!(result.is_completed());
    assert_eq!(result.target_collection, Some(live.clone()));
    assert!(!result.promoted);
    assert_eq!(harness.memory.documents(&live).await.len(), 2);
    assert_eq!(harness.aliases.all_collections(EntityType::Taxonomy).await, vec![live]);
}

#[tokio::test]
async fn engines_run_in_dependency_order() {
    let harness = Harness::new();
    let mut specs = default_descriptor_specs();
    specs.reverse();
    let orchestrator = harness.orchestrator(&specs, &FeatureFlags::new(), SyncMode::InPlace);

    assert_eq!(orchestrator.entity_types(), SYNC_ORDER.to_vec());
}
