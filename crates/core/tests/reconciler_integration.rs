//! Integration tests for batch reconciliation against the in-memory API

mod support;

use stockx_core::{BatchReconciler, ChangeSet, InventoryIndex, ItemStatus};
use stockx_domain::{FeeSchedule, ItemKey, OperationInput, OperationKind, StockxError};
use support::{harness, harness_with, listing, ListingExt};

fn reconciler(h: &support::Harness) -> BatchReconciler {
    BatchReconciler::new(h.client.clone(), h.config.batch.clone())
}

/// Validates a combined price change and quantity increase.
///
/// # Test Steps
/// 1. Index two listings of V1 at 110 USD
/// 2. Stage price 100 and quantity 3
/// 3. Flush and verify one update batch of two and one create batch of one
/// 4. Verify the item succeeded only once both operations finished
#[tokio::test(start_paused = true)]
async fn test_reprice_and_grow_item() {
    let listings = vec![listing("l1", "v1", 110.0), listing("l2", "v1", 110.0)];
    let h = harness(listings.clone());
    h.api.set_polls_to_finish(3);
    let index = InventoryIndex::build(listings, FeeSchedule::default());
    let key = ItemKey::new("v1", 110.0, "USD");

    let changes = ChangeSet::new();
    changes.record_price_change(&key, 100.0).unwrap();
    changes.record_quantity_change(&key, 3).unwrap();

    let report = reconciler(&h).flush(&changes, &index).await;

    let updates = h.api.batches_of(OperationKind::Update);
    let creates = h.api.batches_of(OperationKind::Create);
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].inputs.len(), 2);
    assert_eq!(creates.len(), 1);
    assert_eq!(
        creates[0].inputs,
        vec![OperationInput::Create { variant_id: "v1".into(), amount: 100.0, currency: "USD".into() }]
    );
    assert!(h.api.batches_of(OperationKind::Delete).is_empty());

    let result = report.get(&key).unwrap();
    assert_eq!(result.status, ItemStatus::Succeeded);
    assert_eq!(result.updated.len(), 2);
    assert_eq!(result.created.len(), 1);
    assert!(h.api.calls("get_operation_status") >= 6);
    assert!(changes.is_empty());

    let repriced = h.api.listings().iter().filter(|l| l.amount == 100.0).count();
    assert_eq!(repriced, 3);
}

/// Validates per-item attribution when one update in a batch fails.
///
/// # Test Steps
/// 1. Index three single-listing items
/// 2. Reprice all three; the API rejects the middle listing
/// 3. Verify the failing item names its listing and the others succeed
#[tokio::test(start_paused = true)]
async fn test_partial_batch_failure_names_listing() {
    let listings =
        vec![listing("l1", "v1", 110.0), listing("l2", "v2", 120.0), listing("l3", "v3", 130.0)];
    let h = harness(listings.clone());
    h.api.fail_listing("l2", "price below minimum");
    let index = InventoryIndex::build(listings, FeeSchedule::default());

    let changes = ChangeSet::new();
    for (variant, price) in [("v1", 110.0), ("v2", 120.0), ("v3", 130.0)] {
        changes.record_price_change(&ItemKey::new(variant, price, "USD"), price - 5.0).unwrap();
    }

    let report = reconciler(&h).flush(&changes, &index).await;

    assert_eq!(h.api.batches_of(OperationKind::Update).len(), 1);
    assert_eq!(report.succeeded().count(), 2);
    let failed: Vec<_> = report.failed().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].key, ItemKey::new("v2", 120.0, "USD"));
    assert_eq!(failed[0].status, ItemStatus::PartialFailure);
    assert_eq!(failed[0].failed_listing_ids(), vec!["l2"]);
    assert!(failed[0].error.as_ref().unwrap().to_string().contains("price below minimum"));
    assert!(!report.is_success());
}

/// Two price changes on one item produce one update carrying the latest value.
#[tokio::test(start_paused = true)]
async fn test_price_changes_coalesce() {
    let listings = vec![listing("l1", "v1", 110.0)];
    let h = harness(listings.clone());
    let index = InventoryIndex::build(listings, FeeSchedule::default());
    let key = ItemKey::new("v1", 110.0, "USD");

    let changes = ChangeSet::new();
    changes.record_price_change(&key, 105.0).unwrap();
    changes.record_price_change(&key, 99.0).unwrap();

    let report = reconciler(&h).flush(&changes, &index).await;

    assert!(report.is_success());
    assert_eq!(h.api.calls("batch_update_listings"), 1);
    let updates = h.api.batches_of(OperationKind::Update);
    assert_eq!(updates[0].inputs, vec![OperationInput::Update { listing_id: "l1".into(), amount: 99.0 }]);
}

/// Quantity decreases delete the oldest listings first.
#[tokio::test(start_paused = true)]
async fn test_quantity_decrease_deletes_oldest() {
    let listings = vec![
        listing("l-new", "v1", 110.0).created("2024-03-01T00:00:00Z"),
        listing("l-old", "v1", 110.0).created("2024-01-01T00:00:00Z"),
        listing("l-mid", "v1", 110.0).created("2024-02-01T00:00:00Z"),
    ];
    let h = harness(listings.clone());
    let index = InventoryIndex::build(listings, FeeSchedule::default());
    let key = ItemKey::new("v1", 110.0, "USD");

    let changes = ChangeSet::new();
    changes.record_quantity_change(&key, 1).unwrap();

    let report = reconciler(&h).flush(&changes, &index).await;

    let result = report.get(&key).unwrap();
    assert_eq!(result.deleted, vec!["l-old".to_string(), "l-mid".to_string()]);
    let remaining: Vec<_> = h.api.listings().into_iter().map(|l| l.listing_id).collect();
    assert_eq!(remaining, vec!["l-new"]);
    assert_eq!(report.deleted_count(), 2);
}

/// Entries beyond `batch_size` are split across operations.
#[tokio::test(start_paused = true)]
async fn test_creates_are_chunked() {
    let mut config = support::config();
    config.batch.batch_size = 2;
    let h = harness_with(Vec::new(), config);
    let key = ItemKey::new("v9", 80.0, "USD");

    let changes = ChangeSet::new();
    changes.record_quantity_change(&key, 5).unwrap();

    let report = reconciler(&h).flush(&changes, &InventoryIndex::default()).await;

    let sizes: Vec<_> = h.api.batches_of(OperationKind::Create).iter().map(|b| b.inputs.len()).collect();
    let mut sorted = sizes.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, vec![1, 2, 2]);
    assert_eq!(report.get(&key).unwrap().created.len(), 5);
    assert_eq!(h.api.listings().len(), 5);
}

/// Validates that a fatal auth error stops later submissions.
///
/// # Test Steps
/// 1. Run chunks one at a time
/// 2. Make every delete submission fail with 401
/// 3. Verify the deleting item failed and the later items were not attempted
#[tokio::test(start_paused = true)]
async fn test_auth_failure_skips_remaining_chunks() {
    let mut config = support::config();
    config.batch.max_parallel = 1;
    let listings = vec![listing("l1", "v1", 110.0), listing("l2", "v2", 120.0)];
    let h = harness_with(listings.clone(), config);
    h.api.fail_kind(OperationKind::Delete, StockxError::Auth("refresh token revoked".into()));
    let index = InventoryIndex::build(listings, FeeSchedule::default());

    let shrink = ItemKey::new("v1", 110.0, "USD");
    let reprice = ItemKey::new("v2", 120.0, "USD");
    let grow = ItemKey::new("v3", 50.0, "USD");
    let changes = ChangeSet::new();
    changes.record_quantity_change(&shrink, 0).unwrap();
    changes.record_price_change(&reprice, 115.0).unwrap();
    changes.record_quantity_change(&grow, 1).unwrap();

    let report = reconciler(&h).flush(&changes, &index).await;

    assert_eq!(report.get(&shrink).unwrap().status, ItemStatus::PartialFailure);
    assert_eq!(report.get(&reprice).unwrap().status, ItemStatus::NotAttempted);
    assert_eq!(report.get(&grow).unwrap().status, ItemStatus::NotAttempted);
    assert_eq!(report.not_attempted().count(), 2);
    assert!(h.api.batches().is_empty());
}

/// A forbidden chunk fails only its own entries.
#[tokio::test(start_paused = true)]
async fn test_forbidden_chunk_does_not_skip_others() {
    let mut config = support::config();
    config.batch.max_parallel = 1;
    let listings = vec![listing("l1", "v1", 110.0), listing("l2", "v2", 120.0)];
    let h = harness_with(listings.clone(), config);
    h.api.fail_kind(OperationKind::Delete, StockxError::from_status(403, "insufficient permissions"));
    let index = InventoryIndex::build(listings, FeeSchedule::default());

    let shrink = ItemKey::new("v1", 110.0, "USD");
    let reprice = ItemKey::new("v2", 120.0, "USD");
    let changes = ChangeSet::new();
    changes.record_quantity_change(&shrink, 0).unwrap();
    changes.record_price_change(&reprice, 115.0).unwrap();

    let report = reconciler(&h).flush(&changes, &index).await;

    assert_eq!(report.get(&shrink).unwrap().status, ItemStatus::PartialFailure);
    assert_eq!(report.get(&reprice).unwrap().status, ItemStatus::Succeeded);
    assert_eq!(report.not_attempted().count(), 0);
    assert_eq!(h.api.batches_of(OperationKind::Update).len(), 1);
    assert_eq!(h.refresher.calls(), 1);
}

/// Creates confirmed only by the operation status still count.
#[tokio::test(start_paused = true)]
async fn test_unechoed_creates_are_counted() {
    let listings = vec![listing("l1", "v1", 110.0)];
    let h = harness(listings.clone());
    h.api.omit_entries();
    let index = InventoryIndex::build(listings, FeeSchedule::default());
    let key = ItemKey::new("v1", 110.0, "USD");
    let changes = ChangeSet::new();
    changes.record_quantity_change(&key, 3).unwrap();

    let report = reconciler(&h).flush(&changes, &index).await;

    assert!(report.is_success());
    assert_eq!(report.created_count(), 2);
    assert!(report.get(&key).unwrap().created.is_empty());
}

/// An operation that never finishes times out and fails its entries.
#[tokio::test(start_paused = true)]
async fn test_poll_timeout() {
    let listings = vec![listing("l1", "v1", 110.0)];
    let h = harness(listings.clone());
    h.api.never_finish();
    let index = InventoryIndex::build(listings, FeeSchedule::default());
    let key = ItemKey::new("v1", 110.0, "USD");

    let changes = ChangeSet::new();
    changes.record_price_change(&key, 101.0).unwrap();

    let started = tokio::time::Instant::now();
    let report = reconciler(&h).flush(&changes, &index).await;

    let result = report.get(&key).unwrap();
    assert_eq!(result.status, ItemStatus::PartialFailure);
    let error = result.error.clone().unwrap().into_stockx_error();
    assert!(matches!(error, StockxError::OperationTimeout { .. }));
    assert!(started.elapsed() >= h.config.batch.poll_timeout());
    // 1 + 2 + 4 + 8 + 16 + 16 + 13 seconds of waiting
    assert_eq!(h.api.calls("get_operation_status"), 7);
    assert_eq!(h.api.batches_of(OperationKind::Update).len(), 1);
}

/// Recorded changes that cancel out send nothing and report success.
#[tokio::test(start_paused = true)]
async fn test_noop_change_sends_nothing() {
    let listings = vec![listing("l1", "v1", 110.0)];
    let h = harness(listings.clone());
    let index = InventoryIndex::build(listings, FeeSchedule::default());
    let key = ItemKey::new("v1", 110.0, "USD");

    let changes = ChangeSet::new();
    changes.record_price_change(&key, 110.0).unwrap();
    changes.record_quantity_change(&key, 1).unwrap();

    let report = reconciler(&h).flush(&changes, &index).await;

    assert!(report.is_success());
    assert_eq!(report.get(&key).unwrap().status, ItemStatus::Succeeded);
    assert!(h.api.batches().is_empty());
}
