//! Integration tests for inventory sessions

mod support;

use std::time::Duration;

use anyhow::Context;

use stockx_core::inventory::{Adjustment, FilterCriteria};
use stockx_core::{InventorySession, ItemStatus, SyncRule};
use stockx_domain::{ItemKey, MarketData, OperationKind, StockxError};
use support::{harness, listing};

fn panda_listings() -> Vec<stockx_domain::RemoteListing> {
    vec![
        listing("l1", "v1", 110.0),
        listing("l2", "v1", 110.0),
        listing("l3", "v2", 150.0),
    ]
}

#[tokio::test(start_paused = true)]
async fn test_open_groups_listings() -> anyhow::Result<()> {
    let mut config = support::config();
    config.inventory.page_size = 2;
    let h = support::harness_with(panda_listings(), config.clone());

    let session = InventorySession::open(h.client.clone(), &config).await?;

    assert_eq!(h.api.calls("get_listings"), 2);
    let items = session.items();
    assert_eq!(items.len(), 2);
    let v1 = session.item(&ItemKey::new("v1", 110.0, "USD")).context("v1 item missing")?;
    assert_eq!(v1.quantity, 2);
    assert_eq!(v1.listing_ids, vec!["l1".to_string(), "l2".to_string()]);
    assert_eq!(v1.name.as_deref(), Some("Dunk Low Panda"));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_items_reflect_pending_changes() {
    let h = harness(panda_listings());
    let session = InventorySession::from_listings(h.client.clone(), panda_listings(), &h.config);
    let key = ItemKey::new("v1", 110.0, "USD");

    session.set_price(&key, 100.0).unwrap();
    session.set_quantity(&key, 5).unwrap();

    let item = session.item(&key).unwrap();
    assert_eq!(item.price, 100.0);
    assert_eq!(item.quantity, 5);
    assert!((item.payout - h.config.fees.payout(100.0)).abs() < f64::EPSILON);
    assert_eq!(item.key, key);
    assert!(session.has_pending_changes());

    // Nothing was sent yet.
    assert!(h.api.batches().is_empty());
    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_invalid_edits_are_rejected() {
    let h = harness(panda_listings());
    let session = InventorySession::from_listings(h.client.clone(), panda_listings(), &h.config);
    let key = ItemKey::new("v1", 110.0, "USD");

    assert!(matches!(session.set_price(&key, -1.0), Err(StockxError::InvalidInput(_))));
    assert!(matches!(session.set_price(&key, f64::NAN), Err(StockxError::InvalidInput(_))));
    assert!(matches!(session.set_quantity(&key, -2), Err(StockxError::InvalidInput(_))));
    assert!(matches!(session.set_quantity(&key, i64::from(u32::MAX)), Err(StockxError::InvalidInput(_))));
    assert!(matches!(session.sell("v1", 110.0, u32::MAX), Err(StockxError::InvalidInput(_))));
    let unknown = ItemKey::new("v9", 1.0, "USD");
    assert!(matches!(session.set_price(&unknown, 10.0), Err(StockxError::InvalidInput(_))));
    assert!(!session.has_pending_changes());
}

/// Validates that a scope flushes even when its closure fails.
///
/// # Test Steps
/// 1. Stage a price change inside a scope
/// 2. Return an error from the closure
/// 3. Verify the error is reported alongside a flush that applied the change
#[tokio::test(start_paused = true)]
async fn test_scope_flushes_on_error() {
    let h = harness(panda_listings());
    let session = InventorySession::from_listings(h.client.clone(), panda_listings(), &h.config);
    let key = ItemKey::new("v2", 150.0, "USD");

    let outcome = session
        .scope(|session| {
            let key = key.clone();
            Box::pin(async move {
                session.set_price(&key, 140.0)?;
                Err::<(), _>(StockxError::InvalidInput("caller gave up".into()))
            })
        })
        .await;

    assert!(matches!(outcome.value, Err(StockxError::InvalidInput(_))));
    assert!(outcome.report.is_success());
    assert_eq!(outcome.report.get(&key).unwrap().updated, vec!["l3".to_string()]);
    assert_eq!(h.api.batches_of(OperationKind::Update).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_scope_returns_value_and_report() {
    let h = harness(panda_listings());
    let session = InventorySession::from_listings(h.client.clone(), panda_listings(), &h.config);

    let outcome = session
        .scope(|session| {
            Box::pin(async move {
                let expensive = session.query().filter_fn(|item| item.price > 120.0).all().await?;
                for item in &expensive {
                    session.set_quantity(&item.key, 0)?;
                }
                Ok(expensive.len())
            })
        })
        .await;

    assert_eq!(outcome.report.deleted_count(), 1);
    assert_eq!(outcome.into_result().unwrap(), 1);
    assert_eq!(h.api.listings().len(), 2);
}

/// A failed flush turns a successful closure into an error.
#[tokio::test(start_paused = true)]
async fn test_scope_result_surfaces_flush_failure() {
    let h = harness(panda_listings());
    h.api.fail_listing("l3", "listing locked");
    let session = InventorySession::from_listings(h.client.clone(), panda_listings(), &h.config);

    let outcome = session
        .scope(|session| {
            Box::pin(async move { session.set_price(&ItemKey::new("v2", 150.0, "USD"), 149.0) })
        })
        .await;

    assert!(outcome.value.is_ok());
    assert_eq!(outcome.report.failed().count(), 1);
    let err = outcome.into_result().unwrap_err();
    assert!(err.to_string().contains("listing locked"));
}

/// Dropping a session with pending edits flushes them in the background.
#[tokio::test(start_paused = true)]
async fn test_drop_flushes_in_background() {
    let h = harness(panda_listings());
    {
        let session =
            InventorySession::from_listings(h.client.clone(), panda_listings(), &h.config);
        session.set_price(&ItemKey::new("v2", 150.0, "USD"), 145.0).unwrap();
    }

    for _ in 0..50 {
        if !h.api.batches().is_empty() && h.api.calls("get_operation_status") > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    assert_eq!(h.api.batches_of(OperationKind::Update).len(), 1);
    let repriced = h.api.listings().into_iter().find(|l| l.listing_id == "l3").unwrap();
    assert_eq!(repriced.amount, 145.0);
}

#[tokio::test(start_paused = true)]
async fn test_sell_creates_new_item() {
    let h = harness(panda_listings());
    let session = InventorySession::from_listings(h.client.clone(), panda_listings(), &h.config);

    let key = session.sell("v7", 88.0, 2).unwrap();
    let again = session.sell("v1", 110.0, 1).unwrap();

    let report = session.close().await;
    assert_eq!(report.get(&key).unwrap().created.len(), 2);
    assert_eq!(report.get(&again).unwrap().created.len(), 1);
    assert_eq!(report.created_count(), 3);
    assert_eq!(h.api.listings().len(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_commit_rebuilds_index() {
    let h = harness(panda_listings());
    let mut session = InventorySession::open(h.client.clone(), &h.config).await.unwrap();
    let key = ItemKey::new("v1", 110.0, "USD");

    session.set_price(&key, 95.0).unwrap();
    let report = session.commit().await.unwrap();

    assert!(report.is_success());
    assert!(session.item(&key).is_none());
    let repriced = session.item(&ItemKey::new("v1", 95.0, "USD")).unwrap();
    assert_eq!(repriced.quantity, 2);
    assert!(!session.has_pending_changes());
    session.close().await;
}

/// Validates market-relative repricing.
///
/// # Test Steps
/// 1. Publish market data with a lowest ask for v1 only
/// 2. Beat the lowest ask by 1 for every item
/// 3. Verify only v1 is repriced and the change is applied on close
#[tokio::test(start_paused = true)]
async fn test_beat_lowest_ask() {
    let mut config = support::config();
    config.batch.max_parallel = 1;
    let h = support::harness_with(panda_listings(), config);
    h.api.set_market_data(
        "prod-1",
        vec![
            MarketData {
                product_id: "prod-1".into(),
                variant_id: "v1".into(),
                currency: "USD".into(),
                lowest_ask: Some(105.0),
                highest_bid: Some(90.0),
                sell_faster: None,
                earn_more: None,
                flex_lowest_ask: None,
            },
            MarketData {
                product_id: "prod-1".into(),
                variant_id: "v2".into(),
                currency: "USD".into(),
                lowest_ask: None,
                highest_bid: None,
                sell_faster: None,
                earn_more: None,
                flex_lowest_ask: None,
            },
        ],
    );
    let session = InventorySession::from_listings(h.client.clone(), panda_listings(), &h.config);

    let items = session.items();
    let changes = session
        .beat_lowest_ask(&items, Adjustment::Absolute(1.0), &FilterCriteria::new())
        .await
        .unwrap();

    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].key, ItemKey::new("v1", 110.0, "USD"));
    assert_eq!(changes[0].price, 104.0);
    // Both items share one product: market data is fetched once.
    assert_eq!(h.api.calls("get_market_data"), 1);

    let report = session.close().await;
    assert_eq!(report.updated_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_change_price_with_condition() {
    let h = harness(panda_listings());
    let session = InventorySession::from_listings(h.client.clone(), panda_listings(), &h.config);

    let only_v2 = SyncRule::new(|item: &stockx_domain::Item| item.variant_id() == "v2");
    let changes = session.change_price(&session.items(), 175.0, &only_v2).await.unwrap();

    assert_eq!(changes.len(), 1);
    let report = session.close().await;
    let result = report.get(&ItemKey::new("v2", 150.0, "USD")).unwrap();
    assert_eq!(result.status, ItemStatus::Succeeded);
    assert_eq!(result.updated, vec!["l3".to_string()]);
}
