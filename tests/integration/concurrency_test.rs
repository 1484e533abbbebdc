use std::sync::Arc;

use backturly::models::common::{Plan, PlanSource, SubscriptionStatus};
use backturly::provider::fake::FakePurchaseProvider;
use backturly::services::{PlanResolver, ResolveContext, SubscriptionSyncService};
use time::{Duration, OffsetDateTime};
use tokio::sync::Barrier;
use uuid::Uuid;

use crate::support;

#[tokio::test]
async fn concurrent_resolution_triggers_are_safe_to_interleave() {
    let user_id = Uuid::new_v4();

    let provider = Arc::new(FakePurchaseProvider::identified(user_id));
    provider.set_snapshot(support::snapshot_for(
        backturly::models::entitlement::PurchaserIdentity::identified(user_id),
        vec![support::entitlement(
            "business",
            Some(OffsetDateTime::now_utc() + Duration::days(30)),
        )],
    ));

    let config = support::test_config();
    let sync = Arc::new(SubscriptionSyncService::new(
        support::mock_db_unreachable(),
        &config.provider,
    ));
    let resolver = Arc::new(PlanResolver::new(provider.clone(), sync));

    // Fire 10 resolution triggers at once, the way purchase, restore and
    // app-start triggers can overlap for one user.
    let barrier = Arc::new(Barrier::new(10));
    let mut handles = vec![];

    for _ in 0..10 {
        let resolver = Arc::clone(&resolver);
        let barrier = Arc::clone(&barrier);

        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            resolver.resolve_plan(ResolveContext::for_user(user_id)).await
        }));
    }

    let results: Vec<_> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    for result in results {
        let resolved = result.unwrap();
        assert_eq!(resolved.plan, Plan::Business);
        assert_eq!(resolved.status, SubscriptionStatus::Active);
        assert_eq!(resolved.source, PlanSource::Live);
    }

    // Each trigger fetched its own fresh snapshot; nothing was cached
    // across calls.
    assert_eq!(provider.customer_info_calls(), 10);
}

#[tokio::test]
async fn concurrent_reconciles_for_one_user_all_converge() {
    let user_id = Uuid::new_v4();
    let config = support::test_config();

    let expected =
        support::subscription_record(user_id, Plan::Pro, SubscriptionStatus::Active, None);
    let db = support::mock_db_for_reconciles(expected, 8);
    let sync = Arc::new(SubscriptionSyncService::new(db, &config.provider));

    let snapshot = Arc::new(support::snapshot_for(
        backturly::models::entitlement::PurchaserIdentity::from_raw("purchaser-7"),
        vec![support::entitlement("pro", None)],
    ));

    let barrier = Arc::new(Barrier::new(8));
    let mut handles = vec![];

    for _ in 0..8 {
        let sync = Arc::clone(&sync);
        let snapshot = Arc::clone(&snapshot);
        let barrier = Arc::clone(&barrier);

        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            sync.reconcile(user_id, &snapshot).await
        }));
    }

    let results: Vec<_> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    // Full-replace upserts keyed on user_id: every interleaving lands on
    // the same record.
    for result in results {
        let record = result.unwrap();
        assert_eq!(record.user_id, user_id);
        assert_eq!(record.plan, Plan::Pro);
        assert_eq!(record.status, SubscriptionStatus::Active);
    }
}
