use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use backturly::middleware::UserIdentity;
use backturly::models::common::{Plan, PlanSource, SubscriptionStatus};
use backturly::models::entitlement::{EntitlementSnapshot, PurchaseOutcome, PurchaserIdentity};
use backturly::models::subscription::PurchaseRequest;
use backturly::provider::fake::FakePurchaseProvider;
use backturly::provider::PurchaseProvider;
use backturly::routes::entitlements;
use backturly::services::SubscriptionSyncService;
use backturly::AppState;
use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::support;

#[tokio::test]
async fn reconcile_upserts_full_record() {
    let user_id = Uuid::new_v4();
    let config = support::test_config();

    let expires = OffsetDateTime::now_utc() + Duration::days(30);
    let expected = support::subscription_record(
        user_id,
        Plan::Business,
        SubscriptionStatus::Active,
        Some(expires),
    );
    let db = support::mock_db_for_reconciles(expected.clone(), 1);
    let sync = SubscriptionSyncService::new(db, &config.provider);

    let snapshot = support::snapshot_for(
        PurchaserIdentity::from_raw("purchaser-9"),
        vec![support::entitlement("business", Some(expires))],
    );

    let record = sync.reconcile(user_id, &snapshot).await.unwrap();
    assert_eq!(record.user_id, user_id);
    assert_eq!(record.plan, Plan::Business);
    assert_eq!(record.status, SubscriptionStatus::Active);
}

#[tokio::test]
async fn reconcile_is_idempotent_under_repeated_snapshots() {
    let user_id = Uuid::new_v4();
    let config = support::test_config();

    let expected =
        support::subscription_record(user_id, Plan::Pro, SubscriptionStatus::Active, None);
    let db = support::mock_db_for_reconciles(expected, 3);
    let sync = SubscriptionSyncService::new(db, &config.provider);

    let snapshot = support::snapshot_for(
        PurchaserIdentity::from_raw("purchaser-1"),
        vec![support::entitlement("pro", None)],
    );

    let first = sync.reconcile(user_id, &snapshot).await.unwrap();
    for _ in 0..2 {
        let again = sync.reconcile(user_id, &snapshot).await.unwrap();
        assert_eq!(again.plan, first.plan);
        assert_eq!(again.status, first.status);
        assert_eq!(again.current_period_end, first.current_period_end);
    }
}

#[tokio::test]
async fn empty_restore_reconciles_to_free_none() {
    let user_id = Uuid::new_v4();
    let config = support::test_config();

    let expected = support::subscription_record(user_id, Plan::Free, SubscriptionStatus::None, None);
    let db = support::mock_db_for_reconciles(expected, 1);
    let sync = SubscriptionSyncService::new(db, &config.provider);

    let snapshot = EntitlementSnapshot::empty(PurchaserIdentity::anonymous());
    let record = sync.reconcile(user_id, &snapshot).await.unwrap();

    assert_eq!(record.plan, Plan::Free);
    assert_eq!(record.status, SubscriptionStatus::None);
}

#[tokio::test]
async fn remove_record_deletes_row_and_resets_cache() {
    let user_id = Uuid::new_v4();
    let config = support::test_config();

    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_exec_results([
            MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            },
            MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            },
        ])
        .into_connection();
    let sync = SubscriptionSyncService::new(Arc::new(db), &config.provider);

    sync.remove_record(user_id).await.unwrap();
}

#[tokio::test]
async fn store_outage_never_denies_a_fresh_purchase() {
    let user_id = Uuid::new_v4();

    // Session already linked to this user, so the purchase would normally
    // reconcile into the durable record.
    let provider = Arc::new(FakePurchaseProvider::identified(user_id));
    let expires = OffsetDateTime::now_utc() + Duration::days(30);
    provider.set_purchase_outcome(Ok(PurchaseOutcome::Completed {
        snapshot: support::snapshot_for(
            PurchaserIdentity::identified(user_id),
            vec![support::entitlement("pro", Some(expires))],
        ),
    }));

    // The durable store rejects every statement.
    let state = AppState::with_provider(
        support::mock_db_unreachable(),
        provider,
        support::test_config(),
    );

    let response = entitlements::purchase(
        State(state),
        UserIdentity { user_id },
        Json(PurchaseRequest {
            product_id: "pro.monthly".to_string(),
        }),
    )
    .await
    .unwrap();

    // The live snapshot stands for this session; persistence catches up
    // on the next trigger.
    assert!(!response.0.cancelled);
    let plan = response.0.plan.expect("plan served despite store outage");
    assert_eq!(plan.plan, Plan::Pro);
    assert_eq!(plan.status, SubscriptionStatus::Active);
    assert_eq!(plan.source, PlanSource::Live);
}

#[tokio::test]
async fn unlinked_purchase_is_served_without_touching_the_store() {
    let user_id = Uuid::new_v4();

    // Purchase completed under an anonymous purchaser: nothing ties it to
    // this account yet, so it is served for the session but not persisted.
    // The unreachable store fails any statement, proving nothing is written.
    let provider = Arc::new(FakePurchaseProvider::anonymous());
    let purchaser = provider.current_identity().unwrap();
    provider.set_purchase_outcome(Ok(PurchaseOutcome::Completed {
        snapshot: support::snapshot_for(purchaser, vec![support::entitlement("pro", None)]),
    }));

    let state = AppState::with_provider(
        support::mock_db_unreachable(),
        provider,
        support::test_config(),
    );

    let response = entitlements::purchase(
        State(state),
        UserIdentity { user_id },
        Json(PurchaseRequest {
            product_id: "pro.monthly".to_string(),
        }),
    )
    .await
    .unwrap();

    let plan = response.0.plan.expect("plan served for the session");
    assert_eq!(plan.plan, Plan::Pro);
    assert_eq!(plan.source, PlanSource::Live);
}

#[tokio::test]
async fn sync_trigger_ignores_a_session_bound_to_someone_else() {
    let session_owner = Uuid::new_v4();
    let user_id = Uuid::new_v4();

    // The shared client session carries another user's business
    // entitlement.
    let provider = Arc::new(FakePurchaseProvider::identified(session_owner));
    provider.set_snapshot(support::snapshot_for(
        PurchaserIdentity::identified(session_owner),
        vec![support::entitlement("business", None)],
    ));

    // This user's own durable record says pro; the sync trigger must
    // answer from it, not reconcile the foreign snapshot over it. The
    // mock only scripts the point read, so any write would fail the test.
    let period_end = OffsetDateTime::now_utc() + Duration::days(9);
    let record = support::subscription_record(
        user_id,
        Plan::Pro,
        SubscriptionStatus::Active,
        Some(period_end),
    );
    let state = AppState::with_provider(
        support::mock_db_with_record(Some(record)),
        provider,
        support::test_config(),
    );

    let response = entitlements::sync_subscription(State(state), UserIdentity { user_id })
        .await
        .unwrap();

    assert_eq!(response.0.data.plan, Plan::Pro);
    assert_eq!(response.0.data.source, PlanSource::Durable);
    assert_eq!(response.0.data.current_period_end, Some(period_end));
}

#[tokio::test]
async fn cancelled_purchase_triggers_no_reconciliation() {
    let user_id = Uuid::new_v4();

    let provider = Arc::new(FakePurchaseProvider::anonymous());
    provider.set_purchase_outcome(Ok(PurchaseOutcome::Cancelled));

    // Any store access would fail loudly; a cancelled purchase must not
    // reach the store at all.
    let state = AppState::with_provider(
        support::mock_db_unreachable(),
        provider,
        support::test_config(),
    );

    let response = entitlements::purchase(
        State(state),
        UserIdentity { user_id },
        Json(PurchaseRequest {
            product_id: "pro.monthly".to_string(),
        }),
    )
    .await
    .unwrap();

    assert!(response.0.cancelled);
    assert!(response.0.plan.is_none());
}
