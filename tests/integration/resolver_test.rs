use std::sync::Arc;

use backturly::models::common::{Plan, PlanSource, SubscriptionStatus};
use backturly::models::entitlement::{IdentityMode, LinkResult, PurchaserIdentity};
use backturly::provider::fake::FakePurchaseProvider;
use backturly::provider::{ProviderError, PurchaseProvider};
use backturly::services::{
    IdentityLinker, PlanResolver, ResolveContext, SubscriptionSyncService,
};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::support;

fn resolver_with(
    provider: Arc<FakePurchaseProvider>,
    db: Arc<sea_orm::DatabaseConnection>,
) -> PlanResolver {
    let config = support::test_config();
    let sync = Arc::new(SubscriptionSyncService::new(db, &config.provider));
    PlanResolver::new(provider, sync)
}

#[tokio::test]
async fn live_snapshot_overrides_stale_durable_record() {
    let user_id = Uuid::new_v4();

    // Durable store still says free/none...
    let stale = support::subscription_record(user_id, Plan::Free, SubscriptionStatus::None, None);
    let db = support::mock_db_with_record(Some(stale));

    // ...but the provider, linked to this user, reports an active
    // business entitlement.
    let expires = OffsetDateTime::now_utc() + Duration::days(30);
    let provider = Arc::new(FakePurchaseProvider::identified(user_id));
    provider.set_snapshot(support::snapshot_for(
        PurchaserIdentity::identified(user_id),
        vec![support::entitlement("business", Some(expires))],
    ));

    let resolved = resolver_with(provider, db)
        .resolve_plan(ResolveContext::for_user(user_id))
        .await
        .unwrap();

    assert_eq!(resolved.plan, Plan::Business);
    assert_eq!(resolved.status, SubscriptionStatus::Active);
    assert_eq!(resolved.source, PlanSource::Live);
    assert_eq!(resolved.current_period_end, Some(expires));
}

#[tokio::test]
async fn another_users_live_session_never_leaks() {
    let linked_user = Uuid::new_v4();
    let other_user = Uuid::new_v4();

    // The shared client session is linked to someone else, with a live
    // pro entitlement.
    let provider = Arc::new(FakePurchaseProvider::identified(linked_user));
    provider.set_snapshot(support::snapshot_for(
        PurchaserIdentity::identified(linked_user),
        vec![support::entitlement(
            "pro",
            Some(OffsetDateTime::now_utc() + Duration::days(30)),
        )],
    ));

    // A different user with no record of their own resolves free, not
    // the session owner's pro plan.
    let resolved = resolver_with(provider, support::mock_db_with_record(None))
        .resolve_plan(ResolveContext::for_user(other_user))
        .await
        .unwrap();

    assert_eq!(resolved.plan, Plan::Free);
    assert_eq!(resolved.source, PlanSource::Default);
}

#[tokio::test]
async fn anonymous_session_does_not_demote_a_known_subscriber() {
    let user_id = Uuid::new_v4();

    // Startup state: the client session is anonymous and empty, but the
    // durable record knows this user as a paying subscriber.
    let provider = Arc::new(FakePurchaseProvider::anonymous());
    let record = support::subscription_record(
        user_id,
        Plan::Pro,
        SubscriptionStatus::Active,
        Some(OffsetDateTime::now_utc() + Duration::days(14)),
    );
    let db = support::mock_db_with_record(Some(record));

    let resolved = resolver_with(provider, db)
        .resolve_plan(ResolveContext::for_user(user_id))
        .await
        .unwrap();

    assert_eq!(resolved.plan, Plan::Pro);
    assert_eq!(resolved.status, SubscriptionStatus::Active);
    assert_eq!(resolved.source, PlanSource::Durable);
}

#[tokio::test]
async fn durable_record_answers_when_no_live_check_is_possible() {
    let user_id = Uuid::new_v4();
    let period_end = OffsetDateTime::now_utc() + Duration::days(12);
    let record =
        support::subscription_record(user_id, Plan::Pro, SubscriptionStatus::Active, Some(period_end));
    let db = support::mock_db_with_record(Some(record));

    // Unconfigured provider means no live snapshot can be fetched.
    let provider = Arc::new(FakePurchaseProvider::new());

    let resolved = resolver_with(provider, db)
        .resolve_plan(ResolveContext::for_user(user_id))
        .await
        .unwrap();

    assert_eq!(resolved.plan, Plan::Pro);
    assert_eq!(resolved.status, SubscriptionStatus::Active);
    assert_eq!(resolved.source, PlanSource::Durable);
    assert_eq!(resolved.current_period_end, Some(period_end));
}

#[tokio::test]
async fn durable_record_past_period_end_resolves_expired_free() {
    let user_id = Uuid::new_v4();
    let record = support::subscription_record(
        user_id,
        Plan::Pro,
        SubscriptionStatus::Active,
        Some(OffsetDateTime::now_utc() - Duration::days(3)),
    );
    let db = support::mock_db_with_record(Some(record));
    let provider = Arc::new(FakePurchaseProvider::new());

    let resolved = resolver_with(provider, db)
        .resolve_plan(ResolveContext::for_user(user_id))
        .await
        .unwrap();

    assert_eq!(resolved.plan, Plan::Free);
    assert_eq!(resolved.status, SubscriptionStatus::Expired);
    assert_eq!(resolved.source, PlanSource::Durable);
}

#[tokio::test]
async fn nothing_known_resolves_free_default() {
    let db = support::mock_db_with_record(None);
    let provider = Arc::new(FakePurchaseProvider::new());

    let resolved = resolver_with(provider, db)
        .resolve_plan(ResolveContext::for_user(Uuid::new_v4()))
        .await
        .unwrap();

    assert_eq!(resolved.plan, Plan::Free);
    assert_eq!(resolved.status, SubscriptionStatus::None);
    assert_eq!(resolved.source, PlanSource::Default);
}

#[tokio::test]
async fn no_user_id_and_no_live_check_resolves_default() {
    let db = support::mock_db_unreachable();
    let provider = Arc::new(FakePurchaseProvider::new());

    let resolved = resolver_with(provider, db)
        .resolve_plan(ResolveContext::default())
        .await
        .unwrap();

    assert_eq!(resolved.plan, Plan::Free);
    assert_eq!(resolved.source, PlanSource::Default);
}

#[tokio::test]
async fn anonymous_purchase_survives_identity_linking() {
    let user_id = Uuid::new_v4();

    // Anonymous purchaser bought pro before any account existed.
    let provider = Arc::new(FakePurchaseProvider::anonymous());
    let purchaser = provider.current_identity().unwrap();
    assert!(purchaser.is_anonymous());
    provider.set_snapshot(support::snapshot_for(
        purchaser,
        vec![support::entitlement(
            "pro",
            Some(OffsetDateTime::now_utc() + Duration::days(25)),
        )],
    ));

    let config = support::test_config();
    let expected = support::subscription_record(
        user_id,
        Plan::Pro,
        SubscriptionStatus::Active,
        Some(OffsetDateTime::now_utc() + Duration::days(25)),
    );
    let db = support::mock_db_for_reconciles(expected, 1);
    let sync = Arc::new(SubscriptionSyncService::new(db, &config.provider));

    let linker = IdentityLinker::new(provider.clone(), sync.clone());
    let result = linker.link_identity(user_id).await.unwrap();
    let LinkResult::Linked { record } = result else {
        panic!("expected link to succeed");
    };
    assert_eq!(record.unwrap().plan, Plan::Pro);

    // Immediately after linking, resolution sees pro/active.
    let resolver = PlanResolver::new(provider.clone(), sync);
    let resolved = resolver
        .resolve_plan(ResolveContext::for_user(user_id))
        .await
        .unwrap();
    assert_eq!(resolved.plan, Plan::Pro);
    assert_eq!(resolved.status, SubscriptionStatus::Active);
    assert_eq!(resolved.source, PlanSource::Live);

    // The provider now knows the purchaser by the application user id.
    assert_eq!(
        provider.current_identity().unwrap(),
        PurchaserIdentity::from_raw(user_id.to_string())
    );
}

#[tokio::test]
async fn provider_link_failure_is_soft() {
    let user_id = Uuid::new_v4();
    let provider = Arc::new(FakePurchaseProvider::anonymous());
    provider.fail_log_in(ProviderError::Unavailable("connection reset".into()));

    let config = support::test_config();
    let sync = Arc::new(SubscriptionSyncService::new(
        support::mock_db_unreachable(),
        &config.provider,
    ));
    let linker = IdentityLinker::new(provider.clone(), sync);

    let result = linker.link_identity(user_id).await.unwrap();
    assert!(matches!(result, LinkResult::Deferred));
    assert_eq!(provider.log_in_calls(), 1);
}

#[tokio::test]
async fn linking_twice_is_idempotent() {
    let user_id = Uuid::new_v4();
    let provider = Arc::new(FakePurchaseProvider::anonymous());
    let purchaser = provider.current_identity().unwrap();
    provider.set_snapshot(support::snapshot_for(
        purchaser,
        vec![support::entitlement("pro", None)],
    ));

    let config = support::test_config();
    let expected =
        support::subscription_record(user_id, Plan::Pro, SubscriptionStatus::Active, None);
    let db = support::mock_db_for_reconciles(expected, 2);
    let sync = Arc::new(SubscriptionSyncService::new(db, &config.provider));
    let linker = IdentityLinker::new(provider.clone(), sync);

    let first = linker.link_identity(user_id).await.unwrap();
    let second = linker.link_identity(user_id).await.unwrap();

    for result in [first, second] {
        let LinkResult::Linked { record } = result else {
            panic!("expected link to succeed");
        };
        assert_eq!(record.unwrap().plan, Plan::Pro);
    }
}

#[tokio::test]
async fn configure_then_purchase_roundtrip() {
    let provider = FakePurchaseProvider::new();
    let identity = provider.configure(IdentityMode::Anonymous).await.unwrap();
    assert!(identity.is_anonymous());

    provider.set_purchase_outcome(Ok(
        backturly::models::entitlement::PurchaseOutcome::Completed {
            snapshot: support::snapshot_for(
                identity,
                vec![support::entitlement("business", None)],
            ),
        },
    ));

    let outcome = provider.purchase("business.monthly").await.unwrap();
    match outcome {
        backturly::models::entitlement::PurchaseOutcome::Completed { snapshot } => {
            assert_eq!(snapshot.entitlements.len(), 1);
        }
        _ => panic!("expected completed purchase"),
    }
}
