use axum::{extract::State, Json};
use time::OffsetDateTime;
use tracing::{instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    app_state::AppState,
    error::{ApiError, Result},
    middleware::UserIdentity,
    models::{
        common::{MessageResponse, PlanSource},
        entitlement::{EntitlementSnapshot, LinkResult, PurchaseOutcome},
        subscription::{
            LinkResponse, OfferingsResponse, PlanData, PlanResponse, PurchaseRequest,
            PurchaseResponse,
        },
    },
    services::{subscription_sync::derive_plan_status, ResolveContext},
};

/// GET /api/v1/offerings
#[instrument(skip(state))]
pub async fn get_offerings(State(state): State<AppState>) -> Result<Json<OfferingsResponse>> {
    // An empty list means "retry later" to the client, not "no products".
    let offerings = state.provider.list_offerings().await?;

    Ok(Json(OfferingsResponse {
        success: true,
        data: offerings,
    }))
}

/// POST /api/v1/purchases
#[instrument(skip(state, request))]
pub async fn purchase(
    State(state): State<AppState>,
    identity: UserIdentity,
    Json(request): Json<PurchaseRequest>,
) -> Result<Json<PurchaseResponse>> {
    request
        .validate()
        .map_err(|e| ApiError::BadRequest(format!("Validation error: {}", e)))?;

    match state.provider.purchase(&request.product_id).await? {
        // User dismissed the payment sheet: nothing bought, nothing to
        // reconcile, and nothing to log as a failure.
        PurchaseOutcome::Cancelled => Ok(Json(PurchaseResponse {
            success: true,
            cancelled: true,
            plan: None,
        })),
        PurchaseOutcome::Completed { snapshot } => {
            let plan = attribute_and_reconcile(&state, identity.user_id, &snapshot).await?;
            Ok(Json(PurchaseResponse {
                success: true,
                cancelled: false,
                plan: Some(plan),
            }))
        }
    }
}

/// POST /api/v1/purchases/restore
#[instrument(skip(state))]
pub async fn restore_purchases(
    State(state): State<AppState>,
    identity: UserIdentity,
) -> Result<Json<PlanResponse>> {
    // A purchaser without purchase history restores to an empty snapshot,
    // which reconciles to (free, none).
    let snapshot = state.provider.restore_purchases().await?;
    let plan = attribute_and_reconcile(&state, identity.user_id, &snapshot).await?;

    Ok(Json(PlanResponse {
        success: true,
        data: plan,
    }))
}

/// POST /api/v1/identity/link
#[instrument(skip(state))]
pub async fn link_identity(
    State(state): State<AppState>,
    identity: UserIdentity,
) -> Result<Json<LinkResponse>> {
    // Soft failures still answer 200; linking never blocks login.
    match state.identity_linker.link_identity(identity.user_id).await? {
        LinkResult::Linked { record } => Ok(Json(LinkResponse {
            success: true,
            linked: true,
            plan: record.map(|r| PlanData {
                plan: r.plan,
                status: r.status,
                source: PlanSource::Live,
                current_period_end: r.current_period_end,
            }),
        })),
        LinkResult::Deferred => Ok(Json(LinkResponse {
            success: true,
            linked: false,
            plan: None,
        })),
    }
}

/// POST /api/v1/subscription/sync
///
/// The app-start reconciliation trigger.
#[instrument(skip(state))]
pub async fn sync_subscription(
    State(state): State<AppState>,
    identity: UserIdentity,
) -> Result<Json<PlanResponse>> {
    // The client session is process-wide state; its snapshot only feeds
    // this user's record when the provider actually knows it as this user
    // (post-link). Anything else answers from the resolver instead of
    // overwriting the durable record with someone else's entitlements.
    let snapshot = state.provider.get_customer_info().await?;
    let plan = if snapshot.purchaser_id.matches_user(identity.user_id) {
        reconcile_live_snapshot(&state, identity.user_id, &snapshot).await
    } else {
        resolve_durable_plan(&state, identity.user_id).await?
    };

    Ok(Json(PlanResponse {
        success: true,
        data: plan,
    }))
}

/// GET /api/v1/plan
#[instrument(skip(state))]
pub async fn get_plan(
    State(state): State<AppState>,
    identity: UserIdentity,
) -> Result<Json<PlanResponse>> {
    let resolved = state
        .plan_resolver
        .resolve_plan(ResolveContext::for_user(identity.user_id))
        .await?;

    Ok(Json(PlanResponse {
        success: true,
        data: PlanData::from_resolved(resolved),
    }))
}

/// DELETE /api/v1/subscription
///
/// Called by the account-deletion flow; removes the durable record and
/// resets the cached plan.
#[instrument(skip(state))]
pub async fn delete_subscription(
    State(state): State<AppState>,
    identity: UserIdentity,
) -> Result<Json<MessageResponse>> {
    state
        .subscription_sync
        .remove_record(identity.user_id)
        .await?;

    Ok(Json(MessageResponse::new("Subscription record removed")))
}

/// Decide what a purchase/restore snapshot means for the requesting user
/// before touching the durable record.
///
/// Snapshots bound to the user reconcile as usual. Anonymous snapshots are
/// served for this session but not persisted; attribution happens through
/// identity linking, not here. A snapshot bound to a *different* user is a
/// session mix-up and never reaches this user's record or response.
async fn attribute_and_reconcile(
    state: &AppState,
    user_id: Uuid,
    snapshot: &EntitlementSnapshot,
) -> Result<PlanData> {
    if snapshot.purchaser_id.matches_user(user_id) {
        return Ok(reconcile_live_snapshot(state, user_id, snapshot).await);
    }

    if snapshot.purchaser_id.is_anonymous() {
        let derived = derive_plan_status(snapshot, OffsetDateTime::now_utc());
        return Ok(PlanData {
            plan: derived.plan,
            status: derived.status,
            source: PlanSource::Live,
            current_period_end: derived.period_end,
        });
    }

    warn!(
        "Snapshot for purchaser {} received while serving user {}; ignoring it",
        snapshot.purchaser_id, user_id
    );
    resolve_durable_plan(state, user_id).await
}

/// Answer from the resolver without consuming the snapshot at hand. The
/// resolver applies its own attribution check, so this lands on the durable
/// record or the free default.
async fn resolve_durable_plan(state: &AppState, user_id: Uuid) -> Result<PlanData> {
    let resolved = state
        .plan_resolver
        .resolve_plan(ResolveContext::for_user(user_id))
        .await?;
    Ok(PlanData::from_resolved(resolved))
}

/// Reconcile a live snapshot, answering from the snapshot itself when the
/// durable write fails. A store outage is an operational concern and must
/// never deny a paying user access the provider just confirmed.
async fn reconcile_live_snapshot(
    state: &AppState,
    user_id: Uuid,
    snapshot: &EntitlementSnapshot,
) -> PlanData {
    match state.subscription_sync.reconcile(user_id, snapshot).await {
        Ok(record) => PlanData {
            plan: record.plan,
            status: record.status,
            source: PlanSource::Live,
            current_period_end: record.current_period_end,
        },
        Err(e) => {
            warn!(
                "Reconciliation failed for user {}, serving live-derived plan: {}",
                user_id, e
            );
            let derived = derive_plan_status(snapshot, OffsetDateTime::now_utc());
            PlanData {
                plan: derived.plan,
                status: derived.status,
                source: PlanSource::Live,
                current_period_end: derived.period_end,
            }
        }
    }
}
