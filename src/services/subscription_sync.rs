use sea_orm::{entity::*, query::*, sea_query::OnConflict, DatabaseConnection};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    config::ProviderConfig,
    error::{ApiError, Result},
    models::{
        common::{Plan, SubscriptionStatus},
        entitlement::{Entitlement, EntitlementSnapshot},
    },
};

/// Turns provider entitlement snapshots into the durable per-user
/// subscription record.
pub struct SubscriptionSyncService {
    db: Arc<DatabaseConnection>,
    provider_name: String,
}

/// Plan/status/period derived from one snapshot. Pure data; the durable
/// write happens in [`SubscriptionSyncService::reconcile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedSubscription {
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub period_start: Option<OffsetDateTime>,
    pub period_end: Option<OffsetDateTime>,
}

impl DerivedSubscription {
    fn none() -> Self {
        Self {
            plan: Plan::Free,
            status: SubscriptionStatus::None,
            period_start: None,
            period_end: None,
        }
    }
}

/// Derive the canonical plan and status from a snapshot.
///
/// Selection: the highest-capability entitlement wins, with live
/// (active or in-grace) entitlements ranked above dead ones so a stale
/// expired grant never shadows a current one. Status follows the
/// entitlement's trial flag, then its expiry, then the grace window; an
/// expired entitlement grants nothing, so the plan is forced back to free.
pub fn derive_plan_status(snapshot: &EntitlementSnapshot, now: OffsetDateTime) -> DerivedSubscription {
    let mut selected: Option<(&Entitlement, Plan)> = None;

    for entitlement in &snapshot.entitlements {
        let Some(plan) = entitlement.plan() else {
            warn!(
                "Unknown entitlement '{}' (product '{}') for purchaser {}; check storefront configuration",
                entitlement.name, entitlement.product_id, snapshot.purchaser_id
            );
            continue;
        };

        match selected {
            None => selected = Some((entitlement, plan)),
            Some((current, current_plan)) => {
                let candidate_rank = (is_live(entitlement, now), plan);
                let current_rank = (is_live(current, now), current_plan);
                if candidate_rank > current_rank {
                    selected = Some((entitlement, plan));
                } else if candidate_rank == current_rank && entitlement.name != current.name {
                    // Two differently-named entitlements at the same
                    // capability; no product-defined tie-break exists, so
                    // the first one seen stays and the ambiguity is logged.
                    warn!(
                        "Purchaser {} holds equally-capable entitlements '{}' and '{}'",
                        snapshot.purchaser_id, current.name, entitlement.name
                    );
                }
            }
        }
    }

    let Some((entitlement, plan)) = selected else {
        return DerivedSubscription::none();
    };

    let status = if entitlement.is_trial {
        SubscriptionStatus::Trialing
    } else {
        match entitlement.expires_at {
            None => SubscriptionStatus::Active,
            Some(expires_at) if expires_at > now => SubscriptionStatus::Active,
            Some(_) if entitlement.in_grace_period => SubscriptionStatus::CancelPending,
            Some(_) => SubscriptionStatus::Expired,
        }
    };

    // An expired entitlement grants nothing, whatever its nominal tier.
    let plan = if status == SubscriptionStatus::Expired {
        Plan::Free
    } else {
        plan
    };

    DerivedSubscription {
        plan,
        status,
        period_start: entitlement.period_started_at,
        period_end: entitlement.expires_at,
    }
}

fn is_live(entitlement: &Entitlement, now: OffsetDateTime) -> bool {
    entitlement.is_active
        || entitlement.in_grace_period
        || entitlement.expires_at.map(|e| e > now).unwrap_or(false)
}

impl SubscriptionSyncService {
    pub fn new(db: Arc<DatabaseConnection>, config: &ProviderConfig) -> Self {
        Self {
            db,
            provider_name: config.name.clone(),
        }
    }

    /// Reconcile one user's durable record from a live snapshot.
    ///
    /// The write is a full replace of plan/status/period keyed on user_id,
    /// so retries and concurrent triggers (purchase, restore, link, app
    /// start) are safe to interleave; a stale write is corrected by the
    /// next trigger.
    #[instrument(skip(self, snapshot))]
    pub async fn reconcile(
        &self,
        user_id: Uuid,
        snapshot: &EntitlementSnapshot,
    ) -> Result<entity::subscription_records::Model> {
        let now = OffsetDateTime::now_utc();
        let derived = derive_plan_status(snapshot, now);

        let record = entity::subscription_records::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            provider: Set(self.provider_name.clone()),
            provider_customer_id: Set(snapshot.purchaser_id.as_str().to_string()),
            plan: Set(derived.plan),
            status: Set(derived.status),
            current_period_start: Set(derived.period_start),
            current_period_end: Set(derived.period_end),
            synced_at: Set(now),
            created_at: Set(now),
            updated_at: Set(now),
        };

        entity::subscription_records::Entity::insert(record)
            .on_conflict(
                OnConflict::column(entity::subscription_records::Column::UserId)
                    .update_columns([
                        entity::subscription_records::Column::Provider,
                        entity::subscription_records::Column::ProviderCustomerId,
                        entity::subscription_records::Column::Plan,
                        entity::subscription_records::Column::Status,
                        entity::subscription_records::Column::CurrentPeriodStart,
                        entity::subscription_records::Column::CurrentPeriodEnd,
                        entity::subscription_records::Column::SyncedAt,
                        entity::subscription_records::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await?;

        let model = entity::subscription_records::Entity::find()
            .filter(entity::subscription_records::Column::UserId.eq(user_id))
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| {
                ApiError::Internal(anyhow::anyhow!(
                    "Failed to find subscription record after upsert"
                ))
            })?;

        info!(
            "Reconciled subscription for user {}: plan={}, status={}",
            user_id,
            derived.plan.as_str(),
            derived.status.as_str()
        );

        // Denormalized plan cache; best-effort follow-up write. The cache
        // is derivable from the record, so a failure here is an
        // observability concern, never a reconciliation failure.
        if let Err(e) = self.update_plan_cache(user_id, derived.plan).await {
            warn!("Failed to update plan cache for user {}: {}", user_id, e);
        }

        Ok(model)
    }

    /// Point-read of the durable record.
    pub async fn find_record(
        &self,
        user_id: Uuid,
    ) -> Result<Option<entity::subscription_records::Model>> {
        Ok(entity::subscription_records::Entity::find()
            .filter(entity::subscription_records::Column::UserId.eq(user_id))
            .one(self.db.as_ref())
            .await?)
    }

    /// Delete a user's subscription record and reset the cached plan.
    /// Called by the account-deletion collaborator; this service never
    /// decides when deletion happens.
    #[instrument(skip(self))]
    pub async fn remove_record(&self, user_id: Uuid) -> Result<()> {
        entity::subscription_records::Entity::delete_many()
            .filter(entity::subscription_records::Column::UserId.eq(user_id))
            .exec(self.db.as_ref())
            .await?;

        if let Err(e) = self.update_plan_cache(user_id, Plan::Free).await {
            warn!(
                "Failed to reset plan cache for deleted user {}: {}",
                user_id, e
            );
        }

        info!("Removed subscription record for user {}", user_id);
        Ok(())
    }

    async fn update_plan_cache(&self, user_id: Uuid, plan: Plan) -> Result<()> {
        let now = OffsetDateTime::now_utc();

        let preference = entity::user_preferences::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            current_plan: Set(plan),
            created_at: Set(now),
            updated_at: Set(now),
        };

        entity::user_preferences::Entity::insert(preference)
            .on_conflict(
                OnConflict::column(entity::user_preferences::Column::UserId)
                    .update_columns([
                        entity::user_preferences::Column::CurrentPlan,
                        entity::user_preferences::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await?;

        Ok(())
    }
}
