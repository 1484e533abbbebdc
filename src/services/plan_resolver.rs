use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::{
    error::Result,
    models::common::{Plan, PlanSource, ResolvedPlan, SubscriptionStatus},
    provider::PurchaseProvider,
    services::subscription_sync::{derive_plan_status, SubscriptionSyncService},
};

/// Caller-supplied resolution context; some call sites have an
/// authenticated user, some only a device-side purchaser.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveContext {
    pub user_id: Option<Uuid>,
}

impl ResolveContext {
    pub fn for_user(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }
}

/// Answers "what plan/status does this user have right now".
///
/// Precedence is live-first: a fresh provider snapshot cannot lag, while
/// the durable record can (missed triggers, failed writes), so the record
/// is only consulted when no live check is possible. A purchaser who just
/// bought something is therefore never under-granted, even before any
/// durable row exists.
pub struct PlanResolver {
    provider: Arc<dyn PurchaseProvider>,
    sync: Arc<SubscriptionSyncService>,
}

impl PlanResolver {
    pub fn new(provider: Arc<dyn PurchaseProvider>, sync: Arc<SubscriptionSyncService>) -> Self {
        Self { provider, sync }
    }

    #[instrument(skip(self))]
    pub async fn resolve_plan(&self, ctx: ResolveContext) -> Result<ResolvedPlan> {
        let now = OffsetDateTime::now_utc();

        // 1. Live snapshot wins when one can be fetched, but only when it
        //    actually belongs to the caller. The client session is shared
        //    process state, so an authenticated user must never be answered
        //    from a snapshot bound to a different purchaser (another user's
        //    identity, or an unlinked anonymous one).
        if self.provider.is_configured() {
            match self.provider.get_customer_info().await {
                Ok(snapshot) => {
                    let attributable = match ctx.user_id {
                        None => true,
                        Some(user_id) => snapshot.purchaser_id.matches_user(user_id),
                    };

                    if attributable {
                        let derived = derive_plan_status(&snapshot, now);
                        debug!(
                            "Resolved plan from live snapshot: {} ({})",
                            derived.plan.as_str(),
                            derived.status.as_str()
                        );
                        return Ok(ResolvedPlan {
                            plan: derived.plan,
                            status: derived.status,
                            source: PlanSource::Live,
                            current_period_end: derived.period_end,
                        });
                    }

                    debug!(
                        "Live snapshot belongs to purchaser {}, not this caller; using durable record",
                        snapshot.purchaser_id
                    );
                }
                Err(e) => {
                    // Fall through to the durable record; a transient
                    // provider outage must not demote a known subscriber.
                    warn!("Live entitlement check failed, falling back to durable record: {}", e);
                }
            }
        }

        // 2. Durable record for authenticated users without a live check.
        if let Some(user_id) = ctx.user_id {
            if let Some(record) = self.sync.find_record(user_id).await? {
                let past_period_end = record
                    .current_period_end
                    .map(|end| end <= now)
                    .unwrap_or(false);

                if past_period_end {
                    return Ok(ResolvedPlan {
                        plan: Plan::Free,
                        status: SubscriptionStatus::Expired,
                        source: PlanSource::Durable,
                        current_period_end: record.current_period_end,
                    });
                }

                return Ok(ResolvedPlan {
                    plan: record.plan,
                    status: record.status,
                    source: PlanSource::Durable,
                    current_period_end: record.current_period_end,
                });
            }
        }

        // 3. Nothing known about this caller.
        Ok(ResolvedPlan::free(PlanSource::Default))
    }
}
