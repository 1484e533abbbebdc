use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use validator::Validate;

use super::common::{Plan, PlanSource, ResolvedPlan, SubscriptionStatus};
use crate::models::entitlement::Offering;

/// POST /api/v1/purchases request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRequest {
    #[validate(length(min = 1, max = 200))]
    pub product_id: String,
}

/// POST /api/v1/purchases response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseResponse {
    pub success: bool,
    /// True when the user dismissed the payment sheet; nothing was bought
    /// and nothing was reconciled.
    pub cancelled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<PlanData>,
}

/// GET /api/v1/plan response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanResponse {
    pub success: bool,
    pub data: PlanData,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanData {
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub source: PlanSource,
    #[serde(with = "time::serde::rfc3339::option")]
    pub current_period_end: Option<OffsetDateTime>,
}

impl PlanData {
    pub fn from_resolved(resolved: ResolvedPlan) -> Self {
        Self {
            plan: resolved.plan,
            status: resolved.status,
            source: resolved.source,
            current_period_end: resolved.current_period_end,
        }
    }
}

/// GET /api/v1/offerings response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferingsResponse {
    pub success: bool,
    pub data: Vec<Offering>,
}

/// POST /api/v1/identity/link response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkResponse {
    pub success: bool,
    /// False when the provider-side link was deferred; the client retries
    /// via the next sync trigger.
    pub linked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<PlanData>,
}
