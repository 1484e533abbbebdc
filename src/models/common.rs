use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub use entity::sea_orm_active_enums::{Plan, SubscriptionStatus};

/// Simple message response for lightweight endpoints
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Which source of truth a plan resolution came from. Live provider state
/// always wins over the durable record; the tag makes the precedence rule
/// observable instead of implicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanSource {
    /// Derived from a fresh provider entitlement snapshot.
    Live,
    /// Read from the durable subscription record.
    Durable,
    /// Neither source available; the free default.
    Default,
}

/// The answer to "what plan does this user have right now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPlan {
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub source: PlanSource,
    /// End of the paid period backing this resolution, when the source
    /// knows one.
    #[serde(with = "time::serde::rfc3339::option")]
    pub current_period_end: Option<OffsetDateTime>,
}

impl ResolvedPlan {
    pub fn free(source: PlanSource) -> Self {
        Self {
            plan: Plan::Free,
            status: SubscriptionStatus::None,
            source,
            current_period_end: None,
        }
    }

    pub fn is_paid(&self) -> bool {
        self.plan.is_paid() && self.status.grants_access()
    }
}
