use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::common::Plan;

/// Purchaser id as the provider knows it: device-generated before any
/// account exists, the application's own user id after identity linking.
/// Owned by the provider, never persisted here except as the
/// `provider_customer_id` column on the subscription record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurchaserIdentity(String);

impl PurchaserIdentity {
    pub fn anonymous() -> Self {
        Self(format!("$anon:{}", Uuid::new_v4()))
    }

    pub fn identified(user_id: Uuid) -> Self {
        Self(user_id.to_string())
    }

    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn is_anonymous(&self) -> bool {
        self.0.starts_with("$anon:")
    }

    /// Whether this purchaser identity names the given application user.
    /// Anonymous identities match nobody.
    pub fn matches_user(&self, user_id: Uuid) -> bool {
        self.0 == user_id.to_string()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PurchaserIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// How the purchase client should be configured at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityMode {
    Anonymous,
    Identified(Uuid),
}

/// One named grant of capability from the provider, tied to a product
/// purchase. Transient; only ever inspected within a single resolution or
/// reconciliation call.
#[derive(Debug, Clone, PartialEq)]
pub struct Entitlement {
    pub name: String,
    pub product_id: String,
    /// None means non-expiring (e.g. a lifetime unlock).
    pub expires_at: Option<OffsetDateTime>,
    pub period_started_at: Option<OffsetDateTime>,
    pub is_trial: bool,
    /// Provider-computed liveness; not re-derived here.
    pub is_active: bool,
    /// Past the paid-through date but still covered by the provider's
    /// billing-retry / cancellation-pending window.
    pub in_grace_period: bool,
}

impl Entitlement {
    /// Map the provider-side entitlement name onto a plan tier. Unknown
    /// names grant nothing; the caller logs them as configuration drift.
    pub fn plan(&self) -> Option<Plan> {
        match self.name.as_str() {
            "pro" => Some(Plan::Pro),
            "business" => Some(Plan::Business),
            _ => None,
        }
    }
}

/// Live entitlement state for one purchaser identity. Fetched on demand,
/// discarded after use; never cached beyond a single call.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitlementSnapshot {
    pub purchaser_id: PurchaserIdentity,
    pub entitlements: Vec<Entitlement>,
}

impl EntitlementSnapshot {
    pub fn empty(purchaser_id: PurchaserIdentity) -> Self {
        Self {
            purchaser_id,
            entitlements: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entitlements.is_empty()
    }
}

/// A purchasable product grouping with price and trial metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offering {
    pub identifier: String,
    pub product_id: String,
    pub price_cents: i64,
    pub currency: String,
    pub trial_days: Option<u32>,
}

/// Result of an initiated purchase. A user-declined purchase is a normal
/// outcome, not an error, and must not trigger reconciliation.
#[derive(Debug, Clone)]
pub enum PurchaseOutcome {
    Completed { snapshot: EntitlementSnapshot },
    Cancelled,
}

/// Result of linking an anonymous purchaser to an authenticated account.
#[derive(Debug, Clone)]
pub enum LinkResult {
    /// Provider-side link succeeded. `record` is None when the durable
    /// write failed; the live entitlements still stand for this session.
    Linked {
        record: Option<entity::subscription_records::Model>,
    },
    /// Provider-side link failed (network). Soft failure: login proceeds,
    /// the next sync trigger retries.
    Deferred,
}
