use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product tier. Variant order is the capability order: a later variant
/// grants everything an earlier one does, so `Ord` picks the strongest
/// plan when a purchaser holds several entitlements at once.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[sea_orm(string_value = "free")]
    Free,
    #[sea_orm(string_value = "pro")]
    Pro,
    #[sea_orm(string_value = "business")]
    Business,
}

impl Default for Plan {
    fn default() -> Self {
        Self::Free
    }
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
            Self::Business => "business",
        }
    }

    pub fn is_paid(&self) -> bool {
        *self != Self::Free
    }
}

/// Lifecycle state of a user's subscription as last reconciled from the
/// purchase provider.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    #[sea_orm(string_value = "none")]
    None,
    #[sea_orm(string_value = "trialing")]
    Trialing,
    #[sea_orm(string_value = "active")]
    Active,
    /// Past the paid-through date but still inside the provider's grace
    /// window (billing retry or cancellation pending expiry).
    #[sea_orm(string_value = "cancel_pending")]
    CancelPending,
    #[sea_orm(string_value = "expired")]
    Expired,
}

impl Default for SubscriptionStatus {
    fn default() -> Self {
        Self::None
    }
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Trialing => "trialing",
            Self::Active => "active",
            Self::CancelPending => "cancel_pending",
            Self::Expired => "expired",
        }
    }

    /// Whether this status grants access to the associated plan.
    pub fn grants_access(&self) -> bool {
        matches!(self, Self::Trialing | Self::Active | Self::CancelPending)
    }
}
