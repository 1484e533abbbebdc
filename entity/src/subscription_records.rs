use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::sea_orm_active_enums::{Plan, SubscriptionStatus};

/// Durable subscription record, one row per application user.
///
/// Written only by the subscription synchronizer as a full-replace upsert
/// keyed on `user_id`; never patched field-by-field.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "subscription_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub user_id: Uuid,
    /// Purchase provider that produced this record, e.g. "storekeep".
    pub provider: String,
    /// The provider-side purchaser id this record was reconciled from.
    pub provider_customer_id: String,
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub current_period_start: Option<TimeDateTimeWithTimeZone>,
    pub current_period_end: Option<TimeDateTimeWithTimeZone>,
    /// When the last successful reconciliation ran.
    pub synced_at: TimeDateTimeWithTimeZone,
    pub created_at: TimeDateTimeWithTimeZone,
    pub updated_at: TimeDateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
