pub mod sea_orm_active_enums;
pub mod subscription_records;
pub mod user_preferences;
