// Service modules
pub mod feature_gate;
pub mod identity_linker;
pub mod jwt_service;
pub mod plan_resolver;
pub mod subscription_sync;

pub use identity_linker::IdentityLinker;
pub use jwt_service::JwtService;
pub use plan_resolver::{PlanResolver, ResolveContext};
pub use subscription_sync::SubscriptionSyncService;
