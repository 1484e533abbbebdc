use crate::{
    config::Config,
    provider::{http::HttpPurchaseProvider, PurchaseProvider},
    services::{IdentityLinker, JwtService, PlanResolver, SubscriptionSyncService},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    // Arc because DatabaseConnection is only Clone without sea-orm's
    // `mock` feature, which the test suite enables.
    pub db: Arc<DatabaseConnection>,
    pub provider: Arc<dyn PurchaseProvider>,
    pub subscription_sync: Arc<SubscriptionSyncService>,
    pub identity_linker: Arc<IdentityLinker>,
    pub plan_resolver: Arc<PlanResolver>,
    pub jwt_service: Arc<JwtService>,
    pub config: Arc<Config>,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self, anyhow::Error> {
        // Connect to database
        let db = Arc::new(sea_orm::Database::connect(&config.database.url).await?);

        let provider: Arc<dyn PurchaseProvider> =
            Arc::new(HttpPurchaseProvider::new(&config.provider));

        Ok(Self::with_provider(db, provider, config))
    }

    /// Assemble state around any provider implementation; tests inject
    /// a fake provider here.
    pub fn with_provider(
        db: Arc<DatabaseConnection>,
        provider: Arc<dyn PurchaseProvider>,
        config: Config,
    ) -> Self {
        let subscription_sync = Arc::new(SubscriptionSyncService::new(
            db.clone(),
            &config.provider,
        ));
        let identity_linker = Arc::new(IdentityLinker::new(
            provider.clone(),
            subscription_sync.clone(),
        ));
        let plan_resolver = Arc::new(PlanResolver::new(
            provider.clone(),
            subscription_sync.clone(),
        ));
        let jwt_service = Arc::new(JwtService::new(Arc::new(config.auth.clone())));

        Self {
            db,
            provider,
            subscription_sync,
            identity_linker,
            plan_resolver,
            jwt_service,
            config: Arc::new(config),
        }
    }
}
