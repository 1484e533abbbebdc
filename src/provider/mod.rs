// Purchase provider boundary
#[cfg(any(test, feature = "test-util"))]
pub mod fake;
pub mod http;

use async_trait::async_trait;

use crate::models::entitlement::{
    EntitlementSnapshot, IdentityMode, Offering, PurchaseOutcome, PurchaserIdentity,
};

/// Failure modes of the purchase provider boundary.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    /// Transient network or provider outage; retryable.
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// The requested product does not exist in the storefront
    /// configuration. Operator mistake, not a transient condition.
    #[error("product not found: {0}")]
    ProductNotFound(String),

    /// `configure` was called again with the same identity.
    #[error("provider already configured for {0}")]
    AlreadyConfigured(String),

    /// An operation that needs a purchaser identity ran before `configure`.
    #[error("provider not configured")]
    NotConfigured,

    #[error("provider error: {0}")]
    Unknown(String),
}

/// Port over the storefront purchase provider. The rest of the system
/// depends on this trait, never on the concrete client, so tests can
/// substitute the in-memory fake (behind the `test-util` feature).
///
/// Implementations never write to the application's own store.
#[async_trait]
pub trait PurchaseProvider: Send + Sync {
    /// Configure the provider for a purchaser identity. Callable once per
    /// identity; switching an anonymous session to an authenticated one
    /// goes through [`log_in`](Self::log_in), not a second `configure`.
    async fn configure(&self, mode: IdentityMode) -> Result<PurchaserIdentity, ProviderError>;

    fn is_configured(&self) -> bool;

    fn current_identity(&self) -> Option<PurchaserIdentity>;

    /// Purchasable product groupings. An empty list is a valid response
    /// meaning "retry later", not "no products exist".
    async fn list_offerings(&self) -> Result<Vec<Offering>, ProviderError>;

    /// Initiate a purchase. A user-declined purchase is
    /// [`PurchaseOutcome::Cancelled`], not an error.
    async fn purchase(&self, product_id: &str) -> Result<PurchaseOutcome, ProviderError>;

    /// Re-fetch entitlements tied to the current purchaser from the
    /// provider backend. A purchaser with no purchase history yields an
    /// empty snapshot, not an error.
    async fn restore_purchases(&self) -> Result<EntitlementSnapshot, ProviderError>;

    /// Point-in-time read of current entitlements.
    async fn get_customer_info(&self) -> Result<EntitlementSnapshot, ProviderError>;

    /// Merge the current (anonymous) purchaser's history onto the given
    /// application user id and return the merged snapshot.
    async fn log_in(&self, app_user_id: &str) -> Result<EntitlementSnapshot, ProviderError>;
}
