use std::sync::Mutex;

use async_trait::async_trait;

use super::{ProviderError, PurchaseProvider};
use crate::models::entitlement::{
    EntitlementSnapshot, IdentityMode, Offering, PurchaseOutcome, PurchaserIdentity,
};

/// Scriptable in-memory purchase provider for tests and local development.
/// Behaves like the real client at the trait boundary: configure-once,
/// empty snapshots for unknown purchasers, user-cancel as a non-error.
pub struct FakePurchaseProvider {
    state: Mutex<FakeState>,
}

struct FakeState {
    identity: Option<PurchaserIdentity>,
    snapshot: Option<EntitlementSnapshot>,
    offerings: Vec<Offering>,
    purchase_outcome: Option<Result<PurchaseOutcome, ProviderError>>,
    log_in_error: Option<ProviderError>,
    log_in_calls: u32,
    customer_info_calls: u32,
}

impl FakePurchaseProvider {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                identity: None,
                snapshot: None,
                offerings: Vec::new(),
                purchase_outcome: None,
                log_in_error: None,
                log_in_calls: 0,
                customer_info_calls: 0,
            }),
        }
    }

    /// A provider already configured with an anonymous purchaser.
    pub fn anonymous() -> Self {
        let fake = Self::new();
        fake.lock().identity = Some(PurchaserIdentity::anonymous());
        fake
    }

    /// A provider whose session is already linked to the given user, as it
    /// stands after `log_in`.
    pub fn identified(user_id: uuid::Uuid) -> Self {
        let fake = Self::new();
        fake.lock().identity = Some(PurchaserIdentity::identified(user_id));
        fake
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake provider lock poisoned")
    }

    /// The snapshot subsequent `get_customer_info`/`restore_purchases`/
    /// `log_in` calls return.
    pub fn set_snapshot(&self, snapshot: EntitlementSnapshot) {
        self.lock().snapshot = Some(snapshot);
    }

    pub fn clear_snapshot(&self) {
        self.lock().snapshot = None;
    }

    pub fn set_offerings(&self, offerings: Vec<Offering>) {
        self.lock().offerings = offerings;
    }

    pub fn set_purchase_outcome(&self, outcome: Result<PurchaseOutcome, ProviderError>) {
        self.lock().purchase_outcome = Some(outcome);
    }

    /// Make the next `log_in` calls fail with the given error.
    pub fn fail_log_in(&self, error: ProviderError) {
        self.lock().log_in_error = Some(error);
    }

    pub fn log_in_calls(&self) -> u32 {
        self.lock().log_in_calls
    }

    pub fn customer_info_calls(&self) -> u32 {
        self.lock().customer_info_calls
    }

    fn snapshot_or_empty(state: &FakeState) -> Result<EntitlementSnapshot, ProviderError> {
        let identity = state.identity.clone().ok_or(ProviderError::NotConfigured)?;
        Ok(state
            .snapshot
            .clone()
            .unwrap_or_else(|| EntitlementSnapshot::empty(identity)))
    }
}

impl Default for FakePurchaseProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PurchaseProvider for FakePurchaseProvider {
    async fn configure(&self, mode: IdentityMode) -> Result<PurchaserIdentity, ProviderError> {
        let mut state = self.lock();
        if let Some(existing) = state.identity.as_ref() {
            return Err(ProviderError::AlreadyConfigured(existing.to_string()));
        }

        let identity = match mode {
            IdentityMode::Anonymous => PurchaserIdentity::anonymous(),
            IdentityMode::Identified(user_id) => PurchaserIdentity::identified(user_id),
        };
        state.identity = Some(identity.clone());
        Ok(identity)
    }

    fn is_configured(&self) -> bool {
        self.lock().identity.is_some()
    }

    fn current_identity(&self) -> Option<PurchaserIdentity> {
        self.lock().identity.clone()
    }

    async fn list_offerings(&self) -> Result<Vec<Offering>, ProviderError> {
        Ok(self.lock().offerings.clone())
    }

    async fn purchase(&self, product_id: &str) -> Result<PurchaseOutcome, ProviderError> {
        let mut state = self.lock();
        if state.identity.is_none() {
            return Err(ProviderError::NotConfigured);
        }

        match state.purchase_outcome.take() {
            Some(Ok(outcome)) => {
                if let PurchaseOutcome::Completed { snapshot } = &outcome {
                    state.snapshot = Some(snapshot.clone());
                }
                Ok(outcome)
            }
            Some(Err(e)) => Err(e),
            None => Err(ProviderError::ProductNotFound(product_id.to_string())),
        }
    }

    async fn restore_purchases(&self) -> Result<EntitlementSnapshot, ProviderError> {
        let state = self.lock();
        Self::snapshot_or_empty(&state)
    }

    async fn get_customer_info(&self) -> Result<EntitlementSnapshot, ProviderError> {
        let mut state = self.lock();
        state.customer_info_calls += 1;
        Self::snapshot_or_empty(&state)
    }

    async fn log_in(&self, app_user_id: &str) -> Result<EntitlementSnapshot, ProviderError> {
        let mut state = self.lock();
        state.log_in_calls += 1;

        if state.identity.is_none() {
            return Err(ProviderError::NotConfigured);
        }
        if let Some(error) = state.log_in_error.clone() {
            return Err(error);
        }

        let identity = PurchaserIdentity::from_raw(app_user_id);
        state.identity = Some(identity.clone());

        // The provider transfers the anonymous purchaser's history onto
        // the identified id; entitlements survive the rename.
        let mut snapshot = match state.snapshot.clone() {
            Some(s) => s,
            None => EntitlementSnapshot::empty(identity.clone()),
        };
        snapshot.purchaser_id = identity;
        state.snapshot = Some(snapshot.clone());

        Ok(snapshot)
    }
}
