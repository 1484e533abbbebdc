use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    error::Result,
    models::entitlement::LinkResult,
    provider::PurchaseProvider,
    services::SubscriptionSyncService,
};

/// Merges an anonymous purchaser identity with an authenticated account
/// when a session transitions to identified (signup or login), then hands
/// the merged snapshot to the synchronizer so pre-login purchases become
/// attributable to the account.
pub struct IdentityLinker {
    provider: Arc<dyn PurchaseProvider>,
    sync: Arc<SubscriptionSyncService>,
}

impl IdentityLinker {
    pub fn new(provider: Arc<dyn PurchaseProvider>, sync: Arc<SubscriptionSyncService>) -> Self {
        Self { provider, sync }
    }

    /// Link the current purchaser to an authenticated user.
    ///
    /// Never blocks the login flow: a provider-side failure is a soft
    /// [`LinkResult::Deferred`] (entitlements already on the device stand,
    /// the next sync trigger retries), and a durable-write failure after a
    /// successful link still reports `Linked`. Safe to call twice for the
    /// same user; the synchronizer's upsert makes the second call a no-op.
    ///
    /// Callers sequence purchase-settle before linking; a link racing an
    /// in-flight purchase only yields a stale snapshot that the next
    /// trigger corrects.
    #[instrument(skip(self))]
    pub async fn link_identity(&self, user_id: Uuid) -> Result<LinkResult> {
        let snapshot = match self.provider.log_in(&user_id.to_string()).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(
                    "Provider link failed for user {}, deferring to next sync trigger: {}",
                    user_id, e
                );
                return Ok(LinkResult::Deferred);
            }
        };

        info!(
            "Linked purchaser {} to user {}",
            snapshot.purchaser_id, user_id
        );

        match self.sync.reconcile(user_id, &snapshot).await {
            Ok(record) => Ok(LinkResult::Linked {
                record: Some(record),
            }),
            Err(e) => {
                // Link succeeded; the durable record catches up on the
                // next trigger. Not surfaced to the user.
                warn!(
                    "Post-link reconciliation failed for user {}: {}",
                    user_id, e
                );
                Ok(LinkResult::Linked { record: None })
            }
        }
    }
}
