use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use super::{ProviderError, PurchaseProvider};
use crate::{
    config::ProviderConfig,
    models::entitlement::{
        Entitlement, EntitlementSnapshot, IdentityMode, Offering, PurchaseOutcome,
        PurchaserIdentity,
    },
};

/// Purchase provider client backed by the storefront's subscriber REST API.
pub struct HttpPurchaseProvider {
    config: ProviderConfig,
    http_client: reqwest::Client,
    identity: RwLock<Option<PurchaserIdentity>>,
}

#[derive(Debug, Deserialize)]
struct SubscriberResponse {
    subscriber: SubscriberWire,
}

#[derive(Debug, Deserialize)]
struct SubscriberWire {
    app_user_id: String,
    #[serde(default)]
    entitlements: Vec<EntitlementWire>,
}

#[derive(Debug, Deserialize)]
struct EntitlementWire {
    identifier: String,
    product_identifier: String,
    #[serde(default)]
    expires_date: Option<String>,
    #[serde(default)]
    purchase_date: Option<String>,
    #[serde(default)]
    period_type: Option<String>, // "trial" or "normal"
    #[serde(default)]
    grace_period_expires_date: Option<String>,
    is_active: bool,
}

#[derive(Debug, Deserialize)]
struct OfferingsWire {
    #[serde(default)]
    offerings: Vec<OfferingWire>,
}

#[derive(Debug, Deserialize)]
struct OfferingWire {
    identifier: String,
    product_identifier: String,
    price_cents: i64,
    currency: String,
    #[serde(default)]
    trial_days: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct PurchaseWire {
    #[serde(default)]
    user_cancelled: bool,
    #[serde(default)]
    subscriber: Option<SubscriberWire>,
}

impl HttpPurchaseProvider {
    pub fn new(config: &ProviderConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            config: config.clone(),
            http_client,
            identity: RwLock::new(None),
        }
    }

    fn require_identity(&self) -> Result<PurchaserIdentity, ProviderError> {
        self.identity
            .read()
            .expect("identity lock poisoned")
            .clone()
            .ok_or(ProviderError::NotConfigured)
    }

    fn subscriber_url(&self, identity: &PurchaserIdentity) -> String {
        format!("{}/subscribers/{}", self.config.api_base, identity)
    }

    async fn fetch_subscriber(
        &self,
        identity: &PurchaserIdentity,
    ) -> Result<EntitlementSnapshot, ProviderError> {
        let response = self
            .http_client
            .get(self.subscriber_url(identity))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        // The provider creates subscribers lazily; an unknown purchaser
        // simply has no entitlements yet.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(EntitlementSnapshot::empty(identity.clone()));
        }

        let body: SubscriberResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Unknown(format!("invalid subscriber response: {}", e)))?;

        Ok(snapshot_from_wire(body.subscriber))
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if status.is_server_error() {
            Err(ProviderError::Unavailable(format!(
                "provider returned {}: {}",
                status, body
            )))
        } else {
            Err(ProviderError::Unknown(format!(
                "provider returned {}: {}",
                status, body
            )))
        }
    }
}

#[async_trait]
impl PurchaseProvider for HttpPurchaseProvider {
    async fn configure(&self, mode: IdentityMode) -> Result<PurchaserIdentity, ProviderError> {
        let mut slot = self.identity.write().expect("identity lock poisoned");
        if let Some(existing) = slot.as_ref() {
            return Err(ProviderError::AlreadyConfigured(existing.to_string()));
        }

        let identity = match mode {
            IdentityMode::Anonymous => PurchaserIdentity::anonymous(),
            IdentityMode::Identified(user_id) => PurchaserIdentity::identified(user_id),
        };

        info!("Configured purchase provider for purchaser {}", identity);
        *slot = Some(identity.clone());
        Ok(identity)
    }

    fn is_configured(&self) -> bool {
        self.identity
            .read()
            .expect("identity lock poisoned")
            .is_some()
    }

    fn current_identity(&self) -> Option<PurchaserIdentity> {
        self.identity.read().expect("identity lock poisoned").clone()
    }

    #[instrument(skip(self))]
    async fn list_offerings(&self) -> Result<Vec<Offering>, ProviderError> {
        let response = self
            .http_client
            .get(format!("{}/offerings", self.config.api_base))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        let body: OfferingsWire = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Unknown(format!("invalid offerings response: {}", e)))?;

        Ok(body
            .offerings
            .into_iter()
            .map(|o| Offering {
                identifier: o.identifier,
                product_id: o.product_identifier,
                price_cents: o.price_cents,
                currency: o.currency,
                trial_days: o.trial_days,
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn purchase(&self, product_id: &str) -> Result<PurchaseOutcome, ProviderError> {
        let identity = self.require_identity()?;

        let response = self
            .http_client
            .post(format!("{}/purchases", self.subscriber_url(&identity)))
            .bearer_auth(&self.config.api_key)
            .json(&serde_json::json!({ "product_identifier": product_id }))
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ProviderError::ProductNotFound(product_id.to_string()));
        }

        let body: PurchaseWire = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Unknown(format!("invalid purchase response: {}", e)))?;

        if body.user_cancelled {
            return Ok(PurchaseOutcome::Cancelled);
        }

        let subscriber = body.subscriber.ok_or_else(|| {
            ProviderError::Unknown("purchase completed without subscriber state".to_string())
        })?;

        info!(
            "Purchase of '{}' completed for purchaser {}",
            product_id, identity
        );

        Ok(PurchaseOutcome::Completed {
            snapshot: snapshot_from_wire(subscriber),
        })
    }

    #[instrument(skip(self))]
    async fn restore_purchases(&self) -> Result<EntitlementSnapshot, ProviderError> {
        let identity = self.require_identity()?;

        let response = self
            .http_client
            .post(format!("{}/restore", self.subscriber_url(&identity)))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        // No purchase history is a successful, empty restore.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(EntitlementSnapshot::empty(identity));
        }

        let body: SubscriberResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Unknown(format!("invalid restore response: {}", e)))?;

        Ok(snapshot_from_wire(body.subscriber))
    }

    async fn get_customer_info(&self) -> Result<EntitlementSnapshot, ProviderError> {
        let identity = self.require_identity()?;
        self.fetch_subscriber(&identity).await
    }

    #[instrument(skip(self))]
    async fn log_in(&self, app_user_id: &str) -> Result<EntitlementSnapshot, ProviderError> {
        let identity = self.require_identity()?;

        let response = self
            .http_client
            .post(format!("{}/alias", self.subscriber_url(&identity)))
            .bearer_auth(&self.config.api_key)
            .json(&serde_json::json!({ "new_app_user_id": app_user_id }))
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        let body: SubscriberResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Unknown(format!("invalid alias response: {}", e)))?;

        let snapshot = snapshot_from_wire(body.subscriber);

        // The provider now knows this purchaser by the application user id.
        *self.identity.write().expect("identity lock poisoned") =
            Some(snapshot.purchaser_id.clone());

        Ok(snapshot)
    }
}

fn snapshot_from_wire(subscriber: SubscriberWire) -> EntitlementSnapshot {
    let entitlements = subscriber
        .entitlements
        .into_iter()
        .map(|e| {
            let expires_at = parse_timestamp(e.expires_date.as_deref(), &e.identifier);
            let period_started_at = parse_timestamp(e.purchase_date.as_deref(), &e.identifier);
            let grace_expires =
                parse_timestamp(e.grace_period_expires_date.as_deref(), &e.identifier);

            Entitlement {
                name: e.identifier,
                product_id: e.product_identifier,
                expires_at,
                period_started_at,
                is_trial: e.period_type.as_deref() == Some("trial"),
                is_active: e.is_active,
                in_grace_period: grace_expires
                    .map(|g| g > OffsetDateTime::now_utc())
                    .unwrap_or(false),
            }
        })
        .collect();

    EntitlementSnapshot {
        purchaser_id: PurchaserIdentity::from_raw(subscriber.app_user_id),
        entitlements,
    }
}

fn parse_timestamp(raw: Option<&str>, entitlement: &str) -> Option<OffsetDateTime> {
    let raw = raw?;
    match OffsetDateTime::parse(raw, &Rfc3339) {
        Ok(ts) => Some(ts),
        Err(e) => {
            warn!(
                "Unparseable timestamp '{}' on entitlement '{}': {}",
                raw, entitlement, e
            );
            None
        }
    }
}
