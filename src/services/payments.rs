//! Payment gateway client (PayPal orders API)
//!
//! Every call first exchanges the client credentials for a bearer token.

use crate::config::PaymentConfig;
use crate::error::{ImaginariumError, Result, Upstream};
use crate::services::{ensure_success, http_client, read_json};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SERVICE: Upstream = Upstream::Payments;

/// Order created for checkout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentOrder {
    pub id: String,
    pub status: String,
}

/// Result of capturing an approved order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedOrder {
    pub id: String,
    pub status: String,
    /// Captured amount, as the decimal string the gateway reports
    pub amount: Option<String>,
}

impl CapturedOrder {
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == "COMPLETED"
    }
}

/// Checkout operations
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a capture-intent order for `price` (decimal string, e.g. "10")
    async fn create_order(&self, price: &str) -> Result<PaymentOrder>;

    /// Capture an order the buyer has approved
    async fn capture_order(&self, order_id: &str) -> Result<CapturedOrder>;
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct Amount {
    value: String,
}

#[derive(Debug, Deserialize)]
struct Capture {
    amount: Option<Amount>,
}

#[derive(Debug, Default, Deserialize)]
struct Payments {
    #[serde(default)]
    captures: Vec<Capture>,
}

#[derive(Debug, Deserialize)]
struct PurchaseUnit {
    amount: Option<Amount>,
    #[serde(default)]
    payments: Payments,
}

#[derive(Debug, Deserialize)]
struct OrderBody {
    id: String,
    status: String,
    #[serde(default)]
    purchase_units: Vec<PurchaseUnit>,
}

impl OrderBody {
    /// First captured amount, falling back to the unit's requested amount
    fn amount(self) -> Option<String> {
        let unit = self.purchase_units.into_iter().next()?;
        unit.payments
            .captures
            .into_iter()
            .find_map(|capture| capture.amount)
            .or(unit.amount)
            .map(|amount| amount.value)
    }
}

/// HTTP client for the PayPal REST API
#[derive(Debug, Clone)]
pub struct PayPalClient {
    client: Client,
    config: PaymentConfig,
}

impl PayPalClient {
    /// # Errors
    /// - Failed to create HTTP client
    pub fn new(config: PaymentConfig, timeout: Duration) -> Result<Self> {
        let client = http_client(SERVICE, timeout)?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base().trim_end_matches('/'), path)
    }

    async fn access_token(&self) -> Result<String> {
        let response = self
            .client
            .post(self.url("v1/oauth2/token"))
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| ImaginariumError::network_error(SERVICE, "authenticate", &e))?;

        let body: TokenBody = read_json(SERVICE, "authenticate", response).await?;
        Ok(body.access_token)
    }
}

#[async_trait]
impl PaymentGateway for PayPalClient {
    async fn create_order(&self, price: &str) -> Result<PaymentOrder> {
        let token = self.access_token().await?;
        let payload = serde_json::json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "amount": { "currency_code": self.config.currency, "value": price }
            }]
        });

        let response = self
            .client
            .post(self.url("v2/checkout/orders"))
            .bearer_auth(token)
            .header("Prefer", "return=representation")
            .json(&payload)
            .send()
            .await
            .map_err(|e| ImaginariumError::network_error(SERVICE, "create order", &e))?;

        // Anything but 201 Created means no order exists
        if response.status() != StatusCode::CREATED {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ImaginariumError::upstream_status(
                SERVICE,
                "create order",
                status,
                &body,
            ));
        }

        let body: OrderBody = read_json(SERVICE, "create order", response).await?;
        tracing::info!(order_id = %body.id, price, "Created payment order");
        Ok(PaymentOrder {
            id: body.id,
            status: body.status,
        })
    }

    async fn capture_order(&self, order_id: &str) -> Result<CapturedOrder> {
        let token = self.access_token().await?;
        let response = self
            .client
            .post(self.url(&format!("v2/checkout/orders/{order_id}/capture")))
            .bearer_auth(token)
            .header("Prefer", "return=representation")
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| ImaginariumError::network_error(SERVICE, "capture order", &e))?;

        let response = ensure_success(SERVICE, "capture order", response).await?;
        let body: OrderBody = response.json().await.map_err(|e| {
            ImaginariumError::upstream(SERVICE, format!("capture order returned an unreadable body: {e}"))
        })?;

        let captured = CapturedOrder {
            id: body.id.clone(),
            status: body.status.clone(),
            amount: body.amount(),
        };
        tracing::info!(order_id, status = %captured.status, "Captured payment order");
        Ok(captured)
    }
}
