//! Credit plans and checkout
//!
//! Buying a plan is a two-step checkout: create an order for the plan's
//! price, then capture it once the buyer approves. A completed capture
//! credits the plan to the buyer.

use crate::error::{ImaginariumError, Result};
use crate::services::payments::{CapturedOrder, PaymentGateway, PaymentOrder};
use crate::store::DocumentStore;
use crate::tracing_config::events;
use serde::Serialize;
use std::sync::Arc;

/// One line of a plan's feature list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Inclusion {
    pub label: &'static str,
    pub is_included: bool,
}

/// A purchasable credit package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub id: u32,
    pub name: &'static str,
    /// Price in whole US dollars
    pub price: u32,
    pub credits: u32,
    pub inclusions: [Inclusion; 3],
}

const fn included(label: &'static str) -> Inclusion {
    Inclusion {
        label,
        is_included: true,
    }
}

pub const PLANS: [Plan; 3] = [
    Plan {
        id: 1,
        name: "Free",
        price: 0,
        credits: 9,
        inclusions: [
            included("9 Free Credits"),
            included("1 Background Replacement"),
            included("+ 4 Other Operations"),
        ],
    },
    Plan {
        id: 2,
        name: "Pro Package",
        price: 10,
        credits: 50,
        inclusions: [
            included("50 Credits"),
            included("10 Background Replacement"),
            included("Or 50 Other Operations"),
        ],
    },
    Plan {
        id: 3,
        name: "Premium Package",
        price: 20,
        credits: 125,
        inclusions: [
            included("125 Credits"),
            included("25 Background Replacement"),
            included("Or 125 Other Operations"),
        ],
    },
];

/// Paid plan whose price equals `price`
#[must_use]
pub fn plan_for_price(price: f64) -> Option<&'static Plan> {
    PLANS
        .iter()
        .filter(|plan| plan.price > 0)
        .find(|plan| (f64::from(plan.price) - price).abs() < 0.005)
}

/// Parse a decimal price such as "10" or "10.00"
///
/// # Errors
/// - Not a number, not finite, or not positive
pub fn parse_price(raw: &str) -> Result<f64> {
    let price: f64 = raw
        .trim()
        .parse()
        .map_err(|_| ImaginariumError::invalid_request(format!("order price '{raw}' is not a number")))?;
    if !price.is_finite() || price <= 0.0 {
        return Err(ImaginariumError::invalid_request(format!(
            "order price must be positive, got {raw}"
        )));
    }
    Ok(price)
}

/// Outcome of a captured checkout
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureOutcome {
    pub order: CapturedOrder,
    pub plan: Option<Plan>,
    /// Buyer's balance after crediting
    pub wallet: i64,
}

/// Checkout flow over a payment gateway and the user store
pub struct BillingService {
    gateway: Arc<dyn PaymentGateway>,
    store: Arc<dyn DocumentStore>,
}

impl BillingService {
    #[must_use]
    pub fn new(gateway: Arc<dyn PaymentGateway>, store: Arc<dyn DocumentStore>) -> Self {
        Self { gateway, store }
    }

    /// Create a checkout order for a paid plan
    ///
    /// # Errors
    /// - `InvalidRequest` for a bad price or one matching no paid plan
    /// - `NotFound` for an unknown user
    /// - `UpstreamUnavailable` from the gateway
    pub async fn create_order(&self, price: &str, user_id: &str) -> Result<PaymentOrder> {
        let amount = parse_price(price)?;
        let plan = plan_for_price(amount).ok_or_else(|| {
            ImaginariumError::invalid_request(format!("no plan costs {price} USD"))
        })?;
        if self.store.get_user(user_id).await?.is_none() {
            return Err(ImaginariumError::not_found(format!("user {user_id}")));
        }

        let order = self.gateway.create_order(price.trim()).await?;
        tracing::info!(order_id = %order.id, plan = plan.name, user_id, "Checkout started");
        Ok(order)
    }

    /// Capture an approved order and credit the matching plan
    ///
    /// An incomplete capture credits nothing and returns the current balance.
    ///
    /// # Errors
    /// - `NotFound` for an unknown user
    /// - `UpstreamUnavailable` from the gateway
    pub async fn capture_order(&self, order_id: &str, user_id: &str) -> Result<CaptureOutcome> {
        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| ImaginariumError::not_found(format!("user {user_id}")))?;

        let order = self.gateway.capture_order(order_id).await?;
        let plan = order
            .amount
            .as_deref()
            .and_then(|amount| parse_price(amount).ok())
            .and_then(plan_for_price)
            .copied();

        let wallet = match (&plan, order.is_completed()) {
            (Some(plan), true) => {
                let delta = i64::from(plan.credits);
                let balance = self.store.adjust_credits(user_id, delta).await?;
                events::credits_changed(user_id, delta, balance);
                balance
            },
            _ => {
                tracing::warn!(
                    order_id,
                    status = %order.status,
                    amount = ?order.amount,
                    "Capture did not match a completed plan purchase; no credits added"
                );
                user.credit_balance
            },
        };

        Ok(CaptureOutcome {
            order,
            plan,
            wallet,
        })
    }
}
