use std::{fmt::Display, time::Duration};

use mkt_common::DEFAULT_CURRENCY_CODE;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{CartItem, CheckoutId, OrderId, ShippingContact},
    helpers::RetryPolicy,
    settlement_api::{
        coordinator::{DEFAULT_MAX_CONFLICT_RETRIES, DEFAULT_SETTLEMENT_TIMEOUT},
        notifications::DEFAULT_NOTIFICATION_ATTEMPTS,
        payment_gateway::DEFAULT_PAYMENT_TIMEOUT,
    },
};

/// The warning attached to a checkout whose confirmation could not be sent.
pub const DELAYED_CONFIRMATION_WARNING: &str = "order placed, confirmation email may be delayed";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    /// Idempotency token. Re-submitting a checkout with the same id never charges or settles twice.
    pub checkout_id: CheckoutId,
    pub buyer_id: String,
    pub cart: Vec<CartItem>,
    pub shipping: ShippingContact,
    /// The currency to charge the buyer in. Defaults to the canonical currency.
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutOutcome {
    pub checkout_id: CheckoutId,
    pub order_ids: Vec<OrderId>,
    /// True when the checkout had already been settled by an earlier request
    pub already_settled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl CheckoutOutcome {
    pub fn new(checkout_id: CheckoutId, order_ids: Vec<OrderId>, already_settled: bool) -> Self {
        Self { checkout_id, order_ids, already_settled, warnings: Vec::new() }
    }
}

/// When order confirmations go out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationMode {
    /// One after the other, after settlement commits and before the checkout returns.
    #[default]
    Inline,
    /// Handed to the `OrderSettled` event handlers, which send them in the background. The checkout returns as soon as
    /// settlement commits.
    Background,
}

impl Display for NotificationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationMode::Inline => write!(f, "inline"),
            NotificationMode::Background => write!(f, "background"),
        }
    }
}

/// Tuning for [`crate::CheckoutApi`].
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// The currency that cart prices, fees and wallet balances are held in.
    pub canonical_currency: String,
    pub payment_retry: RetryPolicy,
    /// Time allowed for each payment attempt.
    pub payment_timeout: Duration,
    pub notification_retry: RetryPolicy,
    /// Bounds the number of commit attempts when concurrent checkouts conflict.
    pub settlement_retry: RetryPolicy,
    /// Overall time allowed for settlement. When it elapses the outcome is unknown.
    pub settlement_timeout: Duration,
    pub notification_mode: NotificationMode,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            canonical_currency: DEFAULT_CURRENCY_CODE.to_string(),
            payment_retry: RetryPolicy::default(),
            payment_timeout: DEFAULT_PAYMENT_TIMEOUT,
            notification_retry: RetryPolicy::default().with_max_attempts(DEFAULT_NOTIFICATION_ATTEMPTS),
            settlement_retry: RetryPolicy::new(DEFAULT_MAX_CONFLICT_RETRIES, Duration::from_millis(25)),
            settlement_timeout: DEFAULT_SETTLEMENT_TIMEOUT,
            notification_mode: NotificationMode::default(),
        }
    }
}
