use std::fmt::Display;

use mkt_common::Money;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{CheckoutId, OrderId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessorError {
    #[error("The charge was declined: {0}")]
    Declined(String),
    #[error("The processor rejected the request: {0}")]
    Invalid(String),
    #[error("Temporary processor failure: {0}")]
    Transient(String),
    #[error("The processor did not respond in time")]
    Timeout,
}

impl ProcessorError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ProcessorError::Transient(_) | ProcessorError::Timeout)
    }
}

/// Sent along with every processor call. The processor uses `checkout_id` as the idempotency key, so repeating a call
/// for the same checkout never creates a second charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMetadata {
    pub checkout_id: CheckoutId,
    pub buyer_id: String,
    pub order_ids: Vec<OrderId>,
}

impl PaymentMetadata {
    pub fn new(checkout_id: CheckoutId, buyer_id: String, order_ids: Vec<OrderId>) -> Self {
        Self { checkout_id, buyer_id, order_ids }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeRequest {
    pub amount: Money,
    pub currency: String,
    pub metadata: PaymentMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeStatus {
    Pending,
    Succeeded,
    Declined,
}

impl Display for ChargeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChargeStatus::Pending => write!(f, "pending"),
            ChargeStatus::Succeeded => write!(f, "succeeded"),
            ChargeStatus::Declined => write!(f, "declined"),
        }
    }
}

/// A charge as the processor reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorCharge {
    pub id: String,
    pub amount: Money,
    pub currency: String,
    pub status: ChargeStatus,
    #[serde(default)]
    pub decline_reason: Option<String>,
}

/// A third-party payment processor.
#[allow(async_fn_in_trait)]
pub trait PaymentProcessor {
    /// Creates (authorizes) a charge. The charge may already be final, or may still need confirming.
    async fn create_charge(&self, request: &ChargeRequest) -> Result<ProcessorCharge, ProcessorError>;

    /// Confirms a previously created charge and returns its final state.
    async fn confirm_charge(&self, charge_id: &str, metadata: &PaymentMetadata)
        -> Result<ProcessorCharge, ProcessorError>;

    /// Refunds `amount` of a successful charge.
    async fn refund_charge(&self, reference: &str, amount: Money, metadata: &PaymentMetadata)
        -> Result<(), ProcessorError>;
}
