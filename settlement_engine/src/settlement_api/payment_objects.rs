use chrono::Utc;
use mkt_common::Money;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{CheckoutId, PaymentAttempt, PaymentAttemptStatus},
    traits::ChargeStatus,
};

/// The normalized result of a successful charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResult {
    pub reference: String,
    pub amount_charged: Money,
    pub currency: String,
    pub status: ChargeStatus,
}

impl PaymentResult {
    /// Rebuilds the result from a recorded successful attempt, so that a re-driven checkout can skip the processor.
    pub fn from_attempt(attempt: &PaymentAttempt) -> Option<Self> {
        match (attempt.status, &attempt.reference) {
            (PaymentAttemptStatus::Succeeded, Some(reference)) => Some(Self {
                reference: reference.clone(),
                amount_charged: attempt.amount,
                currency: attempt.currency.clone(),
                status: ChargeStatus::Succeeded,
            }),
            _ => None,
        }
    }

    pub fn to_attempt(&self, checkout_id: &CheckoutId) -> PaymentAttempt {
        PaymentAttempt {
            checkout_id: checkout_id.clone(),
            status: PaymentAttemptStatus::Succeeded,
            reference: Some(self.reference.clone()),
            amount: self.amount_charged,
            currency: self.currency.clone(),
            reason: None,
            updated_at: Utc::now(),
        }
    }
}

pub fn declined_attempt(checkout_id: &CheckoutId, amount: Money, currency: &str, reason: &str) -> PaymentAttempt {
    PaymentAttempt {
        checkout_id: checkout_id.clone(),
        status: PaymentAttemptStatus::Declined,
        reference: None,
        amount,
        currency: currency.to_string(),
        reason: Some(reason.to_string()),
        updated_at: Utc::now(),
    }
}
