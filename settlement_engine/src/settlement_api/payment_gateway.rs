//! Wraps a [`PaymentProcessor`] with timeouts and bounded retries, and normalizes what comes back.
//!
//! Only transient failures and timeouts are retried. A decline or a validation error from the processor is final and
//! is returned on the first attempt. Every call carries the checkout id, which the processor uses as its idempotency
//! key, so retrying a charge can never charge the buyer twice.
use std::time::Duration;

use log::*;
use mkt_common::Money;

use crate::{
    helpers::{retry_with_backoff, RetryPolicy},
    settlement_api::{errors::PaymentError, payment_objects::PaymentResult},
    traits::{ChargeRequest, ChargeStatus, PaymentMetadata, PaymentProcessor, ProcessorCharge, ProcessorError},
};

pub const DEFAULT_PAYMENT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct PaymentGateway<P> {
    processor: P,
    policy: RetryPolicy,
    timeout: Duration,
}

impl<P> PaymentGateway<P> {
    pub fn new(processor: P) -> Self {
        Self { processor, policy: RetryPolicy::default(), timeout: DEFAULT_PAYMENT_TIMEOUT }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The time allowed for each attempt, including confirmation.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }
}

impl<P> PaymentGateway<P>
where P: PaymentProcessor
{
    /// Charges the buyer `amount` of `currency`, retrying transient failures.
    pub async fn charge(
        &self,
        amount: Money,
        currency: &str,
        metadata: PaymentMetadata,
    ) -> Result<PaymentResult, PaymentError> {
        if amount.is_negative() || amount.is_zero() {
            return Err(PaymentError::Invalid(format!("cannot charge {amount} {currency}")));
        }
        let checkout_id = metadata.checkout_id.clone();
        let request = ChargeRequest { amount, currency: currency.to_string(), metadata };
        let request = &request;
        debug!("💳 Charging {amount} {currency} for checkout {checkout_id}");
        let charge = retry_with_backoff(&self.policy, "💳 Charge", ProcessorError::is_transient, move |attempt| {
            trace!("💳 Charge attempt {attempt} for checkout {checkout_id}");
            async move {
                match tokio::time::timeout(self.timeout, self.charge_once(request)).await {
                    Ok(result) => result,
                    Err(_) => Err(ProcessorError::Timeout),
                }
            }
        })
        .await?;
        info!("💳 Charged {} {} for checkout {} ({})", charge.amount, charge.currency, request.metadata.checkout_id, charge.id);
        Ok(PaymentResult {
            reference: charge.id,
            amount_charged: charge.amount,
            currency: charge.currency,
            status: charge.status,
        })
    }

    async fn charge_once(&self, request: &ChargeRequest) -> Result<ProcessorCharge, ProcessorError> {
        let created = self.processor.create_charge(request).await?;
        let charge = match created.status {
            ChargeStatus::Pending => self.processor.confirm_charge(&created.id, &request.metadata).await?,
            _ => created,
        };
        match charge.status {
            ChargeStatus::Succeeded => Ok(charge),
            ChargeStatus::Declined => {
                Err(ProcessorError::Declined(charge.decline_reason.unwrap_or_else(|| "no reason given".to_string())))
            },
            ChargeStatus::Pending => Err(ProcessorError::Transient(format!("charge {} is still pending", charge.id))),
        }
    }

    /// Refunds `amount` of the charge `reference`, with the same retry policy as [`Self::charge`].
    pub async fn refund(&self, reference: &str, amount: Money, metadata: &PaymentMetadata) -> Result<(), PaymentError> {
        debug!("💳 Refunding {amount} of charge {reference} for checkout {}", metadata.checkout_id);
        retry_with_backoff(&self.policy, "💳 Refund", ProcessorError::is_transient, move |_| async move {
            match tokio::time::timeout(self.timeout, self.processor.refund_charge(reference, amount, metadata)).await {
                Ok(result) => result,
                Err(_) => Err(ProcessorError::Timeout),
            }
        })
        .await?;
        info!("💳 Refunded {amount} of charge {reference} for checkout {}", metadata.checkout_id);
        Ok(())
    }
}
