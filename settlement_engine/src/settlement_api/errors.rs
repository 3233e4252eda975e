use std::fmt::Display;

use mkt_common::Money;
use thiserror::Error;

use crate::{
    db_types::CheckoutId,
    partitioner::PartitionError,
    traits::{ExchangeRateError, NotificationServiceError, ProcessorError, StockShortfall, StoreError},
};

fn list<T: Display>(items: &[T]) -> String {
    items.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(", ")
}

//--------------------------------------     PaymentError    ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    #[error("Payment declined: {0}")]
    Declined(String),
    #[error("Invalid payment request: {0}")]
    Invalid(String),
    /// Every attempt failed with a transient error or timed out.
    #[error("Payment could not be completed: {0}")]
    Transient(String),
}

impl From<ProcessorError> for PaymentError {
    fn from(e: ProcessorError) -> Self {
        match e {
            ProcessorError::Declined(s) => PaymentError::Declined(s),
            ProcessorError::Invalid(s) => PaymentError::Invalid(s),
            ProcessorError::Transient(s) => PaymentError::Transient(s),
            ProcessorError::Timeout => PaymentError::Transient("the payment processor timed out".to_string()),
        }
    }
}

//--------------------------------------  NotificationError  ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotificationError {
    /// The payload can never be delivered. No attempt was made.
    #[error("Malformed notification: {0}")]
    Malformed(String),
    #[error("Notification rejected: {0}")]
    Rejected(String),
    #[error("Notification delivery failed: {0}")]
    DeliveryFailed(String),
}

impl From<NotificationServiceError> for NotificationError {
    fn from(e: NotificationServiceError) -> Self {
        match e {
            NotificationServiceError::Rejected(s) => NotificationError::Rejected(s),
            NotificationServiceError::Transient(s) => NotificationError::DeliveryFailed(s),
        }
    }
}

//--------------------------------------    NormalizerError  ---------------------------------------------------------
#[derive(Debug, Clone, Error)]
pub enum NormalizerError {
    #[error("No exchange rate is available for {0}")]
    MissingRate(String),
    #[error("The exchange rate for {0} is not usable")]
    InvalidRate(String),
    #[error("Converting {amount} to {currency} overflows")]
    Overflow { amount: Money, currency: String },
    #[error("Could not read exchange rates. {0}")]
    RateLookup(String),
}

impl From<ExchangeRateError> for NormalizerError {
    fn from(e: ExchangeRateError) -> Self {
        match e {
            ExchangeRateError::RateDoesNotExist(c) => NormalizerError::MissingRate(c),
            ExchangeRateError::InvalidRate(c) => NormalizerError::InvalidRate(c),
            ExchangeRateError::DatabaseError(s) => NormalizerError::RateLookup(s),
        }
    }
}

//--------------------------------------   SettlementError   ---------------------------------------------------------
/// Why a settlement attempt stopped before committing. Nothing was written in any of these cases.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbortReason {
    #[error("Insufficient stock for {}", list(.0))]
    InsufficientStock(Vec<StockShortfall>),
    #[error("Fee policy violation: {0}")]
    FeePolicyViolation(String),
    #[error("Payment does not match the checkout: {0}")]
    PaymentMismatch(String),
    #[error("Gave up after {0} conflicting attempts")]
    ConcurrencyExhausted(u32),
}

#[derive(Debug, Clone, Error)]
pub enum SettlementError {
    #[error("Settlement aborted. {0}")]
    Aborted(AbortReason),
    /// The settlement did not finish in time. It may or may not have committed. Re-drive the checkout with the same id
    /// to find out.
    #[error("The outcome of settling checkout {0} is unknown")]
    OutcomeUnknown(CheckoutId),
    #[error("Storage error during settlement. {0}")]
    Store(#[from] StoreError),
}

impl AbortReason {
    /// Whether re-submitting the same checkout can succeed. The buyer's payment is kept for the re-drive in that case;
    /// every other abort is final and the payment is refunded.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AbortReason::ConcurrencyExhausted(_))
    }
}

impl From<AbortReason> for SettlementError {
    fn from(reason: AbortReason) -> Self {
        SettlementError::Aborted(reason)
    }
}

//--------------------------------------    CheckoutError    ---------------------------------------------------------
#[derive(Debug, Clone, Error)]
pub enum CheckoutError {
    #[error("Invalid checkout request: {0}")]
    Validation(String),
    #[error("Invalid cart. {0}")]
    Partition(#[from] PartitionError),
    #[error("Insufficient stock for {}", list(.0))]
    InsufficientStock(Vec<StockShortfall>),
    #[error("Fee policy violation: {0}")]
    FeePolicyViolation(String),
    #[error("Payment declined: {0}")]
    PaymentDeclined(String),
    #[error("The payment processor rejected the request: {0}")]
    PaymentInvalid(String),
    #[error("The payment could not be completed right now: {0}")]
    PaymentTransient(String),
    #[error("The payment does not match the checkout: {0}")]
    PaymentMismatch(String),
    #[error("Too many concurrent checkouts. Gave up after {0} attempts")]
    ConcurrencyExhausted(u32),
    #[error("The outcome of checkout {0} is unknown. Retry with the same checkout id")]
    OutcomeUnknown(CheckoutId),
    #[error("Currency conversion failed. {0}")]
    Currency(#[from] NormalizerError),
    #[error("Storage error. {0}")]
    Store(#[from] StoreError),
}

impl From<PaymentError> for CheckoutError {
    fn from(e: PaymentError) -> Self {
        match e {
            PaymentError::Declined(s) => CheckoutError::PaymentDeclined(s),
            PaymentError::Invalid(s) => CheckoutError::PaymentInvalid(s),
            PaymentError::Transient(s) => CheckoutError::PaymentTransient(s),
        }
    }
}

impl From<SettlementError> for CheckoutError {
    fn from(e: SettlementError) -> Self {
        match e {
            SettlementError::Aborted(reason) => reason.into(),
            SettlementError::OutcomeUnknown(id) => CheckoutError::OutcomeUnknown(id),
            SettlementError::Store(e) => CheckoutError::Store(e),
        }
    }
}

impl From<AbortReason> for CheckoutError {
    fn from(reason: AbortReason) -> Self {
        match reason {
            AbortReason::InsufficientStock(s) => CheckoutError::InsufficientStock(s),
            AbortReason::FeePolicyViolation(s) => CheckoutError::FeePolicyViolation(s),
            AbortReason::PaymentMismatch(s) => CheckoutError::PaymentMismatch(s),
            AbortReason::ConcurrencyExhausted(n) => CheckoutError::ConcurrencyExhausted(n),
        }
    }
}
