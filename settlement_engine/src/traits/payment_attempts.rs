use crate::{
    db_types::{CheckoutId, PaymentAttempt},
    traits::StoreError,
};

#[allow(async_fn_in_trait)]
pub trait PaymentAttempts {
    async fn fetch_payment_attempt(&self, checkout_id: &CheckoutId) -> Result<Option<PaymentAttempt>, StoreError>;

    /// Records a terminal payment outcome. The first outcome recorded for a checkout wins: if one already exists it is
    /// left untouched and returned instead.
    async fn record_payment_attempt(&self, attempt: &PaymentAttempt) -> Result<PaymentAttempt, StoreError>;

    /// Marks a successful payment as refunded. The checkout can no longer be settled with it.
    async fn mark_refunded(&self, checkout_id: &CheckoutId, reason: &str) -> Result<(), StoreError>;
}
