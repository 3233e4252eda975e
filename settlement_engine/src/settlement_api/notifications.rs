//! Order confirmations.
//!
//! Notification is best-effort. A confirmation that cannot be delivered never un-settles an order; the checkout flow
//! turns the failure into a warning for the buyer instead.
use log::*;
use mkt_common::Money;
use serde::Serialize;

use crate::{
    db_types::{CheckoutId, Order, OrderId, OrderItem, OrderStatusType, SellerId, ShippingContact},
    helpers::{retry_with_backoff, RetryPolicy},
    settlement_api::errors::NotificationError,
    traits::{NotificationAck, NotificationService, NotificationServiceError},
};

pub const ORDER_CONFIRMATION_TEMPLATE: &str = "order-confirmation";
/// The first send plus three retries. The fourth failure is logged and becomes a warning for the buyer.
pub const DEFAULT_NOTIFICATION_ATTEMPTS: u32 = 4;

/// The template data for an order confirmation.
#[derive(Debug, Clone, Serialize)]
pub struct OrderConfirmation<'a> {
    pub order_id: &'a OrderId,
    pub checkout_id: &'a CheckoutId,
    pub seller_id: &'a SellerId,
    pub recipient: &'a str,
    pub shipping_address: &'a str,
    pub items: &'a [OrderItem],
    pub subtotal: Money,
    pub fees: Money,
    pub currency: &'a str,
    pub charge_amount: Money,
    pub charge_currency: &'a str,
    pub status: OrderStatusType,
}

impl<'a> OrderConfirmation<'a> {
    pub fn new(order: &'a Order, contact: &'a ShippingContact) -> Self {
        Self {
            order_id: &order.id,
            checkout_id: &order.checkout_id,
            seller_id: &order.seller_id,
            recipient: &contact.name,
            shipping_address: &contact.address,
            items: order.items.as_slice(),
            subtotal: order.subtotal,
            fees: order.admin_amount,
            currency: &order.currency,
            charge_amount: order.charge_amount,
            charge_currency: &order.charge_currency,
            status: order.status,
        }
    }
}

pub struct NotificationDispatcher<N> {
    service: N,
    policy: RetryPolicy,
}

impl<N> NotificationDispatcher<N> {
    pub fn new(service: N) -> Self {
        Self { service, policy: RetryPolicy::default().with_max_attempts(DEFAULT_NOTIFICATION_ATTEMPTS) }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn service(&self) -> &N {
        &self.service
    }
}

impl<N: Clone> Clone for NotificationDispatcher<N> {
    fn clone(&self) -> Self {
        Self { service: self.service.clone(), policy: self.policy }
    }
}

impl<N> NotificationDispatcher<N>
where N: NotificationService
{
    /// Sends the order confirmation for `order` to `contact`.
    ///
    /// Payloads that can never be delivered (no email address, nothing ordered, a zero total) fail straight away with
    /// [`NotificationError::Malformed`]. Transient failures are retried according to the retry policy.
    pub async fn notify(&self, order: &Order, contact: &ShippingContact) -> Result<NotificationAck, NotificationError> {
        validate_payload(order, contact)?;
        let data = serde_json::to_value(OrderConfirmation::new(order, contact))
            .map_err(|e| NotificationError::Malformed(e.to_string()))?;
        let to = contact.email.trim();
        let data = &data;
        let is_transient = |e: &NotificationServiceError| matches!(e, NotificationServiceError::Transient(_));
        let ack = retry_with_backoff(&self.policy, "📨 Order confirmation", is_transient, move |_| async move {
            self.service.send(to, ORDER_CONFIRMATION_TEMPLATE, data).await
        })
        .await
        .map_err(|e| {
            error!("📨 Could not send the confirmation for order {} to {to}. {e}", order.id);
            NotificationError::from(e)
        })?;
        debug!("📨 Confirmation for order {} sent to {to} ({})", order.id, ack.message_id);
        Ok(ack)
    }
}

fn validate_payload(order: &Order, contact: &ShippingContact) -> Result<(), NotificationError> {
    if contact.email.trim().is_empty() {
        return Err(NotificationError::Malformed(format!("order {} has no contact address", order.id)));
    }
    if order.items.is_empty() {
        return Err(NotificationError::Malformed(format!("order {} has no items", order.id)));
    }
    if order.subtotal.is_zero() {
        return Err(NotificationError::Malformed(format!("order {} has a zero total", order.id)));
    }
    Ok(())
}
