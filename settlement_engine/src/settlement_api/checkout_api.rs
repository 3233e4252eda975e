//! The checkout flow: from a cart to settled, paid-for orders.
//!
//! ```text
//!   partition ─► fees ─► idempotency check ─► stock check ─► allocate charge ─► pay ─► settle ─► notify
//! ```
//!
//! Every step before `pay` is free of side effects, so anything that is wrong with the cart is reported before the
//! buyer is charged. The payment outcome is recorded per checkout, so re-driving a checkout (after a timeout, say)
//! reuses the earlier charge instead of making a new one.
use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Order, OrderId, PaymentAttempt, PaymentAttemptStatus},
    events::{EventProducers, OrderSettledEvent},
    fee_policy::FeeSchedule,
    partitioner::{partition, SellerPartition},
    settlement_api::{
        checkout_objects::{
            CheckoutConfig,
            CheckoutOutcome,
            CheckoutRequest,
            NotificationMode,
            DELAYED_CONFIRMATION_WARNING,
        },
        coordinator::SettlementCoordinator,
        currency::{ChargeAllocation, CurrencyNormalizer},
        errors::{CheckoutError, PaymentError, SettlementError},
        notifications::NotificationDispatcher,
        payment_gateway::PaymentGateway,
        payment_objects::{declined_attempt, PaymentResult},
    },
    traits::{
        aggregate_quantities,
        ExchangeRates,
        NotificationService,
        PaymentAttempts,
        PaymentMetadata,
        PaymentProcessor,
        PlannedOrder,
        SettlementPlan,
        SettlementStore,
    },
};

/// `CheckoutApi` is the primary API for turning a buyer's cart into settled orders.
pub struct CheckoutApi<B, P, N> {
    db: B,
    fees: FeeSchedule,
    coordinator: SettlementCoordinator<B>,
    normalizer: CurrencyNormalizer<B>,
    gateway: PaymentGateway<P>,
    dispatcher: NotificationDispatcher<N>,
    producers: EventProducers,
    notification_mode: NotificationMode,
}

impl<B, P, N> Debug for CheckoutApi<B, P, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CheckoutApi ({} notifications)", self.notification_mode)
    }
}

impl<B: Clone, P, N> CheckoutApi<B, P, N> {
    pub fn new(
        db: B,
        processor: P,
        notifier: N,
        fees: FeeSchedule,
        config: CheckoutConfig,
        producers: EventProducers,
    ) -> Self {
        let coordinator = SettlementCoordinator::new(db.clone())
            .with_retry_policy(config.settlement_retry)
            .with_timeout(config.settlement_timeout);
        let normalizer = CurrencyNormalizer::new(db.clone(), config.canonical_currency);
        let gateway =
            PaymentGateway::new(processor).with_retry_policy(config.payment_retry).with_timeout(config.payment_timeout);
        let dispatcher = NotificationDispatcher::new(notifier).with_retry_policy(config.notification_retry);
        Self {
            db,
            fees,
            coordinator,
            normalizer,
            gateway,
            dispatcher,
            producers,
            notification_mode: config.notification_mode,
        }
    }

    pub fn fee_schedule(&self) -> &FeeSchedule {
        &self.fees
    }

    pub fn canonical_currency(&self) -> &str {
        self.normalizer.canonical_currency()
    }
}

impl<B, P, N> CheckoutApi<B, P, N>
where
    B: SettlementStore + PaymentAttempts + ExchangeRates,
    P: PaymentProcessor,
    N: NotificationService,
{
    /// Checks out the buyer's cart.
    ///
    /// This call is idempotent on `checkout_id`. If the checkout has already been settled, the existing order ids are
    /// returned with `already_settled` set, and nothing is charged or written.
    ///
    /// Notification failures never fail the checkout. They are reported in [`CheckoutOutcome::warnings`].
    pub async fn checkout(&self, request: CheckoutRequest) -> Result<CheckoutOutcome, CheckoutError> {
        validate_request(&request)?;
        let checkout_id = request.checkout_id.clone();
        let partitions = partition(&request.cart)?;
        debug!("🧾 Checkout {checkout_id}: {} items from {} sellers", request.cart.len(), partitions.len());

        let existing = self.db.fetch_orders_for_checkout(&checkout_id).await?;
        if !existing.is_empty() {
            info!("🧾 Checkout {checkout_id} has already been settled. Returning the existing orders.");
            return Ok(CheckoutOutcome::new(checkout_id, order_ids(&existing), true));
        }

        // A checkout that was paid for by an earlier submission goes straight to settlement, which re-checks stock
        // and refunds the payment if the cart can no longer be filled.
        let recorded = self.db.fetch_payment_attempt(&checkout_id).await?;
        let paid = recorded.as_ref().is_some_and(|a| a.status == PaymentAttemptStatus::Succeeded);
        if !paid {
            let quantities = aggregate_quantities(partitions.iter().flat_map(|p| p.items.iter()));
            self.coordinator.check_stock(&quantities).await?;
        }

        let currency = request
            .currency
            .as_deref()
            .map(|c| c.trim().to_uppercase())
            .unwrap_or_else(|| self.canonical_currency().to_string());
        let subtotals = partitions.iter().map(|p| p.subtotal).collect::<Vec<_>>();
        let allocation = self.normalizer.allocate(&subtotals, &currency).await?;
        let mut plan = self.build_plan(&request, &partitions, &allocation);
        let metadata = PaymentMetadata::new(
            checkout_id.clone(),
            request.buyer_id.clone(),
            plan.orders.iter().map(|o| o.order_id.clone()).collect(),
        );

        let payment = self.obtain_payment(&plan, metadata.clone(), recorded).await?;
        plan.payment_reference = payment.reference.clone();

        let outcome = match self.coordinator.settle(&plan, &payment).await {
            Ok(outcome) => outcome,
            Err(SettlementError::Aborted(reason)) if reason.is_recoverable() => {
                warn!("🧾 Checkout {checkout_id} could not settle. {reason}. The payment is kept for a re-submission.");
                return Err(reason.into());
            },
            Err(SettlementError::Aborted(reason)) => {
                warn!("🧾 Checkout {checkout_id} was aborted after payment. {reason}. Refunding the buyer.");
                self.refund(&payment, &metadata, &reason.to_string()).await;
                return Err(reason.into());
            },
            Err(e) => return Err(e.into()),
        };
        if outcome.already_settled {
            return Ok(CheckoutOutcome::new(checkout_id, outcome.order_ids(), true));
        }

        let warnings = self.after_settlement(&outcome.orders, &request).await;
        let mut result = CheckoutOutcome::new(checkout_id, outcome.order_ids(), false);
        result.warnings = warnings;
        info!("🧾 Checkout {} complete with {} orders", result.checkout_id, result.order_ids.len());
        Ok(result)
    }

    fn build_plan(
        &self,
        request: &CheckoutRequest,
        partitions: &[SellerPartition],
        allocation: &ChargeAllocation,
    ) -> SettlementPlan {
        let orders = partitions
            .iter()
            .zip(allocation.per_order.iter())
            .map(|(partition, charge_amount)| PlannedOrder {
                order_id: OrderId::for_partition(&request.checkout_id, &partition.seller_id),
                seller_id: partition.seller_id.clone(),
                items: partition.items.clone(),
                subtotal: partition.subtotal,
                fees: self.fees.fees_for_partition(partition),
                charge_amount: *charge_amount,
            })
            .collect();
        SettlementPlan {
            checkout_id: request.checkout_id.clone(),
            buyer_id: request.buyer_id.clone(),
            currency: self.canonical_currency().to_string(),
            charge_amount: allocation.total,
            charge_currency: allocation.currency.clone(),
            rounding_adjustment: allocation.rounding_adjustment,
            payment_reference: String::new(),
            orders,
        }
    }

    /// Returns the successful payment for the checkout, charging the buyer only if no outcome has been recorded yet.
    ///
    /// `recorded` is the outcome already on file for the checkout, if any.
    async fn obtain_payment(
        &self,
        plan: &SettlementPlan,
        metadata: PaymentMetadata,
        recorded: Option<PaymentAttempt>,
    ) -> Result<PaymentResult, CheckoutError> {
        let checkout_id = &plan.checkout_id;
        if let Some(attempt) = recorded {
            return match attempt.status {
                PaymentAttemptStatus::Succeeded => {
                    info!("🧾 Checkout {checkout_id} was already paid for. Reusing the payment.");
                    PaymentResult::from_attempt(&attempt)
                        .ok_or_else(|| CheckoutError::PaymentInvalid("recorded payment has no reference".into()))
                },
                PaymentAttemptStatus::Declined => {
                    Err(CheckoutError::PaymentDeclined(attempt.reason.unwrap_or_else(|| "declined".to_string())))
                },
                PaymentAttemptStatus::Refunded => Err(CheckoutError::Validation(format!(
                    "checkout {checkout_id} was aborted and refunded. Start a new checkout"
                ))),
            };
        }
        match self.gateway.charge(plan.charge_amount, &plan.charge_currency, metadata).await {
            Ok(payment) => {
                // if a concurrent request for this checkout recorded its outcome first, that one wins
                let recorded = self.db.record_payment_attempt(&payment.to_attempt(checkout_id)).await?;
                PaymentResult::from_attempt(&recorded)
                    .ok_or_else(|| CheckoutError::PaymentDeclined(recorded.reason.unwrap_or_default()))
            },
            Err(PaymentError::Declined(reason)) => {
                let attempt = declined_attempt(checkout_id, plan.charge_amount, &plan.charge_currency, &reason);
                if let Err(e) = self.db.record_payment_attempt(&attempt).await {
                    error!("🧾 Could not record the declined payment for checkout {checkout_id}. {e}");
                }
                Err(CheckoutError::PaymentDeclined(reason))
            },
            Err(e) => Err(e.into()),
        }
    }

    /// Best-effort. A failed refund is logged for manual follow-up; the abort error still goes back to the caller.
    async fn refund(&self, payment: &PaymentResult, metadata: &PaymentMetadata, reason: &str) {
        match self.gateway.refund(&payment.reference, payment.amount_charged, metadata).await {
            Ok(()) => {
                if let Err(e) = self.db.mark_refunded(&metadata.checkout_id, reason).await {
                    error!("🧾 Refunded checkout {}, but could not record the refund. {e}", metadata.checkout_id);
                }
            },
            Err(e) => error!(
                "🧾 REFUND FAILED for checkout {} (payment {}, {} {}). Manual intervention is required. {e}",
                metadata.checkout_id, payment.reference, payment.amount_charged, payment.currency
            ),
        }
    }

    async fn after_settlement(&self, orders: &[Order], request: &CheckoutRequest) -> Vec<String> {
        for order in orders {
            let event = OrderSettledEvent::new(order.clone(), request.shipping.clone());
            self.producers.publish_order_settled(event).await;
        }
        let background = self.notification_mode == NotificationMode::Background;
        if background && !self.producers.order_settled_producer.is_empty() {
            debug!("🧾 Confirmations for checkout {} are being sent in the background", request.checkout_id);
            return Vec::new();
        }
        if background {
            warn!("🧾 Background notifications are enabled, but nothing handles settled orders. Sending inline.");
        }
        let mut warnings = Vec::new();
        for order in orders {
            if let Err(e) = self.dispatcher.notify(order, &request.shipping).await {
                warn!("🧾 Order {} is settled, but its confirmation was not sent. {e}", order.id);
                if !warnings.iter().any(|w| w == DELAYED_CONFIRMATION_WARNING) {
                    warnings.push(DELAYED_CONFIRMATION_WARNING.to_string());
                }
            }
        }
        warnings
    }
}

fn validate_request(request: &CheckoutRequest) -> Result<(), CheckoutError> {
    if request.checkout_id.is_blank() {
        return Err(CheckoutError::Validation("checkout_id is required".into()));
    }
    if request.buyer_id.trim().is_empty() {
        return Err(CheckoutError::Validation("buyer_id is required".into()));
    }
    let missing = request.shipping.missing_fields();
    if !missing.is_empty() {
        return Err(CheckoutError::Validation(format!("shipping {} is required", missing.join(", "))));
    }
    if let Some(currency) = &request.currency {
        let c = currency.trim();
        if c.len() != 3 || !c.chars().all(|ch| ch.is_ascii_alphabetic()) {
            return Err(CheckoutError::Validation(format!("'{currency}' is not a currency code")));
        }
    }
    Ok(())
}

fn order_ids(orders: &[Order]) -> Vec<OrderId> {
    orders.iter().map(|o| o.id.clone()).collect()
}

/// Used by background notification handlers so that they report failures the same way the inline path does.
pub async fn notify_settled_order<N: NotificationService>(dispatcher: &NotificationDispatcher<N>, event: &OrderSettledEvent) {
    if let Err(e) = dispatcher.notify(&event.order, &event.contact).await {
        warn!("📨 Order {} is settled, but its confirmation was not sent. {e}", event.order.id);
    }
}
