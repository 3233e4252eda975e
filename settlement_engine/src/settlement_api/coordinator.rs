//! # Settlement transaction coordinator
//!
//! Settlement turns a paid-for checkout into orders, stock decrements, wallet credits and ledger entries. Either all
//! of that happens, or none of it does.
//!
//! A settlement moves through these states:
//!
//! ```text
//!   Validating ──► Reserving ──► Committing ──► Settled
//!       │              │
//!       └──────────────┴──► Aborted(reason)
//! ```
//!
//! * **Validating** reads current stock for every product (quantities summed across the whole checkout), checks that
//!   no seller ends up with a negative share, and reconciles the payment against the checkout. Nothing is written.
//! * **Reserving** and **Committing** happen inside a single store transaction
//!   ([`SettlementStore::commit_settlement`]). Lost races surface as [`StoreError::Conflict`]; the whole unit is
//!   retried with backoff up to a bounded number of attempts.
//!
//! There is no partially-settled state. A multi-seller checkout either settles for every seller or for none.
use std::{fmt::Display, time::Duration};

use log::*;
use mkt_common::Money;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{CheckoutId, Order, OrderId, ProductId},
    helpers::{retry_with_backoff, RetryPolicy},
    settlement_api::{
        errors::{AbortReason, SettlementError},
        payment_objects::PaymentResult,
    },
    traits::{find_shortfalls, ChargeStatus, CommitOutcome, SettlementPlan, SettlementStore, StoreError},
};

pub const DEFAULT_SETTLEMENT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementState {
    Validating,
    Reserving,
    Committing,
    Settled(Vec<OrderId>),
    Aborted(AbortReason),
}

impl Display for SettlementState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettlementState::Validating => write!(f, "Validating"),
            SettlementState::Reserving => write!(f, "Reserving"),
            SettlementState::Committing => write!(f, "Committing"),
            SettlementState::Settled(ids) => write!(f, "Settled ({} orders)", ids.len()),
            SettlementState::Aborted(reason) => write!(f, "Aborted ({reason})"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementOutcome {
    pub orders: Vec<Order>,
    /// True if the checkout had been settled before. Nothing was written this time.
    pub already_settled: bool,
}

impl SettlementOutcome {
    pub fn order_ids(&self) -> Vec<OrderId> {
        self.orders.iter().map(|o| o.id.clone()).collect()
    }
}

pub struct SettlementCoordinator<B> {
    db: B,
    policy: RetryPolicy,
    timeout: Duration,
}

impl<B: Clone> Clone for SettlementCoordinator<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), policy: self.policy, timeout: self.timeout }
    }
}

impl<B> SettlementCoordinator<B> {
    pub fn new(db: B) -> Self {
        let policy = RetryPolicy::new(DEFAULT_MAX_CONFLICT_RETRIES, Duration::from_millis(25));
        Self { db, policy, timeout: DEFAULT_SETTLEMENT_TIMEOUT }
    }

    /// The retry policy for write conflicts. `max_attempts` bounds the number of commit attempts.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl<B> SettlementCoordinator<B>
where B: SettlementStore
{
    /// Checks current stock against the requested quantities without writing anything.
    ///
    /// The checkout flow calls this before charging the buyer, so that carts that cannot possibly be settled are
    /// rejected up front. Stock can still run out between this check and the commit; the commit re-checks.
    pub async fn check_stock(&self, quantities: &[(ProductId, i64)]) -> Result<(), SettlementError> {
        let products = quantities.iter().map(|(p, _)| p.clone()).collect::<Vec<_>>();
        let stock = self.db.fetch_stock_levels(&products).await?;
        let shortfalls = find_shortfalls(quantities, &stock);
        if shortfalls.is_empty() {
            Ok(())
        } else {
            Err(AbortReason::InsufficientStock(shortfalls).into())
        }
    }

    /// The Validating state. `payment` must be the successful charge for exactly this plan.
    pub async fn validate(&self, plan: &SettlementPlan, payment: &PaymentResult) -> Result<(), SettlementError> {
        self.check_stock(&plan.quantities()).await?;
        check_fees(plan)?;
        reconcile_payment(plan, payment)?;
        Ok(())
    }

    /// Runs the full settlement state machine for `plan`, bounded by the settlement timeout.
    ///
    /// If the timeout elapses the outcome is unknown: the commit may or may not have landed. Re-driving the checkout
    /// with the same id is always safe, since a settled checkout is detected and returned as is.
    pub async fn settle(&self, plan: &SettlementPlan, payment: &PaymentResult) -> Result<SettlementOutcome, SettlementError> {
        match tokio::time::timeout(self.timeout, self.run(plan, payment)).await {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "⚖️ Settlement of checkout {} did not finish within {}ms. The outcome is unknown.",
                    plan.checkout_id,
                    self.timeout.as_millis()
                );
                Err(SettlementError::OutcomeUnknown(plan.checkout_id.clone()))
            },
        }
    }

    async fn run(&self, plan: &SettlementPlan, payment: &PaymentResult) -> Result<SettlementOutcome, SettlementError> {
        let checkout_id = &plan.checkout_id;
        let mut state = SettlementState::Validating;
        debug!("⚖️ Checkout {checkout_id}: {state}");
        if let Err(e) = self.validate(plan, payment).await {
            return Err(abort(checkout_id, state, e));
        }
        state = SettlementState::Reserving;
        debug!("⚖️ Checkout {checkout_id}: {state}");
        let committed = retry_with_backoff(&self.policy, "⚖️ Settlement commit", StoreError::is_conflict, move |attempt| {
            trace!("⚖️ Checkout {checkout_id}: {} attempt {attempt}", SettlementState::Committing);
            self.db.commit_settlement(plan)
        })
        .await;
        let outcome = match committed {
            Ok(CommitOutcome::Settled(orders)) => SettlementOutcome { orders, already_settled: false },
            Ok(CommitOutcome::AlreadySettled(orders)) => {
                info!("⚖️ Checkout {checkout_id} was already settled. Returning the existing orders.");
                SettlementOutcome { orders, already_settled: true }
            },
            Ok(CommitOutcome::InsufficientStock(shortfalls)) => {
                return Err(abort(checkout_id, state, AbortReason::InsufficientStock(shortfalls).into()));
            },
            Err(StoreError::Conflict(e)) => {
                warn!("⚖️ Checkout {checkout_id} kept conflicting with other checkouts. Last conflict: {e}");
                let reason = AbortReason::ConcurrencyExhausted(self.policy.max_attempts.max(1));
                return Err(abort(checkout_id, state, reason.into()));
            },
            Err(e) => return Err(e.into()),
        };
        let state = SettlementState::Settled(outcome.order_ids());
        info!("⚖️ Checkout {checkout_id}: {state}");
        Ok(outcome)
    }
}

fn abort(checkout_id: &CheckoutId, from: SettlementState, e: SettlementError) -> SettlementError {
    if let SettlementError::Aborted(reason) = &e {
        let state = SettlementState::Aborted(reason.clone());
        info!("⚖️ Checkout {checkout_id}: {from} ──► {state}");
    }
    e
}

fn check_fees(plan: &SettlementPlan) -> Result<(), AbortReason> {
    for order in &plan.orders {
        if order.seller_amount().is_negative() {
            return Err(AbortReason::FeePolicyViolation(format!(
                "fees of {} on order {} exceed its subtotal of {}",
                order.admin_amount(),
                order.order_id,
                order.subtotal
            )));
        }
    }
    Ok(())
}

fn reconcile_payment(plan: &SettlementPlan, payment: &PaymentResult) -> Result<(), AbortReason> {
    if payment.status != ChargeStatus::Succeeded {
        return Err(AbortReason::PaymentMismatch(format!("payment {} is {}", payment.reference, payment.status)));
    }
    if payment.reference != plan.payment_reference {
        return Err(AbortReason::PaymentMismatch(format!(
            "expected payment {}, got {}",
            plan.payment_reference, payment.reference
        )));
    }
    if payment.amount_charged != plan.charge_amount || !payment.currency.eq_ignore_ascii_case(&plan.charge_currency) {
        return Err(AbortReason::PaymentMismatch(format!(
            "charged {} {}, but the checkout comes to {} {}",
            payment.amount_charged, payment.currency, plan.charge_amount, plan.charge_currency
        )));
    }
    let allocated = plan.orders.iter().map(|o| o.charge_amount).sum::<Money>() + plan.rounding_adjustment;
    if allocated != plan.charge_amount {
        return Err(AbortReason::PaymentMismatch(format!(
            "order charges add up to {allocated}, but the charge is {}",
            plan.charge_amount
        )));
    }
    Ok(())
}
