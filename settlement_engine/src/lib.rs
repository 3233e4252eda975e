//! Marketplace Settlement Engine
//!
//! The settlement engine turns a buyer's cart, which may hold goods from several independent sellers, into durable
//! per-seller orders. Along the way it computes each seller's fees, charges the buyer through a payment processor,
//! takes the goods out of stock, credits the sellers' wallets and writes an append-only ledger, all as one
//! all-or-nothing unit, and then sends order confirmations.
//!
//! The library is divided into these sections:
//! 1. Pure domain logic: [`mod@db_types`], the [`mod@fee_policy`] and the cart [`mod@partitioner`].
//! 2. The contracts that backends and external collaborators implement ([`mod@traits`]), and the SQLite backend that
//!    implements the storage ones ([`SqliteDatabase`]).
//! 3. The public API ([`mod@settlement_api`]). [`CheckoutApi`] drives the whole checkout flow; [`LedgerApi`] and
//!    [`AdminApi`] cover queries and out-of-band operations.
//!
//! The engine also provides a set of events that can be subscribed to ([`mod@events`]). An `OrderSettled` event is
//! emitted for every settled sub-order, and an `OrderStatusChanged` event whenever fulfilment moves an order along.
pub mod db_types;
pub mod events;
pub mod fee_policy;
pub mod helpers;
pub mod partitioner;
pub mod settlement_api;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use settlement_api::{
    admin_api::{AdminApi, AdminApiError},
    checkout_api::{notify_settled_order, CheckoutApi},
    checkout_objects::{CheckoutConfig, CheckoutOutcome, CheckoutRequest, NotificationMode},
    errors::{AbortReason, CheckoutError, NormalizerError, NotificationError, PaymentError, SettlementError},
    ledger_api::{CheckoutSummary, LedgerApi, SellerStatement},
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
