//! # Backing-store and collaborator contracts.
//!
//! The settlement engine never talks to a database, a payment processor or a mail service directly. It talks to the
//! traits in this module, and a backend (the SQLite one in [`crate::SqliteDatabase`], the HTTP clients in the server
//! crate, or the fakes in `test_utils`) implements them.
//!
//! ## Traits
//! * [`SettlementStore`] is the heart of it. It reads the state that settlement validates against and commits a
//!   whole [`SettlementPlan`] as one all-or-nothing unit.
//! * [`InventoryManagement`] exposes stock levels and the out-of-band restock operation.
//! * [`LedgerQueries`] provides read access to orders, wallets, checkouts and the ledger.
//! * [`PaymentAttempts`] records the terminal payment outcome of each checkout so that a re-driven checkout never
//!   charges the buyer twice.
//! * [`ExchangeRates`] is the rate table used by the currency normalizer.
//! * [`PaymentProcessor`] and [`NotificationService`] are the external collaborators.
mod data_objects;
mod exchange_rates;
mod inventory_management;
mod ledger_queries;
mod notification_service;
mod payment_attempts;
mod payment_processor;
mod settlement_store;

pub use data_objects::{aggregate_quantities, find_shortfalls, CommitOutcome, PlannedOrder, SettlementPlan, StockShortfall};
pub use exchange_rates::{ExchangeRateError, ExchangeRates};
pub use inventory_management::InventoryManagement;
pub use ledger_queries::LedgerQueries;
pub use notification_service::{NotificationAck, NotificationService, NotificationServiceError};
pub use payment_attempts::PaymentAttempts;
pub use payment_processor::{ChargeRequest, ChargeStatus, PaymentMetadata, PaymentProcessor, ProcessorCharge, ProcessorError};
pub use settlement_store::{SettlementStore, StoreError};
