//! # Settlement engine public API
//!
//! The `settlement_api` module exposes the programmatic API of the settlement engine. The API is modular, so that
//! clients can pick the parts they need.
//!
//! * [`checkout_api`] is the primary API. It takes a buyer's cart through partitioning, fees, payment, settlement and
//!   notification.
//! * [`coordinator`] runs the all-or-nothing settlement state machine.
//! * [`payment_gateway`] wraps a payment processor with timeouts and bounded retries.
//! * [`notifications`] sends order confirmations.
//! * [`currency`] converts canonical prices into the buyer's currency.
//! * [`ledger_api`] and [`admin_api`] provide queries and out-of-band operations (restocking, exchange rates and
//!   order fulfilment).
//!
//! # API usage
//!
//! An API instance is created by supplying a backend that implements the traits the API needs.
//!
//! ```rust,ignore
//! use settlement_engine::{LedgerApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! // SqliteDatabase implements LedgerQueries
//! let api = LedgerApi::new(db);
//! let wallet = api.wallet(&seller_id).await?;
//! ```
pub mod admin_api;
pub mod checkout_api;
pub mod checkout_objects;
pub mod coordinator;
pub mod currency;
pub mod errors;
pub mod ledger_api;
pub mod notifications;
pub mod payment_gateway;
pub mod payment_objects;
