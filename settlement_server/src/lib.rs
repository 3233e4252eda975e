//! # Marketplace settlement server
//! This crate hosts the HTTP server for the marketplace settlement engine. It is responsible for:
//! * Accepting checkouts and handing them to the engine's checkout flow.
//! * Serving orders, wallets, seller ledgers and inventory.
//! * Out-of-band admin operations (restocking and exchange rates), guarded by an admin token.
//! * The HTTP clients for the payment processor and the notification service.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `POST /checkout`: Check out a cart.
//! * `GET /checkout/{checkout_id}`, `GET /orders/{order_id}`, `GET /wallets/{seller_id}`,
//!   `GET /ledger/seller/{seller_id}`, `GET /inventory/{product_id}`: Queries.
//! * `POST /admin/inventory/{product_id}/restock`, `POST /admin/exchange_rates`,
//!   `PATCH /admin/orders/{order_id}/status`: Admin operations, including fulfilment.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
