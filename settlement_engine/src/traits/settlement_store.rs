use thiserror::Error;

use crate::{
    db_types::{CheckoutId, InventoryRecord, Order, OrderId, OrderStatusType, ProductId},
    traits::data_objects::{CommitOutcome, SettlementPlan},
};

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    /// A concurrent writer got there first: a version check failed, the database was busy, or a unique key was
    /// already taken. The unit of work was rolled back and can be retried.
    #[error("Write conflict: {0}")]
    Conflict(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Order {order_id} cannot move from {from} to {to}")]
    ForbiddenStatusChange { order_id: OrderId, from: OrderStatusType, to: OrderStatusType },
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

// SQLITE_BUSY and SQLITE_LOCKED, plus their extended codes
const BUSY_CODES: [&str; 4] = ["5", "6", "517", "262"];

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => StoreError::NotFound(e.to_string()),
            sqlx::Error::Database(ref db) => {
                let busy = db.code().map(|c| BUSY_CODES.contains(&c.as_ref())).unwrap_or(false);
                if busy || db.is_unique_violation() {
                    StoreError::Conflict(db.message().to_string())
                } else {
                    StoreError::DatabaseError(e.to_string())
                }
            },
            sqlx::Error::PoolTimedOut => StoreError::Conflict(e.to_string()),
            _ => StoreError::DatabaseError(e.to_string()),
        }
    }
}

/// The transactional contract that settlement runs against.
///
/// Implementations must never cache inventory or wallet state in memory. Every read goes to the store, and every write
/// made by [`SettlementStore::commit_settlement`] is conditional on the version that was read in the same transaction.
#[allow(async_fn_in_trait)]
pub trait SettlementStore: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    /// All orders that were created for the given checkout, in seller order. Empty if the checkout was never settled.
    async fn fetch_orders_for_checkout(&self, checkout_id: &CheckoutId) -> Result<Vec<Order>, StoreError>;

    /// Current stock levels for the given products. Products without an inventory record are omitted.
    async fn fetch_stock_levels(&self, products: &[ProductId]) -> Result<Vec<InventoryRecord>, StoreError>;

    /// Applies the whole plan in a single transaction:
    /// * If orders for the plan's checkout already exist, nothing is written and they are returned as
    ///   [`CommitOutcome::AlreadySettled`].
    /// * Every touched inventory and wallet record is re-read. If any product has too little stock, nothing is written
    ///   and [`CommitOutcome::InsufficientStock`] is returned.
    /// * Inventory is decremented and wallets are credited with version-checked conditional writes, and the orders,
    ///   ledger entries and checkout record are inserted.
    ///
    /// A failed conditional write, a busy database or a duplicate key rolls the transaction back and returns
    /// [`StoreError::Conflict`]. Retrying is up to the caller.
    async fn commit_settlement(&self, plan: &SettlementPlan) -> Result<CommitOutcome, StoreError>;

    /// Moves an order along the fulfilment workflow. Returns the order as it was before, and as it is now.
    async fn update_order_status(
        &self,
        order_id: &OrderId,
        status: OrderStatusType,
    ) -> Result<(Order, Order), StoreError>;
}
