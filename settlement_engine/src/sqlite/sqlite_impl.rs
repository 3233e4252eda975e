//! `SqliteDatabase` is the concrete settlement backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module. The low-level queries live in [`super::db`]; this type strings them together into the transactional units
//! that the traits promise.
use std::fmt::Debug;

use log::*;
use sqlx::SqlitePool;

use super::db::{checkouts, db_url, exchange_rates, inventory, ledger, new_pool, orders, payment_attempts, wallets};
use crate::{
    db_types::{
        CheckoutId,
        CheckoutRecord,
        ExchangeRate,
        InventoryRecord,
        LedgerEntry,
        Order,
        OrderId,
        OrderStatusType,
        PaymentAttempt,
        ProductId,
        SellerId,
        WalletRecord,
    },
    traits::{
        find_shortfalls,
        CommitOutcome,
        ExchangeRateError,
        ExchangeRates,
        InventoryManagement,
        LedgerQueries,
        PaymentAttempts,
        SettlementPlan,
        SettlementStore,
        StoreError,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SettlementStore for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn fetch_orders_for_checkout(&self, checkout_id: &CheckoutId) -> Result<Vec<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_orders_for_checkout(checkout_id, &mut conn).await?;
        Ok(orders)
    }

    async fn fetch_stock_levels(&self, products: &[ProductId]) -> Result<Vec<InventoryRecord>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let stock = inventory::fetch_stock_levels(products, &mut conn).await?;
        Ok(stock)
    }

    async fn commit_settlement(&self, plan: &SettlementPlan) -> Result<CommitOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;
        let existing = orders::fetch_orders_for_checkout(&plan.checkout_id, &mut tx).await?;
        if !existing.is_empty() {
            debug!("🗃️ Checkout {} already has {} orders. Nothing to do.", plan.checkout_id, existing.len());
            tx.rollback().await?;
            return Ok(CommitOutcome::AlreadySettled(existing));
        }
        // Reserving: re-read everything this unit will write
        let quantities = plan.quantities();
        let stock = inventory::fetch_stock_levels(&plan.product_ids(), &mut tx).await?;
        let shortfalls = find_shortfalls(&quantities, &stock);
        if !shortfalls.is_empty() {
            debug!("🗃️ Checkout {} cannot be settled. {} products are short.", plan.checkout_id, shortfalls.len());
            tx.rollback().await?;
            return Ok(CommitOutcome::InsufficientStock(shortfalls));
        }
        let sellers = plan.orders.iter().map(|o| o.seller_id.clone()).collect::<Vec<SellerId>>();
        let seen_wallets = wallets::fetch_wallets(&sellers, &mut tx).await?;

        // Committing: every write is conditional on what was read above
        for (product_id, quantity) in &quantities {
            let seen = stock
                .iter()
                .find(|r| &r.product_id == product_id)
                .ok_or_else(|| StoreError::NotFound(format!("inventory for {product_id}")))?;
            inventory::decrement_stock(seen, *quantity, &mut tx).await?;
        }
        for order in &plan.orders {
            let seen = seen_wallets.iter().find(|w| w.seller_id == order.seller_id);
            wallets::credit_wallet(&order.seller_id, seen, order.seller_amount(), &mut tx).await?;
        }
        let mut created = Vec::with_capacity(plan.orders.len());
        for order in &plan.orders {
            created.push(orders::insert_order(plan, order, &mut tx).await?);
            ledger::insert_entry(plan, order, &mut tx).await?;
        }
        checkouts::insert_checkout(plan, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Checkout {} committed with {} orders", plan.checkout_id, created.len());
        Ok(CommitOutcome::Settled(created))
    }

    async fn update_order_status(
        &self,
        order_id: &OrderId,
        status: OrderStatusType,
    ) -> Result<(Order, Order), StoreError> {
        let mut tx = self.pool.begin().await?;
        let old = orders::fetch_order(order_id, &mut tx)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("order {order_id}")))?;
        if !old.status.can_transition_to(status) {
            return Err(StoreError::ForbiddenStatusChange { order_id: order_id.clone(), from: old.status, to: status });
        }
        let new = orders::update_order_status(order_id, status, &mut tx)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("order {order_id}")))?;
        tx.commit().await?;
        info!("🗃️ Order {order_id} moved from {} to {}", old.status, new.status);
        Ok((old, new))
    }
}

impl InventoryManagement for SqliteDatabase {
    async fn fetch_inventory(&self, product_id: &ProductId) -> Result<Option<InventoryRecord>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let record = inventory::fetch_inventory(product_id, &mut conn).await?;
        Ok(record)
    }

    async fn restock(&self, product_id: &ProductId, quantity: u32) -> Result<InventoryRecord, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let record = inventory::restock(product_id, quantity, &mut conn).await?;
        Ok(record)
    }
}

impl LedgerQueries for SqliteDatabase {
    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_checkout(&self, checkout_id: &CheckoutId) -> Result<Option<CheckoutRecord>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let checkout = checkouts::fetch_checkout(checkout_id, &mut conn).await?;
        Ok(checkout)
    }

    async fn fetch_wallet(&self, seller_id: &SellerId) -> Result<Option<WalletRecord>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let wallet = wallets::fetch_wallet(seller_id, &mut conn).await?;
        Ok(wallet)
    }

    async fn fetch_ledger_for_seller(&self, seller_id: &SellerId) -> Result<Vec<LedgerEntry>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let entries = ledger::fetch_for_seller(seller_id, &mut conn).await?;
        Ok(entries)
    }

    async fn fetch_ledger_for_checkout(&self, checkout_id: &CheckoutId) -> Result<Vec<LedgerEntry>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let entries = ledger::fetch_for_checkout(checkout_id, &mut conn).await?;
        Ok(entries)
    }
}

impl PaymentAttempts for SqliteDatabase {
    async fn fetch_payment_attempt(&self, checkout_id: &CheckoutId) -> Result<Option<PaymentAttempt>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let attempt = payment_attempts::fetch_attempt(checkout_id, &mut conn).await?;
        Ok(attempt)
    }

    async fn record_payment_attempt(&self, attempt: &PaymentAttempt) -> Result<PaymentAttempt, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let recorded = payment_attempts::record_attempt(attempt, &mut conn).await?;
        Ok(recorded)
    }

    async fn mark_refunded(&self, checkout_id: &CheckoutId, reason: &str) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        if !payment_attempts::mark_refunded(checkout_id, reason, &mut conn).await? {
            warn!("🗃️ Checkout {checkout_id} has no successful payment to mark as refunded");
        }
        Ok(())
    }
}

impl ExchangeRates for SqliteDatabase {
    async fn fetch_last_rate(&self, currency: &str) -> Result<ExchangeRate, ExchangeRateError> {
        let mut conn = self.pool.acquire().await?;
        exchange_rates::fetch_last_rate(currency, &mut conn).await
    }

    async fn set_exchange_rate(&self, rate: &ExchangeRate) -> Result<(), ExchangeRateError> {
        let mut conn = self.pool.acquire().await?;
        exchange_rates::set_exchange_rate(rate, &mut conn).await?;
        info!("🗃️ Exchange rate updated: {rate}");
        Ok(())
    }
}

impl SqliteDatabase {
    /// Creates a new database API object, using `MKT_DATABASE_URL` or the default database path.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Applies any outstanding schema migrations.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }
}
