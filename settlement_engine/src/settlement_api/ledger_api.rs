//! Read access to what settlement has written.
use std::fmt::Debug;

use log::trace;
use mkt_common::Money;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{CheckoutId, CheckoutRecord, InventoryRecord, LedgerEntry, Order, OrderId, ProductId, SellerId, WalletRecord},
    traits::{InventoryManagement, LedgerQueries, SettlementStore, StoreError},
};

/// Everything recorded about one checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSummary {
    pub checkout: CheckoutRecord,
    pub orders: Vec<Order>,
    pub ledger: Vec<LedgerEntry>,
}

/// A seller's wallet together with the ledger entries that explain its balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellerStatement {
    pub seller_id: SellerId,
    pub wallet: Option<WalletRecord>,
    pub entries: Vec<LedgerEntry>,
    /// Σ seller_amount over `entries`. Matches the wallet's available balance.
    pub total_credited: Money,
}

/// The `LedgerApi` provides a unified API for querying orders, wallets, inventory and the ledger.
pub struct LedgerApi<B> {
    db: B,
}

impl<B: Debug> Debug for LedgerApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LedgerApi ({:?})", self.db)
    }
}

impl<B> LedgerApi<B>
where B: SettlementStore + LedgerQueries + InventoryManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn order(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError> {
        self.db.fetch_order(order_id).await
    }

    pub async fn orders_for_checkout(&self, checkout_id: &CheckoutId) -> Result<Vec<Order>, StoreError> {
        self.db.fetch_orders_for_checkout(checkout_id).await
    }

    /// Fetches the checkout record with its orders and ledger entries. `None` if the checkout was never settled.
    pub async fn checkout_summary(&self, checkout_id: &CheckoutId) -> Result<Option<CheckoutSummary>, StoreError> {
        let Some(checkout) = self.db.fetch_checkout(checkout_id).await? else {
            return Ok(None);
        };
        let orders = self.db.fetch_orders_for_checkout(checkout_id).await?;
        let ledger = self.db.fetch_ledger_for_checkout(checkout_id).await?;
        Ok(Some(CheckoutSummary { checkout, orders, ledger }))
    }

    pub async fn wallet(&self, seller_id: &SellerId) -> Result<Option<WalletRecord>, StoreError> {
        self.db.fetch_wallet(seller_id).await
    }

    pub async fn seller_statement(&self, seller_id: &SellerId) -> Result<SellerStatement, StoreError> {
        let wallet = self.db.fetch_wallet(seller_id).await?;
        let entries = self.db.fetch_ledger_for_seller(seller_id).await?;
        let total_credited = entries.iter().map(|e| e.seller_amount).sum();
        trace!("Seller {seller_id} has {} ledger entries totalling {total_credited}", entries.len());
        Ok(SellerStatement { seller_id: seller_id.clone(), wallet, entries, total_credited })
    }

    pub async fn ledger_for_checkout(&self, checkout_id: &CheckoutId) -> Result<Vec<LedgerEntry>, StoreError> {
        self.db.fetch_ledger_for_checkout(checkout_id).await
    }

    pub async fn inventory(&self, product_id: &ProductId) -> Result<Option<InventoryRecord>, StoreError> {
        self.db.fetch_inventory(product_id).await
    }
}
