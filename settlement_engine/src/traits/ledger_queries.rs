use crate::{
    db_types::{CheckoutId, CheckoutRecord, LedgerEntry, Order, OrderId, SellerId, WalletRecord},
    traits::StoreError,
};

/// Read-only access to what settlement has written.
#[allow(async_fn_in_trait)]
pub trait LedgerQueries {
    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError>;

    async fn fetch_checkout(&self, checkout_id: &CheckoutId) -> Result<Option<CheckoutRecord>, StoreError>;

    /// The seller's wallet. Sellers that have never been credited have no wallet.
    async fn fetch_wallet(&self, seller_id: &SellerId) -> Result<Option<WalletRecord>, StoreError>;

    /// Ledger entries for the seller, oldest first.
    async fn fetch_ledger_for_seller(&self, seller_id: &SellerId) -> Result<Vec<LedgerEntry>, StoreError>;

    async fn fetch_ledger_for_checkout(&self, checkout_id: &CheckoutId) -> Result<Vec<LedgerEntry>, StoreError>;
}
