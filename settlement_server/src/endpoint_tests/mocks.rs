use chrono::{TimeZone, Utc};
use mockall::mock;
use settlement_engine::{
    db_types::{
        CheckoutId,
        CheckoutRecord,
        ExchangeRate,
        InventoryRecord,
        LedgerEntry,
        Money,
        Order,
        OrderId,
        OrderItem,
        OrderStatusType,
        ProductId,
        SellerId,
        WalletRecord,
    },
    traits::{
        CommitOutcome,
        ExchangeRateError,
        ExchangeRates,
        InventoryManagement,
        LedgerQueries,
        SettlementPlan,
        SettlementStore,
        StoreError,
    },
};
use sqlx::types::Json;

mock! {
    pub Store {}
    impl Clone for Store {
        fn clone(&self) -> Self;
    }
    impl SettlementStore for Store {
        fn url(&self) -> &str;
        async fn fetch_orders_for_checkout(&self, checkout_id: &CheckoutId) -> Result<Vec<Order>, StoreError>;
        async fn fetch_stock_levels(&self, products: &[ProductId]) -> Result<Vec<InventoryRecord>, StoreError>;
        async fn commit_settlement(&self, plan: &SettlementPlan) -> Result<CommitOutcome, StoreError>;
        async fn update_order_status(&self, order_id: &OrderId, status: OrderStatusType) -> Result<(Order, Order), StoreError>;
    }
    impl LedgerQueries for Store {
        async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError>;
        async fn fetch_checkout(&self, checkout_id: &CheckoutId) -> Result<Option<CheckoutRecord>, StoreError>;
        async fn fetch_wallet(&self, seller_id: &SellerId) -> Result<Option<WalletRecord>, StoreError>;
        async fn fetch_ledger_for_seller(&self, seller_id: &SellerId) -> Result<Vec<LedgerEntry>, StoreError>;
        async fn fetch_ledger_for_checkout(&self, checkout_id: &CheckoutId) -> Result<Vec<LedgerEntry>, StoreError>;
    }
    impl InventoryManagement for Store {
        async fn fetch_inventory(&self, product_id: &ProductId) -> Result<Option<InventoryRecord>, StoreError>;
        async fn restock(&self, product_id: &ProductId, quantity: u32) -> Result<InventoryRecord, StoreError>;
    }
    impl ExchangeRates for Store {
        async fn fetch_last_rate(&self, currency: &str) -> Result<ExchangeRate, ExchangeRateError>;
        async fn set_exchange_rate(&self, rate: &ExchangeRate) -> Result<(), ExchangeRateError>;
    }
}

/// The chair order from checkout `chk-1`: 2 × 1000.00 at the default fees.
pub fn sample_order(status: OrderStatusType) -> Order {
    let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let item = OrderItem {
        product_id: "chair".into(),
        quantity: 2,
        unit_price: Money::from(100_000),
        category: "furniture".into(),
    };
    Order {
        id: OrderId::from("chk-1-s1"),
        checkout_id: CheckoutId::from("chk-1"),
        buyer_id: "alice".into(),
        seller_id: SellerId::from("s1"),
        items: Json(vec![item]),
        subtotal: Money::from(200_000),
        handling_fee: Money::from(10_000),
        buyer_protection_fee: Money::from(4_000),
        tax_fee: Money::from(15_000),
        admin_amount: Money::from(29_000),
        seller_amount: Money::from(171_000),
        currency: "USD".into(),
        charge_amount: Money::from(200_000),
        charge_currency: "USD".into(),
        payment_reference: "ch_chk-1".into(),
        status,
        created_at: ts,
        updated_at: ts,
    }
}

pub fn sample_inventory(product: &str, stock: i64) -> InventoryRecord {
    InventoryRecord {
        product_id: product.into(),
        stock,
        version: 3,
        updated_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
    }
}
