#![allow(dead_code)]
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use mkt_common::Money;
use settlement_engine::{
    db_types::{
        CartItem,
        CheckoutId,
        ExchangeRate,
        InventoryRecord,
        Order,
        OrderId,
        OrderStatusType,
        PaymentAttempt,
        ProductId,
        ShippingContact,
    },
    events::EventProducers,
    fee_policy::FeeSchedule,
    helpers::RetryPolicy,
    test_utils::{
        mocks::{RecordingNotifier, ScriptedProcessor},
        prepare_env::fresh_database,
    },
    traits::{
        CommitOutcome,
        ExchangeRateError,
        ExchangeRates,
        PaymentAttempts,
        SettlementPlan,
        SettlementStore,
        StoreError,
    },
    AdminApi,
    CheckoutApi,
    CheckoutConfig,
    CheckoutRequest,
    LedgerApi,
    SqliteDatabase,
};
use sqlx::{migrate::MigrateDatabase, Sqlite};

#[derive(Debug)]
pub struct Marketplace {
    pub db: SqliteDatabase,
    pub processor: ScriptedProcessor,
    pub notifier: RecordingNotifier,
    pub checkout: CheckoutApi<SqliteDatabase, ScriptedProcessor, RecordingNotifier>,
    pub ledger: LedgerApi<SqliteDatabase>,
    pub admin: AdminApi<SqliteDatabase>,
}

/// Retries that don't make the test suite slow.
pub fn test_config() -> CheckoutConfig {
    CheckoutConfig {
        payment_retry: RetryPolicy::new(3, Duration::from_millis(1)),
        notification_retry: RetryPolicy::new(4, Duration::from_millis(1)),
        settlement_retry: RetryPolicy::new(8, Duration::from_millis(5)),
        ..CheckoutConfig::default()
    }
}

impl Marketplace {
    pub async fn new() -> Self {
        Self::with_config(test_config(), EventProducers::default()).await
    }

    pub async fn with_config(config: CheckoutConfig, producers: EventProducers) -> Self {
        let db = fresh_database().await;
        let processor = ScriptedProcessor::new();
        let notifier = RecordingNotifier::new();
        let checkout = CheckoutApi::new(
            db.clone(),
            processor.clone(),
            notifier.clone(),
            FeeSchedule::default(),
            config,
            producers.clone(),
        );
        let ledger = LedgerApi::new(db.clone());
        let admin = AdminApi::new(db.clone(), producers);
        Self { db, processor, notifier, checkout, ledger, admin }
    }

    pub async fn stock(&self, product: &str, quantity: u32) {
        self.admin.restock(&ProductId::from(product), quantity).await.expect("Error restocking");
    }

    pub async fn stock_level(&self, product: &str) -> i64 {
        self.ledger.inventory(&ProductId::from(product)).await.expect("Error fetching inventory").map_or(0, |r| r.stock)
    }

    pub async fn available_balance(&self, seller: &str) -> Money {
        self.ledger
            .wallet(&seller.into())
            .await
            .expect("Error fetching wallet")
            .map(|w| w.available_balance)
            .unwrap_or_default()
    }

    pub async fn tear_down(self) {
        let url = self.db.url().to_string();
        self.db.close().await;
        Sqlite::drop_database(&url).await.ok();
    }
}

pub fn contact() -> ShippingContact {
    ShippingContact::new("Alice Buyer", "1 Main St, Springfield", "alice@example.com")
}

/// Two chairs from seller s1 at 1000.00 and one lamp from seller s2 at 500.00.
pub fn two_seller_cart() -> Vec<CartItem> {
    vec![
        CartItem::new("chair", "s1", 2, Money::from_major(1000), "furniture"),
        CartItem::new("lamp", "s2", 1, Money::from_major(500), "furniture"),
    ]
}

pub fn request(checkout_id: &str, cart: Vec<CartItem>) -> CheckoutRequest {
    CheckoutRequest {
        checkout_id: CheckoutId::from(checkout_id),
        buyer_id: "alice".to_string(),
        cart,
        shipping: contact(),
        currency: None,
    }
}

/// What [`FaultyStore`] does to the next settlement commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitFault {
    None,
    /// Every commit fails with a write conflict
    Conflict,
    /// Stalls before committing
    DelayBefore(Duration),
    /// Commits, then stalls before reporting back
    DelayAfter(Duration),
}

/// A SQLite store whose settlement commits can be made to conflict or stall.
#[derive(Debug, Clone)]
pub struct FaultyStore {
    pub db: SqliteDatabase,
    fault: Arc<Mutex<CommitFault>>,
}

impl FaultyStore {
    pub fn new(db: SqliteDatabase) -> Self {
        Self { db, fault: Arc::new(Mutex::new(CommitFault::None)) }
    }

    pub fn set_fault(&self, fault: CommitFault) {
        *self.fault.lock().expect("fault lock poisoned") = fault;
    }

    fn fault(&self) -> CommitFault {
        *self.fault.lock().expect("fault lock poisoned")
    }
}

impl SettlementStore for FaultyStore {
    fn url(&self) -> &str {
        self.db.url()
    }

    async fn fetch_orders_for_checkout(&self, checkout_id: &CheckoutId) -> Result<Vec<Order>, StoreError> {
        self.db.fetch_orders_for_checkout(checkout_id).await
    }

    async fn fetch_stock_levels(&self, products: &[ProductId]) -> Result<Vec<InventoryRecord>, StoreError> {
        self.db.fetch_stock_levels(products).await
    }

    async fn commit_settlement(&self, plan: &SettlementPlan) -> Result<CommitOutcome, StoreError> {
        match self.fault() {
            CommitFault::None => self.db.commit_settlement(plan).await,
            CommitFault::Conflict => Err(StoreError::Conflict("version mismatch on wallet s1".into())),
            CommitFault::DelayBefore(delay) => {
                tokio::time::sleep(delay).await;
                self.db.commit_settlement(plan).await
            },
            CommitFault::DelayAfter(delay) => {
                let outcome = self.db.commit_settlement(plan).await;
                tokio::time::sleep(delay).await;
                outcome
            },
        }
    }

    async fn update_order_status(
        &self,
        order_id: &OrderId,
        status: OrderStatusType,
    ) -> Result<(Order, Order), StoreError> {
        self.db.update_order_status(order_id, status).await
    }
}

impl PaymentAttempts for FaultyStore {
    async fn fetch_payment_attempt(&self, checkout_id: &CheckoutId) -> Result<Option<PaymentAttempt>, StoreError> {
        self.db.fetch_payment_attempt(checkout_id).await
    }

    async fn record_payment_attempt(&self, attempt: &PaymentAttempt) -> Result<PaymentAttempt, StoreError> {
        self.db.record_payment_attempt(attempt).await
    }

    async fn mark_refunded(&self, checkout_id: &CheckoutId, reason: &str) -> Result<(), StoreError> {
        self.db.mark_refunded(checkout_id, reason).await
    }
}

impl ExchangeRates for FaultyStore {
    async fn fetch_last_rate(&self, currency: &str) -> Result<ExchangeRate, ExchangeRateError> {
        self.db.fetch_last_rate(currency).await
    }

    async fn set_exchange_rate(&self, rate: &ExchangeRate) -> Result<(), ExchangeRateError> {
        self.db.set_exchange_rate(rate).await
    }
}

/// A [`Marketplace`] whose checkouts settle through a [`FaultyStore`].
pub struct FaultyMarketplace {
    pub mkt: Marketplace,
    pub store: FaultyStore,
    pub checkout: CheckoutApi<FaultyStore, ScriptedProcessor, RecordingNotifier>,
}

impl FaultyMarketplace {
    pub async fn new(config: CheckoutConfig) -> Self {
        let mkt = Marketplace::new().await;
        let store = FaultyStore::new(mkt.db.clone());
        let checkout = CheckoutApi::new(
            store.clone(),
            mkt.processor.clone(),
            mkt.notifier.clone(),
            FeeSchedule::default(),
            config,
            EventProducers::default(),
        );
        Self { mkt, store, checkout }
    }
}
