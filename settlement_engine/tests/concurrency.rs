use std::time::Duration;

use futures_util::future::join_all;
use log::*;
use mkt_common::Money;
use settlement_engine::{db_types::CartItem, events::EventProducers, helpers::RetryPolicy, CheckoutError};

use crate::support::{request, test_config, Marketplace};

mod support;

const BUYERS: usize = 12;
const STOCK: u32 = 5;

async fn contended_marketplace() -> Marketplace {
    let mut config = test_config();
    config.settlement_retry =
        RetryPolicy { max_attempts: 25, base_delay: Duration::from_millis(2), max_delay: Duration::from_millis(40) };
    Marketplace::with_config(config, EventProducers::default()).await
}

#[tokio::test]
async fn simultaneous_checkouts_never_oversell() {
    let mkt = contended_marketplace().await;
    mkt.stock("widget", STOCK).await;

    let cart = || vec![CartItem::new("widget", "s1", 1, Money::from_major(10), "gadgets")];
    let checkouts = (0..BUYERS).map(|i| mkt.checkout.checkout(request(&format!("chk-{i}"), cart())));
    let results = join_all(checkouts).await;

    let mut settled = 0;
    for result in &results {
        match result {
            Ok(outcome) => {
                assert_eq!(outcome.order_ids.len(), 1);
                settled += 1;
            },
            Err(CheckoutError::InsufficientStock(_)) => {},
            Err(e) => panic!("Unexpected checkout error: {e}"),
        }
    }
    info!("🚀️ {settled} of {BUYERS} checkouts settled");
    assert_eq!(settled, STOCK as usize);
    let remaining = mkt.stock_level("widget").await;
    assert!(remaining >= 0);
    assert_eq!(remaining, i64::from(STOCK) - settled as i64);
    // 10.00 less 14.5% in fees, once per settled checkout
    assert_eq!(mkt.available_balance("s1").await, Money::from(855) * settled as i64);
    mkt.tear_down().await;
}

#[tokio::test]
async fn concurrent_retries_of_one_checkout_settle_once() {
    let mkt = contended_marketplace().await;
    mkt.stock("widget", 10).await;
    let cart = || vec![CartItem::new("widget", "s1", 2, Money::from_major(10), "gadgets")];
    let attempts = (0..4).map(|_| mkt.checkout.checkout(request("chk-same", cart())));
    let results = join_all(attempts).await;

    let outcomes = results.into_iter().collect::<Result<Vec<_>, _>>().expect("every attempt succeeds");
    assert!(outcomes.iter().all(|o| o.order_ids == outcomes[0].order_ids));
    assert_eq!(outcomes.iter().filter(|o| !o.already_settled).count(), 1);
    assert_eq!(mkt.stock_level("widget").await, 8);
    assert_eq!(mkt.available_balance("s1").await, Money::from(1710));
    mkt.tear_down().await;
}
