use cucumber::{given, then, when};
use mkt_common::Money;
use settlement_engine::{
    db_types::{CartItem, CheckoutId, ExchangeRate, OrderId, OrderStatusType, SellerId},
    traits::NotificationServiceError,
    CheckoutError,
};

use crate::{
    cucumber::{world::parse_money, MarketWorld},
    support::{request, Marketplace},
};

#[given("a fresh marketplace")]
async fn fresh_marketplace(world: &mut MarketWorld) {
    world.system = Some(Marketplace::new().await);
}

#[given(expr = "product {string} has {int} in stock")]
async fn stock_product(world: &mut MarketWorld, product: String, quantity: u32) {
    world.market().stock(&product, quantity).await;
}

#[given(expr = "the cart has {int} {string} from seller {string} at {word} in {string}")]
async fn add_to_cart(world: &mut MarketWorld, quantity: u32, product: String, seller: String, price: String, category: String) {
    world.cart.push(CartItem::new(product, seller, quantity, parse_money(&price), category));
}

#[given(expr = "the cart has {int} {string} with no seller at {word}")]
async fn add_sellerless_item(world: &mut MarketWorld, quantity: u32, product: String, price: String) {
    world.cart.push(CartItem::new(product, "", quantity, parse_money(&price), "misc").without_seller());
}

#[given(expr = "the buyer pays in {word}")]
async fn pay_in(world: &mut MarketWorld, currency: String) {
    world.currency = Some(currency);
}

#[given(expr = "the exchange rate for {word} is {int} millionths with {int} decimals")]
async fn set_rate(world: &mut MarketWorld, currency: String, rate: i64, decimals: i64) {
    world.market().admin.set_exchange_rate(&ExchangeRate::new(currency, rate, decimals)).await.expect("Error setting rate");
}

#[given(expr = "the notification service fails the next {int} deliveries")]
async fn notifications_fail(world: &mut MarketWorld, count: usize) {
    let failures = (0..count).map(|_| NotificationServiceError::Transient("mail server unavailable".into()));
    world.market().notifier.fail_next(failures);
}

#[given(expr = "the payment processor declines with {string}")]
async fn processor_declines(world: &mut MarketWorld, reason: String) {
    use settlement_engine::test_utils::mocks::ChargeScript;
    world.market().processor.push_script([ChargeScript::Decline(reason)]);
}

#[when(expr = "checkout {string} is submitted")]
async fn submit_checkout(world: &mut MarketWorld, checkout_id: String) {
    let mut req = request(&checkout_id, world.cart.clone());
    req.currency = world.currency.clone();
    let result = world.market().checkout.checkout(req).await;
    world.results.push(result);
}

#[when(expr = "order {string} is marked {word}")]
async fn mark_order(world: &mut MarketWorld, order_id: String, status: String) {
    let status = status.parse::<OrderStatusType>().expect("Invalid status");
    world.market().admin.update_order_status(&OrderId::from(order_id), status).await.expect("Error updating status");
}

#[then(expr = "the checkout succeeds with {int} orders")]
async fn checkout_succeeds(world: &mut MarketWorld, count: usize) {
    let outcome = world.last_outcome();
    assert_eq!(outcome.order_ids.len(), count, "Wrong number of orders");
    assert!(!outcome.already_settled, "Checkout was unexpectedly already settled");
}

#[then("the checkout reports that it was already settled")]
async fn already_settled(world: &mut MarketWorld) {
    assert!(world.last_outcome().already_settled);
    let first = world.results.first().and_then(|r| r.as_ref().ok()).expect("First checkout failed");
    assert_eq!(first.order_ids, world.last_outcome().order_ids, "Order ids differ between submissions");
}

#[then(expr = "the checkout warns {string}")]
async fn checkout_warns(world: &mut MarketWorld, warning: String) {
    assert_eq!(world.last_outcome().warnings, vec![warning]);
}

#[then("the checkout fails for insufficient stock")]
async fn fails_for_stock(world: &mut MarketWorld) {
    assert!(matches!(world.last_result(), Err(CheckoutError::InsufficientStock(_))), "{:?}", world.last_result());
}

#[then("the checkout fails because the payment was declined")]
async fn fails_for_decline(world: &mut MarketWorld) {
    assert!(matches!(world.last_result(), Err(CheckoutError::PaymentDeclined(_))), "{:?}", world.last_result());
}

#[then("the cart is rejected")]
async fn cart_rejected(world: &mut MarketWorld) {
    assert!(matches!(world.last_result(), Err(CheckoutError::Partition(_))), "{:?}", world.last_result());
}

#[then(expr = "the buyer was charged {word} {word}")]
async fn buyer_charged(world: &mut MarketWorld, amount: String, currency: String) {
    let charges = world.market().processor.charges();
    assert_eq!(charges.len(), 1, "Expected exactly one charge");
    assert_eq!(charges[0].amount, parse_money(&amount));
    assert_eq!(charges[0].currency, currency);
}

#[then("the buyer was not charged")]
async fn buyer_not_charged(world: &mut MarketWorld) {
    assert!(world.market().processor.charges().is_empty());
}

#[then(expr = "order {string} has admin amount {word} and seller amount {word}")]
async fn order_amounts(world: &mut MarketWorld, order_id: String, admin: String, seller: String) {
    let order = world
        .market()
        .ledger
        .order(&OrderId::from(order_id.clone()))
        .await
        .expect("Error fetching order")
        .unwrap_or_else(|| panic!("Order {order_id} does not exist"));
    assert_eq!(order.admin_amount, parse_money(&admin), "Admin amount is incorrect");
    assert_eq!(order.seller_amount, parse_money(&seller), "Seller amount is incorrect");
    assert_eq!(order.admin_amount + order.seller_amount, order.subtotal);
}

#[then(expr = "order {string} has status {word}")]
async fn order_status(world: &mut MarketWorld, order_id: String, status: String) {
    let order = world.market().ledger.order(&OrderId::from(order_id)).await.expect("Error fetching order");
    assert_eq!(order.map(|o| o.status.to_string()), Some(status));
}

#[then(expr = "seller {string} has a balance of {word}")]
async fn seller_balance(world: &mut MarketWorld, seller: String, amount: String) {
    assert_eq!(world.market().available_balance(&seller).await, parse_money(&amount));
}

#[then(expr = "seller {string} has no wallet")]
async fn seller_has_no_wallet(world: &mut MarketWorld, seller: String) {
    let wallet = world.market().ledger.wallet(&SellerId::from(seller)).await.expect("Error fetching wallet");
    assert!(wallet.is_none());
}

#[then(expr = "product {string} has {int} left in stock")]
async fn stock_left(world: &mut MarketWorld, product: String, quantity: i64) {
    assert_eq!(world.market().stock_level(&product).await, quantity);
}

#[then(expr = "checkout {string} has no orders")]
async fn no_orders(world: &mut MarketWorld, checkout_id: String) {
    let orders = world.market().ledger.orders_for_checkout(&CheckoutId::from(checkout_id)).await.expect("Error");
    assert!(orders.is_empty());
}

#[then(expr = "{int} confirmations were sent")]
async fn confirmations_sent(world: &mut MarketWorld, count: usize) {
    assert_eq!(world.market().notifier.sent().len(), count);
}

#[then(expr = "checkout {string} has a rounding adjustment of {int} minor units")]
async fn rounding_adjustment(world: &mut MarketWorld, checkout_id: String, adjustment: i64) {
    let summary = world
        .market()
        .ledger
        .checkout_summary(&CheckoutId::from(checkout_id))
        .await
        .expect("Error fetching checkout")
        .expect("Checkout was not settled");
    assert_eq!(summary.checkout.rounding_adjustment, Money::from(adjustment));
    let allocated: Money = summary.orders.iter().map(|o| o.charge_amount).sum();
    assert_eq!(allocated + summary.checkout.rounding_adjustment, summary.checkout.charge_amount);
}
