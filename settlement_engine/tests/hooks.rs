use std::{
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};

use log::*;
use settlement_engine::{
    db_types::{OrderId, OrderStatusType},
    events::{EventHandlers, EventHooks},
    helpers::RetryPolicy,
    notify_settled_order,
    settlement_api::notifications::NotificationDispatcher,
    test_utils::mocks::RecordingNotifier,
    NotificationMode,
};

use crate::support::{request, test_config, two_seller_cart, Marketplace};

mod support;

#[derive(Default, Clone)]
struct HookCalled {
    called: Arc<AtomicU32>,
}

impl HookCalled {
    fn called(&self) {
        self.called.fetch_add(1, Ordering::SeqCst);
    }

    fn count(&self) -> u32 {
        self.called.load(Ordering::SeqCst)
    }
}

async fn wait_for<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}

#[tokio::test]
async fn background_notifications_go_through_the_settled_hook() {
    let background = RecordingNotifier::new();
    let dispatcher = NotificationDispatcher::new(background.clone()).with_retry_policy(RetryPolicy::immediate(3));
    let mut hooks = EventHooks::default();
    hooks.on_order_settled(move |event| {
        let dispatcher = dispatcher.clone();
        Box::pin(async move {
            info!("🪝️ {}", event.order);
            notify_settled_order(&dispatcher, &event).await;
        })
    });
    let handlers = EventHandlers::new(16, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let mut config = test_config();
    config.notification_mode = NotificationMode::Background;
    let mkt = Marketplace::with_config(config, producers).await;
    mkt.stock("chair", 5).await;
    mkt.stock("lamp", 5).await;

    let outcome = mkt.checkout.checkout(request("chk-bg", two_seller_cart())).await.expect("checkout failed");
    assert!(outcome.warnings.is_empty());
    assert!(wait_for(|| background.sent().len() == 2).await, "background notifications were not sent");
    assert!(mkt.notifier.sent().is_empty());
    mkt.tear_down().await;
}

#[tokio::test]
async fn background_mode_without_a_handler_sends_inline() {
    let mut config = test_config();
    config.notification_mode = NotificationMode::Background;
    let mkt = Marketplace::with_config(config, Default::default()).await;
    mkt.stock("chair", 5).await;
    mkt.stock("lamp", 5).await;
    mkt.checkout.checkout(request("chk-inline", two_seller_cart())).await.expect("checkout failed");
    assert_eq!(mkt.notifier.sent().len(), 2);
    mkt.tear_down().await;
}

#[tokio::test]
async fn status_changes_are_published() {
    let event = HookCalled::default();
    let event_copy = event.clone();
    let mut hooks = EventHooks::default();
    hooks.on_status_changed(move |ev| {
        let event_copy = event_copy.clone();
        Box::pin(async move {
            info!("🪝️ {} went from {} to {}", ev.order.id, ev.old_status, ev.order.status);
            assert_eq!(ev.old_status, OrderStatusType::PendingApproval);
            event_copy.called();
        })
    });
    let handlers = EventHandlers::new(16, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let mkt = Marketplace::with_config(test_config(), producers).await;
    mkt.stock("chair", 5).await;
    mkt.stock("lamp", 5).await;
    mkt.checkout.checkout(request("chk-hook", two_seller_cart())).await.expect("checkout failed");
    mkt.admin.update_order_status(&OrderId::from("chk-hook-s1"), OrderStatusType::Shipped).await.expect("ship");
    mkt.admin.update_order_status(&OrderId::from("chk-hook-s2"), OrderStatusType::Cancelled).await.expect("cancel");
    assert!(wait_for(|| event.count() == 2).await, "status change hook was called {} times", event.count());
    mkt.tear_down().await;
}
