use std::time::Duration;

use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use serde_json::{json, Value};
use settlement_engine::{
    db_types::ProductId,
    events::EventProducers,
    fee_policy::FeeSchedule,
    helpers::RetryPolicy,
    test_utils::{
        mocks::{ChargeScript, RecordingNotifier, ScriptedProcessor},
        prepare_env::fresh_database,
    },
    AdminApi,
    CheckoutApi,
    CheckoutConfig,
    SqliteDatabase,
};

use super::helpers::send_request;
use crate::routes::CheckoutRoute;

type TestCheckoutApi = CheckoutApi<SqliteDatabase, ScriptedProcessor, RecordingNotifier>;

fn fast_config() -> CheckoutConfig {
    CheckoutConfig {
        payment_retry: RetryPolicy::new(2, Duration::from_millis(1)),
        notification_retry: RetryPolicy::immediate(2),
        settlement_retry: RetryPolicy::new(4, Duration::from_millis(1)),
        ..CheckoutConfig::default()
    }
}

/// A migrated database with 10 chairs and 10 lamps in stock, and a checkout API over it.
async fn stocked_api(processor: ScriptedProcessor) -> anyhow::Result<web::Data<TestCheckoutApi>> {
    let db = fresh_database().await;
    let admin = AdminApi::new(db.clone(), EventProducers::default());
    admin.restock(&ProductId::from("chair"), 10).await?;
    admin.restock(&ProductId::from("lamp"), 10).await?;
    let api = CheckoutApi::new(
        db,
        processor,
        RecordingNotifier::new(),
        FeeSchedule::default(),
        fast_config(),
        EventProducers::default(),
    );
    Ok(web::Data::new(api))
}

fn configure(api: web::Data<TestCheckoutApi>) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg: &mut ServiceConfig| {
        cfg.app_data(api)
            .service(CheckoutRoute::<SqliteDatabase, ScriptedProcessor, RecordingNotifier>::new());
    }
}

fn checkout_body(checkout_id: &str, chairs: u32) -> Value {
    json!({
        "checkout_id": checkout_id,
        "buyer_id": "alice",
        "cart": [
            { "product_id": "chair", "seller_id": "s1", "quantity": chairs, "unit_price": 100000, "category": "furniture" },
            { "product_id": "lamp", "seller_id": "s2", "quantity": 1, "unit_price": 50000, "category": "furniture" }
        ],
        "shipping": { "name": "Alice Buyer", "address": "1 Main St, Springfield", "email": "alice@example.com" }
    })
}

async fn post_checkout(api: web::Data<TestCheckoutApi>, body: &Value) -> (StatusCode, String) {
    let req = TestRequest::post().uri("/checkout").set_json(body);
    send_request(req, configure(api)).await
}

#[actix_web::test]
async fn settles_a_two_seller_checkout() -> anyhow::Result<()> {
    let api = stocked_api(ScriptedProcessor::new()).await?;
    let (status, body) = post_checkout(api, &checkout_body("chk-web-1", 2)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let outcome: Value = serde_json::from_str(&body)?;
    assert_eq!(outcome["already_settled"], json!(false));
    assert_eq!(outcome["order_ids"], json!(["chk-web-1-s1", "chk-web-1-s2"]));
    Ok(())
}

#[actix_web::test]
async fn resubmitted_checkout_is_not_charged_twice() -> anyhow::Result<()> {
    let processor = ScriptedProcessor::new();
    let api = stocked_api(processor.clone()).await?;
    let body = checkout_body("chk-web-2", 1);
    let (status, _) = post_checkout(api.clone(), &body).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, response) = post_checkout(api, &body).await;
    assert_eq!(status, StatusCode::OK, "{response}");
    let outcome: Value = serde_json::from_str(&response)?;
    assert_eq!(outcome["already_settled"], json!(true));
    assert_eq!(processor.charge_calls(), 1);
    Ok(())
}

#[actix_web::test]
async fn insufficient_stock_is_a_conflict() -> anyhow::Result<()> {
    let processor = ScriptedProcessor::new();
    let api = stocked_api(processor.clone()).await?;
    let (status, body) = post_checkout(api, &checkout_body("chk-web-3", 11)).await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
    assert!(body.contains("chair"), "{body}");
    assert_eq!(processor.charge_calls(), 0);
    Ok(())
}

#[actix_web::test]
async fn declined_payment_needs_payment() -> anyhow::Result<()> {
    let processor = ScriptedProcessor::with_script([ChargeScript::Decline("card_declined".into())]);
    let api = stocked_api(processor).await?;
    let (status, body) = post_checkout(api, &checkout_body("chk-web-4", 1)).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED, "{body}");
    assert!(body.contains("error"), "{body}");
    Ok(())
}

#[actix_web::test]
async fn malformed_checkouts_are_bad_requests() -> anyhow::Result<()> {
    let api = stocked_api(ScriptedProcessor::new()).await?;
    let mut body = checkout_body("chk-web-5", 1);
    body["shipping"]["email"] = json!("");
    let (status, response) = post_checkout(api.clone(), &body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{response}");

    let (status, _) = post_checkout(api, &json!({ "checkout_id": "chk-web-6" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[actix_web::test]
async fn cart_totals_that_overflow_are_bad_requests() -> anyhow::Result<()> {
    let processor = ScriptedProcessor::new();
    let api = stocked_api(processor.clone()).await?;
    let mut body = checkout_body("chk-web-7", 3);
    body["cart"][0]["unit_price"] = json!(i64::MAX / 2);
    let (status, response) = post_checkout(api, &body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{response}");
    assert!(response.contains("too large"), "{response}");
    assert_eq!(processor.charge_calls(), 0);
    Ok(())
}
