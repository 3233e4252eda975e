use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use mkt_common::Secret;
use serde_json::json;
use settlement_engine::{
    db_types::{OrderId, OrderStatusType},
    events::EventProducers,
    traits::StoreError,
    AdminApi,
};

use super::{
    helpers::send_request,
    mocks::{sample_inventory, sample_order, MockStore},
};
use crate::{
    middleware::{AdminTokenMiddlewareFactory, ADMIN_TOKEN_HEADER},
    routes::{RestockRoute, SetExchangeRateRoute, UpdateOrderStatusRoute},
};

const TOKEN: &str = "let-me-in";

fn configure(store: MockStore, token: &str) -> impl FnOnce(&mut ServiceConfig) {
    let token = Secret::new(token.to_string());
    move |cfg: &mut ServiceConfig| {
        let scope = web::scope("/admin")
            .wrap(AdminTokenMiddlewareFactory::new(token))
            .service(RestockRoute::<MockStore>::new())
            .service(SetExchangeRateRoute::<MockStore>::new())
            .service(UpdateOrderStatusRoute::<MockStore>::new());
        cfg.app_data(web::Data::new(AdminApi::new(store, EventProducers::default()))).service(scope);
    }
}

fn restock_request(quantity: u32) -> TestRequest {
    TestRequest::post().uri("/admin/inventory/chair/restock").set_json(json!({ "quantity": quantity }))
}

fn status_request(status: &str) -> TestRequest {
    TestRequest::patch().uri("/admin/orders/chk-1-s1/status").set_json(json!({ "status": status }))
}

#[actix_web::test]
async fn restock_needs_the_admin_token() {
    let _ = env_logger::try_init();
    let mut store = MockStore::new();
    store.expect_restock().never();
    let (status, body) = send_request(restock_request(5), configure(store, TOKEN)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "{body}");

    let mut store = MockStore::new();
    store.expect_restock().never();
    let req = restock_request(5).insert_header((ADMIN_TOKEN_HEADER, "let-me-out"));
    let (status, _) = send_request(req, configure(store, TOKEN)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn admin_routes_are_closed_without_a_configured_token() {
    let mut store = MockStore::new();
    store.expect_restock().never();
    let req = restock_request(5).insert_header((ADMIN_TOKEN_HEADER, ""));
    let (status, _) = send_request(req, configure(store, "")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn restock() {
    let mut store = MockStore::new();
    store
        .expect_restock()
        .withf(|product, quantity| product.as_str() == "chair" && *quantity == 5)
        .times(1)
        .returning(|_, _| Ok(sample_inventory("chair", 13)));
    let req = restock_request(5).insert_header((ADMIN_TOKEN_HEADER, TOKEN));
    let (status, body) = send_request(req, configure(store, TOKEN)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body.contains(r#""stock":13"#), "{body}");
}

#[actix_web::test]
async fn restocking_nothing_is_a_bad_request() {
    let mut store = MockStore::new();
    store.expect_restock().never();
    let req = restock_request(0).insert_header((ADMIN_TOKEN_HEADER, TOKEN));
    let (status, body) = send_request(req, configure(store, TOKEN)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
}

#[actix_web::test]
async fn set_exchange_rate() {
    let mut store = MockStore::new();
    store
        .expect_set_exchange_rate()
        .withf(|rate| rate.currency == "EUR" && rate.rate == 920_000)
        .times(1)
        .returning(|_| Ok(()));
    let req = TestRequest::post()
        .uri("/admin/exchange_rates")
        .insert_header((ADMIN_TOKEN_HEADER, TOKEN))
        .set_json(json!({ "currency": "EUR", "rate": 920_000 }));
    let (status, body) = send_request(req, configure(store, TOKEN)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body.contains(r#""success":true"#), "{body}");
}

#[actix_web::test]
async fn exchange_rates_need_a_currency_code() {
    let mut store = MockStore::new();
    store.expect_set_exchange_rate().never();
    let req = TestRequest::post()
        .uri("/admin/exchange_rates")
        .insert_header((ADMIN_TOKEN_HEADER, TOKEN))
        .set_json(json!({ "currency": "euro", "rate": 920_000 }));
    let (status, _) = send_request(req, configure(store, TOKEN)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn ship_an_order() {
    let mut store = MockStore::new();
    store
        .expect_update_order_status()
        .withf(|id, status| id.as_str() == "chk-1-s1" && *status == OrderStatusType::Shipped)
        .times(1)
        .returning(|_, _| Ok((sample_order(OrderStatusType::PendingApproval), sample_order(OrderStatusType::Shipped))));
    let req = status_request("shipped").insert_header((ADMIN_TOKEN_HEADER, TOKEN));
    let (status, body) = send_request(req, configure(store, TOKEN)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body.contains(r#""status":"shipped""#), "{body}");
}

#[actix_web::test]
async fn delivered_orders_cannot_be_cancelled() {
    let mut store = MockStore::new();
    store.expect_update_order_status().returning(|id: &OrderId, to| {
        Err(StoreError::ForbiddenStatusChange { order_id: id.clone(), from: OrderStatusType::Delivered, to })
    });
    let req = status_request("cancelled").insert_header((ADMIN_TOKEN_HEADER, TOKEN));
    let (status, body) = send_request(req, configure(store, TOKEN)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("cannot move from delivered to cancelled"), "{body}");
}

#[actix_web::test]
async fn anonymous_callers_cannot_change_order_status() {
    let mut store = MockStore::new();
    store.expect_update_order_status().never();
    let (status, body) = send_request(status_request("cancelled"), configure(store, TOKEN)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "{body}");

    // the old, unguarded path is gone
    let mut store = MockStore::new();
    store.expect_update_order_status().never();
    let req = TestRequest::patch().uri("/orders/chk-1-s1/status").set_json(json!({ "status": "cancelled" }));
    let (status, _) = send_request(req, configure(store, TOKEN)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
