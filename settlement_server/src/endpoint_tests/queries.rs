use actix_web::{http::StatusCode, web, web::ServiceConfig};
use serde_json::Value;
use settlement_engine::{db_types::OrderStatusType, traits::StoreError, LedgerApi};

use super::{
    helpers::get_request,
    mocks::{sample_inventory, sample_order, MockStore},
};
use crate::routes::{CheckoutSummaryRoute, InventoryRoute, OrderByIdRoute, SellerStatementRoute, WalletRoute};

fn configure(store: MockStore) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg: &mut ServiceConfig| {
        cfg.app_data(web::Data::new(LedgerApi::new(store)))
            .service(OrderByIdRoute::<MockStore>::new())
            .service(CheckoutSummaryRoute::<MockStore>::new())
            .service(WalletRoute::<MockStore>::new())
            .service(SellerStatementRoute::<MockStore>::new())
            .service(InventoryRoute::<MockStore>::new());
    }
}

#[actix_web::test]
async fn fetch_order() {
    let _ = env_logger::try_init();
    let mut store = MockStore::new();
    store
        .expect_fetch_order()
        .withf(|id| id.as_str() == "chk-1-s1")
        .returning(|_| Ok(Some(sample_order(OrderStatusType::PendingApproval))));
    let (status, body) = get_request("/orders/chk-1-s1", configure(store)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let order: Value = serde_json::from_str(&body).expect("order is not JSON");
    assert_eq!(order["status"], "pending-approval");
    assert_eq!(order["seller_id"], "s1");
    assert_eq!(order["admin_amount"], 29_000);
    assert_eq!(order["seller_amount"], 171_000);
}

#[actix_web::test]
async fn unknown_order() {
    let mut store = MockStore::new();
    store.expect_fetch_order().returning(|_| Ok(None));
    let (status, body) = get_request("/orders/nope", configure(store)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("nope"), "{body}");
}

#[actix_web::test]
async fn database_errors_are_internal() {
    let mut store = MockStore::new();
    store.expect_fetch_order().returning(|_| Err(StoreError::DatabaseError("disk on fire".into())));
    let (status, _) = get_request("/orders/chk-1-s1", configure(store)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[actix_web::test]
async fn unsettled_checkout() {
    let mut store = MockStore::new();
    store.expect_fetch_checkout().returning(|_| Ok(None));
    store.expect_fetch_orders_for_checkout().never();
    let (status, _) = get_request("/checkout/chk-9", configure(store)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn sellers_without_sales_have_an_empty_wallet() {
    let mut store = MockStore::new();
    store.expect_fetch_wallet().returning(|_| Ok(None));
    let (status, body) = get_request("/wallets/s7", configure(store)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let wallet: Value = serde_json::from_str(&body).expect("wallet is not JSON");
    assert_eq!(wallet["seller_id"], "s7");
    assert_eq!(wallet["available_balance"], 0);
}

#[actix_web::test]
async fn empty_seller_statement() {
    let mut store = MockStore::new();
    store.expect_fetch_wallet().returning(|_| Ok(None));
    store.expect_fetch_ledger_for_seller().returning(|_| Ok(vec![]));
    let (status, body) = get_request("/ledger/seller/s7", configure(store)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let statement: Value = serde_json::from_str(&body).expect("statement is not JSON");
    assert_eq!(statement["total_credited"], 0);
    assert_eq!(statement["entries"].as_array().map(Vec::len), Some(0));
}

#[actix_web::test]
async fn inventory_levels() {
    let mut store = MockStore::new();
    store.expect_fetch_inventory().withf(|p| p.as_str() == "chair").returning(|_| Ok(Some(sample_inventory("chair", 8))));
    store.expect_fetch_inventory().withf(|p| p.as_str() == "sofa").returning(|_| Ok(None));
    let store = web::Data::new(LedgerApi::new(store));
    let routes = |store: web::Data<LedgerApi<MockStore>>| {
        move |cfg: &mut ServiceConfig| {
            cfg.app_data(store).service(InventoryRoute::<MockStore>::new());
        }
    };
    let (status, body) = get_request("/inventory/chair", routes(store.clone())).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body.contains(r#""stock":8"#), "{body}");
    let (status, _) = get_request("/inventory/sofa", routes(store)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
