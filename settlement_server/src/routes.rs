//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Every handler here awaits the engine, which does all of its I/O
//! asynchronously, so a slow payment processor holds up only the checkout that is waiting for it.
//!
//! Handlers are generic over the backend so that the endpoint tests can swap in mocks. The backend bounds are
//! collected into the marker traits [`SettlementBackend`], [`LedgerBackend`] and [`AdminBackend`], which every type
//! with the right capabilities implements automatically.
use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use settlement_engine::{
    db_types::{CheckoutId, ExchangeRate, OrderId, ProductId, SellerId, WalletRecord},
    traits::{
        ExchangeRates,
        InventoryManagement,
        LedgerQueries,
        NotificationService,
        PaymentAttempts,
        PaymentProcessor,
        SettlementStore,
    },
    AdminApi,
    CheckoutApi,
    CheckoutRequest,
    LedgerApi,
};

use crate::{
    data_objects::{ExchangeRateUpdate, JsonResponse, RestockRequest, StatusUpdate},
    errors::ServerError,
};

/// Everything the checkout flow needs from its backend.
pub trait SettlementBackend: SettlementStore + PaymentAttempts + ExchangeRates {}
impl<T> SettlementBackend for T where T: SettlementStore + PaymentAttempts + ExchangeRates {}

/// Read access to orders, wallets, inventory and the ledger.
pub trait LedgerBackend: SettlementStore + LedgerQueries + InventoryManagement {}
impl<T> LedgerBackend for T where T: SettlementStore + LedgerQueries + InventoryManagement {}

/// Out-of-band operations: restocking, exchange rates and order fulfilment.
pub trait AdminBackend: SettlementStore + InventoryManagement + ExchangeRates {}
impl<T> AdminBackend for T where T: SettlementStore + InventoryManagement + ExchangeRates {}

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro.
// `route!(name => Method "/path" impl BoundA, BoundB)` registers the generic handler `name::<A, B>`, with one type
// parameter per bound, in the same order as the handler declares them.
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Checkout  ----------------------------------------------------
route!(checkout => Post "/checkout" impl SettlementBackend, PaymentProcessor, NotificationService);
/// Route handler for the checkout endpoint
///
/// The body is a [`CheckoutRequest`]. The `checkout_id` is the idempotency token: submitting the same checkout again
/// returns the orders created the first time, with `already_settled` set, and never charges the buyer twice. Clients
/// that get a 503 or a 504 back should retry with the same `checkout_id`.
///
/// Responds with `201 Created` and the new order ids when the checkout settles, or `200 OK` if it had already settled.
pub async fn checkout<B, P, N>(
    body: web::Json<CheckoutRequest>,
    api: web::Data<CheckoutApi<B, P, N>>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementBackend,
    P: PaymentProcessor,
    N: NotificationService,
{
    let request = body.into_inner();
    debug!("💻️ POST checkout {} for buyer {}", request.checkout_id, request.buyer_id);
    let outcome = api.checkout(request).await.map_err(|e| {
        info!("💻️ Checkout failed. {e}");
        ServerError::from(e)
    })?;
    if outcome.already_settled {
        Ok(HttpResponse::Ok().json(outcome))
    } else {
        Ok(HttpResponse::Created().json(outcome))
    }
}

route!(checkout_summary => Get "/checkout/{checkout_id}" impl LedgerBackend);
pub async fn checkout_summary<B: LedgerBackend>(
    path: web::Path<CheckoutId>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let checkout_id = path.into_inner();
    debug!("💻️ GET checkout {checkout_id}");
    let summary = api
        .checkout_summary(&checkout_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Checkout {checkout_id} has not been settled")))?;
    Ok(HttpResponse::Ok().json(summary))
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(order_by_id => Get "/orders/{order_id}" impl LedgerBackend);
pub async fn order_by_id<B: LedgerBackend>(
    path: web::Path<OrderId>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ GET order {order_id}");
    let order =
        api.order(&order_id).await?.ok_or_else(|| ServerError::NoRecordFound(format!("Order {order_id}")))?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Wallets & ledger  ----------------------------------------------
route!(wallet => Get "/wallets/{seller_id}" impl LedgerBackend);
/// Sellers that have never been credited have an empty wallet.
pub async fn wallet<B: LedgerBackend>(
    path: web::Path<SellerId>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let seller_id = path.into_inner();
    debug!("💻️ GET wallet for {seller_id}");
    let wallet = api.wallet(&seller_id).await?.unwrap_or_else(|| WalletRecord::empty(seller_id));
    Ok(HttpResponse::Ok().json(wallet))
}

route!(seller_statement => Get "/ledger/seller/{seller_id}" impl LedgerBackend);
pub async fn seller_statement<B: LedgerBackend>(
    path: web::Path<SellerId>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let seller_id = path.into_inner();
    debug!("💻️ GET ledger for {seller_id}");
    let statement = api.seller_statement(&seller_id).await?;
    Ok(HttpResponse::Ok().json(statement))
}

//----------------------------------------------   Inventory  ----------------------------------------------------
route!(inventory => Get "/inventory/{product_id}" impl LedgerBackend);
pub async fn inventory<B: LedgerBackend>(
    path: web::Path<ProductId>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let product_id = path.into_inner();
    debug!("💻️ GET inventory for {product_id}");
    let record = api
        .inventory(&product_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Product {product_id} has never been stocked")))?;
    Ok(HttpResponse::Ok().json(record))
}

//----------------------------------------------   Admin  ----------------------------------------------------
// These routes are mounted under `/admin`, behind the admin token middleware.
route!(restock => Post "/inventory/{product_id}/restock" impl AdminBackend);
pub async fn restock<B: AdminBackend>(
    path: web::Path<ProductId>,
    body: web::Json<RestockRequest>,
    api: web::Data<AdminApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let product_id = path.into_inner();
    let RestockRequest { quantity } = body.into_inner();
    info!("💻️ POST restock {product_id} with {quantity} units");
    let record = api.restock(&product_id, quantity).await?;
    Ok(HttpResponse::Ok().json(record))
}

route!(set_exchange_rate => Post "/exchange_rates" impl AdminBackend);
pub async fn set_exchange_rate<B: AdminBackend>(
    body: web::Json<ExchangeRateUpdate>,
    api: web::Data<AdminApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let rate: ExchangeRate = body.into_inner().into();
    info!("💻️ POST exchange rate {rate}");
    api.set_exchange_rate(&rate).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Exchange rate set: {rate}"))))
}

route!(update_order_status => Patch "/orders/{order_id}/status" impl AdminBackend);
/// Moves an order along the fulfilment workflow. The body is `{ "status": "shipped" }`.
///
/// Only `pending-approval → shipped → delivered` and cancellation before delivery are allowed. Anything else is a 400.
pub async fn update_order_status<B: AdminBackend>(
    path: web::Path<OrderId>,
    body: web::Json<StatusUpdate>,
    api: web::Data<AdminApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let StatusUpdate { status } = body.into_inner();
    debug!("💻️ PATCH order {order_id} status to {status}");
    let order = api.update_order_status(&order_id, status).await?;
    Ok(HttpResponse::Ok().json(order))
}
