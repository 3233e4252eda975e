use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use settlement_engine::{
    events::{EventHandlers, EventProducers},
    settlement_api::notifications::NotificationDispatcher,
    AdminApi,
    CheckoutApi,
    LedgerApi,
    SqliteDatabase,
};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    integrations::{create_notification_event_handlers, HttpNotificationService, HttpPaymentProcessor},
    middleware::AdminTokenMiddlewareFactory,
    routes::{
        health,
        CheckoutRoute,
        CheckoutSummaryRoute,
        InventoryRoute,
        OrderByIdRoute,
        RestockRoute,
        SellerStatementRoute,
        SetExchangeRateRoute,
        UpdateOrderStatusRoute,
        WalletRoute,
    },
};

const DB_MAX_CONNECTIONS: u32 = 25;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, DB_MAX_CONNECTIONS)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(format!("Database migrations failed. {e}")))?;
    let processor = HttpPaymentProcessor::new(&config.payment)?;
    let notifier = HttpNotificationService::new(&config.notifications)?;
    let producers = start_event_handlers(&config, notifier.clone()).await;
    let srv = create_server_instance(config, db, processor, notifier, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Starts the background event handlers and returns the producers that feed them.
///
/// When background notifications are enabled, order confirmations are sent from the `OrderSettled` handler. Otherwise
/// no handlers are needed and the checkout flow sends them itself.
pub async fn start_event_handlers(config: &ServerConfig, notifier: HttpNotificationService) -> EventProducers {
    if !config.background_notifications {
        return EventProducers::default();
    }
    let policy = config.checkout_config().notification_retry;
    let dispatcher = NotificationDispatcher::new(notifier).with_retry_policy(policy);
    let handlers: EventHandlers = create_notification_event_handlers(dispatcher);
    let producers = handlers.producers();
    handlers.start_handlers().await;
    info!("📬️ Order confirmations will be sent in the background");
    producers
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    processor: HttpPaymentProcessor,
    notifier: HttpNotificationService,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let checkout_api = CheckoutApi::new(
            db.clone(),
            processor.clone(),
            notifier.clone(),
            config.fee_schedule.clone(),
            config.checkout_config(),
            producers.clone(),
        );
        let ledger_api = LedgerApi::new(db.clone());
        let admin_api = AdminApi::new(db.clone(), producers.clone());
        let admin_scope = web::scope("/admin")
            .wrap(AdminTokenMiddlewareFactory::new(config.admin_token.clone()))
            .service(RestockRoute::<SqliteDatabase>::new())
            .service(SetExchangeRateRoute::<SqliteDatabase>::new())
            .service(UpdateOrderStatusRoute::<SqliteDatabase>::new());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("mkt::access_log"))
            .app_data(web::Data::new(checkout_api))
            .app_data(web::Data::new(ledger_api))
            .app_data(web::Data::new(admin_api))
            .service(health)
            .service(CheckoutRoute::<SqliteDatabase, HttpPaymentProcessor, HttpNotificationService>::new())
            .service(CheckoutSummaryRoute::<SqliteDatabase>::new())
            .service(OrderByIdRoute::<SqliteDatabase>::new())
            .service(WalletRoute::<SqliteDatabase>::new())
            .service(SellerStatementRoute::<SqliteDatabase>::new())
            .service(InventoryRoute::<SqliteDatabase>::new())
            .service(admin_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}
