use std::time::Duration;

use actix_web::{
    dev::Server,
    error::{JsonPayloadError, QueryPayloadError},
    http::KeepAlive,
    middleware::Logger,
    web,
    App,
    HttpServer,
};
use farmgate_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    OrderFlowApi,
    PaymentReconciliationApi,
    QuoteApi,
    SqliteDatabase,
};
use log::*;

use crate::{config::ServerConfig, errors::ServerError, expiry_worker::start_expiry_worker, routes::configure_routes};

const EVENT_BUFFER_SIZE: usize = 25;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    if config.run_migrations {
        db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    } else {
        info!("🚀️ Skipping database migrations");
    }
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, logging_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let _worker = start_expiry_worker(
        db.clone(),
        producers.clone(),
        config.fees,
        config.inquiry_ttl,
        config.unpaid_order_timeout,
        config.expiry_sweep_interval,
    );
    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Hooks that record every marketplace event in the log. Notification services attach here.
fn logging_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks
        .on_order_paid(|ev| {
            Box::pin(async move {
                info!("🪝️ Order {} was paid. Total: {}", ev.order.order_number, ev.order.total);
            })
        })
        .on_order_status_changed(|ev| {
            Box::pin(async move {
                info!(
                    "🪝️ Order {} moved from {} to {} by {}",
                    ev.order.order_number, ev.old_status, ev.new_status, ev.changed_by
                );
            })
        })
        .on_inquiry_responded(|ev| {
            Box::pin(async move {
                info!("🪝️ Farm {} responded to inquiry {}", ev.inquiry.farm_id, ev.inquiry.inquiry_number);
            })
        });
    hooks
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let srv = HttpServer::new(move || {
        let orders_api = OrderFlowApi::new(db.clone(), producers.clone()).with_fee_schedule(config.fees);
        let quotes_api = QuoteApi::new(db.clone(), producers.clone())
            .with_inquiry_ttl(config.inquiry_ttl)
            .with_fee_schedule(config.fees);
        let payments_api =
            PaymentReconciliationApi::new(db.clone(), producers.clone(), config.payment.webhook_secret.clone())
                .with_tolerance(config.payment.signature_tolerance);
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("farmgate::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(quotes_api))
            .app_data(web::Data::new(payments_api))
            .app_data(json_config())
            .app_data(query_config())
            .configure(configure_routes::<SqliteDatabase>)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// Malformed JSON bodies are reported in the same shape as every other error.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err: JsonPayloadError, _req| {
        debug!("💻️ Could not deserialize request body. {err}");
        ServerError::InvalidRequestBody(err.to_string()).into()
    })
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err: QueryPayloadError, _req| {
        debug!("💻️ Could not deserialize query string. {err}");
        ServerError::InvalidRequestPath(err.to_string()).into()
    })
}
