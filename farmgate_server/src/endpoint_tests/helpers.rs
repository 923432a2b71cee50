use actix_web::{http::StatusCode, test, test::TestRequest, web, web::ServiceConfig, App};
use farmgate_common::Secret;
use farmgate_engine::{
    db_types::{NewProduct, Product, Satang},
    events::EventProducers,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    InventoryManagement,
    MarketplaceDatabase,
    OrderFlowApi,
    PaymentReconciliationApi,
    QuoteApi,
    SqliteDatabase,
};
use log::*;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sqlx::{migrate::MigrateDatabase, Sqlite};

use crate::{
    auth::{ACTOR_ID_HEADER, ACTOR_ROLE_HEADER},
    routes::configure_routes,
    server::{json_config, query_config},
};

pub const WEBHOOK_SECRET: &str = "whsec_endpoint_tests";

/// A migrated database in the temp directory, with the same routes and APIs the server wires up.
pub struct TestMarket {
    pub db: SqliteDatabase,
    url: String,
}

impl TestMarket {
    pub async fn new() -> Self {
        let url = random_db_path();
        let db = prepare_test_env(&url).await;
        Self { db, url }
    }

    pub async fn add_product(&self, farm: &str, name: &str, price: i64, stock: i64) -> Product {
        let product = NewProduct::new(farm, name, Satang::from(price), stock);
        self.db.insert_product(product).await.expect("Error inserting product")
    }

    pub async fn add_wholesale_product(&self, farm: &str, name: &str, price: i64, stock: i64, moq: i64) -> Product {
        let product = NewProduct::new(farm, name, Satang::from(price), stock).with_moq(moq);
        self.db.insert_product(product).await.expect("Error inserting product")
    }

    pub fn configure(&self) -> impl FnOnce(&mut ServiceConfig) {
        let db = self.db.clone();
        move |cfg| {
            let producers = EventProducers::default();
            let orders = OrderFlowApi::new(db.clone(), producers.clone());
            let quotes = QuoteApi::new(db.clone(), producers.clone());
            let payments = PaymentReconciliationApi::new(db, producers, Secret::from(WEBHOOK_SECRET));
            cfg.app_data(web::Data::new(orders))
                .app_data(web::Data::new(quotes))
                .app_data(web::Data::new(payments))
                .app_data(json_config())
                .app_data(query_config());
            configure_routes::<SqliteDatabase>(cfg);
        }
    }

    /// Sends the request and returns the status and the body, parsed as JSON where possible.
    pub async fn send(&self, req: TestRequest) -> (StatusCode, Value) {
        let app = test::init_service(App::new().configure(self.configure())).await;
        let res = test::call_service(&app, req.to_request()).await;
        let status = res.status();
        let body = test::read_body(res).await;
        let body = serde_json::from_slice(&body).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into()));
        debug!("🚀️ Response {status}: {body}");
        (status, body)
    }

    /// Sends the request, asserts the status and deserializes the body.
    pub async fn send_expecting<T: DeserializeOwned>(&self, req: TestRequest, expected: StatusCode) -> T {
        let (status, body) = self.send(req).await;
        assert_eq!(status, expected, "Unexpected response: {body}");
        serde_json::from_value(body).expect("Response body has an unexpected shape")
    }

    pub async fn cleanup(self) {
        self.db.close().await;
        if let Err(e) = Sqlite::drop_database(&self.url).await {
            warn!("🚀️ Could not remove database {}: {e}", self.url);
        }
    }
}

pub fn as_actor(req: TestRequest, id: &str, role: &str) -> TestRequest {
    req.insert_header((ACTOR_ID_HEADER, id)).insert_header((ACTOR_ROLE_HEADER, role))
}

/// Asserts an error response with the given status and machine code.
pub fn assert_error(response: &(StatusCode, Value), status: StatusCode, code: &str) {
    assert_eq!(response.0, status, "Unexpected response: {}", response.1);
    assert_eq!(response.1["code"], code, "Unexpected error code: {}", response.1);
}
