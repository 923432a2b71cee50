use std::collections::HashMap;

use cucumber::World;
use farmgate_common::Secret;
use farmgate_engine::{
    db_types::{Inquiry, Order, Product},
    events::EventProducers,
    payment_objects::ReconciliationOutcome,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    MarketplaceError,
    OrderFlowApi,
    PaymentReconciliationApi,
    QuoteApi,
    SqliteDatabase,
};
use log::*;

pub const WEBHOOK_SECRET: &str = "whsec_cucumber";

#[derive(Default, Debug, World)]
pub struct MarketWorld {
    pub system: Option<MarketplaceSystem>,
    pub products: HashMap<String, Product>,
    pub last_order: Option<Order>,
    pub last_inquiry: Option<Inquiry>,
    pub last_outcome: Option<ReconciliationOutcome>,
    pub last_error: Option<MarketplaceError>,
    pub event_counter: u64,
}

#[derive(Debug)]
pub struct MarketplaceSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub orders: OrderFlowApi<SqliteDatabase>,
    pub payments: PaymentReconciliationApi<SqliteDatabase>,
    pub quotes: QuoteApi<SqliteDatabase>,
}

impl MarketWorld {
    pub fn system(&self) -> &MarketplaceSystem {
        self.system.as_ref().expect("Marketplace not initialised")
    }

    pub fn product(&self, name: &str) -> &Product {
        self.products.get(name).unwrap_or_else(|| panic!("Product {name} has not been listed"))
    }

    pub fn order(&self) -> &Order {
        self.last_order.as_ref().expect("No order has been placed")
    }

    pub fn inquiry(&self) -> &Inquiry {
        self.last_inquiry.as_ref().expect("No inquiry has been opened")
    }

    pub fn next_event_id(&mut self) -> String {
        self.event_counter += 1;
        format!("evt_{:04}", self.event_counter)
    }

    /// Records the outcome of an action. Errors are kept for later `Then` steps instead of failing the step.
    pub fn record<T>(&mut self, result: Result<T, MarketplaceError>) -> Option<T> {
        match result {
            Ok(value) => {
                self.last_error = None;
                Some(value)
            },
            Err(e) => {
                debug!("🚀️ Action failed: {e}");
                self.last_error = Some(e);
                None
            },
        }
    }
}

impl MarketplaceSystem {
    pub async fn new() -> Self {
        let url = random_db_path();
        let db = prepare_test_env(&url).await;
        debug!("🚀️ Created database: {url}");
        let producers = EventProducers::default();
        let orders = OrderFlowApi::new(db.clone(), producers.clone());
        let payments = PaymentReconciliationApi::new(db.clone(), producers.clone(), Secret::from(WEBHOOK_SECRET));
        let quotes = QuoteApi::new(db.clone(), producers);
        Self { db_path: url, db, orders, payments, quotes }
    }
}
