//! `SqliteDatabase` is a concrete implementation of a Farmgate marketplace engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module. Every trait method that changes more than one row opens its own transaction; the low-level functions in
//! [`super::db`] do the actual work.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::{migrate, SqlitePool};

use super::db::{db_url, inquiries, new_pool, orders, payments, products};
use crate::{
    db_types::{
        Inquiry,
        InquiryStatusType,
        NewInquiry,
        NewInquiryMessage,
        NewOrder,
        NewPayment,
        NewProduct,
        Order,
        OrderNumber,
        OrderStatusType,
        Payment,
        Product,
        Satang,
    },
    fg_api::order_objects::OrderQueryFilter,
    lifecycle::{InquiryTransition, OrderTransition},
    sqlite::db::inquiries::InquiryUpdate,
    traits::{
        InquiryManagement,
        InventoryManagement,
        MarketplaceDatabase,
        MarketplaceError,
        OrderManagement,
        PaymentManagement,
        PaymentSettlement,
        TransitionDetails,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl MarketplaceDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

impl InventoryManagement for SqliteDatabase {
    async fn insert_product(&self, product: NewProduct) -> Result<Product, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let product = products::insert_product(product, &mut tx).await?;
        tx.commit().await?;
        Ok(product)
    }

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::fetch_product(product_id, &mut conn).await?;
        Ok(product)
    }

    async fn fetch_products(&self, product_ids: &[i64]) -> Result<Vec<Product>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let products = products::fetch_products(product_ids, &mut conn).await?;
        Ok(products)
    }

    async fn reserve_stock(&self, product_id: i64, quantity: i64) -> Result<Product, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        products::reserve(product_id, quantity, &mut conn).await
    }

    async fn release_stock(&self, product_id: i64, quantity: i64) -> Result<Product, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        products::release(product_id, quantity, &mut conn).await
    }

    async fn confirm_stock(&self, product_id: i64, quantity: i64) -> Result<Product, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        products::confirm(product_id, quantity, &mut conn).await
    }

    async fn restock(&self, product_id: i64, quantity: i64) -> Result<Product, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        products::restock(product_id, quantity, &mut conn).await
    }
}

impl OrderManagement for SqliteDatabase {
    /// Reserves stock for every item and stores the order in a single atomic transaction. If any reservation fails,
    /// the transaction is dropped and every earlier reservation is rolled back with it.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::insert_order(order, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order {} committed with {} items reserved", order.order_number, order.items.len());
        Ok(order)
    }

    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_number(number, &mut conn).await?;
        Ok(order)
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::search_orders(query, &mut conn).await?;
        Ok(orders)
    }

    async fn transition_order(
        &self,
        order_id: i64,
        transition: OrderTransition,
        details: TransitionDetails,
    ) -> Result<Order, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::apply_transition(order_id, transition, details, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn fetch_stale_pending_orders(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_stale_pending_orders(cutoff, &mut conn).await?;
        Ok(orders)
    }
}

impl PaymentManagement for SqliteDatabase {
    async fn upsert_payment_attempt(&self, payment: NewPayment) -> Result<Payment, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        payments::upsert_attempt(payment, &mut conn).await
    }

    async fn fetch_payment_for_order(&self, order_id: i64) -> Result<Option<Payment>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::fetch_payment_for_order(order_id, &mut conn).await?;
        Ok(payment)
    }

    async fn fetch_payment_by_intent(&self, intent_id: &str) -> Result<Option<Payment>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::fetch_payment_by_intent(intent_id, &mut conn).await?;
        Ok(payment)
    }

    /// Takes a successful payment notification, and in a single atomic transaction,
    /// * marks the payment as `COMPLETED`. If it already was, nothing further is done.
    /// * moves the linked order from `PENDING` to `PAID`, if the order is still `PENDING`.
    async fn settle_payment(&self, intent_id: &str) -> Result<PaymentSettlement, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let Some(payment) = payments::complete(intent_id, &mut tx).await? else {
            let existing = payments::fetch_payment_by_intent(intent_id, &mut tx)
                .await?
                .ok_or_else(|| MarketplaceError::PaymentNotFound(intent_id.to_string()))?;
            debug!("🗃️ Payment {intent_id} is already {}. Nothing to settle", existing.status);
            return Ok(PaymentSettlement::AlreadySettled(existing));
        };
        let order = orders::fetch_order(payment.order_id, &mut tx)
            .await?
            .ok_or_else(|| MarketplaceError::OrderNotFound(payment.order_id.to_string()))?;
        let result = if order.status == OrderStatusType::Pending {
            let transition = order.status.transition_to(OrderStatusType::Paid, order.inventory_committed)?;
            let order = orders::apply_transition(order.id, transition, TransitionDetails::default(), &mut tx).await?;
            PaymentSettlement::Settled { payment, order }
        } else {
            warn!(
                "🗃️ Payment {intent_id} completed, but order {} is {} and cannot be paid",
                order.order_number, order.status
            );
            PaymentSettlement::OrderNotPayable { payment, order }
        };
        tx.commit().await?;
        Ok(result)
    }

    async fn fail_payment(&self, intent_id: &str) -> Result<(Payment, bool), MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        if let Some(payment) = payments::fail(intent_id, &mut conn).await? {
            return Ok((payment, true));
        }
        let existing = payments::fetch_payment_by_intent(intent_id, &mut conn)
            .await?
            .ok_or_else(|| MarketplaceError::PaymentNotFound(intent_id.to_string()))?;
        Ok((existing, false))
    }
}

impl InquiryManagement for SqliteDatabase {
    async fn insert_inquiry(&self, inquiry: NewInquiry) -> Result<Inquiry, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let inquiry = inquiries::insert_inquiry(inquiry, &mut tx).await?;
        tx.commit().await?;
        Ok(inquiry)
    }

    async fn fetch_inquiry(&self, inquiry_id: i64) -> Result<Option<Inquiry>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let inquiry = inquiries::fetch_inquiry(inquiry_id, &mut conn).await?;
        Ok(inquiry)
    }

    async fn append_inquiry_message(
        &self,
        inquiry_id: i64,
        expected: InquiryStatusType,
        transition: Option<InquiryTransition>,
        message: NewInquiryMessage,
        counter_price: Option<Satang>,
    ) -> Result<Inquiry, MarketplaceError> {
        let target = transition.map(|t| t.to).unwrap_or(expected);
        let update = InquiryUpdate { counter_price, ..Default::default() };
        let mut tx = self.pool.begin().await?;
        inquiries::update_status(inquiry_id, expected, target, update, &mut tx).await?;
        inquiries::insert_message(inquiry_id, message, &mut tx).await?;
        let inquiry = inquiries::fetch_inquiry(inquiry_id, &mut tx)
            .await?
            .ok_or(MarketplaceError::InquiryNotFound(inquiry_id))?;
        tx.commit().await?;
        Ok(inquiry)
    }

    async fn transition_inquiry(
        &self,
        inquiry_id: i64,
        transition: InquiryTransition,
        agreed_price: Option<Satang>,
    ) -> Result<Inquiry, MarketplaceError> {
        let update = InquiryUpdate { agreed_price, ..Default::default() };
        let mut tx = self.pool.begin().await?;
        let mut inquiry = inquiries::update_status(inquiry_id, transition.from, transition.to, update, &mut tx).await?;
        inquiry.messages = inquiries::fetch_messages(inquiry_id, &mut tx).await?;
        tx.commit().await?;
        Ok(inquiry)
    }

    async fn convert_inquiry(
        &self,
        inquiry_id: i64,
        transition: InquiryTransition,
        order: NewOrder,
    ) -> Result<(Inquiry, Order), MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        inquiries::update_status(inquiry_id, transition.from, transition.to, InquiryUpdate::default(), &mut tx)
            .await?;
        let order = orders::insert_order(order, &mut tx).await?;
        let mut inquiry = inquiries::link_order(inquiry_id, order.id, &mut tx).await?;
        inquiry.messages = inquiries::fetch_messages(inquiry_id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Inquiry {} converted into order {}", inquiry.inquiry_number, order.order_number);
        Ok((inquiry, order))
    }

    async fn expire_inquiries(&self, now: DateTime<Utc>) -> Result<Vec<Inquiry>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let expired = inquiries::expire_inquiries(now, &mut conn).await?;
        Ok(expired)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object, using the `FG_DATABASE_URL` environment variable (or the default URL).
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Runs the embedded schema migrations against this database.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
