use chrono::{DateTime, Utc};

use crate::{
    db_types::{NewOrder, Order, OrderNumber},
    fg_api::order_objects::OrderQueryFilter,
    lifecycle::OrderTransition,
    traits::{data_objects::TransitionDetails, MarketplaceError},
};

/// The `OrderManagement` trait defines how orders are persisted and moved through their lifecycle.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Stores a new order in `PENDING` status.
    ///
    /// Stock for every item is reserved in the same atomic transaction as the order insert. If any item cannot be
    /// reserved, nothing is stored and no stock is reserved.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, MarketplaceError>;

    /// Fetches the order with the given internal id, including its items.
    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, MarketplaceError>;

    /// Fetches the order with the given order number, including its items.
    async fn fetch_order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, MarketplaceError>;

    /// Fetches orders matching the filter, oldest first. Items are not loaded.
    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, MarketplaceError>;

    /// Applies a validated status change, along with all of its side effects, in one atomic transaction:
    /// * the status is compare-and-set from `transition.from`. If the order is no longer in that state, the change
    ///   fails with [`MarketplaceError::InvalidStateTransition`] reported from the current state,
    /// * the transition timestamp is stamped,
    /// * the inventory action is applied to every item,
    /// * a `COMPLETED` payment is marked `REFUNDED` if the transition requires it.
    async fn transition_order(
        &self,
        order_id: i64,
        transition: OrderTransition,
        details: TransitionDetails,
    ) -> Result<Order, MarketplaceError>;

    /// Fetches all `PENDING` orders created before `cutoff`.
    async fn fetch_stale_pending_orders(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, MarketplaceError>;
}
