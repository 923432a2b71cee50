use std::{collections::BTreeSet, fmt::Debug};

use chrono::{Duration, Utc};
use log::*;

use crate::{
    db_types::{Actor, DeliveryMethod, NewOrder, NewOrderItem, NewPayment, Order, OrderNumber, OrderStatusType, Payment, Role},
    events::{EventProducers, OrderPaidEvent, OrderStatusChangedEvent},
    fg_api::order_objects::{Cart, FeeSchedule, OrderQueryFilter},
    helpers::new_order_number,
    lifecycle::InvalidTransition,
    traits::{MarketplaceDatabase, MarketplaceError, SweepResult, TransitionDetails},
};

/// `OrderFlowApi` is the primary API for placing orders and moving them through their lifecycle.
///
/// Every method takes the [`Actor`] on whose behalf it runs. Buyers and farms may only see and act on their own
/// orders; admins and the system may act on any order.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
    fees: FeeSchedule,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi ({:?})", self.fees)
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers, fees: FeeSchedule::default() }
    }

    pub fn with_fee_schedule(mut self, fees: FeeSchedule) -> Self {
        self.fees = fees;
        self
    }

    pub fn fee_schedule(&self) -> &FeeSchedule {
        &self.fees
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

/// Which target statuses a role may request. Ownership is checked separately.
///
/// `PAID` is reserved for payment reconciliation (`SYSTEM`) and manual overrides (`ADMIN`).
pub fn role_may_request(role: Role, target: OrderStatusType) -> bool {
    use OrderStatusType::*;
    match role {
        Role::Admin | Role::System => true,
        Role::Buyer => matches!(target, Cancelled | Delivered),
        Role::Farm => matches!(target, Confirmed | Preparing | Shipped | Delivered | Cancelled | Refunded),
    }
}

/// Adds delivery and platform fees to a new order, rejecting orders whose total would overflow.
pub(crate) fn apply_fees(order: NewOrder, fees: &FeeSchedule) -> Result<NewOrder, MarketplaceError> {
    let largest_quantity = order.items.iter().map(|i| i.quantity).max().unwrap_or_default();
    let subtotal = order.checked_subtotal().ok_or(MarketplaceError::InvalidQuantity(largest_quantity))?;
    let delivery_fee = fees.delivery_fee(order.delivery_method);
    let platform_fee = fees.platform_fee(subtotal);
    let order = order.with_fees(delivery_fee, platform_fee);
    match order.checked_total() {
        Some(_) => Ok(order),
        None => Err(MarketplaceError::InvalidQuantity(largest_quantity)),
    }
}

pub(crate) fn ensure_owner(actor: &Actor, order: &Order) -> Result<(), MarketplaceError> {
    if actor.owns(&order.buyer_id, &order.farm_id) {
        Ok(())
    } else {
        Err(MarketplaceError::ForbiddenAccess(format!("{actor} may not access order {}", order.order_number)))
    }
}

impl<B> OrderFlowApi<B>
where B: MarketplaceDatabase
{
    /// Places a new order for the buyer from the contents of their cart.
    ///
    /// * Lines for the same product are merged.
    /// * Every product must exist and belong to the same farm. Carts spanning several farms are rejected before any
    ///   stock is reserved.
    /// * Unit prices come from each product's tier schedule (or its retail price).
    /// * Delivery and platform fees are added according to the fee schedule.
    ///
    /// Stock for every item is reserved in the same transaction that stores the order. If any item is short, nothing
    /// is reserved and [`MarketplaceError::InsufficientStock`] is returned.
    pub async fn place_order(&self, actor: &Actor, cart: Cart) -> Result<Order, MarketplaceError> {
        if actor.role != Role::Buyer {
            return Err(MarketplaceError::ForbiddenAccess(format!("{actor} cannot place orders")));
        }
        let lines = cart.merged_items()?;
        if lines.is_empty() {
            return Err(MarketplaceError::EmptyCart);
        }
        if let Some(bad) = lines.iter().find(|l| l.quantity <= 0) {
            return Err(MarketplaceError::InvalidQuantity(bad.quantity));
        }
        let ids = lines.iter().map(|l| l.product_id).collect::<Vec<_>>();
        let products = self.db.fetch_products(&ids).await?;
        let farms = products.iter().map(|p| p.farm_id.clone()).collect::<BTreeSet<String>>();
        if farms.len() > 1 {
            warn!("📦️ {actor} tried to order from {} farms in one cart", farms.len());
            return Err(MarketplaceError::MultiFarmCart(farms.into_iter().collect()));
        }
        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let product = products
                .iter()
                .find(|p| p.id == line.product_id)
                .ok_or(MarketplaceError::ProductNotFound(line.product_id))?;
            // The reservation itself is still guarded in the database
            if line.quantity > product.available_stock() {
                return Err(MarketplaceError::InsufficientStock {
                    product_id: product.id,
                    requested: line.quantity,
                    available: product.available_stock(),
                });
            }
            items.push(NewOrderItem::new(product.id, line.quantity, product.unit_price_for(line.quantity)));
        }
        let farm_id = farms.into_iter().next().ok_or(MarketplaceError::EmptyCart)?;
        let order = self.priced_order(actor.id.clone(), farm_id, cart.delivery_method, items)?;
        let order = self.db.insert_order(order).await?;
        info!(
            "📦️ Order {} placed by {actor} with farm {} for {} ({} items)",
            order.order_number,
            order.farm_id,
            order.total,
            order.items.len()
        );
        Ok(order)
    }

    /// Builds a new order with fees applied from the schedule. Fails with [`MarketplaceError::InvalidQuantity`] if the
    /// order total cannot be represented.
    pub(crate) fn priced_order(
        &self,
        buyer_id: String,
        farm_id: String,
        delivery_method: DeliveryMethod,
        items: Vec<NewOrderItem>,
    ) -> Result<NewOrder, MarketplaceError> {
        let now = Utc::now();
        let mut order = NewOrder::new(new_order_number(now), buyer_id, farm_id).with_delivery_method(delivery_method);
        order.created_at = now;
        order.items = items;
        apply_fees(order, &self.fees)
    }

    pub async fn fetch_order(&self, actor: &Actor, order_id: i64) -> Result<Order, MarketplaceError> {
        let order =
            self.db.fetch_order(order_id).await?.ok_or_else(|| MarketplaceError::OrderNotFound(order_id.to_string()))?;
        ensure_owner(actor, &order)?;
        Ok(order)
    }

    pub async fn fetch_order_by_number(&self, actor: &Actor, number: &OrderNumber) -> Result<Order, MarketplaceError> {
        let order = self
            .db
            .fetch_order_by_number(number)
            .await?
            .ok_or_else(|| MarketplaceError::OrderNotFound(number.to_string()))?;
        ensure_owner(actor, &order)?;
        Ok(order)
    }

    /// Searches orders. Buyers only ever see their own orders, and farms only the orders placed with them, whatever
    /// the filter says.
    pub async fn search_orders(&self, actor: &Actor, query: OrderQueryFilter) -> Result<Vec<Order>, MarketplaceError> {
        let query = match actor.role {
            Role::Buyer => query.with_buyer_id(actor.id.clone()),
            Role::Farm => query.with_farm_id(actor.id.clone()),
            Role::Admin | Role::System => query,
        };
        trace!("📦️ Searching orders for {actor}: {query}");
        self.db.search_orders(query).await
    }

    /// Requests a status change for an order.
    ///
    /// The checks run in this order:
    /// 1. The order must exist ([`MarketplaceError::OrderNotFound`]).
    /// 2. The actor must own the order, and its role must be allowed to request the target status
    ///    ([`MarketplaceError::ForbiddenAccess`]).
    /// 3. The change must be an edge of the order lifecycle ([`MarketplaceError::InvalidStateTransition`]).
    /// 4. Courier orders need a tracking number to ship ([`MarketplaceError::MissingTrackingReference`]).
    ///
    /// The status write and its inventory side effects are applied in one transaction. Events are published once the
    /// change has been committed.
    pub async fn update_order_status(
        &self,
        actor: &Actor,
        order_id: i64,
        target: OrderStatusType,
        details: TransitionDetails,
    ) -> Result<Order, MarketplaceError> {
        let order = self.fetch_order(actor, order_id).await?;
        if !role_may_request(actor.role, target) {
            return Err(MarketplaceError::ForbiddenAccess(format!("{} may not move orders to {target}", actor.role)));
        }
        let transition = order.status.transition_to(target, order.inventory_committed)?;
        let has_tracking = details.tracking_number.as_ref().map(|t| !t.trim().is_empty()).unwrap_or(false);
        if target == OrderStatusType::Shipped && order.delivery_method == DeliveryMethod::Courier && !has_tracking {
            return Err(MarketplaceError::MissingTrackingReference(order.order_number));
        }
        let old_status = order.status;
        let updated = self.db.transition_order(order.id, transition, details).await?;
        info!("📦️ Order {} moved from {old_status} to {} by {actor}", updated.order_number, updated.status);
        self.notify_status_change(updated.clone(), old_status, actor.clone()).await;
        Ok(updated)
    }

    pub async fn cancel_order(&self, actor: &Actor, order_id: i64, reason: &str) -> Result<Order, MarketplaceError> {
        let details = TransitionDetails::default().with_reason(reason);
        self.update_order_status(actor, order_id, OrderStatusType::Cancelled, details).await
    }

    pub async fn refund_order(&self, actor: &Actor, order_id: i64, reason: &str) -> Result<Order, MarketplaceError> {
        let details = TransitionDetails::default().with_reason(reason);
        self.update_order_status(actor, order_id, OrderStatusType::Refunded, details).await
    }

    pub(crate) async fn notify_status_change(&self, order: Order, old_status: OrderStatusType, actor: Actor) {
        if order.status == OrderStatusType::Paid {
            debug!("📦️ Notifying order paid hook subscribers");
            self.producers.publish_order_paid(OrderPaidEvent::new(order.clone())).await;
        }
        self.producers.publish_order_status_changed(OrderStatusChangedEvent::new(order, old_status, actor)).await;
    }

    /// Cancels every `PENDING` order that was created more than `timeout` ago. Orders that move on while the sweep
    /// runs (e.g. a payment lands) are skipped.
    pub async fn cancel_stale_orders(&self, timeout: Duration) -> Result<SweepResult<Order>, MarketplaceError> {
        let now = Utc::now();
        let stale = self.db.fetch_stale_pending_orders(now - timeout).await?;
        let system = Actor::system();
        let reason = format!("Payment was not received within {} hours", timeout.num_hours());
        let mut cancelled = Vec::with_capacity(stale.len());
        for order in stale {
            match self.cancel_order(&system, order.id, &reason).await {
                Ok(order) => cancelled.push(order),
                Err(MarketplaceError::InvalidStateTransition(e)) => {
                    debug!("🕰️ Order {} was not cancelled by the sweep. {e}", order.order_number);
                },
                Err(e) => return Err(e),
            }
        }
        if !cancelled.is_empty() {
            info!("🕰️ {} unpaid orders cancelled", cancelled.len());
        }
        Ok(SweepResult::new(cancelled, now))
    }

    /// Records a payment attempt for one of the buyer's own `PENDING` orders. The amount is always the order total.
    ///
    /// Creating the payment intent with the provider happens elsewhere; this call only stores the intent id so that
    /// later notifications can be matched to the order.
    pub async fn start_payment(
        &self,
        actor: &Actor,
        order_id: i64,
        method: &str,
        provider_intent_id: &str,
    ) -> Result<Payment, MarketplaceError> {
        if actor.role != Role::Buyer {
            return Err(MarketplaceError::ForbiddenAccess(format!("{actor} cannot pay for orders")));
        }
        if provider_intent_id.trim().is_empty() {
            return Err(MarketplaceError::InvalidPaymentEvent("A payment intent id is required".to_string()));
        }
        let order = self.fetch_order(actor, order_id).await?;
        if order.status != OrderStatusType::Pending {
            return Err(InvalidTransition::new("Order", order.status, OrderStatusType::Paid).into());
        }
        let payment = NewPayment::new(order.id, method, provider_intent_id, order.total);
        let payment = self.db.upsert_payment_attempt(payment).await?;
        info!("💰️ Payment attempt {} started for order {}", payment.provider_intent_id, order.order_number);
        Ok(payment)
    }
}
