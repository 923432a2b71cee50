use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{NewOrder, Order, OrderItem, OrderNumber, OrderStatusType},
    fg_api::order_objects::OrderQueryFilter,
    lifecycle::{InvalidTransition, InventoryAction, OrderTransition},
    sqlite::db::{payments, products},
    traits::{MarketplaceError, TransitionDetails},
};

/// Reserves stock for every item and then stores the order and its items. This is not atomic. Embed the call in a
/// transaction and pass `&mut *tx` as the connection so that a failed reservation rolls everything back.
///
/// The reservations come first so that the write lock is taken by the first statement of the transaction.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, MarketplaceError> {
    for item in &order.items {
        products::reserve(item.product_id, item.quantity, &mut *conn).await?;
    }
    let subtotal = order.subtotal();
    let total = order.total();
    let mut result: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_number,
                buyer_id,
                farm_id,
                status,
                delivery_method,
                subtotal,
                delivery_fee,
                platform_fee,
                total,
                source_inquiry_id,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            RETURNING *;
        "#,
    )
    .bind(order.order_number.as_str())
    .bind(&order.buyer_id)
    .bind(&order.farm_id)
    .bind(OrderStatusType::Pending)
    .bind(order.delivery_method)
    .bind(subtotal)
    .bind(order.delivery_fee)
    .bind(order.platform_fee)
    .bind(total)
    .bind(order.source_inquiry_id)
    .bind(order.created_at)
    .fetch_one(&mut *conn)
    .await?;
    for item in &order.items {
        sqlx::query(
            r#"
                INSERT INTO order_items (order_id, product_id, quantity, unit_price, line_total)
                VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(result.id)
        .bind(item.product_id)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.line_total())
        .execute(&mut *conn)
        .await?;
    }
    result.items = fetch_order_items(result.id, conn).await?;
    debug!("🗃️ Order [{}] inserted with id {} and {} items", result.order_number, result.id, result.items.len());
    Ok(result)
}

pub async fn fetch_order_items(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id ASC").bind(order_id).fetch_all(conn).await
}

async fn with_items(order: Option<Order>, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    match order {
        Some(mut order) => {
            order.items = fetch_order_items(order.id, conn).await?;
            Ok(Some(order))
        },
        None => Ok(None),
    }
}

pub async fn fetch_order(id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(&mut *conn).await?;
    with_items(order, conn).await
}

pub async fn fetch_order_by_number(
    number: &OrderNumber,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE order_number = $1")
        .bind(number.as_str())
        .fetch_optional(&mut *conn)
        .await?;
    with_items(order, conn).await
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`
///
/// Resulting orders are ordered by `created_at` in ascending order. Items are not loaded.
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM orders ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(number) = query.order_number {
        where_clause.push("order_number = ");
        where_clause.push_bind_unseparated(number.0);
    }
    if let Some(buyer_id) = query.buyer_id {
        where_clause.push("buyer_id = ");
        where_clause.push_bind_unseparated(buyer_id);
    }
    if let Some(farm_id) = query.farm_id {
        where_clause.push("farm_id = ");
        where_clause.push_bind_unseparated(farm_id);
    }
    if let Some(statuses) = query.status.filter(|s| !s.is_empty()) {
        where_clause.push("status IN (");
        for (i, status) in statuses.into_iter().enumerate() {
            if i > 0 {
                where_clause.push_unseparated(", ");
            }
            where_clause.push_bind_unseparated(status);
        }
        where_clause.push_unseparated(")");
    }
    if let Some(since) = query.since {
        where_clause.push("julianday(created_at) >= julianday(");
        where_clause.push_bind_unseparated(since);
        where_clause.push_unseparated(")");
    }
    if let Some(until) = query.until {
        where_clause.push("julianday(created_at) <= julianday(");
        where_clause.push_bind_unseparated(until);
        where_clause.push_unseparated(")");
    }
    builder.push(" ORDER BY created_at ASC, id ASC");

    trace!("🗃️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    trace!("🗃️ Result of search_orders: {}", orders.len());
    Ok(orders)
}

/// Compare-and-set the order status from `transition.from` to `transition.to`, stamping the transition timestamp and
/// storing the details. Returns `None` if the order does not exist or is no longer in the `from` state.
async fn compare_and_set_status(
    id: i64,
    transition: &OrderTransition,
    details: &TransitionDetails,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let now = Utc::now();
    let mut builder = QueryBuilder::new("UPDATE orders SET status = ");
    builder.push_bind(transition.to);
    builder.push(", updated_at = ");
    builder.push_bind(now);
    if let Some(column) = transition.stamp.column() {
        builder.push(format!(", {column} = "));
        builder.push_bind(now);
    }
    if transition.commits_inventory {
        builder.push(", inventory_committed = 1");
    }
    if let Some(tracking) = &details.tracking_number {
        builder.push(", tracking_number = ");
        builder.push_bind(tracking.clone());
    }
    if let Some(reason) = &details.reason {
        builder.push(", cancel_reason = ");
        builder.push_bind(reason.clone());
    }
    builder.push(" WHERE id = ");
    builder.push_bind(id);
    builder.push(" AND status = ");
    builder.push_bind(transition.from);
    builder.push(" RETURNING *");
    trace!("🗃️ Executing query: {}", builder.sql());
    builder.build_query_as::<Order>().fetch_optional(conn).await
}

/// Applies a validated transition and all its side effects. This is not atomic on its own; embed the call in a
/// transaction. The status update is the first statement.
pub async fn apply_transition(
    id: i64,
    transition: OrderTransition,
    details: TransitionDetails,
    conn: &mut SqliteConnection,
) -> Result<Order, MarketplaceError> {
    let Some(mut order) = compare_and_set_status(id, &transition, &details, &mut *conn).await? else {
        let current = fetch_order(id, &mut *conn).await?.ok_or_else(|| MarketplaceError::OrderNotFound(id.to_string()))?;
        debug!(
            "🗃️ Order {} was expected to be {}, but is {}. Transition to {} rejected",
            current.order_number, transition.from, current.status, transition.to
        );
        return Err(InvalidTransition::new("Order", current.status, transition.to).into());
    };
    order.items = fetch_order_items(order.id, &mut *conn).await?;
    for item in &order.items {
        match transition.inventory {
            InventoryAction::None => {},
            InventoryAction::Confirm => {
                products::confirm(item.product_id, item.quantity, &mut *conn).await?;
            },
            InventoryAction::Release => {
                products::release(item.product_id, item.quantity, &mut *conn).await?;
            },
            InventoryAction::Restock => {
                products::restock(item.product_id, item.quantity, &mut *conn).await?;
            },
        }
    }
    if transition.refunds_payment {
        payments::mark_refunded(order.id, &mut *conn).await?;
    }
    debug!(
        "🗃️ Order {} moved from {} to {}. Inventory action: {:?}",
        order.order_number, transition.from, transition.to, transition.inventory
    );
    Ok(order)
}

/// Fetches all `PENDING` orders created before `cutoff`
pub async fn fetch_stale_pending_orders(
    cutoff: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as(
        "SELECT * FROM orders WHERE status = 'PENDING' AND julianday(created_at) < julianday($1) ORDER BY created_at",
    )
    .bind(cutoff)
    .fetch_all(conn)
    .await
}
