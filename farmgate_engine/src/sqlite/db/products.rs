use chrono::Utc;
use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{NewProduct, PricingTier, Product},
    traits::MarketplaceError,
};

/// Inserts a new product and its pricing tiers. This is not atomic. Embed the call in a transaction if you need the
/// tiers to be stored all-or-nothing.
pub async fn insert_product(product: NewProduct, conn: &mut SqliteConnection) -> Result<Product, MarketplaceError> {
    let now = Utc::now();
    let mut result: Product = sqlx::query_as(
        r#"
            INSERT INTO products (
                farm_id,
                name,
                unit,
                retail_price,
                moq_wholesale,
                total_stock,
                reserved_stock,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, 0, $7, $7)
            RETURNING *;
        "#,
    )
    .bind(product.farm_id)
    .bind(product.name)
    .bind(product.unit)
    .bind(product.retail_price)
    .bind(product.moq_wholesale)
    .bind(product.total_stock)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    for tier in &product.pricing_tiers {
        sqlx::query("INSERT INTO pricing_tiers (product_id, min_qty, max_qty, unit_price) VALUES ($1, $2, $3, $4)")
            .bind(result.id)
            .bind(tier.min_qty)
            .bind(tier.max_qty)
            .bind(tier.unit_price)
            .execute(&mut *conn)
            .await?;
    }
    result.pricing_tiers = fetch_pricing_tiers(result.id, conn).await?;
    debug!("🗃️ Product #{} ({}) inserted for farm {}", result.id, result.name, result.farm_id);
    Ok(result)
}

/// Fetches the pricing tiers for a product in ascending order.
pub async fn fetch_pricing_tiers(product_id: i64, conn: &mut SqliteConnection) -> Result<Vec<PricingTier>, sqlx::Error> {
    let tiers = sqlx::query_as(
        "SELECT min_qty, max_qty, unit_price FROM pricing_tiers WHERE product_id = $1 ORDER BY min_qty ASC",
    )
    .bind(product_id)
    .fetch_all(conn)
    .await?;
    Ok(tiers)
}

/// Fetches the product row only. Pricing tiers are not loaded.
async fn fetch_product_row(product_id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(product_id).fetch_optional(conn).await
}

pub async fn fetch_product(product_id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    let Some(mut product) = fetch_product_row(product_id, &mut *conn).await? else {
        return Ok(None);
    };
    product.pricing_tiers = fetch_pricing_tiers(product_id, conn).await?;
    Ok(Some(product))
}

pub async fn fetch_products(product_ids: &[i64], conn: &mut SqliteConnection) -> Result<Vec<Product>, sqlx::Error> {
    if product_ids.is_empty() {
        return Ok(vec![]);
    }
    let mut builder = QueryBuilder::new("SELECT * FROM products WHERE id IN (");
    let mut ids = builder.separated(", ");
    for id in product_ids {
        ids.push_bind(*id);
    }
    builder.push(") ORDER BY id ASC");
    trace!("🗃️ Executing query: {}", builder.sql());
    let mut products = builder.build_query_as::<Product>().fetch_all(&mut *conn).await?;
    for product in &mut products {
        product.pricing_tiers = fetch_pricing_tiers(product.id, &mut *conn).await?;
    }
    Ok(products)
}

/// Works out why a guarded stock update did not touch any rows.
async fn stock_update_failure(
    product_id: i64,
    requested: i64,
    reserved_only: bool,
    conn: &mut SqliteConnection,
) -> MarketplaceError {
    match fetch_product_row(product_id, conn).await {
        Ok(Some(p)) => {
            let available = if reserved_only { p.reserved_stock } else { p.available_stock() };
            MarketplaceError::InsufficientStock { product_id, requested, available }
        },
        Ok(None) => MarketplaceError::ProductNotFound(product_id),
        Err(e) => e.into(),
    }
}

/// Reserves `quantity` units of the product, provided that at least that many units are available. The check and the
/// increment are a single statement.
pub async fn reserve(product_id: i64, quantity: i64, conn: &mut SqliteConnection) -> Result<Product, MarketplaceError> {
    let updated: Option<Product> = sqlx::query_as(
        r#"
            UPDATE products SET reserved_stock = reserved_stock + $1, updated_at = $2
            WHERE id = $3 AND total_stock - reserved_stock >= $1
            RETURNING *;
        "#,
    )
    .bind(quantity)
    .bind(Utc::now())
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?;
    match updated {
        Some(product) => {
            trace!("🗃️ Reserved {quantity} of product #{product_id}. {} now available", product.available_stock());
            Ok(product)
        },
        None => Err(stock_update_failure(product_id, quantity, false, conn).await),
    }
}

/// Returns `quantity` reserved units to the available pool. The reservation is clamped at zero.
pub async fn release(product_id: i64, quantity: i64, conn: &mut SqliteConnection) -> Result<Product, MarketplaceError> {
    let updated: Option<Product> = sqlx::query_as(
        r#"
            UPDATE products SET reserved_stock = MAX(reserved_stock - $1, 0), updated_at = $2
            WHERE id = $3
            RETURNING *;
        "#,
    )
    .bind(quantity)
    .bind(Utc::now())
    .bind(product_id)
    .fetch_optional(conn)
    .await?;
    let product = updated.ok_or(MarketplaceError::ProductNotFound(product_id))?;
    trace!("🗃️ Released {quantity} of product #{product_id}. {} now available", product.available_stock());
    Ok(product)
}

/// Converts a reservation into a permanent deduction. Both counters drop by `quantity` in one statement.
pub async fn confirm(product_id: i64, quantity: i64, conn: &mut SqliteConnection) -> Result<Product, MarketplaceError> {
    let updated: Option<Product> = sqlx::query_as(
        r#"
            UPDATE products SET
                total_stock = total_stock - $1,
                reserved_stock = reserved_stock - $1,
                updated_at = $2
            WHERE id = $3 AND reserved_stock >= $1
            RETURNING *;
        "#,
    )
    .bind(quantity)
    .bind(Utc::now())
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?;
    match updated {
        Some(product) => {
            trace!("🗃️ Confirmed {quantity} of product #{product_id}. {} left in stock", product.total_stock);
            Ok(product)
        },
        None => Err(stock_update_failure(product_id, quantity, true, conn).await),
    }
}

/// Puts `quantity` units that were previously deducted back into stock.
pub async fn restock(product_id: i64, quantity: i64, conn: &mut SqliteConnection) -> Result<Product, MarketplaceError> {
    let updated: Option<Product> = sqlx::query_as(
        "UPDATE products SET total_stock = total_stock + $1, updated_at = $2 WHERE id = $3 RETURNING *",
    )
    .bind(quantity)
    .bind(Utc::now())
    .bind(product_id)
    .fetch_optional(conn)
    .await?;
    let product = updated.ok_or(MarketplaceError::ProductNotFound(product_id))?;
    trace!("🗃️ Restocked {quantity} of product #{product_id}. {} now in stock", product.total_stock);
    Ok(product)
}
