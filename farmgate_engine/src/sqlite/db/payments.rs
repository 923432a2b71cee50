use chrono::Utc;
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewPayment, Payment, PaymentStatus},
    lifecycle::InvalidTransition,
    traits::MarketplaceError,
};

/// Creates the payment for an order, or restarts a `FAILED` payment with the new intent id.
///
/// The insert and the restart are a single upsert. Repeating the call with the intent of a `PENDING` payment is a
/// no-op refresh. Any other intent is rejected while a payment is `PENDING`, since the provider may still capture it.
/// An intent id that already belongs to another order is rejected with [`MarketplaceError::InvalidPaymentEvent`].
pub async fn upsert_attempt(payment: NewPayment, conn: &mut SqliteConnection) -> Result<Payment, MarketplaceError> {
    let order_id = payment.order_id;
    let intent_id = payment.provider_intent_id.clone();
    let result: Option<Payment> = sqlx::query_as(
        r#"
            INSERT INTO payments (order_id, status, method, provider_intent_id, amount, created_at, updated_at)
            VALUES ($1, 'PENDING', $2, $3, $4, $5, $5)
            ON CONFLICT (order_id) DO UPDATE SET
                status = 'PENDING',
                method = excluded.method,
                provider_intent_id = excluded.provider_intent_id,
                amount = excluded.amount,
                updated_at = excluded.updated_at
            WHERE payments.status = 'FAILED'
                OR (payments.status = 'PENDING' AND payments.provider_intent_id = excluded.provider_intent_id)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(payment.method)
    .bind(payment.provider_intent_id)
    .bind(payment.amount)
    .bind(Utc::now())
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref de) if de.is_unique_violation() => {
            debug!("🗃️ Intent {intent_id} is already linked to another order. {de}");
            MarketplaceError::InvalidPaymentEvent(format!("Payment intent {intent_id} belongs to another order"))
        },
        e => e.into(),
    })?;
    match result {
        Some(p) => {
            debug!("🗃️ Payment attempt {} recorded for order #{order_id}", p.provider_intent_id);
            Ok(p)
        },
        None => {
            let existing = fetch_payment_for_order(order_id, conn)
                .await?
                .ok_or_else(|| MarketplaceError::PaymentNotFound(format!("order #{order_id}")))?;
            Err(InvalidTransition::new("Payment", existing.status, PaymentStatus::Pending).into())
        },
    }
}

pub async fn fetch_payment_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payments WHERE order_id = $1").bind(order_id).fetch_optional(conn).await
}

pub async fn fetch_payment_by_intent(
    intent_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payments WHERE provider_intent_id = $1").bind(intent_id).fetch_optional(conn).await
}

/// Marks a `PENDING` or `FAILED` payment as `COMPLETED`. Returns `None` if no such payment was found.
pub async fn complete(intent_id: &str, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    let now = Utc::now();
    let payment: Option<Payment> = sqlx::query_as(
        r#"
            UPDATE payments SET status = 'COMPLETED', paid_at = $1, updated_at = $1
            WHERE provider_intent_id = $2 AND status IN ('PENDING', 'FAILED')
            RETURNING *;
        "#,
    )
    .bind(now)
    .bind(intent_id)
    .fetch_optional(conn)
    .await?;
    trace!("🗃️ Completing payment {intent_id}: {}", if payment.is_some() { "done" } else { "no-op" });
    Ok(payment)
}

/// Marks a `PENDING` payment as `FAILED`. Returns `None` if no such payment was found.
pub async fn fail(intent_id: &str, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE payments SET status = 'FAILED', updated_at = $1
            WHERE provider_intent_id = $2 AND status = 'PENDING'
            RETURNING *;
        "#,
    )
    .bind(Utc::now())
    .bind(intent_id)
    .fetch_optional(conn)
    .await
}

/// Marks the `COMPLETED` payment for the order as `REFUNDED`. Orders without a completed payment are left alone.
pub async fn mark_refunded(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    let payment: Option<Payment> = sqlx::query_as(
        r#"
            UPDATE payments SET status = 'REFUNDED', updated_at = $1
            WHERE order_id = $2 AND status = 'COMPLETED'
            RETURNING *;
        "#,
    )
    .bind(Utc::now())
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    if let Some(p) = &payment {
        debug!("🗃️ Payment {} for order #{order_id} marked as refunded", p.provider_intent_id);
    }
    Ok(payment)
}
