use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{Inquiry, InquiryMessage, InquiryStatusType, NewInquiry, NewInquiryMessage, Role, Satang},
    lifecycle::InvalidTransition,
    traits::MarketplaceError,
};

/// Stores a new `PENDING` inquiry. An opening note, if any, becomes the first message.
pub async fn insert_inquiry(inquiry: NewInquiry, conn: &mut SqliteConnection) -> Result<Inquiry, MarketplaceError> {
    let now = Utc::now();
    let mut result: Inquiry = sqlx::query_as(
        r#"
            INSERT INTO inquiries (
                inquiry_number,
                buyer_id,
                farm_id,
                product_id,
                quantity,
                proposed_price,
                status,
                expires_at,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            RETURNING *;
        "#,
    )
    .bind(&inquiry.inquiry_number)
    .bind(&inquiry.buyer_id)
    .bind(&inquiry.farm_id)
    .bind(inquiry.product_id)
    .bind(inquiry.quantity)
    .bind(inquiry.proposed_price)
    .bind(InquiryStatusType::Pending)
    .bind(inquiry.expires_at)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    if let Some(note) = inquiry.note.filter(|n| !n.trim().is_empty()) {
        let message = NewInquiryMessage {
            sender_id: inquiry.buyer_id.clone(),
            sender_role: Role::Buyer,
            body: note,
            offered_price: None,
        };
        insert_message(result.id, message, &mut *conn).await?;
    }
    result.messages = fetch_messages(result.id, conn).await?;
    debug!("🗃️ Inquiry [{}] inserted with id {}", result.inquiry_number, result.id);
    Ok(result)
}

pub async fn insert_message(
    inquiry_id: i64,
    message: NewInquiryMessage,
    conn: &mut SqliteConnection,
) -> Result<InquiryMessage, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO inquiry_messages (inquiry_id, sender_id, sender_role, body, offered_price, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(inquiry_id)
    .bind(message.sender_id)
    .bind(message.sender_role)
    .bind(message.body)
    .bind(message.offered_price)
    .bind(Utc::now())
    .fetch_one(conn)
    .await
}

pub async fn fetch_messages(inquiry_id: i64, conn: &mut SqliteConnection) -> Result<Vec<InquiryMessage>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM inquiry_messages WHERE inquiry_id = $1 ORDER BY id ASC")
        .bind(inquiry_id)
        .fetch_all(conn)
        .await
}

pub async fn fetch_inquiry(id: i64, conn: &mut SqliteConnection) -> Result<Option<Inquiry>, sqlx::Error> {
    let inquiry: Option<Inquiry> =
        sqlx::query_as("SELECT * FROM inquiries WHERE id = $1").bind(id).fetch_optional(&mut *conn).await?;
    match inquiry {
        Some(mut inquiry) => {
            inquiry.messages = fetch_messages(id, conn).await?;
            Ok(Some(inquiry))
        },
        None => Ok(None),
    }
}

/// Field updates that accompany an inquiry status write.
#[derive(Debug, Clone, Copy, Default)]
pub struct InquiryUpdate {
    pub counter_price: Option<Satang>,
    pub agreed_price: Option<Satang>,
    pub order_id: Option<i64>,
}

/// Compare-and-set the inquiry status from `from` to `to` (which may be the same status) and applies the field
/// updates. Fails with `InvalidStateTransition` if the inquiry is no longer in `from` status.
///
/// The messages of the returned inquiry are not loaded.
pub async fn update_status(
    id: i64,
    from: InquiryStatusType,
    to: InquiryStatusType,
    update: InquiryUpdate,
    conn: &mut SqliteConnection,
) -> Result<Inquiry, MarketplaceError> {
    let mut builder = QueryBuilder::new("UPDATE inquiries SET status = ");
    builder.push_bind(to);
    builder.push(", updated_at = ");
    builder.push_bind(Utc::now());
    if let Some(price) = update.counter_price {
        builder.push(", counter_price = ");
        builder.push_bind(price);
    }
    if let Some(price) = update.agreed_price {
        builder.push(", agreed_price = ");
        builder.push_bind(price);
    }
    if let Some(order_id) = update.order_id {
        builder.push(", order_id = ");
        builder.push_bind(order_id);
    }
    builder.push(" WHERE id = ");
    builder.push_bind(id);
    builder.push(" AND status = ");
    builder.push_bind(from);
    builder.push(" RETURNING *");
    trace!("🗃️ Executing query: {}", builder.sql());
    let updated = builder.build_query_as::<Inquiry>().fetch_optional(&mut *conn).await?;
    match updated {
        Some(inquiry) => Ok(inquiry),
        None => {
            let current = fetch_inquiry(id, conn).await?.ok_or(MarketplaceError::InquiryNotFound(id))?;
            debug!("🗃️ Inquiry {} was expected to be {from}, but is {}", current.inquiry_number, current.status);
            Err(InvalidTransition::new("Inquiry", current.status, to).into())
        },
    }
}

/// Sets the order reference on a converted inquiry
pub async fn link_order(id: i64, order_id: i64, conn: &mut SqliteConnection) -> Result<Inquiry, sqlx::Error> {
    sqlx::query_as("UPDATE inquiries SET order_id = $1, updated_at = $2 WHERE id = $3 RETURNING *")
        .bind(order_id)
        .bind(Utc::now())
        .bind(id)
        .fetch_one(conn)
        .await
}

/// Moves every open inquiry whose `expires_at` is earlier than `now` to `EXPIRED` in one statement.
pub async fn expire_inquiries(now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Vec<Inquiry>, sqlx::Error> {
    let expired: Vec<Inquiry> = sqlx::query_as(
        r#"
            UPDATE inquiries SET status = 'EXPIRED', updated_at = $1
            WHERE status IN ('PENDING', 'NEGOTIATING') AND julianday(expires_at) < julianday($1)
            RETURNING *;
        "#,
    )
    .bind(now)
    .fetch_all(conn)
    .await?;
    trace!("🗃️ {} inquiries expired", expired.len());
    Ok(expired)
}
