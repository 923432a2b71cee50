use serde::{Deserialize, Serialize};

use crate::db_types::Satang;

/// The event types the reconciliation adapter acts on. Everything else is acknowledged and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentEventKind {
    Succeeded,
    Failed,
    Refunded,
    Other,
}

impl PaymentEventKind {
    pub fn from_type(event_type: &str) -> Self {
        match event_type {
            "payment_intent.succeeded" => Self::Succeeded,
            "payment_intent.payment_failed" | "payment_intent.canceled" => Self::Failed,
            "charge.refunded" => Self::Refunded,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEventData {
    /// The provider's payment intent id; the correlation key with our payment records
    pub intent_id: String,
    #[serde(default)]
    pub order_number: Option<String>,
    #[serde(default)]
    pub amount: Option<Satang>,
    #[serde(default)]
    pub method: Option<String>,
}

/// A notification from the payment provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    /// Unix timestamp at which the provider created the event
    #[serde(default)]
    pub created: i64,
    pub data: PaymentEventData,
}

impl PaymentEvent {
    pub fn new<S: Into<String>>(id: S, event_type: S, intent_id: S) -> Self {
        Self {
            id: id.into(),
            event_type: event_type.into(),
            created: chrono::Utc::now().timestamp(),
            data: PaymentEventData { intent_id: intent_id.into(), order_number: None, amount: None, method: None },
        }
    }

    pub fn kind(&self) -> PaymentEventKind {
        PaymentEventKind::from_type(&self.event_type)
    }
}

/// What the reconciliation adapter did with a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReconciliationOutcome {
    /// The notification changed payment and/or order state.
    Applied,
    /// The notification had already been applied. Nothing changed.
    Duplicate,
    /// The event type is not one we act on.
    Ignored,
    /// No payment matches the intent id.
    UnknownPayment,
    /// The payment succeeded, but the order could no longer be paid. The money must be returned to the buyer.
    RequiresRefund,
}
