use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{Order, Payment};

/// Extra data that accompanies an order status change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransitionDetails {
    /// Stored when the order enters `SHIPPED`
    pub tracking_number: Option<String>,
    /// Stored when the order is cancelled or refunded
    pub reason: Option<String>,
}

impl TransitionDetails {
    pub fn with_tracking_number<S: Into<String>>(mut self, tracking_number: S) -> Self {
        self.tracking_number = Some(tracking_number.into());
        self
    }

    pub fn with_reason<S: Into<String>>(mut self, reason: S) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// The result of settling a successful payment against its order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PaymentSettlement {
    /// The payment is now `COMPLETED` and the order moved from `PENDING` to `PAID`.
    Settled { payment: Payment, order: Order },
    /// The payment had already been settled. Nothing changed.
    AlreadySettled(Payment),
    /// The payment is now `COMPLETED`, but the order was no longer `PENDING` and was left untouched. The money has to
    /// be returned to the buyer.
    OrderNotPayable { payment: Payment, order: Order },
}

/// Orders and inquiries affected by an expiry sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepResult<T> {
    pub affected: Vec<T>,
    pub swept_at: Option<DateTime<Utc>>,
}

impl<T> SweepResult<T> {
    pub fn new(affected: Vec<T>, swept_at: DateTime<Utc>) -> Self {
        Self { affected, swept_at: Some(swept_at) }
    }

    pub fn count(&self) -> usize {
        self.affected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.affected.is_empty()
    }
}
