use serde::{Deserialize, Serialize};

use crate::db_types::{Actor, Inquiry, InquiryMessage, Order, OrderStatusType};

/// Emitted after an order has moved from `PENDING` to `PAID` and the change has been committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPaidEvent {
    pub order: Order,
}

impl OrderPaidEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// Emitted after any committed order status change, including the move to `PAID`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChangedEvent {
    pub order: Order,
    pub old_status: OrderStatusType,
    pub new_status: OrderStatusType,
    pub changed_by: Actor,
}

impl OrderStatusChangedEvent {
    pub fn new(order: Order, old_status: OrderStatusType, changed_by: Actor) -> Self {
        let new_status = order.status;
        Self { order, old_status, new_status, changed_by }
    }
}

/// Emitted when a farm replies to a wholesale inquiry, with a message or a counter offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InquiryRespondedEvent {
    pub inquiry: Inquiry,
    pub message: Option<InquiryMessage>,
}

impl InquiryRespondedEvent {
    pub fn new(inquiry: Inquiry) -> Self {
        let message = inquiry.messages.last().cloned();
        Self { inquiry, message }
    }
}
