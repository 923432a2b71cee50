use crate::{db_types::OrderStatusType, lifecycle::InvalidTransition};

/// What happens to the reserved stock of every order item when a transition is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryAction {
    None,
    /// Turn the reservation into a permanent deduction (`total_stock` and `reserved_stock` both decrease).
    Confirm,
    /// Give the reservation back to the available pool.
    Release,
    /// Return stock that was already deducted (`total_stock` increases).
    Restock,
}

/// The timestamp column a transition stamps, besides `updated_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionStamp {
    None,
    PaidAt,
    ConfirmedAt,
    ShippedAt,
    DeliveredAt,
    CancelledAt,
    RefundedAt,
}

impl TransitionStamp {
    pub fn column(&self) -> Option<&'static str> {
        match self {
            TransitionStamp::None => None,
            TransitionStamp::PaidAt => Some("paid_at"),
            TransitionStamp::ConfirmedAt => Some("confirmed_at"),
            TransitionStamp::ShippedAt => Some("shipped_at"),
            TransitionStamp::DeliveredAt => Some("delivered_at"),
            TransitionStamp::CancelledAt => Some("cancelled_at"),
            TransitionStamp::RefundedAt => Some("refunded_at"),
        }
    }
}

/// A validated order status change and its side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTransition {
    pub from: OrderStatusType,
    pub to: OrderStatusType,
    pub stamp: TransitionStamp,
    pub inventory: InventoryAction,
    /// Whether `inventory_committed` must be set on the order as part of this transition
    pub commits_inventory: bool,
    /// Whether a `COMPLETED` payment for the order moves to `REFUNDED`
    pub refunds_payment: bool,
}

impl OrderTransition {
    fn new(from: OrderStatusType, to: OrderStatusType, stamp: TransitionStamp) -> Self {
        Self { from, to, stamp, inventory: InventoryAction::None, commits_inventory: false, refunds_payment: false }
    }

    fn with_inventory(mut self, action: InventoryAction) -> Self {
        self.inventory = action;
        self
    }
}

/// Stock that was only reserved is released. Stock that was already deducted goes back on the shelf.
fn return_stock(inventory_committed: bool) -> InventoryAction {
    if inventory_committed {
        InventoryAction::Restock
    } else {
        InventoryAction::Release
    }
}

impl OrderStatusType {
    /// Validates the move from `self` to `target`.
    ///
    /// ```text
    /// PENDING -> PAID -> CONFIRMED -> PREPARING -> SHIPPED -> DELIVERED
    ///    |        |  \       |
    ///    v        v   v      v
    /// CANCELLED  REFUNDED  CANCELLED
    /// ```
    pub fn transition_to(
        self,
        target: OrderStatusType,
        inventory_committed: bool,
    ) -> Result<OrderTransition, InvalidTransition> {
        use InventoryAction as Inv;
        use OrderStatusType::*;
        use TransitionStamp as Stamp;
        let transition = match (self, target) {
            (Pending, Paid) => OrderTransition::new(self, target, Stamp::PaidAt),
            (Pending | Paid | Confirmed, Cancelled) => OrderTransition::new(self, target, Stamp::CancelledAt)
                .with_inventory(return_stock(inventory_committed)),
            (Paid, Confirmed) => {
                let mut t = OrderTransition::new(self, target, Stamp::ConfirmedAt);
                // A committed order has already had its stock deducted
                if !inventory_committed {
                    t = t.with_inventory(Inv::Confirm);
                    t.commits_inventory = true;
                }
                t
            },
            (Paid, Refunded) => {
                let mut t = OrderTransition::new(self, target, Stamp::RefundedAt)
                    .with_inventory(return_stock(inventory_committed));
                t.refunds_payment = true;
                t
            },
            (Confirmed, Preparing) => OrderTransition::new(self, target, Stamp::None),
            (Preparing, Shipped) => OrderTransition::new(self, target, Stamp::ShippedAt),
            (Shipped, Delivered) => OrderTransition::new(self, target, Stamp::DeliveredAt),
            (Pending, _) | (Paid, _) | (Confirmed, _) | (Preparing, _) | (Shipped, _) => {
                return Err(InvalidTransition::new("Order", self, target))
            },
            (Delivered | Cancelled | Refunded, _) => return Err(InvalidTransition::new("Order", self, target)),
        };
        Ok(transition)
    }

    pub fn can_transition_to(self, target: OrderStatusType) -> bool {
        self.transition_to(target, false).is_ok()
    }
}
