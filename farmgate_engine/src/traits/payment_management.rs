use crate::{
    db_types::{NewPayment, Payment},
    traits::{data_objects::PaymentSettlement, MarketplaceError},
};

/// The `PaymentManagement` trait defines how payment attempts are recorded and settled.
///
/// There is at most one payment per order. The provider's intent id is the correlation key for every asynchronous
/// notification.
#[allow(async_fn_in_trait)]
pub trait PaymentManagement {
    /// Records a payment attempt for an order.
    ///
    /// If the order has no payment yet, a new `PENDING` payment is created. A `PENDING` or `FAILED` payment is reset to
    /// `PENDING` with the new intent id, method and amount. A payment that has already completed cannot be restarted.
    async fn upsert_payment_attempt(&self, payment: NewPayment) -> Result<Payment, MarketplaceError>;

    async fn fetch_payment_for_order(&self, order_id: i64) -> Result<Option<Payment>, MarketplaceError>;

    async fn fetch_payment_by_intent(&self, intent_id: &str) -> Result<Option<Payment>, MarketplaceError>;

    /// Marks the payment `COMPLETED` and, in the same transaction, moves its order from `PENDING` to `PAID`.
    ///
    /// Replaying the call for a payment that has already been settled changes nothing.
    async fn settle_payment(&self, intent_id: &str) -> Result<PaymentSettlement, MarketplaceError>;

    /// Marks a `PENDING` payment as `FAILED`. The order is not touched.
    ///
    /// Returns the payment, and `false` if the payment was not `PENDING` (and so nothing changed).
    async fn fail_payment(&self, intent_id: &str) -> Result<(Payment, bool), MarketplaceError>;
}
