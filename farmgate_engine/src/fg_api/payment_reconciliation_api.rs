use std::fmt::Debug;

use chrono::{Duration, Utc};
use farmgate_common::Secret;
use log::*;

use crate::{
    db_types::{Actor, OrderStatusType},
    events::{EventProducers, OrderPaidEvent, OrderStatusChangedEvent},
    fg_api::{
        order_flow_api::OrderFlowApi,
        payment_objects::{PaymentEvent, PaymentEventKind, ReconciliationOutcome},
    },
    helpers::verify_webhook_signature,
    traits::{MarketplaceDatabase, MarketplaceError, PaymentSettlement},
};

/// The default distance (in seconds) between a notification's signature timestamp and our clock that is accepted.
pub const DEFAULT_SIGNATURE_TOLERANCE: i64 = 300;

/// `PaymentReconciliationApi` consumes signed notifications from the payment provider and maps them onto payment and
/// order state.
///
/// Notifications may arrive late, more than once, or out of order. Every notification is therefore correlated on the
/// provider's intent id and applied only if the payment is not already in the target state. Replays are reported as
/// [`ReconciliationOutcome::Duplicate`] and change nothing.
pub struct PaymentReconciliationApi<B> {
    db: B,
    producers: EventProducers,
    secret: Secret<String>,
    tolerance: Option<Duration>,
}

impl<B> Debug for PaymentReconciliationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentReconciliationApi (secret: {}, tolerance: {:?})", self.secret, self.tolerance)
    }
}

impl<B> PaymentReconciliationApi<B> {
    pub fn new(db: B, producers: EventProducers, secret: Secret<String>) -> Self {
        let tolerance = Some(Duration::seconds(DEFAULT_SIGNATURE_TOLERANCE));
        Self { db, producers, secret, tolerance }
    }

    /// Sets the signature timestamp tolerance. `None` disables the timestamp check.
    pub fn with_tolerance(mut self, tolerance: Option<Duration>) -> Self {
        self.tolerance = tolerance;
        self
    }
}

impl<B> PaymentReconciliationApi<B>
where B: MarketplaceDatabase
{
    /// Verifies and applies a raw notification.
    ///
    /// A missing or invalid signature is rejected with [`MarketplaceError::InvalidSignature`] before the body is even
    /// parsed, and nothing changes.
    pub async fn process_webhook(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<ReconciliationOutcome, MarketplaceError> {
        let Some(signature) = signature else {
            warn!("💰️ Payment notification received without a signature. Rejecting it.");
            return Err(MarketplaceError::InvalidSignature("The signature header is missing".to_string()));
        };
        if let Err(e) = verify_webhook_signature(body, signature, self.secret.reveal(), self.tolerance, Utc::now()) {
            warn!("💰️ Payment notification rejected. {e}");
            return Err(MarketplaceError::InvalidSignature(e.to_string()));
        }
        let event = serde_json::from_slice::<PaymentEvent>(body).map_err(|e| {
            warn!("💰️ Could not parse payment notification. {e}");
            MarketplaceError::InvalidPaymentEvent(e.to_string())
        })?;
        self.reconcile(event).await
    }

    /// Applies an already verified notification.
    pub async fn reconcile(&self, event: PaymentEvent) -> Result<ReconciliationOutcome, MarketplaceError> {
        debug!("💰️ Reconciling event {} ({}) for intent {}", event.id, event.event_type, event.data.intent_id);
        let result = match event.kind() {
            PaymentEventKind::Succeeded => self.payment_succeeded(&event).await,
            PaymentEventKind::Failed => self.payment_failed(&event).await,
            PaymentEventKind::Refunded => self.payment_refunded(&event).await,
            PaymentEventKind::Other => {
                debug!("💰️ Ignoring event {} of type {}", event.id, event.event_type);
                Ok(ReconciliationOutcome::Ignored)
            },
        };
        match result {
            Err(MarketplaceError::PaymentNotFound(intent)) => {
                warn!("💰️ Event {} refers to unknown payment intent {intent}", event.id);
                Ok(ReconciliationOutcome::UnknownPayment)
            },
            other => other,
        }
    }

    async fn payment_succeeded(&self, event: &PaymentEvent) -> Result<ReconciliationOutcome, MarketplaceError> {
        match self.db.settle_payment(&event.data.intent_id).await? {
            PaymentSettlement::Settled { payment, order } => {
                if let Some(amount) = event.data.amount.filter(|a| *a != payment.amount) {
                    warn!(
                        "💰️ Provider reported {amount} for intent {}, but we expected {}",
                        payment.provider_intent_id, payment.amount
                    );
                }
                info!("💰️ Order {} has been paid ({})", order.order_number, payment.amount);
                self.producers.publish_order_paid(OrderPaidEvent::new(order.clone())).await;
                let event = OrderStatusChangedEvent::new(order, OrderStatusType::Pending, Actor::system());
                self.producers.publish_order_status_changed(event).await;
                Ok(ReconciliationOutcome::Applied)
            },
            PaymentSettlement::AlreadySettled(payment) => {
                debug!("💰️ Payment {} was already {}. Duplicate event", payment.provider_intent_id, payment.status);
                Ok(ReconciliationOutcome::Duplicate)
            },
            PaymentSettlement::OrderNotPayable { payment, order } => {
                error!(
                    "💰️ Payment {} of {} succeeded, but order {} is {}. The buyer must be refunded manually.",
                    payment.provider_intent_id, payment.amount, order.order_number, order.status
                );
                Ok(ReconciliationOutcome::RequiresRefund)
            },
        }
    }

    async fn payment_failed(&self, event: &PaymentEvent) -> Result<ReconciliationOutcome, MarketplaceError> {
        let (payment, changed) = self.db.fail_payment(&event.data.intent_id).await?;
        if changed {
            info!("💰️ Payment {} for order #{} failed", payment.provider_intent_id, payment.order_id);
            Ok(ReconciliationOutcome::Applied)
        } else {
            debug!("💰️ Payment {} is {}. Failure event ignored", payment.provider_intent_id, payment.status);
            Ok(ReconciliationOutcome::Duplicate)
        }
    }

    async fn payment_refunded(&self, event: &PaymentEvent) -> Result<ReconciliationOutcome, MarketplaceError> {
        let intent_id = &event.data.intent_id;
        let payment = self
            .db
            .fetch_payment_by_intent(intent_id)
            .await?
            .ok_or_else(|| MarketplaceError::PaymentNotFound(intent_id.clone()))?;
        let order = self
            .db
            .fetch_order(payment.order_id)
            .await?
            .ok_or_else(|| MarketplaceError::OrderNotFound(payment.order_id.to_string()))?;
        if order.status == OrderStatusType::Refunded {
            return Ok(ReconciliationOutcome::Duplicate);
        }
        if !order.status.can_transition_to(OrderStatusType::Refunded) {
            error!(
                "💰️ The provider refunded payment {intent_id}, but order {} is {} and cannot be marked as refunded",
                order.order_number, order.status
            );
            return Ok(ReconciliationOutcome::Ignored);
        }
        let orders = OrderFlowApi::new(self.db.clone(), self.producers.clone());
        orders.refund_order(&Actor::system(), order.id, "Refunded by the payment provider").await?;
        Ok(ReconciliationOutcome::Applied)
    }
}
