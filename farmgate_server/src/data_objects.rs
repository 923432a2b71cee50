use farmgate_engine::{
    db_types::{Inquiry, Order, OrderStatusType},
    payment_objects::ReconciliationOutcome,
    TransitionDetails,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: OrderStatusType,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl StatusUpdateRequest {
    pub fn details(&self) -> TransitionDetails {
        TransitionDetails { tracking_number: self.tracking_number.clone(), reason: self.reason.clone() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartPaymentRequest {
    pub method: String,
    pub provider_intent_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderListParams {
    pub status: Option<OrderStatusType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub outcome: ReconciliationOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResponse {
    pub inquiry: Inquiry,
    pub order: Order,
}
