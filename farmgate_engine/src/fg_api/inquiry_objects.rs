use serde::{Deserialize, Serialize};

use crate::db_types::{DeliveryMethod, Satang};

/// A buyer's request for a wholesale quote on a single product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInquiryRequest {
    pub product_id: i64,
    pub quantity: i64,
    /// The unit price the buyer proposes, in satang
    pub proposed_price: Satang,
    #[serde(default)]
    pub note: Option<String>,
}

impl NewInquiryRequest {
    pub fn new(product_id: i64, quantity: i64, proposed_price: Satang) -> Self {
        Self { product_id, quantity, proposed_price, note: None }
    }

    pub fn with_note<S: Into<String>>(mut self, note: S) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// A message posted to an inquiry thread. When a farm includes `offered_price`, the message is a counter offer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InquiryMessageRequest {
    pub body: String,
    #[serde(default)]
    pub offered_price: Option<Satang>,
}

impl InquiryMessageRequest {
    pub fn new<S: Into<String>>(body: S) -> Self {
        Self { body: body.into(), offered_price: None }
    }

    pub fn with_offer(mut self, price: Satang) -> Self {
        self.offered_price = Some(price);
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AcceptInquiryRequest {
    /// Overrides the negotiated price. Otherwise the farm's counter offer, or failing that the buyer's proposal, is
    /// taken as agreed.
    #[serde(default)]
    pub agreed_price: Option<Satang>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConvertInquiryRequest {
    #[serde(default)]
    pub delivery_method: DeliveryMethod,
}
