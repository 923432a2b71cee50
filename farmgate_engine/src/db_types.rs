//! Data types that are persisted by the marketplace engine backends.
//!
//! Row types derive [`FromRow`] so that the backends can load them directly. Collections that live in child tables
//! (pricing tiers, order items, inquiry messages) are marked `#[sqlx(skip)]` and are populated by the backend after
//! the parent row has been loaded.
use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use farmgate_common::Satang;
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

use crate::pricing::resolve_unit_price;

#[derive(Debug, Clone, Error)]
#[error("Invalid {kind}: {value}")]
pub struct ConversionError {
    kind: &'static str,
    value: String,
}

impl ConversionError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self { kind, value: value.to_string() }
    }
}

//--------------------------------------          Role           -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// A retail or wholesale customer.
    Buyer,
    /// A farm account. The actor id of a farm is the farm id.
    Farm,
    /// Marketplace staff. May act on any order or inquiry.
    Admin,
    /// Internal callers: the payment reconciliation adapter and the expiry sweeps.
    System,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Buyer => write!(f, "BUYER"),
            Role::Farm => write!(f, "FARM"),
            Role::Admin => write!(f, "ADMIN"),
            Role::System => write!(f, "SYSTEM"),
        }
    }
}

impl FromStr for Role {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUYER" => Ok(Self::Buyer),
            "FARM" => Ok(Self::Farm),
            "ADMIN" => Ok(Self::Admin),
            "SYSTEM" => Ok(Self::System),
            _ => Err(ConversionError::new("role", s)),
        }
    }
}

//--------------------------------------          Actor          -------------------------------------------------------
/// The identity on whose behalf an operation is performed.
///
/// Actors arrive already authenticated. The engine trusts them and only checks that the actor owns the entity it is
/// acting on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn new<S: Into<String>>(id: S, role: Role) -> Self {
        Self { id: id.into(), role }
    }

    pub fn buyer<S: Into<String>>(id: S) -> Self {
        Self::new(id, Role::Buyer)
    }

    pub fn farm<S: Into<String>>(id: S) -> Self {
        Self::new(id, Role::Farm)
    }

    pub fn admin<S: Into<String>>(id: S) -> Self {
        Self::new(id, Role::Admin)
    }

    pub fn system() -> Self {
        Self::new("system", Role::System)
    }

    /// Admins and internal callers are not subject to ownership checks.
    pub fn is_privileged(&self) -> bool {
        matches!(self.role, Role::Admin | Role::System)
    }

    /// True if this actor is the buyer or the farm named, or is privileged.
    pub fn owns(&self, buyer_id: &str, farm_id: &str) -> bool {
        match self.role {
            Role::Buyer => self.id == buyer_id,
            Role::Farm => self.id == farm_id,
            Role::Admin | Role::System => true,
        }
    }
}

impl Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.role, self.id)
    }
}

//--------------------------------------      PricingTier        -------------------------------------------------------
/// A quantity band with its own unit price. Both bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct PricingTier {
    pub min_qty: i64,
    pub max_qty: i64,
    pub unit_price: Satang,
}

impl PricingTier {
    pub fn new(min_qty: i64, max_qty: i64, unit_price: Satang) -> Self {
        Self { min_qty, max_qty, unit_price }
    }

    pub fn contains(&self, quantity: i64) -> bool {
        self.min_qty <= quantity && quantity <= self.max_qty
    }
}

//--------------------------------------        Product          -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub farm_id: String,
    pub name: String,
    pub unit: String,
    pub retail_price: Satang,
    /// The smallest quantity for which a wholesale inquiry may be submitted
    pub moq_wholesale: i64,
    pub total_stock: i64,
    pub reserved_stock: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub pricing_tiers: Vec<PricingTier>,
}

impl Product {
    /// The only quantity that may be offered to new orders.
    pub fn available_stock(&self) -> i64 {
        self.total_stock - self.reserved_stock
    }

    /// The unit price for the given quantity according to the tier schedule. Quantities that no tier covers fall back
    /// to the retail price.
    pub fn unit_price_for(&self, quantity: i64) -> Satang {
        resolve_unit_price(&self.pricing_tiers, quantity).unwrap_or(self.retail_price)
    }
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub farm_id: String,
    pub name: String,
    pub unit: String,
    pub retail_price: Satang,
    pub moq_wholesale: i64,
    pub total_stock: i64,
    pub pricing_tiers: Vec<PricingTier>,
}

impl NewProduct {
    pub fn new<S: Into<String>>(farm_id: S, name: S, retail_price: Satang, total_stock: i64) -> Self {
        Self {
            farm_id: farm_id.into(),
            name: name.into(),
            unit: "kg".to_string(),
            retail_price,
            moq_wholesale: 1,
            total_stock,
            pricing_tiers: Vec::new(),
        }
    }

    pub fn with_unit<S: Into<String>>(mut self, unit: S) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_moq(mut self, moq: i64) -> Self {
        self.moq_wholesale = moq;
        self
    }

    pub fn with_tier(mut self, min_qty: i64, max_qty: i64, unit_price: Satang) -> Self {
        self.pricing_tiers.push(PricingTier::new(min_qty, max_qty, unit_price));
        self
    }
}

//--------------------------------------     DeliveryMethod      -------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryMethod {
    /// The buyer collects the produce at the farm.
    #[default]
    Pickup,
    /// The farm delivers with its own vehicle.
    FarmDelivery,
    /// A third-party carrier delivers. Shipping requires a tracking reference.
    Courier,
}

impl DeliveryMethod {
    pub fn is_self_fulfilled(&self) -> bool {
        !matches!(self, DeliveryMethod::Courier)
    }
}

impl Display for DeliveryMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryMethod::Pickup => write!(f, "PICKUP"),
            DeliveryMethod::FarmDelivery => write!(f, "FARM_DELIVERY"),
            DeliveryMethod::Courier => write!(f, "COURIER"),
        }
    }
}

impl FromStr for DeliveryMethod {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PICKUP" => Ok(Self::Pickup),
            "FARM_DELIVERY" => Ok(Self::FarmDelivery),
            "COURIER" => Ok(Self::Courier),
            _ => Err(ConversionError::new("delivery method", s)),
        }
    }
}

//--------------------------------------     OrderStatusType     -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatusType {
    /// The order has been placed and stock is reserved. No payment has been received.
    Pending,
    /// The payment provider has confirmed payment in full.
    Paid,
    /// The farm has committed to fulfilling the order. Reserved stock has been permanently deducted.
    Confirmed,
    /// The farm is harvesting or packing the order.
    Preparing,
    /// The order is on its way to the buyer.
    Shipped,
    /// The buyer has received the order.
    Delivered,
    /// The order was cancelled by the buyer, the farm, an admin or the unpaid-order sweep.
    Cancelled,
    /// The payment was returned to the buyer.
    Refunded,
}

impl OrderStatusType {
    pub const ALL: [OrderStatusType; 8] = [
        OrderStatusType::Pending,
        OrderStatusType::Paid,
        OrderStatusType::Confirmed,
        OrderStatusType::Preparing,
        OrderStatusType::Shipped,
        OrderStatusType::Delivered,
        OrderStatusType::Cancelled,
        OrderStatusType::Refunded,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatusType::Delivered | OrderStatusType::Cancelled | OrderStatusType::Refunded)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "PENDING"),
            OrderStatusType::Paid => write!(f, "PAID"),
            OrderStatusType::Confirmed => write!(f, "CONFIRMED"),
            OrderStatusType::Preparing => write!(f, "PREPARING"),
            OrderStatusType::Shipped => write!(f, "SHIPPED"),
            OrderStatusType::Delivered => write!(f, "DELIVERED"),
            OrderStatusType::Cancelled => write!(f, "CANCELLED"),
            OrderStatusType::Refunded => write!(f, "REFUNDED"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "PAID" => Ok(Self::Paid),
            "CONFIRMED" => Ok(Self::Confirmed),
            "PREPARING" => Ok(Self::Preparing),
            "SHIPPED" => Ok(Self::Shipped),
            "DELIVERED" => Ok(Self::Delivered),
            "CANCELLED" => Ok(Self::Cancelled),
            "REFUNDED" => Ok(Self::Refunded),
            _ => Err(ConversionError::new("order status", s)),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to PENDING");
            OrderStatusType::Pending
        })
    }
}

//--------------------------------------       OrderNumber       -------------------------------------------------------
/// The externally visible, human-legible order reference, e.g. `FG-261019-7K3QXH`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderNumber(pub String);

impl FromStr for OrderNumber {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderNumber {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl OrderNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------        OrderItem        -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    /// The unit price at the time the order was placed
    pub unit_price: Satang,
    pub line_total: Satang,
}

//--------------------------------------          Order          -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_number: OrderNumber,
    pub buyer_id: String,
    pub farm_id: String,
    pub status: OrderStatusType,
    pub delivery_method: DeliveryMethod,
    pub tracking_number: Option<String>,
    pub subtotal: Satang,
    pub delivery_fee: Satang,
    pub platform_fee: Satang,
    pub total: Satang,
    /// True once the reserved stock for this order has been permanently deducted
    pub inventory_committed: bool,
    /// The inquiry this order was converted from, if any
    pub source_inquiry_id: Option<i64>,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    #[sqlx(skip)]
    pub items: Vec<OrderItem>,
}

impl Order {
    pub fn quantity_of(&self, product_id: i64) -> i64 {
        self.items.iter().filter(|i| i.product_id == product_id).map(|i| i.quantity).sum()
    }
}

//--------------------------------------        NewOrder         -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price: Satang,
}

impl NewOrderItem {
    pub fn new(product_id: i64, quantity: i64, unit_price: Satang) -> Self {
        Self { product_id, quantity, unit_price }
    }

    pub fn line_total(&self) -> Satang {
        self.unit_price * self.quantity
    }

    pub fn checked_line_total(&self) -> Option<Satang> {
        self.unit_price.checked_mul(self.quantity)
    }
}

/// A fully priced order, ready to be persisted. Stock for every item is reserved when it is inserted.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: OrderNumber,
    pub buyer_id: String,
    pub farm_id: String,
    pub delivery_method: DeliveryMethod,
    pub items: Vec<NewOrderItem>,
    pub delivery_fee: Satang,
    pub platform_fee: Satang,
    pub source_inquiry_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn new<S: Into<String>>(order_number: OrderNumber, buyer_id: S, farm_id: S) -> Self {
        Self {
            order_number,
            buyer_id: buyer_id.into(),
            farm_id: farm_id.into(),
            delivery_method: DeliveryMethod::default(),
            items: Vec::new(),
            delivery_fee: Satang::default(),
            platform_fee: Satang::default(),
            source_inquiry_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_item(mut self, item: NewOrderItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn with_delivery_method(mut self, method: DeliveryMethod) -> Self {
        self.delivery_method = method;
        self
    }

    pub fn with_fees(mut self, delivery_fee: Satang, platform_fee: Satang) -> Self {
        self.delivery_fee = delivery_fee;
        self.platform_fee = platform_fee;
        self
    }

    pub fn with_source_inquiry(mut self, inquiry_id: i64) -> Self {
        self.source_inquiry_id = Some(inquiry_id);
        self
    }

    pub fn subtotal(&self) -> Satang {
        self.items.iter().map(NewOrderItem::line_total).sum()
    }

    pub fn total(&self) -> Satang {
        self.subtotal() + self.delivery_fee + self.platform_fee
    }

    /// The subtotal, or `None` if any line or the sum of the lines overflows.
    pub fn checked_subtotal(&self) -> Option<Satang> {
        self.items.iter().try_fold(Satang::default(), |acc, item| acc.checked_add(item.checked_line_total()?))
    }

    pub fn checked_total(&self) -> Option<Satang> {
        self.checked_subtotal()?.checked_add(self.delivery_fee)?.checked_add(self.platform_fee)
    }
}

//--------------------------------------      PaymentStatus      -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "PENDING"),
            PaymentStatus::Completed => write!(f, "COMPLETED"),
            PaymentStatus::Failed => write!(f, "FAILED"),
            PaymentStatus::Refunded => write!(f, "REFUNDED"),
        }
    }
}

//--------------------------------------         Payment         -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub order_id: i64,
    pub status: PaymentStatus,
    /// The payment method reported by the buyer or provider, e.g. `promptpay` or `card`
    pub method: String,
    /// The provider's payment intent identifier. Used to correlate asynchronous notifications.
    pub provider_intent_id: String,
    pub amount: Satang,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub order_id: i64,
    pub method: String,
    pub provider_intent_id: String,
    pub amount: Satang,
}

impl NewPayment {
    pub fn new<S: Into<String>>(order_id: i64, method: S, provider_intent_id: S, amount: Satang) -> Self {
        Self { order_id, method: method.into(), provider_intent_id: provider_intent_id.into(), amount }
    }
}

//--------------------------------------    InquiryStatusType    -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InquiryStatusType {
    /// Submitted by the buyer; no reply yet.
    Pending,
    /// At least one message has been exchanged.
    Negotiating,
    /// A price has been agreed.
    Accepted,
    /// The inquiry has been turned into an order.
    Converted,
    Rejected,
    Expired,
}

impl InquiryStatusType {
    pub const ALL: [InquiryStatusType; 6] = [
        InquiryStatusType::Pending,
        InquiryStatusType::Negotiating,
        InquiryStatusType::Accepted,
        InquiryStatusType::Converted,
        InquiryStatusType::Rejected,
        InquiryStatusType::Expired,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, InquiryStatusType::Converted | InquiryStatusType::Rejected | InquiryStatusType::Expired)
    }

    /// Whether the inquiry is still open for negotiation.
    pub fn is_open(&self) -> bool {
        matches!(self, InquiryStatusType::Pending | InquiryStatusType::Negotiating)
    }
}

impl Display for InquiryStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InquiryStatusType::Pending => write!(f, "PENDING"),
            InquiryStatusType::Negotiating => write!(f, "NEGOTIATING"),
            InquiryStatusType::Accepted => write!(f, "ACCEPTED"),
            InquiryStatusType::Converted => write!(f, "CONVERTED"),
            InquiryStatusType::Rejected => write!(f, "REJECTED"),
            InquiryStatusType::Expired => write!(f, "EXPIRED"),
        }
    }
}

impl FromStr for InquiryStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "NEGOTIATING" => Ok(Self::Negotiating),
            "ACCEPTED" => Ok(Self::Accepted),
            "CONVERTED" => Ok(Self::Converted),
            "REJECTED" => Ok(Self::Rejected),
            "EXPIRED" => Ok(Self::Expired),
            _ => Err(ConversionError::new("inquiry status", s)),
        }
    }
}

//--------------------------------------     InquiryMessage      -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct InquiryMessage {
    pub id: i64,
    pub inquiry_id: i64,
    pub sender_id: String,
    pub sender_role: Role,
    pub body: String,
    /// A counter offer (unit price) carried by this message
    pub offered_price: Option<Satang>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewInquiryMessage {
    pub sender_id: String,
    pub sender_role: Role,
    pub body: String,
    pub offered_price: Option<Satang>,
}

impl NewInquiryMessage {
    pub fn new<S: Into<String>>(sender: &Actor, body: S) -> Self {
        Self { sender_id: sender.id.clone(), sender_role: sender.role, body: body.into(), offered_price: None }
    }

    pub fn with_offer(mut self, price: Satang) -> Self {
        self.offered_price = Some(price);
        self
    }
}

//--------------------------------------         Inquiry         -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Inquiry {
    pub id: i64,
    pub inquiry_number: String,
    pub buyer_id: String,
    pub farm_id: String,
    pub product_id: i64,
    pub quantity: i64,
    /// The unit price proposed by the buyer
    pub proposed_price: Satang,
    /// The latest counter offer from the farm
    pub counter_price: Option<Satang>,
    pub agreed_price: Option<Satang>,
    pub status: InquiryStatusType,
    /// The order created when the inquiry was converted
    pub order_id: Option<i64>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub messages: Vec<InquiryMessage>,
}

impl Inquiry {
    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

#[derive(Debug, Clone)]
pub struct NewInquiry {
    pub inquiry_number: String,
    pub buyer_id: String,
    pub farm_id: String,
    pub product_id: i64,
    pub quantity: i64,
    pub proposed_price: Satang,
    pub expires_at: DateTime<Utc>,
    /// An optional opening note. It is stored as the first message, but does not advance the status.
    pub note: Option<String>,
}
