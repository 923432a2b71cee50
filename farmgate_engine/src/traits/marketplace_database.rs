use thiserror::Error;

use crate::{
    db_types::{OrderNumber, Satang},
    lifecycle::InvalidTransition,
    traits::{InquiryManagement, InventoryManagement, OrderManagement, PaymentManagement},
};

/// This trait defines the highest level of behaviour for backends supporting the Farmgate marketplace engine.
///
/// A backend must be able to
/// * keep the inventory ledger for every product ([`InventoryManagement`]),
/// * persist orders and apply order lifecycle transitions atomically with their inventory side effects
///   ([`OrderManagement`]),
/// * record payment attempts and settle them against orders ([`PaymentManagement`]),
/// * persist wholesale inquiries and their negotiation history ([`InquiryManagement`]).
#[allow(async_fn_in_trait)]
pub trait MarketplaceDatabase:
    Clone + InventoryManagement + OrderManagement + PaymentManagement + InquiryManagement
{
    /// The URL of the database
    fn url(&self) -> &str;

    /// Closes all connections to the database.
    async fn close(&self);
}

#[derive(Debug, Clone, Error)]
pub enum MarketplaceError {
    #[error("Insufficient stock for product {product_id}. Requested {requested}, but only {available} is available")]
    InsufficientStock { product_id: i64, requested: i64, available: i64 },
    #[error("Invalid state transition. {0}")]
    InvalidStateTransition(#[from] InvalidTransition),
    #[error("All items in an order must come from the same farm. The cart contains items from {}", .0.join(", "))]
    MultiFarmCart(Vec<String>),
    #[error("The payment notification signature is invalid. {0}")]
    InvalidSignature(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(String),
    #[error("The requested product {0} does not exist")]
    ProductNotFound(i64),
    #[error("The requested inquiry {0} does not exist")]
    InquiryNotFound(i64),
    #[error("No payment exists for {0}")]
    PaymentNotFound(String),
    #[error("Forbidden. {0}")]
    ForbiddenAccess(String),
    #[error("Cannot place an order with an empty cart")]
    EmptyCart,
    #[error("Quantity {0} is not valid. Quantities must be strictly positive and the order total must be representable")]
    InvalidQuantity(i64),
    #[error("Prices must be strictly positive, but {0} was given")]
    InvalidPrice(Satang),
    #[error("Wholesale inquiries for product {product_id} require at least {minimum} units, but {requested} were requested")]
    BelowMinimumOrderQuantity { product_id: i64, requested: i64, minimum: i64 },
    #[error("Order {0} is delivered by courier and cannot be shipped without a tracking number")]
    MissingTrackingReference(OrderNumber),
    #[error("Inquiry {0} has no agreed price and cannot be converted into an order")]
    MissingAgreedPrice(i64),
    #[error("The payment notification could not be understood. {0}")]
    InvalidPaymentEvent(String),
    #[error("Inquiry {0} has expired")]
    InquiryExpired(String),
    #[error("We have an internal database engine (configuration/uptime etc.) error: {0}")]
    DatabaseError(String),
}

impl MarketplaceError {
    /// A stable, machine-readable code for the error
    pub fn code(&self) -> &'static str {
        use MarketplaceError::*;
        match self {
            InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            InvalidStateTransition(_) => "INVALID_STATE_TRANSITION",
            MultiFarmCart(_) => "MULTI_FARM_CART",
            InvalidSignature(_) => "INVALID_SIGNATURE",
            OrderNotFound(_) | ProductNotFound(_) | InquiryNotFound(_) | PaymentNotFound(_) => "NOT_FOUND",
            ForbiddenAccess(_) => "FORBIDDEN",
            EmptyCart => "EMPTY_CART",
            InvalidQuantity(_) => "INVALID_QUANTITY",
            InvalidPrice(_) => "INVALID_PRICE",
            BelowMinimumOrderQuantity { .. } => "BELOW_MINIMUM_ORDER_QUANTITY",
            MissingTrackingReference(_) => "MISSING_TRACKING_REFERENCE",
            MissingAgreedPrice(_) => "MISSING_AGREED_PRICE",
            InvalidPaymentEvent(_) => "INVALID_PAYMENT_EVENT",
            InquiryExpired(_) => "INQUIRY_EXPIRED",
            DatabaseError(_) => "INTERNAL",
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code() == "NOT_FOUND"
    }
}

impl From<sqlx::Error> for MarketplaceError {
    fn from(e: sqlx::Error) -> Self {
        MarketplaceError::DatabaseError(e.to_string())
    }
}
