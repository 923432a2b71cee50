use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{DeliveryMethod, OrderNumber, OrderStatusType, Satang},
    traits::MarketplaceError,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderQueryFilter {
    pub order_number: Option<OrderNumber>,
    pub buyer_id: Option<String>,
    pub farm_id: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub status: Option<Vec<OrderStatusType>>,
}

impl OrderQueryFilter {
    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn with_order_number(mut self, number: OrderNumber) -> Self {
        self.order_number = Some(number);
        self
    }

    pub fn with_buyer_id<S: Into<String>>(mut self, buyer_id: S) -> Self {
        self.buyer_id = Some(buyer_id.into());
        self
    }

    pub fn with_farm_id<S: Into<String>>(mut self, farm_id: S) -> Self {
        self.farm_id = Some(farm_id.into());
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.status.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.order_number.is_none() &&
            self.buyer_id.is_none() &&
            self.farm_id.is_none() &&
            self.status.as_ref().map(Vec::is_empty).unwrap_or(true) &&
            self.since.is_none() &&
            self.until.is_none()
    }
}

impl Display for OrderQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "No filters.")?;
            return Ok(());
        }
        if let Some(number) = &self.order_number {
            write!(f, "order_number: {number}. ")?;
        }
        if let Some(buyer_id) = &self.buyer_id {
            write!(f, "buyer_id: {buyer_id}. ")?;
        }
        if let Some(farm_id) = &self.farm_id {
            write!(f, "farm_id: {farm_id}. ")?;
        }
        if let Some(since) = &self.since {
            write!(f, "since {since}. ")?;
        }
        if let Some(until) = &self.until {
            write!(f, "until {until}. ")?;
        }
        if let Some(statuses) = &self.status {
            let statuses = statuses.iter().map(|s| s.to_string()).collect::<Vec<String>>().join(",");
            write!(f, "statuses: [{statuses}]. ")?;
        }
        Ok(())
    }
}

/// A single cart line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: i64,
    pub quantity: i64,
}

impl CartItem {
    pub fn new(product_id: i64, quantity: i64) -> Self {
        Self { product_id, quantity }
    }
}

/// A buyer's request to place an order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cart {
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub delivery_method: DeliveryMethod,
}

impl Cart {
    pub fn new(delivery_method: DeliveryMethod) -> Self {
        Self { items: Vec::new(), delivery_method }
    }

    pub fn with_item(mut self, product_id: i64, quantity: i64) -> Self {
        self.items.push(CartItem::new(product_id, quantity));
        self
    }

    /// Merges lines for the same product, keeping the order in which products first appear.
    pub fn merged_items(&self) -> Result<Vec<CartItem>, MarketplaceError> {
        let mut merged: Vec<CartItem> = Vec::with_capacity(self.items.len());
        for item in &self.items {
            match merged.iter_mut().find(|m| m.product_id == item.product_id) {
                Some(existing) => {
                    existing.quantity = existing
                        .quantity
                        .checked_add(item.quantity)
                        .ok_or(MarketplaceError::InvalidQuantity(item.quantity))?;
                },
                None => merged.push(*item),
            }
        }
        Ok(merged)
    }
}

/// Delivery and platform fees added on top of the order subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub farm_delivery_fee: Satang,
    pub courier_fee: Satang,
    /// The platform fee, in basis points of the subtotal
    pub platform_fee_bps: u32,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self { farm_delivery_fee: Satang::from(4_000), courier_fee: Satang::from(6_000), platform_fee_bps: 300 }
    }
}

impl FeeSchedule {
    pub fn free() -> Self {
        Self { farm_delivery_fee: Satang::default(), courier_fee: Satang::default(), platform_fee_bps: 0 }
    }

    pub fn delivery_fee(&self, method: DeliveryMethod) -> Satang {
        match method {
            DeliveryMethod::Pickup => Satang::default(),
            DeliveryMethod::FarmDelivery => self.farm_delivery_fee,
            DeliveryMethod::Courier => self.courier_fee,
        }
    }

    pub fn platform_fee(&self, subtotal: Satang) -> Satang {
        subtotal.basis_points(self.platform_fee_bps)
    }
}
