use crate::{
    db_types::{NewProduct, Product},
    traits::MarketplaceError,
};

/// The `InventoryManagement` trait defines the inventory ledger.
///
/// Every product carries a `total_stock` and a `reserved_stock` counter, with `0 <= reserved_stock <= total_stock`.
/// Only `total_stock - reserved_stock` may be offered to new orders. Every method here must be applied as a single
/// guarded update, so that concurrent callers can never drive either counter out of range.
///
/// The ledger does not deduplicate. Exactly-once semantics for `confirm` and `release` are provided by the order
/// lifecycle, which only ever applies them as part of a status change.
#[allow(async_fn_in_trait)]
pub trait InventoryManagement {
    /// Stores a new product, along with its pricing tiers.
    async fn insert_product(&self, product: NewProduct) -> Result<Product, MarketplaceError>;

    /// Fetches the product with the given id, including its pricing tiers.
    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, MarketplaceError>;

    /// Fetches every product in `product_ids` that exists. Missing ids are silently skipped.
    async fn fetch_products(&self, product_ids: &[i64]) -> Result<Vec<Product>, MarketplaceError>;

    /// Reserves `quantity` units of the product.
    ///
    /// Fails with [`MarketplaceError::InsufficientStock`] if fewer than `quantity` units are available, in which case
    /// nothing changes.
    async fn reserve_stock(&self, product_id: i64, quantity: i64) -> Result<Product, MarketplaceError>;

    /// Returns `quantity` reserved units to the available pool. The reservation never drops below zero.
    async fn release_stock(&self, product_id: i64, quantity: i64) -> Result<Product, MarketplaceError>;

    /// Converts a reservation of `quantity` units into a permanent deduction.
    async fn confirm_stock(&self, product_id: i64, quantity: i64) -> Result<Product, MarketplaceError>;

    /// Puts `quantity` previously deducted units back into stock.
    async fn restock(&self, product_id: i64, quantity: i64) -> Result<Product, MarketplaceError>;
}
