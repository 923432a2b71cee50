//! Unit price resolution against a tiered price schedule.
//!
//! Tiers are assumed to be non-overlapping, sorted in ascending order and inclusive at both ends. They are not
//! validated here.
use crate::db_types::{PricingTier, Satang};

/// Returns the unit price of the tier whose `[min_qty, max_qty]` range contains `quantity`.
///
/// * A quantity above the highest tier's `max_qty` is charged at the last tier's price.
/// * If there are no tiers, or the quantity falls below the lowest tier (or into a gap between tiers), `None` is
///   returned and the caller decides on a fallback (usually the retail price).
pub fn resolve_unit_price(tiers: &[PricingTier], quantity: i64) -> Option<Satang> {
    if let Some(tier) = tiers.iter().find(|t| t.contains(quantity)) {
        return Some(tier.unit_price);
    }
    match tiers.last() {
        Some(last) if quantity > last.max_qty => Some(last.unit_price),
        _ => None,
    }
}
