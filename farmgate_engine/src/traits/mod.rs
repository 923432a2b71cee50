//! # Database management and control.
//!
//! This module provides the interfaces that define the contracts of the marketplace engine database *backends*.
//!
//! ## Traits
//!
//! * [`MarketplaceDatabase`] is the top-level trait. A backend that implements it can serve every API in the engine.
//! * [`InventoryManagement`] keeps the stock ledger (reserve, release, confirm, restock).
//! * [`OrderManagement`] stores orders and applies lifecycle transitions together with their inventory side effects.
//! * [`PaymentManagement`] records payment attempts and settles them against their orders.
//! * [`InquiryManagement`] stores wholesale inquiries and their negotiation history.
//!
//! The lifecycle rules themselves live in [`crate::lifecycle`]. Backends only ever apply transitions that have already
//! been validated there, but they are responsible for making each one atomic.
mod data_objects;
mod inquiry_management;
mod inventory_management;
mod marketplace_database;
mod order_management;
mod payment_management;

pub use data_objects::{PaymentSettlement, SweepResult, TransitionDetails};
pub use inquiry_management::InquiryManagement;
pub use inventory_management::InventoryManagement;
pub use marketplace_database::{MarketplaceDatabase, MarketplaceError};
pub use order_management::OrderManagement;
pub use payment_management::PaymentManagement;
