//! # Order and inquiry lifecycles
//!
//! The legal status transitions for orders and wholesale inquiries are encoded as exhaustive `match` expressions on
//! the status enums. A transition never touches storage; it only describes which timestamp to stamp and which
//! inventory side effect has to be applied together with the status write. The database backends apply those effects
//! inside the same transaction as the status change.
mod inquiries;
mod orders;

use std::fmt::Display;

pub use inquiries::InquiryTransition;
pub use orders::{InventoryAction, OrderTransition, TransitionStamp};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A requested status change that is not an edge of the lifecycle graph.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{entity} cannot move from {from} to {to}")]
pub struct InvalidTransition {
    pub entity: String,
    pub from: String,
    pub to: String,
}

impl InvalidTransition {
    pub fn new<A: Display, B: Display>(entity: &str, from: A, to: B) -> Self {
        Self { entity: entity.to_string(), from: from.to_string(), to: to.to_string() }
    }
}
