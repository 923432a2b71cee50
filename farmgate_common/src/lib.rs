mod satang;

pub mod helpers;
pub mod op;
mod secret;

pub use satang::{Satang, SatangConversionError, THB_CURRENCY_CODE};
pub use secret::Secret;
