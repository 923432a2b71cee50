use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const THB_CURRENCY_CODE: &str = "THB";

//--------------------------------------       Satang        ---------------------------------------------------------
/// An amount of Thai baht, held as an integer number of satang (1/100 THB).
///
/// All prices, fees and totals in the marketplace use this type so that no floating point arithmetic is ever involved
/// in computing an order total.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Satang(i64);

op!(binary Satang, Add, add);
op!(binary Satang, Sub, sub);
op!(inplace Satang, AddAssign, add_assign);
op!(inplace Satang, SubAssign, sub_assign);
op!(unary Satang, Neg, neg);

impl Mul<i64> for Satang {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Satang {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in satang: {0}")]
pub struct SatangConversionError(String);

impl From<i64> for Satang {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Satang {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Satang {}

impl TryFrom<u64> for Satang {
    type Error = SatangConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(SatangConversionError(format!("Value {value} is too large to convert to Satang")))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Satang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}฿{}.{:02}", abs / 100, abs % 100)
    }
}

impl Satang {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_baht(baht: i64) -> Self {
        Self(baht * 100)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Multiplies by a quantity, returning `None` if the result cannot be represented.
    pub fn checked_mul(&self, rhs: i64) -> Option<Self> {
        self.0.checked_mul(rhs).map(Self)
    }

    pub fn checked_add(&self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    /// Returns the given fraction of this amount, expressed in basis points (1/100th of a percent), rounded half-up to
    /// the nearest satang.
    pub fn basis_points(&self, bps: u32) -> Self {
        let scaled = i128::from(self.0) * i128::from(bps);
        let rounded = (scaled + 5_000) / 10_000;
        #[allow(clippy::cast_possible_truncation)]
        Self(rounded as i64)
    }
}
