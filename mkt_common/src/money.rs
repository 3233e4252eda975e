use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

/// The currency that prices are quoted in when nothing else is configured.
pub const DEFAULT_CURRENCY_CODE: &str = "USD";
/// The number of basis points in one whole (100%).
pub const BASIS_POINTS: u32 = 10_000;

//--------------------------------------       Money         ---------------------------------------------------------
/// An amount of money, held as a signed count of the currency's minor units (e.g. cents).
///
/// `Money` does not carry its currency. Callers keep the currency code next to the amount, the same way the order and
/// ledger records do.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, AddAssign, add_assign);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a money amount: {0}")]
pub struct MoneyConversionError(String);

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Money {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Money {}

impl TryFrom<u64> for Money {
    type Error = MoneyConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        i64::try_from(value)
            .map(Self)
            .map_err(|_| MoneyConversionError(format!("Value {value} is too large to convert to Money")))
    }
}

impl TryFrom<i128> for Money {
    type Error = MoneyConversionError;

    fn try_from(value: i128) -> Result<Self, Self::Error> {
        i64::try_from(value).map(Self).map_err(|_| MoneyConversionError(format!("Value {value} overflows Money")))
    }
}

/// Formats the amount assuming two decimal places, which is what log lines and error messages want.
impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Money {
    pub fn from_minor(minor_units: i64) -> Self {
        Self(minor_units)
    }

    /// Whole currency units, assuming two decimal places.
    pub fn from_major(units: i64) -> Self {
        Self(units * 100)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// `None` if the product does not fit.
    pub fn checked_mul(&self, rhs: i64) -> Option<Money> {
        self.0.checked_mul(rhs).map(Money)
    }

    /// `None` if the sum does not fit.
    pub fn checked_add(&self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    pub fn saturating_mul(&self, rhs: i64) -> Money {
        Money(self.0.saturating_mul(rhs))
    }

    /// Returns `bps` basis points of this amount, rounded half-up to the nearest minor unit.
    ///
    /// Results beyond the `i64` range saturate.
    pub fn apply_bps(&self, bps: u32) -> Money {
        let scaled = div_round_half_up(i128::from(self.0) * i128::from(bps), i128::from(BASIS_POINTS));
        Money::try_from(scaled).unwrap_or(if scaled < 0 { Money(i64::MIN) } else { Money(i64::MAX) })
    }
}

/// Integer division that rounds halves away from zero ("round half up" for the non-negative amounts we deal with).
///
/// `denominator` must be positive.
pub fn div_round_half_up(numerator: i128, denominator: i128) -> i128 {
    debug_assert!(denominator > 0);
    let remainder = numerator.abs() % denominator;
    let quotient = numerator.abs() / denominator;
    let rounded = if remainder * 2 >= denominator { quotient + 1 } else { quotient };
    if numerator < 0 {
        -rounded
    } else {
        rounded
    }
}
