// core/src/money.rs

//! Minor-unit money.
//!
//! Prices are entered and displayed in naira as `Decimal` with two decimal places.
//! Everything that is summed, split, charged or stored as a total is an integer
//! number of kobo, so a total never changes unit between modules.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Kobo per naira.
pub const MINOR_PER_MAJOR: i64 = 100;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoneyError {
  #[error("Amount {0} does not fit in 64-bit kobo")]
  Overflow(Decimal),

  #[error("Amount {0} is negative")]
  Negative(Decimal),
}

/// An amount in kobo (1/100 naira).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Kobo(pub i64);

impl Kobo {
  pub const ZERO: Kobo = Kobo(0);

  /// Converts a naira amount to kobo, rounding half to even at the kobo boundary.
  pub fn from_naira(amount: Decimal) -> Result<Self, MoneyError> {
    if amount.is_sign_negative() && !amount.is_zero() {
      return Err(MoneyError::Negative(amount));
    }
    let scaled = amount
      .checked_mul(Decimal::from(MINOR_PER_MAJOR))
      .ok_or(MoneyError::Overflow(amount))?;
    round_to_unit(scaled).to_i64().map(Kobo).ok_or(MoneyError::Overflow(amount))
  }

  pub fn to_naira(self) -> Decimal {
    Decimal::new(self.0, 2)
  }

  pub fn value(self) -> i64 {
    self.0
  }

  pub fn is_zero(self) -> bool {
    self.0 == 0
  }

  pub fn checked_add(self, rhs: Kobo) -> Result<Kobo, MoneyError> {
    self
      .0
      .checked_add(rhs.0)
      .map(Kobo)
      .ok_or_else(|| MoneyError::Overflow(self.to_naira() + rhs.to_naira()))
  }

  /// Adds up `amounts`, failing instead of wrapping past `i64::MAX` kobo.
  pub fn checked_sum(amounts: impl IntoIterator<Item = Kobo>) -> Result<Kobo, MoneyError> {
    amounts.into_iter().try_fold(Kobo::ZERO, Kobo::checked_add)
  }
}

/// Rounds to a whole number, half to even.
pub fn round_to_unit(amount: Decimal) -> Decimal {
  amount.round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
}

/// Rounds to currency precision (two decimal places), half to even.
pub fn round_to_currency(amount: Decimal) -> Decimal {
  amount.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

impl fmt::Display for Kobo {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "NGN {:.2}", self.to_naira())
  }
}
