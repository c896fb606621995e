//! Value Objects

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

/// Monetary amount in BRL.
///
/// The storefront sells in a single currency (the PIX rail is BRL-only), so
/// money is a plain decimal behind a newtype rather than an amount/currency
/// pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self { Self(amount) }
    pub fn amount(&self) -> Decimal { self.0 }
    pub fn is_zero(&self) -> bool { self.0.is_zero() }

    /// Price for `quantity` units at this per-unit amount.
    pub fn times(&self, quantity: u32) -> Money { Money(self.0 * Decimal::from(quantity)) }

    /// `value` percent of this amount.
    pub fn percent(&self, value: Decimal) -> Money {
        Money(self.0 * value / Decimal::ONE_HUNDRED)
    }

    pub fn min(self, other: Money) -> Money {
        if self.0 <= other.0 { self } else { other }
    }
}

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money { Money(self.0 + rhs.0) }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) { self.0 += rhs.0 }
}

impl Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money { Money(self.0 - rhs.0) }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R$ {:.2}", self.0)
    }
}

/// Human-readable order number: `YYYYMMDD-NNNN`, sequential per day.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    /// First order number of a day, e.g. `20231206-0001`.
    pub fn first(prefix: &str) -> Self { Self(format!("{prefix}-0001")) }

    /// Parse a stored order number, validating the `YYYYMMDD-NNNN` layout.
    pub fn parse(value: &str) -> Result<Self, OrderNumberError> {
        let (prefix, suffix) = value.split_once('-').ok_or(OrderNumberError::Malformed)?;
        if prefix.len() != 8 || !prefix.bytes().all(|b| b.is_ascii_digit()) {
            return Err(OrderNumberError::Malformed);
        }
        if suffix.len() != 4 || !suffix.bytes().all(|b| b.is_ascii_digit()) {
            return Err(OrderNumberError::Malformed);
        }
        Ok(Self(value.to_string()))
    }

    /// The next number in the same day's sequence.
    pub fn next(&self) -> Self {
        let (prefix, suffix) = self.0.split_once('-').unwrap_or((self.0.as_str(), "0000"));
        let n: u32 = suffix.parse().unwrap_or(0);
        Self(format!("{prefix}-{:04}", n + 1))
    }

    /// Date prefix for the given day.
    pub fn date_prefix(date: NaiveDate) -> String {
        date.format("%Y%m%d").to_string()
    }

    /// The number with separators stripped, used as a payment transaction id.
    pub fn payment_reference(&self) -> String {
        self.0.replace('-', "")
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone)] pub enum OrderNumberError { Malformed }
impl std::error::Error for OrderNumberError {}
impl fmt::Display for OrderNumberError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Order number must look like YYYYMMDD-NNNN")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_arithmetic() {
        let a = Money::new(Decimal::new(100, 0));
        assert_eq!(a.times(3), Money::new(Decimal::new(300, 0)));
        assert_eq!(a.percent(Decimal::new(10, 0)), Money::new(Decimal::new(10, 0)));
        assert_eq!(Money::new(Decimal::new(50, 0)).min(a), Money::new(Decimal::new(50, 0)));
    }

    #[test]
    fn test_money_display_keeps_cents() {
        assert_eq!(Money::new(Decimal::new(50, 0)).to_string(), "R$ 50.00");
        assert_eq!(Money::new(Decimal::new(1999, 2)).to_string(), "R$ 19.99");
    }

    #[test]
    fn test_order_number_sequence() {
        let first = OrderNumber::first("20231206");
        assert_eq!(first.as_str(), "20231206-0001");
        assert_eq!(first.next().as_str(), "20231206-0002");
        assert_eq!(first.payment_reference(), "202312060001");
    }

    #[test]
    fn test_order_number_parse_rejects_garbage() {
        assert!(OrderNumber::parse("20231206-0042").is_ok());
        assert!(OrderNumber::parse("20231206").is_err());
        assert!(OrderNumber::parse("2023-0001").is_err());
        assert!(OrderNumber::parse("20231206-01").is_err());
    }
}
