//! Exact decimal types for prices and quantities
//!
//! Built on `rust_decimal` so comparisons and sums are exact; binary
//! floating point never enters the matching path. Both types serialize
//! as strings to avoid JSON number precision loss.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

/// A strictly positive price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Price(Decimal);

impl Price {
    /// Create a price, returning `None` unless the value is positive.
    pub fn try_new(value: Decimal) -> Option<Self> {
        if value > Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Create from an integer. Intended for tests and fixtures.
    ///
    /// # Panics
    /// Panics on zero.
    pub fn from_u64(value: u64) -> Self {
        Self::try_new(Decimal::from(value)).expect("price must be positive")
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Whether this price sits on the given quantum (tick size).
    ///
    /// A non-positive quantum disables the check.
    pub fn is_on_quantum(&self, quantum: Decimal) -> bool {
        if quantum <= Decimal::ZERO {
            return true;
        }
        (self.0 % quantum).is_zero()
    }
}

impl FromStr for Price {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal = Decimal::from_str(s)?;
        Price::try_new(decimal)
            .ok_or_else(|| rust_decimal::Error::ErrorString("price must be positive".to_string()))
    }
}

impl Serialize for Price {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let decimal = Decimal::from_str(&s).map_err(serde::de::Error::custom)?;
        Self::try_new(decimal).ok_or_else(|| serde::de::Error::custom("price must be positive"))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A non-negative quantity.
///
/// Zero is representable because fill accounting starts at zero; order
/// validation separately rejects zero-quantity submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quantity(Decimal);

impl Quantity {
    /// Create a quantity, returning `None` if the value is negative.
    pub fn try_new(value: Decimal) -> Option<Self> {
        if value >= Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Create from an integer. Intended for tests and fixtures.
    pub fn from_u64(value: u64) -> Self {
        Self(Decimal::from(value))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Subtraction that refuses to go negative.
    pub fn checked_sub(&self, rhs: Quantity) -> Option<Quantity> {
        if self.0 >= rhs.0 {
            Some(Self(self.0 - rhs.0))
        } else {
            None
        }
    }

    /// The smaller of two quantities.
    pub fn min(self, other: Quantity) -> Quantity {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }

    /// Whether this quantity sits on the given quantum (lot size).
    ///
    /// A non-positive quantum disables the check.
    pub fn is_on_quantum(&self, quantum: Decimal) -> bool {
        if quantum <= Decimal::ZERO {
            return true;
        }
        (self.0 % quantum).is_zero()
    }
}

impl Add for Quantity {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Quantity {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl FromStr for Quantity {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal = Decimal::from_str(s)?;
        Quantity::try_new(decimal)
            .ok_or_else(|| rust_decimal::Error::ErrorString("quantity cannot be negative".to_string()))
    }
}

impl Serialize for Quantity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let decimal = Decimal::from_str(&s).map_err(serde::de::Error::custom)?;
        Self::try_new(decimal).ok_or_else(|| serde::de::Error::custom("quantity cannot be negative"))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_rejects_non_positive() {
        assert!(Price::try_new(Decimal::ZERO).is_none());
        assert!(Price::try_new(Decimal::from(-5)).is_none());
        assert!(Price::try_new(Decimal::from(100)).is_some());
    }

    #[test]
    fn test_price_tick_quantum() {
        let price = Price::from_str("100.25").unwrap();
        assert!(price.is_on_quantum(Decimal::from_str("0.25").unwrap()));
        assert!(price.is_on_quantum(Decimal::from_str("0.05").unwrap()));
        assert!(!price.is_on_quantum(Decimal::from_str("0.1").unwrap()));
        // Disabled quantum always passes
        assert!(price.is_on_quantum(Decimal::ZERO));
    }

    #[test]
    fn test_price_serializes_as_string() {
        let price = Price::from_str("50000.25").unwrap();
        let json = serde_json::to_string(&price).unwrap();
        assert_eq!(json, "\"50000.25\"");
        let back: Price = serde_json::from_str(&json).unwrap();
        assert_eq!(price, back);
    }

    #[test]
    fn test_price_deserialize_rejects_zero() {
        let result: Result<Price, _> = serde_json::from_str("\"0\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_quantity_allows_zero_rejects_negative() {
        assert!(Quantity::try_new(Decimal::ZERO).is_some());
        assert!(Quantity::try_new(Decimal::from(-1)).is_none());
    }

    #[test]
    fn test_quantity_checked_sub() {
        let q3 = Quantity::from_u64(3);
        let q5 = Quantity::from_u64(5);
        assert_eq!(q5.checked_sub(q3), Some(Quantity::from_u64(2)));
        assert_eq!(q3.checked_sub(q5), None);
    }

    #[test]
    fn test_quantity_min() {
        let q3 = Quantity::from_u64(3);
        let q5 = Quantity::from_u64(5);
        assert_eq!(q3.min(q5), q3);
        assert_eq!(q5.min(q3), q3);
    }

    #[test]
    fn test_quantity_lot_quantum() {
        let qty = Quantity::from_str("1.5").unwrap();
        assert!(qty.is_on_quantum(Decimal::from_str("0.5").unwrap()));
        assert!(!qty.is_on_quantum(Decimal::from_str("1").unwrap()));
    }

    #[test]
    fn test_exact_decimal_comparison() {
        // 0.1 + 0.2 must equal 0.3 exactly, unlike binary floats
        let a = Quantity::from_str("0.1").unwrap() + Quantity::from_str("0.2").unwrap();
        assert_eq!(a, Quantity::from_str("0.3").unwrap());
    }
}
