//! Non-negative decimal amounts.

use core::fmt;
use core::iter::Sum;
use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

/// Errors that can occur when constructing a [`Price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The amount is below zero.
    #[error("price cannot be negative")]
    Negative,
    /// The input is not a decimal number.
    #[error("price is not a valid decimal: {0}")]
    Invalid(String),
    /// More than two decimal places.
    #[error("price cannot have more than {max} decimal places")]
    TooPrecise {
        /// Maximum decimal places.
        max: u32,
    },
    /// The amount does not fit the `NUMERIC(12, 2)` columns.
    #[error("price must be below {max}")]
    TooLarge {
        /// Exclusive upper bound.
        max: i64,
    },
}

/// A non-negative monetary amount in the store currency.
///
/// Serialized as a decimal string (`"19.99"`) so no precision is lost in
/// transit; accepts either a JSON string or number on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Decimal places kept by the database columns.
    pub const SCALE: u32 = 2;

    /// Exclusive upper bound: ten integer digits.
    pub const LIMIT: i64 = 10_000_000_000;

    /// Create a price from a decimal.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Negative`] for amounts below zero,
    /// [`PriceError::TooPrecise`] for fractions of a cent and
    /// [`PriceError::TooLarge`] for amounts of [`Price::LIMIT`] or more.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative);
        }
        let amount = amount.normalize();
        if amount.scale() > Self::SCALE {
            return Err(PriceError::TooPrecise { max: Self::SCALE });
        }
        if amount >= Decimal::from(Self::LIMIT) {
            return Err(PriceError::TooLarge { max: Self::LIMIT });
        }
        Ok(Self(amount))
    }

    /// Create a price from an integer number of cents.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Negative`] for negative input.
    pub fn from_cents(cents: i64) -> Result<Self, PriceError> {
        Self::new(Decimal::new(cents, 2))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl FromStr for Price {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let amount = Decimal::from_str(s.trim()).map_err(|e| PriceError::Invalid(e.to_string()))?;
        Self::new(amount)
    }
}

impl TryFrom<Decimal> for Price {
    type Error = PriceError;

    fn try_from(amount: Decimal) -> Result<Self, Self::Error> {
        Self::new(amount)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        Self(iter.map(|p| p.0).sum())
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let amount = <Decimal as Deserialize>::deserialize(deserializer)?;
        Self::new(amount).map_err(serde::de::Error::custom)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Price {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Price {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let amount = <Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::new(amount)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Price {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Decimal as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_negative() {
        assert_eq!(Price::new(Decimal::new(-1, 2)), Err(PriceError::Negative));
        assert_eq!("-3".parse::<Price>(), Err(PriceError::Negative));
    }

    #[test]
    fn test_zero_is_allowed() {
        assert_eq!(Price::new(Decimal::ZERO).unwrap(), Price::ZERO);
    }

    #[test]
    fn test_display_two_places() {
        assert_eq!(Price::from_cents(1999).unwrap().to_string(), "19.99");
        assert_eq!("7".parse::<Price>().unwrap().to_string(), "7.00");
    }

    #[test]
    fn test_rejects_fractions_of_a_cent() {
        assert_eq!(
            "12.345".parse::<Price>(),
            Err(PriceError::TooPrecise { max: 2 })
        );
        // Trailing zeros do not count.
        assert_eq!(
            "12.500".parse::<Price>().unwrap(),
            Price::from_cents(1250).unwrap()
        );
        assert!(serde_json::from_str::<Price>("\"0.001\"").is_err());
    }

    #[test]
    fn test_rejects_amounts_beyond_column_width() {
        assert_eq!(
            "10000000000".parse::<Price>(),
            Err(PriceError::TooLarge { max: Price::LIMIT })
        );
        assert_eq!(
            "9999999999.99".parse::<Price>().unwrap().to_string(),
            "9999999999.99"
        );
        assert!(serde_json::from_str::<Price>("1e12").is_err());
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!("twelve".parse::<Price>(), Err(PriceError::Invalid(_))));
    }

    #[test]
    fn test_sum() {
        let total: Price = [Price::from_cents(250).unwrap(), Price::from_cents(125).unwrap()]
            .into_iter()
            .sum();
        assert_eq!(total, Price::from_cents(375).unwrap());
    }

    #[test]
    fn test_deserialize_string_and_number() {
        let from_str: Price = serde_json::from_str("\"12.50\"").unwrap();
        let from_num: Price = serde_json::from_str("12").unwrap();
        assert_eq!(from_str, Price::from_cents(1250).unwrap());
        assert_eq!(from_num, Price::from_cents(1200).unwrap());
        assert!(serde_json::from_str::<Price>("\"-1\"").is_err());
    }
}
