//! Line-item quantities.

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Errors that can occur when constructing a [`Quantity`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QuantityError {
    /// Zero or negative.
    #[error("quantity must be at least 1")]
    NotPositive,
    /// Larger than a single order line accepts.
    #[error("quantity must be at most {max}")]
    TooLarge {
        /// Maximum allowed quantity.
        max: i32,
    },
}

/// A strictly positive number of units on an order line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Quantity(i32);

impl Quantity {
    /// Upper bound for a single line. Keeps summed quantities far from
    /// `i32` overflow when several lines name the same product.
    pub const MAX: i32 = 100_000;

    /// Create a quantity.
    ///
    /// # Errors
    ///
    /// Returns an error if `n < 1` or `n > Quantity::MAX`.
    pub const fn new(n: i32) -> Result<Self, QuantityError> {
        if n < 1 {
            return Err(QuantityError::NotPositive);
        }
        if n > Self::MAX {
            return Err(QuantityError::TooLarge { max: Self::MAX });
        }
        Ok(Self(n))
    }

    /// The number of units.
    #[must_use]
    pub const fn get(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let n = i64::deserialize(deserializer)?;
        let n = i32::try_from(n).map_err(|_| {
            serde::de::Error::custom(QuantityError::TooLarge { max: Self::MAX })
        })?;
        Self::new(n).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        assert_eq!(Quantity::new(0), Err(QuantityError::NotPositive));
        assert_eq!(Quantity::new(-4), Err(QuantityError::NotPositive));
        assert!(Quantity::new(1).is_ok());
        assert!(Quantity::new(Quantity::MAX).is_ok());
        assert!(matches!(
            Quantity::new(Quantity::MAX + 1),
            Err(QuantityError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_deserialize_rejects_zero() {
        assert!(serde_json::from_str::<Quantity>("0").is_err());
        assert!(serde_json::from_str::<Quantity>("9999999999").is_err());
        assert_eq!(
            serde_json::from_str::<Quantity>("3").ok().map(|q| q.get()),
            Some(3)
        );
    }
}
