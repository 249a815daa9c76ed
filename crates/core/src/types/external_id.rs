//! Identity-provider subject identifier.

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Errors that can occur when parsing an [`ExternalUserId`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ExternalUserIdError {
    /// The identifier is empty.
    #[error("external user id cannot be empty")]
    Empty,
    /// The identifier exceeds the column width.
    #[error("external user id must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
}

/// The subject identifier the identity provider issues for a user
/// (for example `user_2abc...`).
///
/// It is the stable join key between provider sessions, lifecycle events,
/// local user records and the denormalized copy stored on each order.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ExternalUserId(String);

impl ExternalUserId {
    /// Maximum identifier length.
    pub const MAX_LENGTH: usize = 128;

    /// Parse an identifier, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier is empty or too long.
    pub fn parse(s: &str) -> Result<Self, ExternalUserIdError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ExternalUserIdError::Empty);
        }
        if trimmed.len() > Self::MAX_LENGTH {
            return Err(ExternalUserIdError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExternalUserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ExternalUserId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for ExternalUserId {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for ExternalUserId {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::parse(&s)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for ExternalUserId {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}
