//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use shopfloor_core::{Email, ExternalUserId, UserId};

/// A customer known to the back office.
///
/// Created and kept in sync by identity-provider lifecycle events; addresses
/// and wishlist entries hang off it and are loaded on demand.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Local user ID.
    pub id: UserId,
    /// Identity-provider subject identifier.
    pub external_id: ExternalUserId,
    /// Display name.
    pub name: String,
    /// Email address (unique).
    pub email: Email,
    /// Avatar URL, empty when the provider has none.
    pub image_url: String,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Profile fields carried by an identity-provider lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub external_id: ExternalUserId,
    pub name: String,
    pub email: Email,
    pub image_url: String,
}
