//! Identity-provider lifecycle events delivered by the event dispatcher.
//!
//! Delivery is at-least-once, so every handler is idempotent: creates and
//! updates upsert by subject id, deletes succeed whether or not the user
//! still exists.
//!
//! # Signature
//!
//! When a signing key is configured each request carries
//! `X-Inngest-Signature: t=<unix seconds>&s=<hex>`, where `s` is the
//! HMAC-SHA256 of the raw body followed by `t`. Requests older than five
//! minutes are refused.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, info, instrument};

use shopfloor_core::{Email, ExternalUserId, UserId};

use crate::db::{RepositoryError, Store};
use crate::models::UserProfile;

/// Event name for a newly registered user.
pub const USER_CREATED: &str = "webhook-integration/user.created";
/// Event name for a profile change.
pub const USER_UPDATED: &str = "webhook-integration/user.updated";
/// Event name for an account deletion.
pub const USER_DELETED: &str = "webhook-integration/user.deleted";

/// Maximum accepted age of a signed request, in seconds.
const MAX_SIGNATURE_AGE_SECS: i64 = 300;

/// Errors from webhook verification and event handling.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// The signature header is missing, stale or does not match.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// The event body cannot be understood.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// A dispatched event.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    pub name: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Request body: either a bare event or one wrapped as `{"event": {...}}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum EventEnvelope {
    Wrapped { event: Event },
    Bare(Event),
}

impl EventEnvelope {
    /// The event inside the envelope.
    #[must_use]
    pub fn into_event(self) -> Event {
        match self {
            Self::Wrapped { event } | Self::Bare(event) => event,
        }
    }
}

#[derive(Debug, Deserialize)]
struct EmailAddress {
    email_address: String,
}

/// User payload of `user.created` / `user.updated`.
#[derive(Debug, Deserialize)]
struct ProviderUser {
    id: String,
    #[serde(default)]
    email_addresses: Vec<EmailAddress>,
    first_name: Option<String>,
    last_name: Option<String>,
    image_url: Option<String>,
}

/// User payload of `user.deleted`.
#[derive(Debug, Deserialize)]
struct DeletedUser {
    id: String,
}

impl ProviderUser {
    fn into_profile(self) -> Result<UserProfile, WebhookError> {
        let external_id = ExternalUserId::parse(&self.id)
            .map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;

        let email = self
            .email_addresses
            .first()
            .ok_or_else(|| WebhookError::InvalidPayload("user has no email address".to_owned()))?;
        let email = Email::parse(&email.email_address)
            .map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;

        let name = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or_default(),
            self.last_name.as_deref().unwrap_or_default()
        );
        let name = match name.trim() {
            "" => "User".to_owned(),
            trimmed => trimmed.to_owned(),
        };

        Ok(UserProfile {
            external_id,
            name,
            email,
            image_url: self.image_url.unwrap_or_default(),
        })
    }
}

/// What handling an event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// The user was created or refreshed.
    UserSynced(UserId),
    /// The delete was applied; `existed` is false on a repeated delivery.
    UserDeleted { existed: bool },
    /// Not an event this service handles.
    Ignored,
}

/// Applies lifecycle events to the store.
pub struct EventProcessor<'a> {
    store: &'a dyn Store,
}

impl<'a> EventProcessor<'a> {
    /// Create a new event processor.
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Handle one event.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPayload` if a known event has unusable data, or
    /// `Repository` if the store fails.
    #[instrument(skip(self, event), fields(event = %event.name))]
    pub async fn handle(&self, event: Event) -> Result<EventOutcome, WebhookError> {
        match event.name.as_str() {
            USER_CREATED | USER_UPDATED => {
                let user: ProviderUser = serde_json::from_value(event.data)
                    .map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;
                let profile = user.into_profile()?;
                let user = self.store.upsert_user(&profile).await?;
                info!(user_id = %user.id, external_id = %user.external_id, "User synced");
                Ok(EventOutcome::UserSynced(user.id))
            }
            USER_DELETED => {
                let user: DeletedUser = serde_json::from_value(event.data)
                    .map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;
                let external_id = ExternalUserId::parse(&user.id)
                    .map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;
                let existed = self.store.delete_user_by_external_id(&external_id).await?;
                info!(%external_id, existed, "User deleted");
                Ok(EventOutcome::UserDeleted { existed })
            }
            other => {
                debug!(event = other, "Ignoring unhandled event");
                Ok(EventOutcome::Ignored)
            }
        }
    }
}

/// Strip the `signkey-<env>-` prefix the dispatcher puts on signing keys.
fn signing_key_material(key: &str) -> &str {
    key.strip_prefix("signkey-")
        .and_then(|rest| rest.split_once('-'))
        .map_or(key, |(_, material)| material)
}

/// Verify an `X-Inngest-Signature` header against the raw request body.
///
/// # Errors
///
/// Returns `InvalidSignature` if the header is malformed, older than five
/// minutes relative to `now`, or the HMAC does not match.
pub fn verify_signature(
    signing_key: &SecretString,
    header: &str,
    body: &[u8],
    now: i64,
) -> Result<(), WebhookError> {
    let mut timestamp = None;
    let mut signature = None;
    for pair in header.split('&') {
        match pair.split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("s", value)) => signature = Some(value),
            _ => {}
        }
    }
    let (Some(timestamp), Some(signature)) = (timestamp, signature) else {
        return Err(WebhookError::InvalidSignature(
            "Missing timestamp or signature".to_owned(),
        ));
    };

    let ts: i64 = timestamp
        .parse()
        .map_err(|_| WebhookError::InvalidSignature("Invalid timestamp".to_owned()))?;
    if (now - ts).abs() > MAX_SIGNATURE_AGE_SECS {
        return Err(WebhookError::InvalidSignature(
            "Request timestamp too old".to_owned(),
        ));
    }

    let expected = hex::decode(signature)
        .map_err(|_| WebhookError::InvalidSignature("Signature is not hex".to_owned()))?;

    let key = signing_key_material(signing_key.expose_secret());
    let mut mac = Hmac::<Sha256>::new_from_slice(key.as_bytes())
        .map_err(|e| WebhookError::InvalidSignature(e.to_string()))?;
    mac.update(body);
    mac.update(timestamp.as_bytes());

    mac.verify_slice(&expected)
        .map_err(|_| WebhookError::InvalidSignature("Signature mismatch".to_owned()))?;

    debug!("Webhook signature verified");
    Ok(())
}
