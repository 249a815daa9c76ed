//! Event dispatcher webhook.
//!
//! The dispatcher delivers identity-provider lifecycle events at least once.
//! Handling is idempotent, so a repeated delivery is acknowledged like the
//! first one.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
};
use chrono::Utc;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::services::events::verify_signature;
use crate::services::{EventEnvelope, EventOutcome, EventProcessor, WebhookError};
use crate::state::AppState;

/// Header carrying `t=<unix seconds>&s=<hex hmac>`.
pub const SIGNATURE_HEADER: &str = "x-inngest-signature";

/// Create the webhook routes router.
pub fn routes() -> Router<AppState> {
    Router::new().route("/", post(receive_event))
}

#[derive(Debug, Serialize)]
pub struct EventAck {
    pub status: &'static str,
}

/// `POST /api/inngest`
///
/// The signature is checked against the raw body when a signing key is
/// configured.
pub async fn receive_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<EventAck>> {
    if let Some(key) = &state.config().inngest_signing_key {
        let header = headers
            .get(SIGNATURE_HEADER)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| WebhookError::InvalidSignature("Missing signature".to_string()))?;
        verify_signature(key, header, &body, Utc::now().timestamp())?;
    }

    let envelope: EventEnvelope = serde_json::from_slice(&body)
        .map_err(|e| AppError::from(WebhookError::InvalidPayload(e.to_string())))?;

    let status = match EventProcessor::new(state.store())
        .handle(envelope.into_event())
        .await?
    {
        EventOutcome::UserSynced(_) => "synced",
        EventOutcome::UserDeleted { .. } => "deleted",
        EventOutcome::Ignored => "ignored",
    };

    Ok(Json(EventAck { status }))
}
