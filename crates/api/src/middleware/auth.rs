//! Authentication extractors.
//!
//! The caller presents the identity provider's session as a bearer token.
//! [`CurrentUser`] verifies it and resolves the local user; [`RequireAdmin`]
//! additionally checks the configured admin allowlist.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::Utc;

use crate::error::{AppError, set_sentry_user};
use crate::models::User;
use crate::services::IdentityError;
use crate::services::identity::bearer_token;
use crate::state::AppState;

/// Extractor that requires a signed-in user with a local record.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(CurrentUser(user): CurrentUser) -> impl IntoResponse {
///     format!("Hello, {}!", user.name)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(bearer_token)
            .ok_or(IdentityError::MissingToken)?;

        let subject = state.sessions().verify(token, Utc::now())?;

        let user = state
            .store()
            .find_user_by_external_id(&subject)
            .await?
            .ok_or(IdentityError::UnknownPrincipal)?;

        set_sentry_user(&user.id, Some(user.email.as_str()));
        Ok(Self(user))
    }
}

/// Extractor that requires a signed-in user on the admin allowlist.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub User);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;

        if !state.config().is_admin(&user.email) {
            tracing::warn!(user_id = %user.id, "Non-admin user attempted admin access");
            return Err(AppError::Forbidden);
        }

        Ok(Self(user))
    }
}
