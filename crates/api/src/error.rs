//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Client errors become a 4xx
//! response with a JSON body `{"message": "..."}`; server errors are captured
//! to Sentry and answered with a generic message so internals never leak.

use axum::{
    Json,
    extract::{
        FromRequest,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::{IdentityError, ImageHostError, OrderError, WebhookError};

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// The caller could not be identified.
    #[error("{0}")]
    Identity(#[from] IdentityError),

    /// The caller is known but not allowed here.
    #[error("Admin access required")]
    Forbidden,

    /// Order placement or status transition failed.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// Store operation failed.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Image upload failed.
    #[error("image host error: {0}")]
    ImageHost(#[from] ImageHostError),

    /// Webhook delivery could not be processed.
    #[error("webhook error: {0}")]
    Webhook(#[from] WebhookError),

    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// The request clashes with existing data.
    #[error("{0}")]
    Conflict(String),

    /// Bad request from client.
    #[error("{0}")]
    Validation(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Identity(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Order(err) => match err {
                OrderError::EmptyOrder
                | OrderError::TooManyLines { .. }
                | OrderError::InsufficientStock { .. }
                | OrderError::InvalidStatus(_) => StatusCode::BAD_REQUEST,
                OrderError::ProductNotFound(_) | OrderError::OrderNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                OrderError::Repository(err) => repository_status(err),
            },
            Self::Repository(err) => repository_status(err),
            Self::ImageHost(ImageHostError::Rejected(_)) | Self::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Webhook(err) => match err {
                WebhookError::InvalidSignature(_) => StatusCode::UNAUTHORIZED,
                WebhookError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
                WebhookError::Repository(err) => repository_status(err),
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::ImageHost(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show the client.
    fn public_message(&self) -> String {
        if self.status().is_server_error() {
            return "Internal server error".to_string();
        }
        match self {
            Self::Identity(IdentityError::UnknownPrincipal) => "User not found".to_string(),
            Self::Identity(_) => "Unauthorized".to_string(),
            Self::Repository(RepositoryError::NotFound)
            | Self::Order(OrderError::Repository(RepositoryError::NotFound))
            | Self::Webhook(WebhookError::Repository(RepositoryError::NotFound)) => {
                "Not found".to_string()
            }
            Self::Repository(RepositoryError::Conflict(msg))
            | Self::Order(OrderError::Repository(RepositoryError::Conflict(msg)))
            | Self::Webhook(WebhookError::Repository(RepositoryError::Conflict(msg))) => {
                msg.clone()
            }
            Self::Webhook(WebhookError::InvalidSignature(_)) => "Invalid signature".to_string(),
            Self::ImageHost(err) => err.to_string(),
            _ => self.to_string(),
        }
    }
}

const fn repository_status(err: &RepositoryError) -> StatusCode {
    match err {
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Conflict(_) => StatusCode::CONFLICT,
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        let body = Json(json!({ "message": self.public_message() }));
        (status, body).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        Self::Validation(err.body_text())
    }
}

/// JSON body extractor whose rejections use the API's error shape.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Path extractor whose rejections use the API's error shape.
#[derive(Debug, axum::extract::FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context for the current request.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}
