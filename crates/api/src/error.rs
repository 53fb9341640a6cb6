//! API error types and handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use rentfold_billing::BillingError;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // Authentication errors
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Insufficient permissions")]
    Forbidden,

    // Validation errors
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Unknown action")]
    UnknownAction,

    // Resource errors
    #[error("Billing profile not found")]
    ProfileNotFound,
    #[error("No subscription found")]
    NoSubscriptionFound,

    // Internal errors
    #[error("Database error: {0}")]
    Database(String),
    #[error("Internal server error")]
    Internal,
    #[error("Service unavailable")]
    ServiceUnavailable,
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) | ApiError::UnknownAction => StatusCode::BAD_REQUEST,
            ApiError::ProfileNotFound | ApiError::NoSubscriptionFound => StatusCode::NOT_FOUND,
            ApiError::Database(_) | ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Client-facing message. Internal failures deliberately collapse to a
    /// generic message so upstream detail never leaks.
    fn public_message(&self) -> String {
        match self {
            ApiError::Database(_) | ApiError::Internal => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = Json(json!({
            "success": false,
            "error": self.public_message(),
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        match err {
            sqlx::Error::RowNotFound => ApiError::ProfileNotFound,
            _ => ApiError::Database(err.to_string()),
        }
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::ProfileNotFound(_) => ApiError::ProfileNotFound,
            BillingError::NoSubscription => ApiError::NoSubscriptionFound,
            BillingError::UnknownAction(_) => ApiError::UnknownAction,
            BillingError::InvalidTransition { from, to } => {
                ApiError::BadRequest(format!("Invalid status transition: {} -> {}", from, to))
            }
            BillingError::StripeApi(e) => {
                tracing::error!(error = %e, "Billing provider error");
                ApiError::Internal
            }
            BillingError::ConcurrentModification(e) => {
                tracing::warn!(error = %e, "Concurrent billing modification");
                ApiError::Internal
            }
            BillingError::Database(e) => ApiError::Database(e),
            BillingError::Config(e) => {
                tracing::error!(error = %e, "Billing configuration error");
                ApiError::ServiceUnavailable
            }
            BillingError::Internal(e) => {
                tracing::error!(error = %e, "Billing internal error");
                ApiError::Internal
            }
        }
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
