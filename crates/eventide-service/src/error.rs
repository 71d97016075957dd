//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use eventide_core::WEEKLY_FREE_SESSION_LIMIT;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The weekly free-session quota is spent.
    #[error("weekly session limit reached: used={used}, limit={limit}")]
    SessionLimitReached {
        /// Sessions already consumed this window.
        used: u32,
        /// The weekly quota.
        limit: u32,
    },

    /// The request needs a premium subscription.
    #[error("premium subscription required")]
    PremiumRequired,

    /// A required integration is not configured on this deployment.
    #[error("not configured: {0}")]
    NotConfigured(&'static str),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// External service error.
    #[error("external service error: {0}")]
    ExternalService(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                self.to_string(),
                None,
            ),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None),
            Self::SessionLimitReached { used, limit } => (
                StatusCode::CONFLICT,
                "session_limit_reached",
                self.to_string(),
                Some(serde_json::json!({
                    "used": used,
                    "limit": limit
                })),
            ),
            Self::PremiumRequired => (
                StatusCode::PAYMENT_REQUIRED,
                "premium_required",
                self.to_string(),
                None,
            ),
            Self::NotConfigured(what) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "not_configured",
                format!("{what} is not configured on this deployment"),
                None,
            ),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
            Self::ExternalService(msg) => (
                StatusCode::BAD_GATEWAY,
                "external_service_error",
                msg.clone(),
                None,
            ),
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<eventide_store::StoreError> for ApiError {
    fn from(err: eventide_store::StoreError) -> Self {
        match err {
            eventide_store::StoreError::NotFound => Self::NotFound("account not found".into()),
            eventide_store::StoreError::WeeklyLimitReached { count } => {
                Self::SessionLimitReached {
                    used: count,
                    limit: WEEKLY_FREE_SESSION_LIMIT,
                }
            }
            eventide_store::StoreError::Database(msg)
            | eventide_store::StoreError::Serialization(msg) => Self::Internal(msg),
        }
    }
}
