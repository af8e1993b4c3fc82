// HTTP API Error Types
use axum::{extract::rejection::JsonRejection, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::auth::AuthError;
use crate::config::ConfigError;
use crate::database::DatabaseError;
use crate::providers::ProviderError;
use crate::services::{AdsError, AggregateError, ArchiveError};

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },
    InvalidJson(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 502 Bad Gateway (provider unreachable or unintelligible)
    BadGateway(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),

    // Mirrors a provider's non-2xx status; `details` is the provider's body
    Provider {
        status: u16,
        message: String,
        details: Value,
    },
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ValidationError { .. } => 400,
            ApiError::InvalidJson(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::InternalServerError(_) => 500,
            ApiError::BadGateway(_) => 502,
            ApiError::ServiceUnavailable(_) => 503,
            ApiError::Provider { status, .. } => *status,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::ValidationError { message, .. } => message,
            ApiError::InvalidJson(msg) => msg,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::BadGateway(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
            ApiError::Provider { message, .. } => message,
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let mut response = json!({
            "success": false,
            "error": self.error_code(),
            "message": self.message(),
        });

        match self {
            ApiError::ValidationError {
                field_errors: Some(field_errors),
                ..
            } => {
                response["details"] = json!(field_errors);
            }
            ApiError::Provider { details, .. } => {
                response["details"] = details.clone();
            }
            _ => {}
        }

        response
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::InvalidJson(_) => "INVALID_JSON",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::BadGateway(_) => "BAD_GATEWAY",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::Provider { .. } => "PROVIDER_ERROR",
        }
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(message: impl Into<String>, field_errors: Option<HashMap<String, String>>) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors,
        }
    }

    /// Single-field validation failure
    pub fn invalid_field(field: &str, problem: impl Into<String>) -> Self {
        let mut field_errors = HashMap::new();
        field_errors.insert(field.to_string(), problem.into());
        ApiError::validation_error("Invalid request", Some(field_errors))
    }

    pub fn invalid_json(message: impl Into<String>) -> Self {
        ApiError::InvalidJson(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        ApiError::BadGateway(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }

    /// Provider failure surfaced under `message`
    pub fn from_provider(message: impl Into<String>, err: ProviderError) -> Self {
        let message = message.into();
        tracing::error!("{}: {}", message, err);
        match err {
            ProviderError::Status { status, body } => {
                // Only error statuses are mirrored
                let status = if (400..600).contains(&status) { status } else { 502 };
                ApiError::Provider {
                    status,
                    message,
                    details: body,
                }
            }
            ProviderError::Timeout => ApiError::Provider {
                status: 504,
                message,
                details: json!("Provider request timed out"),
            },
            ProviderError::Transport(reason) | ProviderError::Decode(reason) => ApiError::Provider {
                status: 502,
                message,
                details: json!(reason),
            },
        }
    }
}

// Convert other error types to ApiError
impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(msg) => ApiError::not_found(msg),
            DatabaseError::Conflict(msg) => ApiError::conflict(msg),
            DatabaseError::ConfigMissing(key) => {
                tracing::error!("Database configuration missing: {}", key);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            DatabaseError::Transaction(msg) => {
                // Rolled back; nothing partial remains
                tracing::error!("Transaction failed: {}", msg);
                ApiError::internal_server_error("The operation could not be completed")
            }
            DatabaseError::Decode(msg) => {
                tracing::error!("Stored row could not be decoded: {}", msg);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
            DatabaseError::Sqlx(sqlx_err) => {
                // Log the real error but return generic message
                tracing::error!("SQLx error: {}", sqlx_err);
                ApiError::internal_server_error("Database error occurred")
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => ApiError::unauthorized(AuthError::InvalidCredentials.to_string()),
            AuthError::Unauthorized(msg) => ApiError::unauthorized(msg),
            AuthError::Forbidden(msg) => ApiError::forbidden(msg),
            AuthError::SelfTargetForbidden => ApiError::forbidden(AuthError::SelfTargetForbidden.to_string()),
            AuthError::Token(msg) | AuthError::Hash(msg) => {
                tracing::error!("Authentication internals failed: {}", msg);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
            AuthError::Storage(db) => db.into(),
        }
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        ApiError::from_provider("Provider request failed", err)
    }
}

impl From<AggregateError> for ApiError {
    fn from(err: AggregateError) -> Self {
        match err {
            AggregateError::Unauthorized(e) => {
                tracing::warn!("Facebook profile lookup rejected: {}", e);
                ApiError::unauthorized("Facebook session is no longer valid, please sign in again")
            }
            AggregateError::Provider(e) => ApiError::from_provider("Failed to fetch Facebook pages", e),
        }
    }
}

impl From<ArchiveError> for ApiError {
    fn from(err: ArchiveError) -> Self {
        match err {
            ArchiveError::NotConfigured => ApiError::service_unavailable("Archive storage is not configured"),
            ArchiveError::NotFound(key) => ApiError::not_found(format!("No archived export at '{}'", key)),
            ArchiveError::Provider(e) => ApiError::from_provider("Archive storage request failed", e),
        }
    }
}

impl From<AdsError> for ApiError {
    fn from(err: AdsError) -> Self {
        match err {
            AdsError::Invalid(msg) => ApiError::bad_request(msg),
            AdsError::NotConfigured(key) => {
                tracing::error!("Ads sync is missing configuration: {}", key);
                ApiError::service_unavailable("Ads sync is not configured")
            }
            AdsError::Provider(e) => ApiError::from_provider("Failed to fetch ads insights", e),
            AdsError::Archive(e) => e.into(),
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        tracing::error!("Configuration error: {}", err);
        ApiError::service_unavailable("Service is misconfigured")
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::invalid_json(rejection.body_text())
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_status_and_body_are_mirrored() {
        let err = ApiError::from_provider(
            "Failed to generate embed token",
            ProviderError::Status {
                status: 400,
                body: json!({"error": "invalid_client"}),
            },
        );
        assert_eq!(err.status_code(), 400);
        let body = err.to_json();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "PROVIDER_ERROR");
        assert_eq!(body["details"]["error"], "invalid_client");
    }

    #[test]
    fn provider_timeout_is_gateway_timeout() {
        let err = ApiError::from_provider("x", ProviderError::Timeout);
        assert_eq!(err.status_code(), 504);
    }

    #[test]
    fn credential_failures_share_one_message() {
        let err: ApiError = AuthError::InvalidCredentials.into();
        assert_eq!(err.status_code(), 401);
        assert_eq!(err.message(), "Invalid email or password");
    }

    #[test]
    fn transaction_failures_are_generic_500s() {
        let err: ApiError = DatabaseError::Transaction("deadlock detected".into()).into();
        assert_eq!(err.status_code(), 500);
        assert!(!err.message().contains("deadlock"));
    }

    #[test]
    fn plain_errors_have_no_details() {
        let body = ApiError::not_found("User not found").to_json();
        assert!(body.get("details").is_none());
        assert_eq!(body["error"], "NOT_FOUND");
    }
}
