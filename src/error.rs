//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::models::{merchant::MerchantStatus, transaction::TransactionStatus};

/// Application-wide error type.
///
/// Each variant maps to a specific HTTP status code and error message.
///
/// # Error Categories
///
/// - **Storage Errors**: Any sqlx::Error from database operations
/// - **Authentication Errors**: Invalid API keys or callback signatures
/// - **Resource Errors**: Merchants or transactions that do not resolve
/// - **State Errors**: Operations against an entity in the wrong state,
///   carrying the offending current state for diagnostics
/// - **Admission Errors**: Velocity rate limiting
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Underlying persistence failure. Never partially applied: every
    /// multi-write operation runs inside a database transaction.
    ///
    /// Returns HTTP 500 with an opaque body.
    #[error("Storage failure: {0}")]
    Database(#[from] sqlx::Error),

    /// API key is missing, invalid, or inactive.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Invalid API key")]
    InvalidApiKey,

    /// Callback signature is missing or does not match the request body.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Invalid callback signature")]
    InvalidSignature,

    /// Merchant identifier does not resolve.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("Merchant not found")]
    MerchantNotFound,

    /// Transaction identifier does not resolve.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("Transaction not found")]
    TransactionNotFound,

    /// Merchant exists but is not eligible to receive payments.
    ///
    /// Returns HTTP 422 Unprocessable Entity.
    #[error("Merchant is not active. Current status: {0}")]
    MerchantNotActive(MerchantStatus),

    /// Callback arrived for a transaction that is no longer pending.
    /// A second callback for the same transaction is an error, not a no-op.
    ///
    /// Returns HTTP 422 Unprocessable Entity.
    #[error("Transaction is not pending. Current status: {0}")]
    TransactionNotPending(TransactionStatus),

    /// Velocity admission denied for the merchant.
    ///
    /// Returns HTTP 429 Too Many Requests.
    #[error("Transaction rate limit exceeded. Please try again later.")]
    RateLimited,

    /// An idempotency-key race was lost and the winning transaction could
    /// not be fetched back. Callers may retry the identical request.
    ///
    /// Returns HTTP 409 Conflict.
    #[error("Concurrent request with the same idempotency key")]
    Conflict,

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    /// The String contains details about what was invalid.
    #[error("Invalid request")]
    InvalidRequest(String),
}

/// Convert AppError into an HTTP response.
///
/// This implementation allows Axum handlers to return `Result<T, AppError>`
/// and have errors automatically converted to proper HTTP responses.
///
/// # Response Format
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Map each error variant to (HTTP status, error code, message)
        let (status, code, message) = match self {
            AppError::InvalidApiKey => (
                StatusCode::UNAUTHORIZED,
                "invalid_api_key",
                self.to_string(),
            ),
            AppError::InvalidSignature => (
                StatusCode::UNAUTHORIZED,
                "invalid_signature",
                self.to_string(),
            ),
            AppError::MerchantNotFound => (
                StatusCode::NOT_FOUND,
                "merchant_not_found",
                self.to_string(),
            ),
            AppError::TransactionNotFound => (
                StatusCode::NOT_FOUND,
                "transaction_not_found",
                self.to_string(),
            ),
            AppError::MerchantNotActive(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "merchant_not_active",
                self.to_string(),
            ),
            AppError::TransactionNotPending(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "transaction_not_pending",
                self.to_string(),
            ),
            AppError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                self.to_string(),
            ),
            AppError::Conflict => (StatusCode::CONFLICT, "conflict", self.to_string()),
            AppError::InvalidRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "An internal error occurred".to_string(),
            ),
        };

        // Build JSON response body
        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
