//! Payment HTTP handlers.
//!
//! This module implements the payment API endpoints:
//! - POST /api/v1/payments - Create a payment against a merchant
//! - GET /api/v1/payments/:id - Get payment details
//! - GET /api/v1/payments/merchant/:merchant_id - List a merchant's payments
//! - POST /api/v1/payments/callback - Provider callback finalizing a payment

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::transaction::{CreatePaymentRequest, PaymentCallbackRequest, PaymentResponse};
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the callback signature, `sha256=<hex>` over the raw body.
const SIGNATURE_HEADER: &str = "X-Callback-Signature";

/// Create a payment transaction.
///
/// # Request Body
///
/// ```json
/// {
///   "merchant_id": "550e8400-...",
///   "amount": "100.00",
///   "currency": "USD",
///   "idempotency_key": "order-001"
/// }
/// ```
///
/// # Response (201)
///
/// The created transaction in `Pending` status. Replaying the request with
/// the same idempotency key returns the original transaction instead of
/// creating a second one.
pub async fn create_payment(
    State(state): State<AppState>,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<PaymentResponse>), AppError> {
    let transaction = state.engine.create_payment(request).await?;

    Ok((StatusCode::CREATED, Json(transaction.into())))
}

/// Get payment by ID.
pub async fn get_payment(
    State(state): State<AppState>,
    Path(transaction_id): Path<Uuid>,
) -> Result<Json<PaymentResponse>, AppError> {
    let transaction = state.engine.get_by_id(transaction_id).await?;

    Ok(Json(transaction.into()))
}

/// List all payments for a merchant, newest first.
pub async fn list_merchant_payments(
    State(state): State<AppState>,
    Path(merchant_id): Path<Uuid>,
) -> Result<Json<Vec<PaymentResponse>>, AppError> {
    let transactions = state.engine.get_by_merchant(merchant_id).await?;

    Ok(Json(transactions.into_iter().map(Into::into).collect()))
}

/// Provider callback finalizing a pending payment.
///
/// This endpoint is unauthenticated (the provider holds no API key), so
/// when `CALLBACK_SECRET` is configured the request must carry
/// `X-Callback-Signature: sha256=<hex>` computed as HMAC-SHA256 over the
/// raw request body. Verification happens before the body is parsed.
pub async fn payment_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<PaymentResponse>, AppError> {
    if let Some(secret) = &state.callback_secret {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok());
        verify_callback_signature(secret, signature, &body)?;
    }

    let request: PaymentCallbackRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::InvalidRequest(format!("Malformed callback body: {e}")))?;

    let transaction = state.engine.process_callback(request).await?;

    Ok(Json(transaction.into()))
}

/// Check a `sha256=<hex>` signature against the raw body.
///
/// Comparison runs in constant time via `Mac::verify_slice`.
fn verify_callback_signature(
    secret: &str,
    signature: Option<&str>,
    body: &[u8],
) -> Result<(), AppError> {
    let signature = signature.ok_or(AppError::InvalidSignature)?;
    let hex_digest = signature
        .strip_prefix("sha256=")
        .ok_or(AppError::InvalidSignature)?;
    let digest = hex::decode(hex_digest).map_err(|_| AppError::InvalidSignature)?;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AppError::InvalidSignature)?;
    mac.update(body);
    mac.verify_slice(&digest)
        .map_err(|_| AppError::InvalidSignature)
}
