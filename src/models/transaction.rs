//! Payment transaction data models and API request/response types.
//!
//! This module defines:
//! - `PaymentTransaction`: Database entity representing a payment
//! - `TransactionStatus`: Closed set of transaction states
//! - `CallbackStatus`: The two states a provider callback may report
//! - Request types for creation and callback processing
//! - `PaymentResponse`: Response body returned to clients

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Transaction lifecycle status.
///
/// Stored as the `transaction_status` Postgres enum. A transaction starts
/// `Pending` and is finalized exactly once, to `Success` or `Failed`, by the
/// callback path. `Cancelled` and `Refunded` are representable for external
/// reconciliation tooling but reachable through no operation here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_status", rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
    Cancelled,
    Refunded,
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TransactionStatus::Pending => "Pending",
            TransactionStatus::Success => "Success",
            TransactionStatus::Failed => "Failed",
            TransactionStatus::Cancelled => "Cancelled",
            TransactionStatus::Refunded => "Refunded",
        };
        f.write_str(label)
    }
}

/// Outcome a payment provider callback may report.
///
/// Deliberately narrower than [`TransactionStatus`]: any other label fails
/// deserialization before the engine runs, so unvalidated state transitions
/// cannot enter through the callback endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallbackStatus {
    Success,
    Failed,
}

impl From<CallbackStatus> for TransactionStatus {
    fn from(status: CallbackStatus) -> Self {
        match status {
            CallbackStatus::Success => TransactionStatus::Success,
            CallbackStatus::Failed => TransactionStatus::Failed,
        }
    }
}

/// Represents a payment transaction record from the database.
///
/// # Database Table
///
/// Maps to the `transactions` table. Each transaction:
/// - Belongs to one merchant
/// - Stores the amount as fixed-point NUMERIC(18,2), never floats
/// - Carries at most one idempotency key, unique across all transactions
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize)]
pub struct PaymentTransaction {
    /// Unique identifier, assigned at creation
    pub transaction_id: Uuid,

    /// Merchant this payment was created against
    pub merchant_id: Uuid,

    /// Monetary amount, strictly positive, at most two decimal places
    pub amount: Decimal,

    /// ISO 4217 currency code (3 letters)
    pub currency: String,

    /// Current lifecycle status
    pub status: TransactionStatus,

    /// Reference assigned by the payment provider; set only by a callback
    pub external_reference_id: Option<String>,

    /// Optional idempotency key for preventing duplicates
    ///
    /// If a client sends the same idempotency_key twice, the second request
    /// returns the original transaction instead of creating a duplicate.
    pub idempotency_key: Option<String>,

    /// When the transaction was created
    pub created_at: DateTime<Utc>,

    /// Timestamp of the last status change
    pub updated_at: DateTime<Utc>,
}

/// Request to create a payment against a merchant.
///
/// # JSON Example
///
/// ```json
/// {
///   "merchant_id": "550e8400-e29b-41d4-a716-446655440000",
///   "amount": "100.00",
///   "currency": "USD",
///   "idempotency_key": "order-2026-001"
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePaymentRequest {
    /// Merchant to charge against
    pub merchant_id: Uuid,

    /// Amount to charge (strictly positive, bounded by configuration)
    pub amount: Decimal,

    /// Currency code (defaults to "USD" if not provided)
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Optional idempotency key to make retries safe
    pub idempotency_key: Option<String>,
}

/// Default currency value when not specified in request.
fn default_currency() -> String {
    "USD".to_string()
}

/// Asynchronous callback from the payment provider finalizing a transaction.
///
/// # JSON Example
///
/// ```json
/// {
///   "transaction_id": "770e8400-e29b-41d4-a716-446655440002",
///   "status": "Success",
///   "external_reference_id": "ext-1",
///   "message": "Settled by acquirer"
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentCallbackRequest {
    /// Transaction being finalized
    pub transaction_id: Uuid,

    /// Terminal outcome; only `Success` or `Failed` are accepted
    pub status: CallbackStatus,

    /// Provider-side reference for the transaction
    pub external_reference_id: Option<String>,

    /// Free-text note recorded in the audit log
    pub message: Option<String>,
}

/// Response returned for payment operations.
///
/// Hides the idempotency key, which is client bookkeeping rather than
/// payment state.
#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub transaction_id: Uuid,
    pub merchant_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub status: TransactionStatus,
    pub external_reference_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PaymentTransaction> for PaymentResponse {
    fn from(transaction: PaymentTransaction) -> Self {
        Self {
            transaction_id: transaction.transaction_id,
            merchant_id: transaction.merchant_id,
            amount: transaction.amount,
            currency: transaction.currency,
            status: transaction.status,
            external_reference_id: transaction.external_reference_id,
            created_at: transaction.created_at,
            updated_at: transaction.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_status_accepts_only_terminal_outcomes() {
        let ok: CallbackStatus = serde_json::from_str("\"Success\"").unwrap();
        assert_eq!(ok, CallbackStatus::Success);

        let ok: CallbackStatus = serde_json::from_str("\"Failed\"").unwrap();
        assert_eq!(ok, CallbackStatus::Failed);

        assert!(serde_json::from_str::<CallbackStatus>("\"Pending\"").is_err());
        assert!(serde_json::from_str::<CallbackStatus>("\"Refunded\"").is_err());
        assert!(serde_json::from_str::<CallbackStatus>("\"success\"").is_err());
    }

    #[test]
    fn status_display_matches_audit_labels() {
        assert_eq!(TransactionStatus::Pending.to_string(), "Pending");
        assert_eq!(TransactionStatus::Success.to_string(), "Success");
        assert_eq!(TransactionStatus::Failed.to_string(), "Failed");
    }

    #[test]
    fn create_request_defaults_currency_to_usd() {
        let request: CreatePaymentRequest = serde_json::from_str(
            r#"{"merchant_id": "550e8400-e29b-41d4-a716-446655440000", "amount": "10.50"}"#,
        )
        .unwrap();
        assert_eq!(request.currency, "USD");
        assert_eq!(request.amount, Decimal::new(1050, 2));
        assert!(request.idempotency_key.is_none());
    }
}
