//! Merchant data models and API request/response types.
//!
//! This module defines:
//! - `Merchant`: Database entity representing a merchant
//! - `MerchantStatus`: Closed set of merchant lifecycle states
//! - Request and response types for the merchant management endpoints

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Merchant lifecycle status.
///
/// Stored as the `merchant_status` Postgres enum. Only `Active` merchants
/// may have new transactions created against them; the other states are
/// managed by the onboarding flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "merchant_status", rename_all = "lowercase")]
pub enum MerchantStatus {
    Pending,
    Active,
    Suspended,
    Rejected,
}

impl std::fmt::Display for MerchantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            MerchantStatus::Pending => "Pending",
            MerchantStatus::Active => "Active",
            MerchantStatus::Suspended => "Suspended",
            MerchantStatus::Rejected => "Rejected",
        };
        f.write_str(label)
    }
}

/// Represents a merchant record from the database.
///
/// Merchants start in `Pending` status and must be activated before any
/// payment can be created against them. The payment engine treats this
/// record as read-only.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Merchant {
    /// Unique identifier for this merchant
    pub merchant_id: Uuid,

    /// Registered business name
    pub business_name: String,

    /// Contact email (unique, case-insensitive)
    pub email: String,

    /// Current lifecycle status
    pub status: MerchantStatus,

    /// When the merchant was registered
    pub created_at: DateTime<Utc>,

    /// Timestamp of the last profile or status change
    pub updated_at: DateTime<Utc>,
}

/// Request body for registering a new merchant.
///
/// # JSON Example
///
/// ```json
/// {
///   "business_name": "Acme Ltd",
///   "email": "billing@acme.example"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateMerchantRequest {
    /// Business name (2 to 200 characters)
    pub business_name: String,

    /// Contact email
    pub email: String,
}

/// Request body for updating merchant profile fields.
///
/// Fields left out of the request are not modified.
#[derive(Debug, Deserialize)]
pub struct UpdateMerchantRequest {
    pub business_name: Option<String>,
    pub email: Option<String>,
}

/// Request body for changing a merchant's lifecycle status.
///
/// Accepts `Active`, `Suspended` or `Rejected`; a merchant cannot be moved
/// back to `Pending` once it has left onboarding.
#[derive(Debug, Deserialize)]
pub struct UpdateMerchantStatusRequest {
    pub status: MerchantStatus,
}

/// Response body for merchant endpoints.
#[derive(Debug, Serialize)]
pub struct MerchantResponse {
    pub merchant_id: Uuid,
    pub business_name: String,
    pub email: String,
    pub status: MerchantStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Merchant> for MerchantResponse {
    fn from(merchant: Merchant) -> Self {
        Self {
            merchant_id: merchant.merchant_id,
            business_name: merchant.business_name,
            email: merchant.email,
            status: merchant.status,
            created_at: merchant.created_at,
            updated_at: merchant.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_labels_use_pascal_case_on_the_wire() {
        let json = serde_json::to_string(&MerchantStatus::Suspended).unwrap();
        assert_eq!(json, "\"Suspended\"");

        let parsed: MerchantStatus = serde_json::from_str("\"Active\"").unwrap();
        assert_eq!(parsed, MerchantStatus::Active);
    }

    #[test]
    fn unknown_status_labels_are_rejected() {
        let result = serde_json::from_str::<MerchantStatus>("\"Banned\"");
        assert!(result.is_err());
    }
}
