//! API key model for authentication.
//!
//! API keys authenticate platform clients calling the management surface
//! (merchant CRUD, payment creation). They are stored as SHA-256 hashes;
//! the raw key is returned exactly once at issuance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents an API key record from the database.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApiKey {
    /// Unique identifier for this API key
    pub id: Uuid,

    /// SHA-256 hash of the actual API key (64 hex characters)
    ///
    /// When a request comes in with "Bearer abc123", the key is hashed and
    /// the hash looked up here. Raw keys never touch the database.
    pub key_hash: String,

    /// Human-readable name of the client using this API key
    pub client_name: String,

    /// Timestamp when this API key was created
    pub created_at: DateTime<Utc>,

    /// Whether this API key is currently active
    ///
    /// Inactive keys are rejected during authentication, which provides a
    /// way to revoke access without deleting the record.
    pub is_active: bool,
}

/// Request body for issuing a new API key.
#[derive(Debug, Deserialize)]
pub struct CreateApiKeyRequest {
    /// Name of the client the key is issued to
    pub client_name: String,
}

/// Response body for key issuance.
///
/// The `api_key` field carries the raw key and is the only place it ever
/// appears; it cannot be recovered later.
#[derive(Debug, Serialize)]
pub struct ApiKeyResponse {
    pub id: Uuid,
    pub client_name: String,
    pub api_key: String,
    pub created_at: DateTime<Utc>,
}
