//! API key authentication middleware.
//!
//! Protected routes require `Authorization: Bearer <key>`. The key is
//! hashed with SHA-256 and looked up against active records in `api_keys`;
//! on success an [`AuthContext`] is injected into the request extensions.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::api_key::ApiKey;
use crate::state::AppState;

/// Authentication context attached to authenticated requests.
///
/// Route handlers can extract this with `Extension<AuthContext>` to know
/// which platform client made the request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// ID of the authenticated API key
    pub api_key_id: Uuid,

    /// Name of the client the key was issued to
    pub client_name: String,
}

/// SHA-256 hash of a raw API key, hex encoded.
///
/// The same derivation is used at issuance, at bootstrap seeding, and at
/// request time, so raw keys never need to be stored.
pub fn hash_api_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Reject the request unless it carries an active API key.
///
/// # Flow
///
/// 1. Extract `Authorization: Bearer <key>` header
/// 2. Hash the key and look the hash up where `is_active = true`
/// 3. Inject [`AuthContext`], call the next handler
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::InvalidApiKey)?;

    let api_key = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AppError::InvalidApiKey)?;

    let key_hash = hash_api_key(api_key);

    let record = sqlx::query_as::<_, ApiKey>(
        "SELECT id, key_hash, client_name, created_at, is_active
         FROM api_keys
         WHERE key_hash = $1 AND is_active = true",
    )
    .bind(&key_hash)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(AppError::InvalidApiKey)?;

    request.extensions_mut().insert(AuthContext {
        api_key_id: record.id,
        client_name: record.client_name,
    });

    Ok(next.run(request).await)
}
