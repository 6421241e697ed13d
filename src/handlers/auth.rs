//! API key issuance handler.

use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::hash_api_key;
use crate::models::api_key::{ApiKeyResponse, CreateApiKeyRequest};
use crate::state::AppState;

/// Issue a new API key for a platform client.
///
/// Requires an existing active key (the first key is seeded at startup via
/// `BOOTSTRAP_API_KEY`). The raw key is generated server-side from 32
/// random bytes and returned exactly once; only its hash is stored.
pub async fn create_api_key(
    State(state): State<AppState>,
    Json(request): Json<CreateApiKeyRequest>,
) -> Result<(StatusCode, Json<ApiKeyResponse>), AppError> {
    if request.client_name.trim().is_empty() {
        return Err(AppError::InvalidRequest(
            "Client name must not be empty".to_string(),
        ));
    }

    let raw_key = generate_api_key();
    let key_hash = hash_api_key(&raw_key);

    let (id, created_at): (Uuid, chrono::DateTime<Utc>) = sqlx::query_as(
        r#"
        INSERT INTO api_keys (key_hash, client_name)
        VALUES ($1, $2)
        RETURNING id, created_at
        "#,
    )
    .bind(&key_hash)
    .bind(&request.client_name)
    .fetch_one(&state.pool)
    .await?;

    tracing::info!(api_key_id = %id, client_name = %request.client_name, "API key issued");

    Ok((
        StatusCode::CREATED,
        Json(ApiKeyResponse {
            id,
            client_name: request.client_name,
            api_key: raw_key,
            created_at,
        }),
    ))
}

/// Generate a raw API key: 32 random bytes as 64 hex characters.
fn generate_api_key() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_are_64_hex_chars_and_unique() {
        let first = generate_api_key();
        let second = generate_api_key();

        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(first, second);
    }
}
