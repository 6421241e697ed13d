//! Merchant management HTTP handlers.
//!
//! This module implements the merchant API endpoints:
//! - POST /api/v1/merchants - Register a merchant
//! - GET /api/v1/merchants - List all merchants
//! - GET /api/v1/merchants/:id - Get merchant by ID
//! - PUT /api/v1/merchants/:id - Update merchant profile
//! - PATCH /api/v1/merchants/:id/status - Change merchant status
//! - DELETE /api/v1/merchants/:id - Delete a merchant without transactions

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::merchant::{
    CreateMerchantRequest, MerchantResponse, UpdateMerchantRequest, UpdateMerchantStatusRequest,
};
use crate::services::merchant_service;
use crate::state::AppState;

/// Register a new merchant.
///
/// Merchants start in `Pending` status and must be activated through the
/// status endpoint before payments can be created against them.
pub async fn create_merchant(
    State(state): State<AppState>,
    Json(request): Json<CreateMerchantRequest>,
) -> Result<(StatusCode, Json<MerchantResponse>), AppError> {
    let merchant = merchant_service::create_merchant(&state.pool, request).await?;

    Ok((StatusCode::CREATED, Json(merchant.into())))
}

/// List all merchants, newest first.
pub async fn list_merchants(
    State(state): State<AppState>,
) -> Result<Json<Vec<MerchantResponse>>, AppError> {
    let merchants = merchant_service::list_merchants(&state.pool).await?;

    Ok(Json(merchants.into_iter().map(Into::into).collect()))
}

/// Get a merchant by ID.
pub async fn get_merchant(
    State(state): State<AppState>,
    Path(merchant_id): Path<Uuid>,
) -> Result<Json<MerchantResponse>, AppError> {
    let merchant = merchant_service::get_merchant(&state.pool, merchant_id).await?;

    Ok(Json(merchant.into()))
}

/// Update merchant profile fields.
pub async fn update_merchant(
    State(state): State<AppState>,
    Path(merchant_id): Path<Uuid>,
    Json(request): Json<UpdateMerchantRequest>,
) -> Result<Json<MerchantResponse>, AppError> {
    let merchant = merchant_service::update_merchant(&state.pool, merchant_id, request).await?;

    Ok(Json(merchant.into()))
}

/// Change a merchant's lifecycle status (Active, Suspended or Rejected).
pub async fn update_merchant_status(
    State(state): State<AppState>,
    Path(merchant_id): Path<Uuid>,
    Json(request): Json<UpdateMerchantStatusRequest>,
) -> Result<Json<MerchantResponse>, AppError> {
    let merchant =
        merchant_service::update_merchant_status(&state.pool, merchant_id, request).await?;

    Ok(Json(merchant.into()))
}

/// Delete a merchant. Fails if the merchant has transactions.
pub async fn delete_merchant(
    State(state): State<AppState>,
    Path(merchant_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    merchant_service::delete_merchant(&state.pool, merchant_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
