//! Merchant management - onboarding and profile maintenance.
//!
//! This surface is plain data plumbing around the `merchants` table. The
//! payment engine never calls it; it only reads merchants through the
//! `MerchantDirectory` boundary.

use uuid::Uuid;

use crate::db::DbPool;
use crate::error::AppError;
use crate::models::merchant::{
    CreateMerchantRequest, Merchant, MerchantStatus, UpdateMerchantRequest,
    UpdateMerchantStatusRequest,
};

/// Register a new merchant in `Pending` status.
///
/// # Errors
///
/// - `InvalidRequest`: name outside 2..=200 characters, malformed email,
///   or email already registered
/// - `Database`: any other persistence error
pub async fn create_merchant(
    pool: &DbPool,
    request: CreateMerchantRequest,
) -> Result<Merchant, AppError> {
    validate_business_name(&request.business_name)?;
    validate_email(&request.email)?;

    let result = sqlx::query_as::<_, Merchant>(
        r#"
        INSERT INTO merchants (business_name, email, status)
        VALUES ($1, $2, 'pending')
        RETURNING *
        "#,
    )
    .bind(&request.business_name)
    .bind(&request.email)
    .fetch_one(pool)
    .await;

    match result {
        Ok(merchant) => Ok(merchant),
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(
            AppError::InvalidRequest("A merchant with this email already exists".to_string()),
        ),
        Err(e) => Err(e.into()),
    }
}

/// All merchants, newest first.
pub async fn list_merchants(pool: &DbPool) -> Result<Vec<Merchant>, AppError> {
    let merchants =
        sqlx::query_as::<_, Merchant>("SELECT * FROM merchants ORDER BY created_at DESC")
            .fetch_all(pool)
            .await?;

    Ok(merchants)
}

/// Fetch a single merchant.
pub async fn get_merchant(pool: &DbPool, merchant_id: Uuid) -> Result<Merchant, AppError> {
    sqlx::query_as::<_, Merchant>("SELECT * FROM merchants WHERE merchant_id = $1")
        .bind(merchant_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::MerchantNotFound)
}

/// Update profile fields. Absent fields keep their stored values.
pub async fn update_merchant(
    pool: &DbPool,
    merchant_id: Uuid,
    request: UpdateMerchantRequest,
) -> Result<Merchant, AppError> {
    if let Some(name) = &request.business_name {
        validate_business_name(name)?;
    }
    if let Some(email) = &request.email {
        validate_email(email)?;
    }

    let result = sqlx::query_as::<_, Merchant>(
        r#"
        UPDATE merchants
        SET business_name = COALESCE($2, business_name),
            email = COALESCE($3, email),
            updated_at = NOW()
        WHERE merchant_id = $1
        RETURNING *
        "#,
    )
    .bind(merchant_id)
    .bind(&request.business_name)
    .bind(&request.email)
    .fetch_optional(pool)
    .await;

    match result {
        Ok(Some(merchant)) => Ok(merchant),
        Ok(None) => Err(AppError::MerchantNotFound),
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(
            AppError::InvalidRequest("A merchant with this email already exists".to_string()),
        ),
        Err(e) => Err(e.into()),
    }
}

/// Change a merchant's lifecycle status.
///
/// `Pending` is the onboarding entry state and cannot be re-entered.
pub async fn update_merchant_status(
    pool: &DbPool,
    merchant_id: Uuid,
    request: UpdateMerchantStatusRequest,
) -> Result<Merchant, AppError> {
    if request.status == MerchantStatus::Pending {
        return Err(AppError::InvalidRequest(
            "Merchant status cannot be set back to Pending".to_string(),
        ));
    }

    let merchant = sqlx::query_as::<_, Merchant>(
        r#"
        UPDATE merchants
        SET status = $2, updated_at = NOW()
        WHERE merchant_id = $1
        RETURNING *
        "#,
    )
    .bind(merchant_id)
    .bind(request.status)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::MerchantNotFound)?;

    tracing::info!(
        merchant_id = %merchant.merchant_id,
        status = %merchant.status,
        "merchant status updated"
    );

    Ok(merchant)
}

/// Delete a merchant that has no transactions.
///
/// Transactions reference merchants with ON DELETE RESTRICT, so a merchant
/// with payment history cannot be removed.
pub async fn delete_merchant(pool: &DbPool, merchant_id: Uuid) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM merchants WHERE merchant_id = $1")
        .bind(merchant_id)
        .execute(pool)
        .await;

    match result {
        Ok(done) if done.rows_affected() == 0 => Err(AppError::MerchantNotFound),
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
            Err(AppError::InvalidRequest(
                "Merchant has transactions and cannot be deleted".to_string(),
            ))
        }
        Err(e) => Err(e.into()),
    }
}

fn validate_business_name(name: &str) -> Result<(), AppError> {
    let length = name.chars().count();
    if !(2..=200).contains(&length) {
        return Err(AppError::InvalidRequest(
            "Business name must be between 2 and 200 characters".to_string(),
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), AppError> {
    let valid = email.len() <= 100
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid {
        return Err(AppError::InvalidRequest("Invalid email format".to_string()));
    }
    Ok(())
}
