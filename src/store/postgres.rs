//! PostgreSQL implementation of the storage boundary.
//!
//! # Atomicity Guarantees
//!
//! - Idempotency: the partial unique index on `transactions.idempotency_key`
//!   arbitrates concurrent inserts; this module translates the resulting
//!   unique violation into [`InsertOutcome::DuplicateKey`].
//! - Finalization: the status change and its audit entry are written inside
//!   one database transaction, with the status precondition re-asserted in
//!   the UPDATE itself so racing callbacks cannot both commit.

use async_trait::async_trait;
use uuid::Uuid;

use crate::db::DbPool;
use crate::error::AppError;
use crate::models::audit_log::TransactionAuditLog;
use crate::models::merchant::Merchant;
use crate::models::transaction::{PaymentTransaction, TransactionStatus};
use crate::store::{InsertOutcome, MerchantDirectory, TransactionStore};

/// Postgres-backed store for merchants, transactions and audit entries.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MerchantDirectory for PgStore {
    async fn merchant_by_id(&self, merchant_id: Uuid) -> Result<Option<Merchant>, AppError> {
        let merchant =
            sqlx::query_as::<_, Merchant>("SELECT * FROM merchants WHERE merchant_id = $1")
                .bind(merchant_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(merchant)
    }

    async fn merchant_exists(&self, merchant_id: Uuid) -> Result<bool, AppError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM merchants WHERE merchant_id = $1)")
                .bind(merchant_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }
}

#[async_trait]
impl TransactionStore for PgStore {
    async fn transaction_by_id(
        &self,
        transaction_id: Uuid,
    ) -> Result<Option<PaymentTransaction>, AppError> {
        let transaction = sqlx::query_as::<_, PaymentTransaction>(
            "SELECT * FROM transactions WHERE transaction_id = $1",
        )
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(transaction)
    }

    async fn transaction_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<PaymentTransaction>, AppError> {
        let transaction = sqlx::query_as::<_, PaymentTransaction>(
            "SELECT * FROM transactions WHERE idempotency_key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(transaction)
    }

    async fn transactions_by_merchant(
        &self,
        merchant_id: Uuid,
    ) -> Result<Vec<PaymentTransaction>, AppError> {
        let transactions = sqlx::query_as::<_, PaymentTransaction>(
            "SELECT * FROM transactions WHERE merchant_id = $1 ORDER BY created_at DESC",
        )
        .bind(merchant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(transactions)
    }

    async fn insert_transaction(
        &self,
        transaction: &PaymentTransaction,
    ) -> Result<InsertOutcome, AppError> {
        let result = sqlx::query_as::<_, PaymentTransaction>(
            r#"
            INSERT INTO transactions (
                transaction_id,
                merchant_id,
                amount,
                currency,
                status,
                external_reference_id,
                idempotency_key,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(transaction.transaction_id)
        .bind(transaction.merchant_id)
        .bind(transaction.amount)
        .bind(&transaction.currency)
        .bind(transaction.status)
        .bind(&transaction.external_reference_id)
        .bind(&transaction.idempotency_key)
        .bind(transaction.created_at)
        .bind(transaction.updated_at)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(stored) => Ok(InsertOutcome::Inserted(stored)),
            // The idempotency index is the only unique constraint a fresh
            // v4 id can realistically collide on.
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Ok(InsertOutcome::DuplicateKey)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_with_audit(
        &self,
        transaction: &PaymentTransaction,
        expected: TransactionStatus,
        audit: &TransactionAuditLog,
    ) -> Result<Option<PaymentTransaction>, AppError> {
        let mut tx = self.pool.begin().await?;

        // Re-assert the precondition inside the transaction. A concurrent
        // callback that already finalized this row makes the UPDATE match
        // nothing, and the rollback below discards the audit entry too.
        let updated = sqlx::query_as::<_, PaymentTransaction>(
            r#"
            UPDATE transactions
            SET status = $1,
                external_reference_id = $2,
                updated_at = $3
            WHERE transaction_id = $4 AND status = $5
            RETURNING *
            "#,
        )
        .bind(transaction.status)
        .bind(&transaction.external_reference_id)
        .bind(transaction.updated_at)
        .bind(transaction.transaction_id)
        .bind(expected)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(updated) = updated else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query(
            r#"
            INSERT INTO transaction_audit_logs (
                audit_log_id,
                transaction_id,
                previous_status,
                new_status,
                message,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(audit.audit_log_id)
        .bind(audit.transaction_id)
        .bind(&audit.previous_status)
        .bind(&audit.new_status)
        .bind(&audit.message)
        .bind(audit.created_at)
        .execute(&mut *tx)
        .await?;

        // Both writes land or neither does.
        tx.commit().await?;

        Ok(Some(updated))
    }
}
