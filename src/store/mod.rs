//! Storage boundary consumed by the payment engine.
//!
//! The engine talks to persistence through the two traits in this module so
//! that the lifecycle logic can be exercised against in-memory fakes while
//! production wires in the Postgres implementation from [`postgres`].

pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::audit_log::TransactionAuditLog;
use crate::models::merchant::Merchant;
use crate::models::transaction::{PaymentTransaction, TransactionStatus};

/// Result of attempting to insert a new transaction.
#[derive(Debug)]
pub enum InsertOutcome {
    /// The transaction was persisted; carries the stored row.
    Inserted(PaymentTransaction),

    /// Another transaction already holds this idempotency key. The caller
    /// decides how to resolve the race; nothing was written.
    DuplicateKey,
}

/// Read-only view of merchants, as the payment engine sees them.
#[async_trait]
pub trait MerchantDirectory: Send + Sync {
    async fn merchant_by_id(&self, merchant_id: Uuid) -> Result<Option<Merchant>, AppError>;

    async fn merchant_exists(&self, merchant_id: Uuid) -> Result<bool, AppError>;
}

/// Durable storage for transactions and their audit trail.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn transaction_by_id(
        &self,
        transaction_id: Uuid,
    ) -> Result<Option<PaymentTransaction>, AppError>;

    async fn transaction_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<PaymentTransaction>, AppError>;

    /// Transactions for a merchant, newest first.
    async fn transactions_by_merchant(
        &self,
        merchant_id: Uuid,
    ) -> Result<Vec<PaymentTransaction>, AppError>;

    /// Insert a new transaction.
    ///
    /// The idempotency guarantee lives here, not in the caller: the store
    /// must reject a second transaction bearing an already-stored key and
    /// report it as [`InsertOutcome::DuplicateKey`] rather than an opaque
    /// error, even under concurrent inserts.
    async fn insert_transaction(
        &self,
        transaction: &PaymentTransaction,
    ) -> Result<InsertOutcome, AppError>;

    /// Atomically persist a status change together with its audit entry.
    ///
    /// The update only applies while the stored status still equals
    /// `expected`; otherwise nothing is written (no partial audit entry)
    /// and `None` is returned. A reader must never observe the new status
    /// without the audit entry, or the audit entry without the new status.
    async fn update_with_audit(
        &self,
        transaction: &PaymentTransaction,
        expected: TransactionStatus,
        audit: &TransactionAuditLog,
    ) -> Result<Option<PaymentTransaction>, AppError>;
}
