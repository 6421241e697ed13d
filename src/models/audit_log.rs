//! Transaction audit log model.
//!
//! One audit entry is appended per status transition, in the same database
//! transaction as the status change itself. Entries are never updated or
//! deleted afterwards.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Append-only record of a single transaction status transition.
///
/// Status labels are stored as display text ("Pending", "Success", ...) so
/// the trail stays readable even if the enum evolves.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct TransactionAuditLog {
    /// Unique identifier for this audit entry
    pub audit_log_id: Uuid,

    /// Transaction this entry documents
    pub transaction_id: Uuid,

    /// Status label before the transition
    pub previous_status: String,

    /// Status label after the transition
    pub new_status: String,

    /// Free-text note, supplied by the callback or a default
    pub message: String,

    /// When the transition happened
    pub created_at: DateTime<Utc>,
}
