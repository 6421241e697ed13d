//! Shared application state handed to every request handler.

use std::sync::Arc;

use crate::db::DbPool;
use crate::services::payment_engine::PaymentEngine;

/// Everything a handler needs: the connection pool for plain data plumbing,
/// the payment engine for lifecycle operations, and the optional shared
/// secret for callback signature verification.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub engine: Arc<PaymentEngine>,
    pub callback_secret: Option<String>,
}
