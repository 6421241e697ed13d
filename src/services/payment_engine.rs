//! Payment lifecycle engine.
//!
//! Orchestrates the two operations with real ordering and consistency
//! concerns:
//!
//! - **Creation**: merchant eligibility, idempotency, velocity admission,
//!   persistence, and window recording, in that order.
//! - **Callback**: the single Pending -> Success/Failed transition, written
//!   atomically with its audit entry.
//!
//! # Idempotency
//!
//! The pre-insert lookup is an optimization, not the guarantee. The store's
//! unique index arbitrates concurrent duplicates; when this engine loses
//! that race it re-fetches and returns the winner's transaction, so a
//! retried request never sees an error for being a retry.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::audit_log::TransactionAuditLog;
use crate::models::merchant::MerchantStatus;
use crate::models::transaction::{
    CreatePaymentRequest, PaymentCallbackRequest, PaymentTransaction, TransactionStatus,
};
use crate::services::velocity::VelocityGuard;
use crate::store::{InsertOutcome, MerchantDirectory, TransactionStore};

/// Longest accepted idempotency key (mirrors the column width).
const MAX_IDEMPOTENCY_KEY_LEN: usize = 100;

/// Audit message used when a callback carries none.
const DEFAULT_CALLBACK_MESSAGE: &str = "Status changed via callback";

/// Orchestrates payment creation and callback finalization.
///
/// Safe to share across request tasks behind an `Arc`; all interior state
/// is the concurrency-safe velocity guard.
pub struct PaymentEngine {
    merchants: Arc<dyn MerchantDirectory>,
    transactions: Arc<dyn TransactionStore>,
    velocity: VelocityGuard,
    max_amount: Decimal,
}

impl PaymentEngine {
    pub fn new(
        merchants: Arc<dyn MerchantDirectory>,
        transactions: Arc<dyn TransactionStore>,
        velocity: VelocityGuard,
        max_amount: Decimal,
    ) -> Self {
        Self {
            merchants,
            transactions,
            velocity,
            max_amount,
        }
    }

    /// Fetch a single transaction snapshot.
    pub async fn get_by_id(&self, transaction_id: Uuid) -> Result<PaymentTransaction, AppError> {
        self.transactions
            .transaction_by_id(transaction_id)
            .await?
            .ok_or(AppError::TransactionNotFound)
    }

    /// All transactions for a merchant, newest first.
    pub async fn get_by_merchant(
        &self,
        merchant_id: Uuid,
    ) -> Result<Vec<PaymentTransaction>, AppError> {
        if !self.merchants.merchant_exists(merchant_id).await? {
            return Err(AppError::MerchantNotFound);
        }

        self.transactions.transactions_by_merchant(merchant_id).await
    }

    /// Create a payment transaction against a merchant.
    ///
    /// # Process
    ///
    /// 1. Validate amount and currency
    /// 2. Check the merchant exists and is Active
    /// 3. Return any existing transaction for the idempotency key
    /// 4. Ask the velocity guard for admission
    /// 5. Persist the new Pending transaction
    /// 6. Record the admitted transaction in the velocity window
    ///
    /// A denied attempt leaves no durable trace and no velocity entry; the
    /// window only counts transactions that were actually persisted.
    pub async fn create_payment(
        &self,
        request: CreatePaymentRequest,
    ) -> Result<PaymentTransaction, AppError> {
        self.validate(&request)?;

        let merchant = self
            .merchants
            .merchant_by_id(request.merchant_id)
            .await?
            .ok_or(AppError::MerchantNotFound)?;

        if merchant.status != MerchantStatus::Active {
            return Err(AppError::MerchantNotActive(merchant.status));
        }

        // An empty key means "no key"; retried requests often serialize it
        // that way.
        let idempotency_key = request
            .idempotency_key
            .as_deref()
            .filter(|key| !key.is_empty());

        if let Some(key) = idempotency_key {
            if let Some(existing) = self.transactions.transaction_by_idempotency_key(key).await? {
                tracing::debug!(
                    transaction_id = %existing.transaction_id,
                    "idempotent replay, returning stored transaction"
                );
                return Ok(existing);
            }
        }

        if !self.velocity.is_allowed(request.merchant_id) {
            tracing::warn!(merchant_id = %request.merchant_id, "velocity admission denied");
            return Err(AppError::RateLimited);
        }

        let now = Utc::now();
        let transaction = PaymentTransaction {
            transaction_id: Uuid::new_v4(),
            merchant_id: request.merchant_id,
            amount: request.amount,
            currency: request.currency.clone(),
            status: TransactionStatus::Pending,
            external_reference_id: None,
            idempotency_key: idempotency_key.map(str::to_owned),
            created_at: now,
            updated_at: now,
        };

        let stored = match self.transactions.insert_transaction(&transaction).await? {
            InsertOutcome::Inserted(stored) => stored,
            InsertOutcome::DuplicateKey => {
                // A concurrent request with the same key won the insert
                // between our lookup and our insert. Resolution rule:
                // return the winner, don't error.
                let Some(key) = idempotency_key else {
                    return Err(AppError::Conflict);
                };
                return self
                    .transactions
                    .transaction_by_idempotency_key(key)
                    .await?
                    .ok_or(AppError::Conflict);
            }
        };

        // Only persisted transactions count toward the window; an attempt
        // abandoned or rejected above must not consume admission budget.
        self.velocity.record(stored.merchant_id);

        tracing::info!(
            transaction_id = %stored.transaction_id,
            merchant_id = %stored.merchant_id,
            amount = %stored.amount,
            currency = %stored.currency,
            "payment created"
        );

        Ok(stored)
    }

    /// Apply a provider callback, finalizing a Pending transaction.
    ///
    /// The callback is deliberately not idempotent: a second callback for
    /// the same transaction fails with the transaction's current status
    /// instead of being absorbed as a no-op.
    pub async fn process_callback(
        &self,
        request: PaymentCallbackRequest,
    ) -> Result<PaymentTransaction, AppError> {
        let transaction = self
            .transactions
            .transaction_by_id(request.transaction_id)
            .await?
            .ok_or(AppError::TransactionNotFound)?;

        if transaction.status != TransactionStatus::Pending {
            return Err(AppError::TransactionNotPending(transaction.status));
        }

        let previous_status = transaction.status;
        let new_status = TransactionStatus::from(request.status);
        let now = Utc::now();

        let mut updated = transaction;
        updated.status = new_status;
        updated.external_reference_id = request.external_reference_id;
        updated.updated_at = now;

        let audit = TransactionAuditLog {
            audit_log_id: Uuid::new_v4(),
            transaction_id: updated.transaction_id,
            previous_status: previous_status.to_string(),
            new_status: new_status.to_string(),
            message: request
                .message
                .unwrap_or_else(|| DEFAULT_CALLBACK_MESSAGE.to_string()),
            created_at: now,
        };

        let stored = self
            .transactions
            .update_with_audit(&updated, TransactionStatus::Pending, &audit)
            .await?;

        match stored {
            Some(stored) => {
                tracing::info!(
                    transaction_id = %stored.transaction_id,
                    status = %stored.status,
                    "payment finalized via callback"
                );
                Ok(stored)
            }
            None => {
                // A concurrent callback finalized the row first; report the
                // state it left behind.
                let current = self
                    .transactions
                    .transaction_by_id(updated.transaction_id)
                    .await?
                    .ok_or(AppError::TransactionNotFound)?;
                Err(AppError::TransactionNotPending(current.status))
            }
        }
    }

    /// Number of velocity-window entries currently held for a merchant.
    pub fn recorded_velocity(&self, merchant_id: Uuid) -> usize {
        self.velocity.recorded_count(merchant_id)
    }

    fn validate(&self, request: &CreatePaymentRequest) -> Result<(), AppError> {
        if request.amount <= Decimal::ZERO {
            return Err(AppError::InvalidRequest(
                "Amount must be positive".to_string(),
            ));
        }

        if request.amount > self.max_amount {
            return Err(AppError::InvalidRequest(format!(
                "Amount must not exceed {}",
                self.max_amount
            )));
        }

        if request.amount.round_dp(2) != request.amount {
            return Err(AppError::InvalidRequest(
                "Amount cannot have more than two decimal places".to_string(),
            ));
        }

        if request.currency.len() != 3 || !request.currency.chars().all(|c| c.is_ascii_alphabetic())
        {
            return Err(AppError::InvalidRequest(
                "Currency must be a 3-letter code".to_string(),
            ));
        }

        if let Some(key) = &request.idempotency_key {
            if key.len() > MAX_IDEMPOTENCY_KEY_LEN {
                return Err(AppError::InvalidRequest(format!(
                    "Idempotency key must not exceed {MAX_IDEMPOTENCY_KEY_LEN} characters"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::models::merchant::Merchant;
    use crate::models::transaction::CallbackStatus;

    #[derive(Default)]
    struct InMemoryDirectory {
        merchants: Mutex<HashMap<Uuid, Merchant>>,
    }

    impl InMemoryDirectory {
        fn with_merchant(merchant: Merchant) -> Arc<Self> {
            let directory = Self::default();
            directory
                .merchants
                .lock()
                .unwrap()
                .insert(merchant.merchant_id, merchant);
            Arc::new(directory)
        }
    }

    #[async_trait]
    impl MerchantDirectory for InMemoryDirectory {
        async fn merchant_by_id(&self, merchant_id: Uuid) -> Result<Option<Merchant>, AppError> {
            Ok(self.merchants.lock().unwrap().get(&merchant_id).cloned())
        }

        async fn merchant_exists(&self, merchant_id: Uuid) -> Result<bool, AppError> {
            Ok(self.merchants.lock().unwrap().contains_key(&merchant_id))
        }
    }

    /// In-memory stand-in for the Postgres store. The single mutex makes
    /// insert-with-uniqueness and update-with-audit atomic, mirroring what
    /// the unique index and the SQL transaction provide in production.
    #[derive(Default)]
    struct InMemoryStore {
        state: Mutex<StoreState>,
    }

    #[derive(Default)]
    struct StoreState {
        transactions: HashMap<Uuid, PaymentTransaction>,
        audits: Vec<TransactionAuditLog>,
    }

    impl InMemoryStore {
        fn transaction_count(&self) -> usize {
            self.state.lock().unwrap().transactions.len()
        }

        fn audit_entries(&self) -> Vec<TransactionAuditLog> {
            self.state.lock().unwrap().audits.clone()
        }

        fn put(&self, transaction: PaymentTransaction) {
            self.state
                .lock()
                .unwrap()
                .transactions
                .insert(transaction.transaction_id, transaction);
        }
    }

    #[async_trait]
    impl TransactionStore for InMemoryStore {
        async fn transaction_by_id(
            &self,
            transaction_id: Uuid,
        ) -> Result<Option<PaymentTransaction>, AppError> {
            Ok(self
                .state
                .lock()
                .unwrap()
                .transactions
                .get(&transaction_id)
                .cloned())
        }

        async fn transaction_by_idempotency_key(
            &self,
            key: &str,
        ) -> Result<Option<PaymentTransaction>, AppError> {
            Ok(self
                .state
                .lock()
                .unwrap()
                .transactions
                .values()
                .find(|t| t.idempotency_key.as_deref() == Some(key))
                .cloned())
        }

        async fn transactions_by_merchant(
            &self,
            merchant_id: Uuid,
        ) -> Result<Vec<PaymentTransaction>, AppError> {
            let mut transactions: Vec<_> = self
                .state
                .lock()
                .unwrap()
                .transactions
                .values()
                .filter(|t| t.merchant_id == merchant_id)
                .cloned()
                .collect();
            transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(transactions)
        }

        async fn insert_transaction(
            &self,
            transaction: &PaymentTransaction,
        ) -> Result<InsertOutcome, AppError> {
            let mut state = self.state.lock().unwrap();
            if let Some(key) = transaction.idempotency_key.as_deref() {
                let taken = state
                    .transactions
                    .values()
                    .any(|t| t.idempotency_key.as_deref() == Some(key));
                if taken {
                    return Ok(InsertOutcome::DuplicateKey);
                }
            }
            state
                .transactions
                .insert(transaction.transaction_id, transaction.clone());
            Ok(InsertOutcome::Inserted(transaction.clone()))
        }

        async fn update_with_audit(
            &self,
            transaction: &PaymentTransaction,
            expected: TransactionStatus,
            audit: &TransactionAuditLog,
        ) -> Result<Option<PaymentTransaction>, AppError> {
            let mut state = self.state.lock().unwrap();
            let precondition_holds = state
                .transactions
                .get(&transaction.transaction_id)
                .is_some_and(|current| current.status == expected);
            if !precondition_holds {
                return Ok(None);
            }
            state
                .transactions
                .insert(transaction.transaction_id, transaction.clone());
            state.audits.push(audit.clone());
            Ok(Some(transaction.clone()))
        }
    }

    /// Wrapper that misses the first idempotency-key lookup, simulating a
    /// concurrent writer committing between the engine's pre-check and its
    /// insert.
    struct RacingStore {
        inner: Arc<InMemoryStore>,
        first_lookup: AtomicBool,
    }

    #[async_trait]
    impl TransactionStore for RacingStore {
        async fn transaction_by_id(
            &self,
            transaction_id: Uuid,
        ) -> Result<Option<PaymentTransaction>, AppError> {
            self.inner.transaction_by_id(transaction_id).await
        }

        async fn transaction_by_idempotency_key(
            &self,
            key: &str,
        ) -> Result<Option<PaymentTransaction>, AppError> {
            if self.first_lookup.swap(false, Ordering::SeqCst) {
                return Ok(None);
            }
            self.inner.transaction_by_idempotency_key(key).await
        }

        async fn transactions_by_merchant(
            &self,
            merchant_id: Uuid,
        ) -> Result<Vec<PaymentTransaction>, AppError> {
            self.inner.transactions_by_merchant(merchant_id).await
        }

        async fn insert_transaction(
            &self,
            transaction: &PaymentTransaction,
        ) -> Result<InsertOutcome, AppError> {
            self.inner.insert_transaction(transaction).await
        }

        async fn update_with_audit(
            &self,
            transaction: &PaymentTransaction,
            expected: TransactionStatus,
            audit: &TransactionAuditLog,
        ) -> Result<Option<PaymentTransaction>, AppError> {
            self.inner.update_with_audit(transaction, expected, audit).await
        }
    }

    /// Wrapper whose first read returns a stale Pending snapshot while the
    /// underlying row has already been finalized, simulating a callback that
    /// races past the engine's precondition check.
    struct StaleReadStore {
        inner: Arc<InMemoryStore>,
        stale: Mutex<Option<PaymentTransaction>>,
    }

    #[async_trait]
    impl TransactionStore for StaleReadStore {
        async fn transaction_by_id(
            &self,
            transaction_id: Uuid,
        ) -> Result<Option<PaymentTransaction>, AppError> {
            if let Some(stale) = self.stale.lock().unwrap().take() {
                return Ok(Some(stale));
            }
            self.inner.transaction_by_id(transaction_id).await
        }

        async fn transaction_by_idempotency_key(
            &self,
            key: &str,
        ) -> Result<Option<PaymentTransaction>, AppError> {
            self.inner.transaction_by_idempotency_key(key).await
        }

        async fn transactions_by_merchant(
            &self,
            merchant_id: Uuid,
        ) -> Result<Vec<PaymentTransaction>, AppError> {
            self.inner.transactions_by_merchant(merchant_id).await
        }

        async fn insert_transaction(
            &self,
            transaction: &PaymentTransaction,
        ) -> Result<InsertOutcome, AppError> {
            self.inner.insert_transaction(transaction).await
        }

        async fn update_with_audit(
            &self,
            transaction: &PaymentTransaction,
            expected: TransactionStatus,
            audit: &TransactionAuditLog,
        ) -> Result<Option<PaymentTransaction>, AppError> {
            self.inner.update_with_audit(transaction, expected, audit).await
        }
    }

    fn merchant_with_status(status: MerchantStatus) -> Merchant {
        let now = Utc::now();
        Merchant {
            merchant_id: Uuid::new_v4(),
            business_name: "Acme Ltd".to_string(),
            email: "billing@acme.example".to_string(),
            status,
            created_at: now,
            updated_at: now,
        }
    }

    fn engine_for(
        merchant: &Merchant,
        store: Arc<InMemoryStore>,
        max_events: usize,
    ) -> PaymentEngine {
        PaymentEngine::new(
            InMemoryDirectory::with_merchant(merchant.clone()),
            store,
            VelocityGuard::new(max_events, Duration::from_secs(60)),
            Decimal::from(1_000_000),
        )
    }

    fn payment_request(merchant_id: Uuid, key: Option<&str>) -> CreatePaymentRequest {
        CreatePaymentRequest {
            merchant_id,
            amount: Decimal::new(10_000, 2),
            currency: "USD".to_string(),
            idempotency_key: key.map(str::to_owned),
        }
    }

    #[tokio::test]
    async fn creates_pending_transaction_for_active_merchant() {
        let merchant = merchant_with_status(MerchantStatus::Active);
        let store = Arc::new(InMemoryStore::default());
        let engine = engine_for(&merchant, store.clone(), 10);

        let transaction = engine
            .create_payment(payment_request(merchant.merchant_id, Some("k1")))
            .await
            .unwrap();

        assert_eq!(transaction.status, TransactionStatus::Pending);
        assert_eq!(transaction.merchant_id, merchant.merchant_id);
        assert_eq!(transaction.amount, Decimal::new(10_000, 2));
        assert_eq!(transaction.idempotency_key.as_deref(), Some("k1"));
        assert!(transaction.external_reference_id.is_none());
        assert_eq!(store.transaction_count(), 1);
        assert_eq!(engine.recorded_velocity(merchant.merchant_id), 1);
    }

    #[tokio::test]
    async fn unknown_merchant_fails_with_not_found() {
        let merchant = merchant_with_status(MerchantStatus::Active);
        let store = Arc::new(InMemoryStore::default());
        let engine = engine_for(&merchant, store.clone(), 10);
        let stranger = Uuid::new_v4();

        let result = engine.create_payment(payment_request(stranger, None)).await;

        assert!(matches!(result, Err(AppError::MerchantNotFound)));
        assert_eq!(store.transaction_count(), 0);
        assert_eq!(engine.recorded_velocity(stranger), 0);
    }

    #[tokio::test]
    async fn inactive_merchant_fails_and_reports_current_status() {
        for status in [
            MerchantStatus::Pending,
            MerchantStatus::Suspended,
            MerchantStatus::Rejected,
        ] {
            let merchant = merchant_with_status(status);
            let store = Arc::new(InMemoryStore::default());
            let engine = engine_for(&merchant, store.clone(), 10);

            let result = engine
                .create_payment(payment_request(merchant.merchant_id, None))
                .await;

            match result {
                Err(AppError::MerchantNotActive(reported)) => assert_eq!(reported, status),
                other => panic!("expected MerchantNotActive, got {other:?}"),
            }
            assert_eq!(store.transaction_count(), 0);
            assert_eq!(engine.recorded_velocity(merchant.merchant_id), 0);
        }
    }

    #[tokio::test]
    async fn repeated_idempotency_key_returns_the_stored_transaction() {
        let merchant = merchant_with_status(MerchantStatus::Active);
        let store = Arc::new(InMemoryStore::default());
        let engine = engine_for(&merchant, store.clone(), 10);
        let request = payment_request(merchant.merchant_id, Some("k1"));

        let first = engine.create_payment(request.clone()).await.unwrap();
        let second = engine.create_payment(request).await.unwrap();

        assert_eq!(first.transaction_id, second.transaction_id);
        assert_eq!(store.transaction_count(), 1);
        // The replay is not a new admission; the window holds one entry.
        assert_eq!(engine.recorded_velocity(merchant.merchant_id), 1);
    }

    #[tokio::test]
    async fn empty_idempotency_key_is_treated_as_absent() {
        let merchant = merchant_with_status(MerchantStatus::Active);
        let store = Arc::new(InMemoryStore::default());
        let engine = engine_for(&merchant, store.clone(), 10);
        let request = payment_request(merchant.merchant_id, Some(""));

        let first = engine.create_payment(request.clone()).await.unwrap();
        let second = engine.create_payment(request).await.unwrap();

        assert_ne!(first.transaction_id, second.transaction_id);
        assert!(first.idempotency_key.is_none());
        assert_eq!(store.transaction_count(), 2);
    }

    #[tokio::test]
    async fn denied_admission_creates_nothing() {
        let merchant = merchant_with_status(MerchantStatus::Active);
        let store = Arc::new(InMemoryStore::default());
        let engine = engine_for(&merchant, store.clone(), 1);

        engine
            .create_payment(payment_request(merchant.merchant_id, None))
            .await
            .unwrap();

        let result = engine
            .create_payment(payment_request(merchant.merchant_id, None))
            .await;

        assert!(matches!(result, Err(AppError::RateLimited)));
        assert_eq!(store.transaction_count(), 1);
        assert_eq!(engine.recorded_velocity(merchant.merchant_id), 1);
    }

    #[tokio::test]
    async fn rejects_invalid_amounts_and_currencies() {
        let merchant = merchant_with_status(MerchantStatus::Active);
        let store = Arc::new(InMemoryStore::default());
        let engine = engine_for(&merchant, store.clone(), 10);

        let mut zero = payment_request(merchant.merchant_id, None);
        zero.amount = Decimal::ZERO;

        let mut negative = payment_request(merchant.merchant_id, None);
        negative.amount = Decimal::new(-100, 2);

        let mut too_large = payment_request(merchant.merchant_id, None);
        too_large.amount = Decimal::from(1_000_001);

        let mut sub_cent = payment_request(merchant.merchant_id, None);
        sub_cent.amount = Decimal::new(10_005, 3);

        let mut bad_currency = payment_request(merchant.merchant_id, None);
        bad_currency.currency = "US1".to_string();

        let mut long_currency = payment_request(merchant.merchant_id, None);
        long_currency.currency = "USDT".to_string();

        for request in [zero, negative, too_large, sub_cent, bad_currency, long_currency] {
            let result = engine.create_payment(request).await;
            assert!(matches!(result, Err(AppError::InvalidRequest(_))));
        }
        assert_eq!(store.transaction_count(), 0);
        assert_eq!(engine.recorded_velocity(merchant.merchant_id), 0);
    }

    #[tokio::test]
    async fn lost_insert_race_returns_the_winning_transaction() {
        let merchant = merchant_with_status(MerchantStatus::Active);
        let inner = Arc::new(InMemoryStore::default());

        let now = Utc::now();
        let winner = PaymentTransaction {
            transaction_id: Uuid::new_v4(),
            merchant_id: merchant.merchant_id,
            amount: Decimal::new(10_000, 2),
            currency: "USD".to_string(),
            status: TransactionStatus::Pending,
            external_reference_id: None,
            idempotency_key: Some("k1".to_string()),
            created_at: now,
            updated_at: now,
        };
        inner.put(winner.clone());

        let racing = Arc::new(RacingStore {
            inner: inner.clone(),
            first_lookup: AtomicBool::new(true),
        });
        let engine = PaymentEngine::new(
            InMemoryDirectory::with_merchant(merchant.clone()),
            racing,
            VelocityGuard::new(10, Duration::from_secs(60)),
            Decimal::from(1_000_000),
        );

        let returned = engine
            .create_payment(payment_request(merchant.merchant_id, Some("k1")))
            .await
            .unwrap();

        assert_eq!(returned.transaction_id, winner.transaction_id);
        assert_eq!(inner.transaction_count(), 1);
        // The loser must not consume admission budget for the winner's insert.
        assert_eq!(engine.recorded_velocity(merchant.merchant_id), 0);
    }

    #[tokio::test]
    async fn concurrent_duplicate_requests_converge_on_one_transaction() {
        let merchant = merchant_with_status(MerchantStatus::Active);
        let store = Arc::new(InMemoryStore::default());
        let engine = Arc::new(engine_for(&merchant, store.clone(), 10));
        let request = payment_request(merchant.merchant_id, Some("k1"));

        let left = {
            let engine = engine.clone();
            let request = request.clone();
            tokio::spawn(async move { engine.create_payment(request).await })
        };
        let right = {
            let engine = engine.clone();
            let request = request.clone();
            tokio::spawn(async move { engine.create_payment(request).await })
        };

        let left = left.await.unwrap().unwrap();
        let right = right.await.unwrap().unwrap();

        assert_eq!(left.transaction_id, right.transaction_id);
        assert_eq!(store.transaction_count(), 1);
    }

    #[tokio::test]
    async fn successful_callback_finalizes_and_appends_one_audit_entry() {
        let merchant = merchant_with_status(MerchantStatus::Active);
        let store = Arc::new(InMemoryStore::default());
        let engine = engine_for(&merchant, store.clone(), 10);

        let created = engine
            .create_payment(payment_request(merchant.merchant_id, None))
            .await
            .unwrap();

        let finalized = engine
            .process_callback(PaymentCallbackRequest {
                transaction_id: created.transaction_id,
                status: CallbackStatus::Success,
                external_reference_id: Some("ext-1".to_string()),
                message: None,
            })
            .await
            .unwrap();

        assert_eq!(finalized.status, TransactionStatus::Success);
        assert_eq!(finalized.external_reference_id.as_deref(), Some("ext-1"));
        assert!(finalized.updated_at >= created.updated_at);

        let audits = store.audit_entries();
        assert_eq!(audits.len(), 1);
        assert_eq!(audits[0].transaction_id, created.transaction_id);
        assert_eq!(audits[0].previous_status, "Pending");
        assert_eq!(audits[0].new_status, "Success");
        assert_eq!(audits[0].message, "Status changed via callback");
    }

    #[tokio::test]
    async fn failed_callback_records_the_supplied_message() {
        let merchant = merchant_with_status(MerchantStatus::Active);
        let store = Arc::new(InMemoryStore::default());
        let engine = engine_for(&merchant, store.clone(), 10);

        let created = engine
            .create_payment(payment_request(merchant.merchant_id, None))
            .await
            .unwrap();

        let finalized = engine
            .process_callback(PaymentCallbackRequest {
                transaction_id: created.transaction_id,
                status: CallbackStatus::Failed,
                external_reference_id: None,
                message: Some("Declined by issuer".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(finalized.status, TransactionStatus::Failed);

        let audits = store.audit_entries();
        assert_eq!(audits.len(), 1);
        assert_eq!(audits[0].new_status, "Failed");
        assert_eq!(audits[0].message, "Declined by issuer");
    }

    #[tokio::test]
    async fn second_callback_fails_and_mutates_nothing() {
        let merchant = merchant_with_status(MerchantStatus::Active);
        let store = Arc::new(InMemoryStore::default());
        let engine = engine_for(&merchant, store.clone(), 10);

        let created = engine
            .create_payment(payment_request(merchant.merchant_id, None))
            .await
            .unwrap();
        let callback = PaymentCallbackRequest {
            transaction_id: created.transaction_id,
            status: CallbackStatus::Success,
            external_reference_id: Some("ext-1".to_string()),
            message: None,
        };

        let finalized = engine.process_callback(callback.clone()).await.unwrap();
        let replay = engine.process_callback(callback).await;

        match replay {
            Err(AppError::TransactionNotPending(status)) => {
                assert_eq!(status, TransactionStatus::Success);
            }
            other => panic!("expected TransactionNotPending, got {other:?}"),
        }

        // No second audit entry, no further mutation.
        assert_eq!(store.audit_entries().len(), 1);
        let stored = engine.get_by_id(created.transaction_id).await.unwrap();
        assert_eq!(stored, finalized);
    }

    #[tokio::test]
    async fn callback_for_unknown_transaction_fails_with_not_found() {
        let merchant = merchant_with_status(MerchantStatus::Active);
        let store = Arc::new(InMemoryStore::default());
        let engine = engine_for(&merchant, store.clone(), 10);

        let result = engine
            .process_callback(PaymentCallbackRequest {
                transaction_id: Uuid::new_v4(),
                status: CallbackStatus::Success,
                external_reference_id: None,
                message: None,
            })
            .await;

        assert!(matches!(result, Err(AppError::TransactionNotFound)));
        assert!(store.audit_entries().is_empty());
    }

    #[tokio::test]
    async fn get_by_merchant_requires_the_merchant_to_exist() {
        let merchant = merchant_with_status(MerchantStatus::Active);
        let store = Arc::new(InMemoryStore::default());
        let engine = engine_for(&merchant, store.clone(), 10);

        let result = engine.get_by_merchant(Uuid::new_v4()).await;
        assert!(matches!(result, Err(AppError::MerchantNotFound)));

        engine
            .create_payment(payment_request(merchant.merchant_id, None))
            .await
            .unwrap();
        engine
            .create_payment(payment_request(merchant.merchant_id, None))
            .await
            .unwrap();

        let transactions = engine.get_by_merchant(merchant.merchant_id).await.unwrap();
        assert_eq!(transactions.len(), 2);
    }

    #[tokio::test]
    async fn get_by_id_resolves_or_fails_with_not_found() {
        let merchant = merchant_with_status(MerchantStatus::Active);
        let store = Arc::new(InMemoryStore::default());
        let engine = engine_for(&merchant, store.clone(), 10);

        let created = engine
            .create_payment(payment_request(merchant.merchant_id, None))
            .await
            .unwrap();

        let fetched = engine.get_by_id(created.transaction_id).await.unwrap();
        assert_eq!(fetched.transaction_id, created.transaction_id);

        let missing = engine.get_by_id(Uuid::new_v4()).await;
        assert!(matches!(missing, Err(AppError::TransactionNotFound)));
    }

    #[tokio::test]
    async fn callback_losing_the_finalization_race_reports_final_status() {
        let merchant = merchant_with_status(MerchantStatus::Active);
        let inner = Arc::new(InMemoryStore::default());

        let now = Utc::now();
        let pending = PaymentTransaction {
            transaction_id: Uuid::new_v4(),
            merchant_id: merchant.merchant_id,
            amount: Decimal::new(10_000, 2),
            currency: "USD".to_string(),
            status: TransactionStatus::Pending,
            external_reference_id: None,
            idempotency_key: None,
            created_at: now,
            updated_at: now,
        };
        let mut finalized = pending.clone();
        finalized.status = TransactionStatus::Success;
        inner.put(finalized);

        let store = Arc::new(StaleReadStore {
            inner: inner.clone(),
            stale: Mutex::new(Some(pending.clone())),
        });
        let engine = PaymentEngine::new(
            InMemoryDirectory::with_merchant(merchant),
            store,
            VelocityGuard::new(10, Duration::from_secs(60)),
            Decimal::from(1_000_000),
        );

        let result = engine
            .process_callback(PaymentCallbackRequest {
                transaction_id: pending.transaction_id,
                status: CallbackStatus::Failed,
                external_reference_id: None,
                message: None,
            })
            .await;

        match result {
            Err(AppError::TransactionNotPending(status)) => {
                assert_eq!(status, TransactionStatus::Success);
            }
            other => panic!("expected TransactionNotPending, got {other:?}"),
        }
        // The guarded update wrote nothing, so no audit entry appears.
        assert!(inner.audit_entries().is_empty());
    }
}
