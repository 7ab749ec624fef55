//! Single-writer posting worker
//!
//! Every posting goes through one Tokio task that owns the mailbox receiver.
//! Requests are processed strictly one at a time, which is what makes the
//! read-then-increment sequence allocation safe.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │              Callers (many tasks)                     │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              PostingHandle (Clone)                    │
//! │   oneshot reply slot + optional caller deadline      │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              PostingActor (Single Task)               │
//! │  route → validate → allocate + hash → persist        │
//! │  → mark chart stale → reply                          │
//! │  Timer: rebuild stale charts (optional)              │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       ▼
//!            Storage::create / update (one WriteBatch)
//! ```

use crate::{
    allocator,
    chart::{AccountTree, ChartCache},
    crypto::transaction_hash,
    metrics::Metrics,
    types::{AccountId, CompanyId, Operation, Transaction, TransactionStatus},
    validator::{check_route, codes, validate, ValidationErrors},
    Config, Error, Result, Storage,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, timeout_at, Duration};
use uuid::Uuid;

/// Result of a successful posting
#[derive(Debug, Clone, PartialEq)]
pub struct PostingOutcome {
    /// Transaction as persisted
    pub transaction: Transaction,
    /// Stored state before an update or approval
    pub previous: Option<Transaction>,
}

/// One posting request travelling through the mailbox
#[derive(Debug)]
pub struct PostingRequest {
    /// Correlation id for logs and audit
    pub request_id: Uuid,
    /// Candidate transaction
    pub candidate: Transaction,
    /// Requested operation
    pub operation: Operation,
    /// Reply slot, consumed exactly once
    pub reply: oneshot::Sender<Result<PostingOutcome>>,
}

/// Message sent to the posting worker
#[derive(Debug)]
pub enum PostingMessage {
    /// Process a posting
    Submit(PostingRequest),

    /// Rebuild one company's chart of accounts
    RefreshChart {
        /// Company to rebuild
        company_id: CompanyId,
        /// Reply slot
        response: oneshot::Sender<Result<Arc<AccountTree>>>,
    },

    /// Stop after the messages already queued ahead of this one
    Shutdown,
}

/// Worker that processes posting messages
pub struct PostingActor {
    storage: Arc<Storage>,
    chart: Arc<ChartCache>,
    metrics: Metrics,
    mailbox: mpsc::Receiver<PostingMessage>,
    refresh_interval: Option<Duration>,
}

impl PostingActor {
    /// Create new actor
    pub fn new(
        storage: Arc<Storage>,
        chart: Arc<ChartCache>,
        metrics: Metrics,
        mailbox: mpsc::Receiver<PostingMessage>,
        refresh_interval: Option<Duration>,
    ) -> Self {
        Self {
            storage,
            chart,
            metrics,
            mailbox,
            refresh_interval,
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        let period = self.refresh_interval.unwrap_or(Duration::from_secs(60));
        let mut refresh_timer = interval(period);
        refresh_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!(
            refresh_interval_ms = self.refresh_interval.map(|d| d.as_millis() as u64),
            "Posting worker started"
        );

        loop {
            tokio::select! {
                msg = self.mailbox.recv() => match msg {
                    Some(PostingMessage::Shutdown) | None => break,
                    Some(msg) => self.handle_message(msg),
                },

                _ = refresh_timer.tick(), if self.refresh_interval.is_some() => {
                    self.refresh_stale_charts();
                }
            }
        }

        tracing::info!("Posting worker stopped");
    }

    fn handle_message(&mut self, msg: PostingMessage) {
        match msg {
            PostingMessage::Submit(request) => self.handle_request(request),

            PostingMessage::RefreshChart { company_id, response } => {
                let result = self.chart.refresh(&self.storage, company_id);
                if result.is_ok() {
                    self.metrics.record_chart_refresh();
                }
                let _ = response.send(result);
            }

            PostingMessage::Shutdown => {
                // Handled in main loop
            }
        }
    }

    fn handle_request(&mut self, request: PostingRequest) {
        let PostingRequest {
            request_id,
            candidate,
            operation,
            reply,
        } = request;
        let company_id = candidate.company_id;
        let started = Instant::now();

        let result = self.process(candidate, operation);
        self.metrics
            .record_request(started.elapsed().as_secs_f64(), &result);

        match &result {
            Ok(outcome) => {
                let tx = &outcome.transaction;
                tracing::info!(
                    %request_id,
                    company_id,
                    %operation,
                    transaction_id = tx.id,
                    transaction_type = %tx.transaction_type,
                    year_counter = tx.year_counter,
                    "Posting committed"
                );
            }
            Err(err) if err.is_caller_error() => {
                tracing::warn!(%request_id, company_id, %operation, error = %err, "Posting rejected");
            }
            Err(err) => {
                tracing::error!(%request_id, company_id, %operation, error = %err, "Posting failed");
            }
        }

        if reply.send(result).is_err() {
            tracing::debug!(%request_id, "Caller went away before the reply");
        }
    }

    /// Route a request to its handler
    fn process(&self, candidate: Transaction, operation: Operation) -> Result<PostingOutcome> {
        match operation {
            Operation::CreateJournal | Operation::CreateVoucher => self.create(candidate, operation),
            Operation::UpdateJournal | Operation::UpdateVoucher => self.update(candidate, operation),
            Operation::ApproveVoucher => self.approve(candidate),
        }
    }

    fn create(&self, mut tx: Transaction, operation: Operation) -> Result<PostingOutcome> {
        let mut errors = check_route(&tx, operation);

        match (operation, tx.status) {
            (Operation::CreateVoucher, None) => tx.status = Some(TransactionStatus::Unapproved),
            (Operation::CreateVoucher, Some(TransactionStatus::Approved)) => errors.add(
                "status",
                codes::STATUS,
                "a voucher is created unapproved and approved separately",
            ),
            _ if !tx.transaction_type.is_voucher() => tx.status = None,
            _ => {}
        }

        tx.amount = tx.total_debit().unwrap_or_default();
        errors.merge(validate(&tx, operation));
        errors.into_result()?;

        let year = posting_year(&tx)?;
        let allocation = allocator::allocate(&self.storage, tx.company_id, tx.transaction_type, year)
            .map_err(|e| e.during(operation))?;
        tx.id = allocation.id;
        tx.year_counter = allocation.year_counter;
        tx.year_cumulative = allocation.year_cumulative;
        tx.hash = transaction_hash(&tx);

        let stored = self.storage.create(&tx).map_err(|e| e.during(operation))?;
        self.mark_stale(&stored, None);

        Ok(PostingOutcome {
            transaction: stored,
            previous: None,
        })
    }

    fn update(&self, candidate: Transaction, operation: Operation) -> Result<PostingOutcome> {
        let existing = self
            .storage
            .find_by_id(candidate.company_id, candidate.id)
            .map_err(|e| e.during(operation))?;

        check_route(&existing, operation).into_result()?;
        if existing.status == Some(TransactionStatus::Approved) {
            return Err(Error::InvalidState(format!(
                "{} {} is approved and can no longer change",
                existing.transaction_type, existing.id
            )));
        }

        // Identity, counters, hash and status stay as stored
        let mut tx = existing.header();
        tx.currency_id = candidate.currency_id;
        tx.rate = candidate.rate;
        tx.post_date = candidate.post_date;
        tx.invoice = candidate.invoice;
        tx.description = candidate.description;
        tx.slots = candidate.slots;
        tx.amount = tx.total_debit().unwrap_or_default();

        let mut errors = ValidationErrors::new();
        if let (Some(old), Some(new)) = (existing.year(), tx.year()) {
            if old != new {
                errors.add(
                    "post_date",
                    codes::YEAR_CHANGE,
                    format!("post date cannot move from {} to {}", old, new),
                );
            }
        }
        errors.merge(validate(&tx, operation));
        errors.into_result()?;

        let stored = self.storage.update(&tx).map_err(|e| e.during(operation))?;
        self.mark_stale(&stored, Some(&existing));

        Ok(PostingOutcome {
            transaction: stored,
            previous: Some(existing),
        })
    }

    fn approve(&self, candidate: Transaction) -> Result<PostingOutcome> {
        let operation = Operation::ApproveVoucher;
        let existing = self
            .storage
            .find_by_id(candidate.company_id, candidate.id)
            .map_err(|e| e.during(operation))?;

        check_route(&existing, operation).into_result()?;
        match existing.status {
            Some(TransactionStatus::Unapproved) => {}
            Some(TransactionStatus::Approved) => {
                return Err(Error::InvalidState(format!(
                    "{} {} is already approved",
                    existing.transaction_type, existing.id
                )));
            }
            None => {
                return Err(Error::InvalidState(format!(
                    "{} {} has no approval status",
                    existing.transaction_type, existing.id
                )));
            }
        }

        let stored = self
            .storage
            .set_status(existing.company_id, existing.id, TransactionStatus::Approved)
            .map_err(|e| e.during(operation))?;

        Ok(PostingOutcome {
            transaction: stored,
            previous: Some(existing),
        })
    }

    fn mark_stale(&self, stored: &Transaction, previous: Option<&Transaction>) {
        let accounts: Vec<AccountId> = stored
            .slots
            .iter()
            .chain(previous.into_iter().flat_map(|p| p.slots.iter()))
            .map(|s| s.account_id)
            .collect();
        self.chart.mark_stale(stored.company_id, accounts);
    }

    fn refresh_stale_charts(&self) {
        for company_id in self.chart.stale_companies() {
            match self.chart.refresh(&self.storage, company_id) {
                Ok(_) => self.metrics.record_chart_refresh(),
                Err(e) => tracing::error!(company_id, error = %e, "Chart refresh failed"),
            }
        }
    }
}

fn posting_year(tx: &Transaction) -> Result<i32> {
    tx.year().ok_or_else(|| {
        let mut errors = ValidationErrors::new();
        errors.add("post_date", codes::REQUIRED, "post date is required");
        Error::Validation(errors)
    })
}

/// Handle for sending messages to the actor
#[derive(Clone)]
pub struct PostingHandle {
    sender: mpsc::Sender<PostingMessage>,
    metrics: Metrics,
}

impl std::fmt::Debug for PostingHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostingHandle")
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}

impl PostingHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<PostingMessage>, metrics: Metrics) -> Self {
        Self { sender, metrics }
    }

    /// Submit a posting and wait for the reply without a deadline
    pub async fn submit(&self, candidate: Transaction, operation: Operation) -> Result<PostingOutcome> {
        self.request(Uuid::now_v7(), candidate, operation, None).await
    }

    /// Submit a posting and give up after `deadline`.
    ///
    /// The worker still completes a request that was already queued; its
    /// reply is drained and logged in the background.
    pub async fn submit_with_deadline(
        &self,
        candidate: Transaction,
        operation: Operation,
        deadline: Duration,
    ) -> Result<PostingOutcome> {
        self.request(Uuid::now_v7(), candidate, operation, Some(deadline))
            .await
    }

    /// Submit a posting under a caller-chosen request id
    pub async fn request(
        &self,
        request_id: Uuid,
        candidate: Transaction,
        operation: Operation,
        deadline: Option<Duration>,
    ) -> Result<PostingOutcome> {
        let (tx, rx) = oneshot::channel();
        let msg = PostingMessage::Submit(PostingRequest {
            request_id,
            candidate,
            operation,
            reply: tx,
        });

        let Some(deadline) = deadline else {
            self.sender
                .send(msg)
                .await
                .map_err(|_| Error::Concurrency("Posting mailbox closed".to_string()))?;
            return rx
                .await
                .map_err(|_| Error::Concurrency("Reply channel closed".to_string()))?;
        };

        let expires = tokio::time::Instant::now() + deadline;
        let timeout_ms = deadline.as_millis() as u64;

        match timeout_at(expires, self.sender.send(msg)).await {
            Ok(sent) => {
                sent.map_err(|_| Error::Concurrency("Posting mailbox closed".to_string()))?
            }
            Err(_) => {
                // Never enqueued, nothing to drain
                self.metrics.record_timeout();
                return Err(Error::Timeout(timeout_ms));
            }
        }

        let mut rx = rx;
        match timeout_at(expires, &mut rx).await {
            Ok(reply) => reply.map_err(|_| Error::Concurrency("Reply channel closed".to_string()))?,
            Err(_) => {
                self.metrics.record_timeout();
                tracing::warn!(%request_id, %operation, timeout_ms, "Posting reply deadline expired");
                tokio::spawn(drain_late_reply(request_id, rx));
                Err(Error::Timeout(timeout_ms))
            }
        }
    }

    /// Ask the worker to rebuild a company's chart of accounts
    pub async fn refresh_chart(&self, company_id: CompanyId) -> Result<Arc<AccountTree>> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(PostingMessage::RefreshChart {
                company_id,
                response: tx,
            })
            .await
            .map_err(|_| Error::Concurrency("Posting mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(PostingMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Posting mailbox closed".to_string()))?;
        Ok(())
    }
}

async fn drain_late_reply(request_id: Uuid, rx: oneshot::Receiver<Result<PostingOutcome>>) {
    match rx.await {
        Ok(Ok(outcome)) => tracing::warn!(
            %request_id,
            transaction_id = outcome.transaction.id,
            year_counter = outcome.transaction.year_counter,
            "Posting committed after its caller gave up"
        ),
        Ok(Err(err)) => tracing::warn!(
            %request_id,
            error = %err,
            "Posting failed after its caller gave up"
        ),
        Err(_) => tracing::debug!(%request_id, "Late reply dropped by the worker"),
    }
}

/// Spawn the posting worker
pub fn spawn_posting_actor(
    storage: Arc<Storage>,
    chart: Arc<ChartCache>,
    metrics: Metrics,
    config: &Config,
) -> PostingHandle {
    let (tx, rx) = mpsc::channel(config.worker.mailbox_capacity);
    let refresh_interval = config.chart.refresh_interval_ms.map(Duration::from_millis);
    let actor = PostingActor::new(storage, chart, metrics.clone(), rx, refresh_interval);

    tokio::spawn(async move {
        actor.run().await;
    });

    PostingHandle::new(tx, metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Account, Currency, Slot, TransactionType};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    const COMPANY: CompanyId = 7;

    fn setup(config_fn: impl FnOnce(&mut Config)) -> (PostingHandle, Arc<Storage>, Arc<ChartCache>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        config.rocksdb.sync_writes = false;
        config_fn(&mut config);

        let storage = Arc::new(Storage::open(&config).unwrap());
        storage
            .put_currency(&Currency { id: 1, name: "Euro".into(), code: "EUR".into() })
            .unwrap();
        for (id, name) in [(100, "Cash"), (200, "Sales"), (300, "Bank")] {
            storage
                .put_account(&Account {
                    id,
                    company_id: COMPANY,
                    node_id: 0,
                    parent_id: None,
                    code: id.to_string(),
                    name: name.into(),
                })
                .unwrap();
        }

        let chart = Arc::new(ChartCache::new());
        let handle = spawn_posting_actor(
            storage.clone(),
            chart.clone(),
            Metrics::new().unwrap(),
            &config,
        );
        (handle, storage, chart, temp_dir)
    }

    fn candidate(transaction_type: TransactionType, amount: i64) -> Transaction {
        let mut tx = Transaction::new(COMPANY, transaction_type);
        tx.currency_id = 1;
        tx.rate = Decimal::ONE;
        tx.post_date = NaiveDate::from_ymd_opt(2024, 5, 2);
        tx.slots = vec![
            Slot::debit(100, Decimal::from(amount)),
            Slot::credit(200, Decimal::from(amount)),
        ];
        tx
    }

    #[tokio::test]
    async fn test_create_journal_allocates_and_hashes() {
        let (handle, storage, _chart, _temp) = setup(|_| {});

        let outcome = handle
            .submit(candidate(TransactionType::JournalEntry, 100), Operation::CreateJournal)
            .await
            .unwrap();

        let tx = outcome.transaction;
        assert_eq!((tx.id, tx.year_counter, tx.year_cumulative), (1, 1, 1));
        assert_eq!(tx.amount, Decimal::from(100));
        assert_eq!(tx.status, None);
        assert_eq!(tx.hash, transaction_hash(&tx));
        assert!(outcome.previous.is_none());
        assert_eq!(storage.find_by_id(COMPANY, 1).unwrap(), tx);
    }

    #[tokio::test]
    async fn test_voucher_type_on_journal_route_rejected() {
        let (handle, storage, _chart, _temp) = setup(|_| {});

        let err = handle
            .submit(candidate(TransactionType::PaymentVoucher, 10), Operation::CreateJournal)
            .await
            .unwrap_err();

        match err {
            Error::Validation(errors) => assert!(errors.has_code(codes::ROUTE)),
            other => panic!("expected validation error, got {:?}", other),
        }
        assert!(storage.last(COMPANY, None).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_voucher_created_approved_rejected() {
        let (handle, _storage, _chart, _temp) = setup(|_| {});
        let mut tx = candidate(TransactionType::JournalVoucher, 10);
        tx.status = Some(TransactionStatus::Approved);

        let err = handle.submit(tx, Operation::CreateVoucher).await.unwrap_err();
        assert!(matches!(err, Error::Validation(ref e) if e.has_field("status")));
    }

    #[tokio::test]
    async fn test_update_keeps_identity_and_rejects_year_change() {
        let (handle, _storage, _chart, _temp) = setup(|_| {});
        let created = handle
            .submit(candidate(TransactionType::JournalEntry, 100), Operation::CreateJournal)
            .await
            .unwrap()
            .transaction;

        let mut change = candidate(TransactionType::JournalEntry, 60);
        change.id = created.id;
        change.slots[0].account_id = 300;
        change.nonce = 99;
        change.year_counter = 42;
        let outcome = handle.submit(change, Operation::UpdateJournal).await.unwrap();

        assert_eq!(outcome.transaction.year_counter, created.year_counter);
        assert_eq!(outcome.transaction.hash, created.hash);
        assert_eq!(outcome.transaction.nonce, created.nonce);
        assert_eq!(outcome.transaction.amount, Decimal::from(60));
        assert_eq!(outcome.previous.as_ref(), Some(&created));

        let mut moved = candidate(TransactionType::JournalEntry, 60);
        moved.id = created.id;
        moved.post_date = NaiveDate::from_ymd_opt(2025, 1, 3);
        let err = handle.submit(moved, Operation::UpdateJournal).await.unwrap_err();
        assert!(matches!(err, Error::Validation(ref e) if e.has_code(codes::YEAR_CHANGE)));
    }

    #[tokio::test]
    async fn test_update_missing_transaction_is_tagged_not_found() {
        let (handle, _storage, _chart, _temp) = setup(|_| {});
        let mut tx = candidate(TransactionType::JournalEntry, 5);
        tx.id = 77;

        let err = handle.submit(tx, Operation::UpdateJournal).await.unwrap_err();
        assert!(matches!(err, Error::Operation { operation: Operation::UpdateJournal, .. }));
        assert!(matches!(err.root(), Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_approved_voucher_is_frozen() {
        let (handle, _storage, _chart, _temp) = setup(|_| {});
        let voucher = handle
            .submit(candidate(TransactionType::ReceiptVoucher, 20), Operation::CreateVoucher)
            .await
            .unwrap()
            .transaction;

        handle.submit(voucher.clone(), Operation::ApproveVoucher).await.unwrap();

        let err = handle
            .submit(voucher.clone(), Operation::UpdateVoucher)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_posting_marks_chart_stale() {
        let (handle, _storage, chart, _temp) = setup(|_| {});
        let before = handle.refresh_chart(COMPANY).await.unwrap();
        assert_eq!(before.total_balance(), Decimal::ZERO);

        handle
            .submit(candidate(TransactionType::Manual, 15), Operation::CreateJournal)
            .await
            .unwrap();

        let served = chart.get(COMPANY).unwrap();
        assert!(Arc::ptr_eq(&served, &before));
        assert!(served.stale_accounts().contains(&100));

        let after = handle.refresh_chart(COMPANY).await.unwrap();
        assert_eq!(after.node(100).unwrap().total_balance, Decimal::from(15));
    }

    #[tokio::test]
    async fn test_refresh_timer_rebuilds_stale_charts() {
        let (handle, _storage, chart, _temp) = setup(|c| c.chart.refresh_interval_ms = Some(20));
        handle.refresh_chart(COMPANY).await.unwrap();
        handle
            .submit(candidate(TransactionType::Manual, 15), Operation::CreateJournal)
            .await
            .unwrap();

        let mut rebuilt = false;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            if chart.stale_companies().is_empty() {
                rebuilt = true;
                break;
            }
        }
        assert!(rebuilt);
        assert_eq!(
            chart.get(COMPANY).unwrap().node(200).unwrap().total_balance,
            Decimal::from(-15)
        );
    }

    #[tokio::test]
    async fn test_deadline_expires_and_late_reply_is_drained() {
        let metrics = Metrics::new().unwrap();
        let (tx, mut rx) = mpsc::channel(4);
        let handle = PostingHandle::new(tx, metrics.clone());

        let err = handle
            .submit_with_deadline(
                candidate(TransactionType::JournalEntry, 1),
                Operation::CreateJournal,
                Duration::from_millis(30),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(30)));
        assert_eq!(metrics.mailbox_timeouts_total.get(), 1);

        // The request is still queued; a late reply must land in the drain task
        match rx.recv().await {
            Some(PostingMessage::Submit(request)) => {
                let late = PostingOutcome {
                    transaction: request.candidate.clone(),
                    previous: None,
                };
                assert!(request.reply.send(Ok(late)).is_ok());
            }
            other => panic!("expected queued submit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_overflowing_candidate_leaves_worker_running() {
        let (handle, storage, _chart, _temp) = setup(|_| {});
        let mut huge = candidate(TransactionType::JournalEntry, 1);
        huge.slots = vec![
            Slot::debit(100, Decimal::MAX),
            Slot::debit(300, Decimal::MAX),
            Slot::credit(200, Decimal::MAX),
        ];

        let err = handle.submit(huge, Operation::CreateJournal).await.unwrap_err();
        assert!(matches!(err, Error::Validation(ref e) if e.has_code(codes::OVERFLOW)));

        let outcome = handle
            .submit(candidate(TransactionType::JournalEntry, 5), Operation::CreateJournal)
            .await
            .unwrap();
        assert_eq!(outcome.transaction.year_counter, 1);
        assert_eq!(storage.last_id(COMPANY).unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_balance_overflow_is_storage_error() {
        let (handle, storage, _chart, _temp) = setup(|_| {});
        let mut first = candidate(TransactionType::Manual, 1);
        first.slots = vec![Slot::debit(100, Decimal::MAX), Slot::credit(200, Decimal::MAX)];
        handle.submit(first.clone(), Operation::CreateJournal).await.unwrap();

        // Valid on its own, but pushes account 100 past the representable range
        first.nonce = 1;
        let err = handle.submit(first, Operation::CreateJournal).await.unwrap_err();
        assert!(matches!(err, Error::Operation { operation: Operation::CreateJournal, .. }));
        assert!(matches!(err.root(), Error::Storage(_)));
        assert_eq!(storage.account_balance(COMPANY, 100).unwrap(), Decimal::MAX);

        let mut reverse = candidate(TransactionType::JournalEntry, 5);
        reverse.slots = vec![Slot::debit(200, Decimal::from(5)), Slot::credit(100, Decimal::from(5))];
        let outcome = handle.submit(reverse, Operation::CreateJournal).await.unwrap();
        assert_eq!(outcome.transaction.id, 2);
    }

    #[tokio::test]
    async fn test_closed_mailbox_is_concurrency_error() {
        let (handle, _storage, _chart, _temp) = setup(|_| {});
        handle.shutdown().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let err = handle
            .submit(candidate(TransactionType::JournalEntry, 1), Operation::CreateJournal)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Concurrency(_)));
    }
}
