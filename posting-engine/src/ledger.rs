//! Main ledger orchestration layer
//!
//! This module ties together storage, the posting worker, the chart cache and
//! the collaborators into a high-level API.
//!
//! # Example
//!
//! ```no_run
//! use posting_engine::{Config, Ledger, Operation, Slot, Transaction, TransactionType};
//! use rust_decimal::Decimal;
//!
//! #[tokio::main]
//! async fn main() -> posting_engine::Result<()> {
//!     let ledger = Ledger::open(Config::default()).await?;
//!
//!     let mut entry = Transaction::new(1, TransactionType::JournalEntry);
//!     entry.currency_id = 1;
//!     entry.rate = Decimal::ONE;
//!     entry.post_date = chrono::NaiveDate::from_ymd_opt(2024, 1, 10);
//!     entry.slots = vec![Slot::debit(10, Decimal::ONE), Slot::credit(20, Decimal::ONE)];
//!
//!     let outcome = ledger.submit(entry, Operation::CreateJournal).await?;
//!     println!("posted #{}", outcome.transaction.year_counter);
//!     Ok(())
//! }
//! ```

use crate::{
    actor::{spawn_posting_actor, PostingHandle, PostingOutcome},
    audit::AuditRecord,
    chart::{AccountTree, ChartCache},
    collaborators::{AccountLookup, CurrencyLookup, InMemorySettings, SettingsStore},
    metrics::Metrics,
    types::{
        AccountId, CompanyId, Operation, Slot, Transaction, TransactionId, TransactionStatus,
        TransactionType,
    },
    Config, Error, Result, Storage,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tokio::time::Duration;
use uuid::Uuid;

/// Main ledger interface
pub struct Ledger {
    /// Actor handle for postings
    handle: PostingHandle,

    /// Direct storage access (for reads)
    storage: Arc<Storage>,

    /// Chart-of-accounts cache shared with the worker
    chart: Arc<ChartCache>,

    /// Read-only settings
    settings: Arc<InMemorySettings>,

    /// Metrics
    metrics: Metrics,

    /// Configuration
    config: Config,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("storage", &self.storage)
            .field("handle", &self.handle)
            .finish()
    }
}

impl Ledger {
    /// Open ledger with configuration
    pub async fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let storage = Arc::new(Storage::open(&config)?);
        let chart = Arc::new(ChartCache::new());
        let metrics = Metrics::new().map_err(|e| Error::Other(format!("metrics: {}", e)))?;
        let settings = Arc::new(InMemorySettings::new(config.settings.clone()));

        let handle = spawn_posting_actor(storage.clone(), chart.clone(), metrics.clone(), &config);

        tracing::info!(
            service = %config.service_name,
            version = %config.service_version,
            data_dir = ?config.data_dir,
            "Ledger opened"
        );

        Ok(Self {
            handle,
            storage,
            chart,
            settings,
            metrics,
            config,
        })
    }

    /// Submit a posting under the configured reply deadline
    pub async fn submit(&self, candidate: Transaction, operation: Operation) -> Result<PostingOutcome> {
        self.handle
            .request(Uuid::now_v7(), candidate, operation, self.reply_deadline())
            .await
    }

    /// Submit a posting and build its audit record
    pub async fn submit_audited(
        &self,
        candidate: Transaction,
        operation: Operation,
    ) -> Result<(PostingOutcome, AuditRecord)> {
        let request_id = Uuid::now_v7();
        let outcome = self
            .handle
            .request(request_id, candidate, operation, self.reply_deadline())
            .await?;
        let record = AuditRecord::from_outcome(request_id, operation, &outcome)?;
        Ok((outcome, record))
    }

    fn reply_deadline(&self) -> Option<Duration> {
        self.config.worker.reply_deadline_ms.map(Duration::from_millis)
    }

    /// Cached chart of accounts, built on first use
    pub async fn chart(&self, company_id: CompanyId) -> Result<Arc<AccountTree>> {
        match self.chart.get(company_id) {
            Some(tree) => Ok(tree),
            None => self.handle.refresh_chart(company_id).await,
        }
    }

    /// Rebuild a company's chart of accounts now
    pub async fn refresh_chart(&self, company_id: CompanyId) -> Result<Arc<AccountTree>> {
        self.handle.refresh_chart(company_id).await
    }

    /// Add the balancing cash slot to a payment or receipt.
    ///
    /// Payments credit the default cash account with Σ debit − Σ credit,
    /// receipts debit it with Σ credit − Σ debit. Other types, and
    /// candidates that are already balanced, come back unchanged.
    pub fn with_cash_leg(&self, mut tx: Transaction) -> Result<Transaction> {
        let Some(gap) = tx
            .total_debit()
            .zip(tx.total_credit())
            .and_then(|(debit, credit)| debit.checked_sub(credit))
        else {
            // Out-of-range totals are rejected by validation on submit
            return Ok(tx);
        };
        let leg: fn(AccountId, Decimal) -> Slot = match tx.transaction_type {
            TransactionType::PaymentEntry | TransactionType::PaymentVoucher if gap > Decimal::ZERO => {
                Slot::credit
            }
            TransactionType::ReceiptEntry | TransactionType::ReceiptVoucher if gap < Decimal::ZERO => {
                Slot::debit
            }
            _ => return Ok(tx),
        };

        let cash_account = self.settings.default_cash_account()?.ok_or_else(|| {
            Error::Config(format!(
                "{} is not set",
                crate::config::DEFAULT_CASH_ACCOUNT_KEY
            ))
        })?;
        self.storage
            .find_account(tx.company_id, tx.node_id, cash_account)?;

        tx.slots.push(leg(cash_account, gap.abs()));
        Ok(tx)
    }

    /// Render a stored transaction with account and currency names
    pub fn describe(&self, company_id: CompanyId, id: TransactionId) -> Result<TransactionView> {
        let tx = self.storage.find_by_id(company_id, id)?;
        let currency = self.storage.find_currency(tx.currency_id)?;

        let lines = tx
            .slots
            .iter()
            .map(|slot| -> Result<LineView> {
                let account = self
                    .storage
                    .find_account(company_id, tx.node_id, slot.account_id)?;
                Ok(LineView {
                    account_id: account.id,
                    account_code: account.code,
                    account_name: account.name,
                    debit: slot.debit,
                    credit: slot.credit,
                    balance: slot.balance,
                    description: slot.description.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(TransactionView {
            id: tx.id,
            company_id,
            transaction_type: tx.transaction_type,
            status: tx.status,
            year_counter: tx.year_counter,
            year_cumulative: tx.year_cumulative,
            post_date: tx.post_date,
            currency_code: currency.code,
            amount: tx.amount,
            description: tx.description.clone(),
            hash: tx.hash_hex(),
            lines,
        })
    }

    /// Direct storage access
    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    /// Settings collaborator
    pub fn settings(&self) -> &InMemorySettings {
        &self.settings
    }

    /// Get metrics
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Posting gateway, for callers that want their own deadlines
    pub fn handle(&self) -> PostingHandle {
        self.handle.clone()
    }

    /// Get configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Stop the posting worker after already-queued messages
    pub async fn shutdown(&self) -> Result<()> {
        self.handle.shutdown().await
    }
}

/// Human-readable rendering of a transaction
#[derive(Debug, Clone, Serialize)]
pub struct TransactionView {
    /// Row id
    pub id: TransactionId,
    /// Tenant
    pub company_id: CompanyId,
    /// Transaction kind
    pub transaction_type: TransactionType,
    /// Approval status (voucher-class only)
    pub status: Option<TransactionStatus>,
    /// Sequence per (company, type, year)
    pub year_counter: u64,
    /// Sequence per (company, year)
    pub year_cumulative: u64,
    /// Posting date
    pub post_date: Option<NaiveDate>,
    /// ISO 4217 code of the transaction currency
    pub currency_code: String,
    /// Total debited amount
    pub amount: Decimal,
    /// Free-text description
    pub description: String,
    /// Hex-encoded content hash
    pub hash: String,
    /// Rendered slots, in line order
    pub lines: Vec<LineView>,
}

/// One rendered slot
#[derive(Debug, Clone, Serialize)]
pub struct LineView {
    /// Account posted to
    pub account_id: AccountId,
    /// Account code
    pub account_code: String,
    /// Account display name
    pub account_name: String,
    /// Debit amount
    pub debit: Decimal,
    /// Credit amount
    pub credit: Decimal,
    /// Running balance after this line
    pub balance: Decimal,
    /// Line description
    pub description: String,
}
