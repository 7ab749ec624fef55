//! Ledger Posting Engine
//!
//! Double-entry posting core: every journal entry or voucher goes through one
//! worker that validates it, numbers it and persists it atomically.
//!
//! # Architecture
//!
//! - **Single Writer**: One worker task linearizes all postings
//! - **Atomic Writes**: Header, slots, indices and balances share one RocksDB batch
//! - **Dense Numbering**: Year counters and year cumulatives without gaps
//! - **Cached Chart**: Per-company account trees served from memory
//!
//! # Invariants
//!
//! - Balance: Σ(debits) == Σ(credits) for every stored transaction
//! - Uniqueness: No two stored transactions share a hash
//! - Density: Counters run 1..N per (company, type, year)
//! - Monotonic status: Vouchers only move from unapproved to approved

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, clippy::all)]

pub mod actor;
pub mod allocator;
pub mod audit;
pub mod chart;
pub mod collaborators;
pub mod config;
pub mod crypto;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod storage;
pub mod types;
pub mod validator;

// Re-exports
pub use actor::{PostingHandle, PostingOutcome};
pub use config::Config;
pub use error::{Error, Result};
pub use ledger::Ledger;
pub use storage::Storage;
pub use types::{
    Account, AccountId, CompanyId, Currency, CurrencyId, NodeId, Operation, Slot, Transaction,
    TransactionId, TransactionStatus, TransactionType,
};
