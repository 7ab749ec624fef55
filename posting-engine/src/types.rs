//! Core types for the posting engine
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Exact arithmetic (Decimal for money)
//! - Closed enums for every routing decision

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tenant identifier
pub type CompanyId = u32;

/// Sub-scope inside a tenant (branch, store)
pub type NodeId = u32;

/// Account identifier (unique per company)
pub type AccountId = u32;

/// Currency identifier (0 means unset)
pub type CurrencyId = u32;

/// Transaction row identifier (unique per company)
pub type TransactionId = u64;

/// Actor reference for `created_by`
pub type UserId = u32;

/// Content fingerprint of a transaction
pub type TransactionHash = [u8; 32];

/// Kind of ledger transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum TransactionType {
    /// Manual transfer between accounts (no approval workflow)
    Manual = 1,
    /// Journal entry
    JournalEntry = 2,
    /// Journal voucher
    JournalVoucher = 3,
    /// Payment entry
    PaymentEntry = 4,
    /// Payment voucher
    PaymentVoucher = 5,
    /// Receipt entry
    ReceiptEntry = 6,
    /// Receipt voucher
    ReceiptVoucher = 7,
    /// Opening balance entry
    OpeningEntry = 8,
    /// Opening balance voucher
    OpeningVoucher = 9,
}

impl TransactionType {
    /// Every stored transaction type
    pub const ALL: [TransactionType; 9] = [
        TransactionType::Manual,
        TransactionType::JournalEntry,
        TransactionType::JournalVoucher,
        TransactionType::PaymentEntry,
        TransactionType::PaymentVoucher,
        TransactionType::ReceiptEntry,
        TransactionType::ReceiptVoucher,
        TransactionType::OpeningEntry,
        TransactionType::OpeningVoucher,
    ];

    /// Stable byte tag used in storage keys
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Voucher-class types go through the approval workflow
    pub fn is_voucher(self) -> bool {
        matches!(
            self,
            TransactionType::JournalVoucher
                | TransactionType::PaymentVoucher
                | TransactionType::ReceiptVoucher
                | TransactionType::OpeningVoucher
        )
    }

    /// Paired entry/voucher form
    pub fn counterpart(self) -> Option<TransactionType> {
        use TransactionType::*;
        match self {
            Manual => None,
            JournalEntry => Some(JournalVoucher),
            JournalVoucher => Some(JournalEntry),
            PaymentEntry => Some(PaymentVoucher),
            PaymentVoucher => Some(PaymentEntry),
            ReceiptEntry => Some(ReceiptVoucher),
            ReceiptVoucher => Some(ReceiptEntry),
            OpeningEntry => Some(OpeningVoucher),
            OpeningVoucher => Some(OpeningEntry),
        }
    }

    /// Wire name
    pub fn name(self) -> &'static str {
        use TransactionType::*;
        match self {
            Manual => "manual",
            JournalEntry => "journal-entry",
            JournalVoucher => "journal-voucher",
            PaymentEntry => "payment-entry",
            PaymentVoucher => "payment-voucher",
            ReceiptEntry => "receipt-entry",
            ReceiptVoucher => "receipt-voucher",
            OpeningEntry => "opening-entry",
            OpeningVoucher => "opening-voucher",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Approval status of voucher-class transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum TransactionStatus {
    /// Recorded, awaiting approval
    Unapproved = 1,
    /// Approved (terminal)
    Approved = 2,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::Unapproved => f.write_str("unapproved"),
            TransactionStatus::Approved => f.write_str("approved"),
        }
    }
}

/// Operation a caller asks the posting worker to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    /// Create a manual transfer or an entry-class transaction
    CreateJournal,
    /// Replace the lines of an entry-class transaction
    UpdateJournal,
    /// Create an unapproved voucher
    CreateVoucher,
    /// Move a voucher from unapproved to approved
    ApproveVoucher,
    /// Replace the lines of an unapproved voucher
    UpdateVoucher,
}

impl Operation {
    /// Operations that replace an existing transaction's lines
    pub fn is_update(self) -> bool {
        matches!(self, Operation::UpdateJournal | Operation::UpdateVoucher)
    }

    /// Whether the route handles voucher-class transactions
    pub fn targets_voucher(self) -> bool {
        matches!(
            self,
            Operation::CreateVoucher | Operation::ApproveVoucher | Operation::UpdateVoucher
        )
    }

    /// Wire name
    pub fn name(self) -> &'static str {
        match self {
            Operation::CreateJournal => "create-journal",
            Operation::UpdateJournal => "update-journal",
            Operation::CreateVoucher => "create-voucher",
            Operation::ApproveVoucher => "approve-voucher",
            Operation::UpdateVoucher => "update-voucher",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One debit or credit line of a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    /// Owning transaction (assigned by the store)
    pub transaction_id: TransactionId,

    /// Account posted to
    pub account_id: AccountId,

    /// Line currency (defaults to the transaction currency)
    pub currency_id: CurrencyId,

    /// Debit amount
    pub debit: Decimal,

    /// Credit amount
    pub credit: Decimal,

    /// Running balance of the account after this line (assigned by the store)
    pub balance: Decimal,

    /// Line description
    #[serde(default)]
    pub description: String,

    /// Posting date (copied from the transaction)
    pub post_date: Option<NaiveDate>,
}

impl Slot {
    /// Debit line
    pub fn debit(account_id: AccountId, amount: Decimal) -> Self {
        Self::line(account_id, amount, Decimal::ZERO)
    }

    /// Credit line
    pub fn credit(account_id: AccountId, amount: Decimal) -> Self {
        Self::line(account_id, Decimal::ZERO, amount)
    }

    fn line(account_id: AccountId, debit: Decimal, credit: Decimal) -> Self {
        Self {
            transaction_id: 0,
            account_id,
            currency_id: 0,
            debit,
            credit,
            balance: Decimal::ZERO,
            description: String::new(),
            post_date: None,
        }
    }

    /// Attach a line description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Signed effect on the account balance (debit positive), `None` on overflow
    pub fn net(&self) -> Option<Decimal> {
        self.debit.checked_sub(self.credit)
    }
}

/// Ledger transaction with its balance lines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Row id, unique per company (assigned on create)
    pub id: TransactionId,

    /// Tenant
    pub company_id: CompanyId,

    /// Sub-scope inside the tenant
    pub node_id: NodeId,

    /// Transaction currency
    pub currency_id: CurrencyId,

    /// Exchange rate at post time
    pub rate: Decimal,

    /// Creating actor
    pub created_by: UserId,

    /// Content fingerprint (assigned on create)
    pub hash: TransactionHash,

    /// Transaction kind
    pub transaction_type: TransactionType,

    /// Approval status (voucher-class only)
    pub status: Option<TransactionStatus>,

    /// Sequence per (company, type, year)
    pub year_counter: u64,

    /// Sequence per (company, year) across all types
    pub year_cumulative: u64,

    /// Linked external document number
    pub invoice: Option<String>,

    /// Free-text description
    #[serde(default)]
    pub description: String,

    /// Total debited amount
    pub amount: Decimal,

    /// Posting date
    pub post_date: Option<NaiveDate>,

    /// Caller-chosen discriminator folded into the hash
    #[serde(default)]
    pub nonce: u64,

    /// Balance lines (stored in their own relation)
    #[serde(default)]
    pub slots: Vec<Slot>,
}

impl Transaction {
    /// Empty candidate for a company and type
    pub fn new(company_id: CompanyId, transaction_type: TransactionType) -> Self {
        Self {
            id: 0,
            company_id,
            node_id: 0,
            currency_id: 0,
            rate: Decimal::ZERO,
            created_by: 0,
            hash: [0u8; 32],
            transaction_type,
            status: None,
            year_counter: 0,
            year_cumulative: 0,
            invoice: None,
            description: String::new(),
            amount: Decimal::ZERO,
            post_date: None,
            nonce: 0,
            slots: Vec::new(),
        }
    }

    /// Calendar year of the posting date
    pub fn year(&self) -> Option<i32> {
        self.post_date.map(|d| d.year())
    }

    /// Σ debit over all slots, `None` when the sum overflows
    pub fn total_debit(&self) -> Option<Decimal> {
        checked_sum(self.slots.iter().map(|s| s.debit))
    }

    /// Σ credit over all slots, `None` when the sum overflows
    pub fn total_credit(&self) -> Option<Decimal> {
        checked_sum(self.slots.iter().map(|s| s.credit))
    }

    /// Whether Σ debit == Σ credit (an overflowing side never balances)
    pub fn is_balanced(&self) -> bool {
        match (self.total_debit(), self.total_credit()) {
            (Some(debit), Some(credit)) => debit == credit,
            _ => false,
        }
    }

    /// Hex rendering of the hash
    pub fn hash_hex(&self) -> String {
        self.hash.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Copy of the header without its slots
    pub fn header(&self) -> Transaction {
        Transaction {
            slots: Vec::new(),
            invoice: self.invoice.clone(),
            description: self.description.clone(),
            ..*self
        }
    }
}

/// Account master row (owned by master-data CRUD)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account id
    pub id: AccountId,
    /// Owning company
    pub company_id: CompanyId,
    /// Sub-scope (0 = shared across the company)
    pub node_id: NodeId,
    /// Parent in the chart of accounts
    pub parent_id: Option<AccountId>,
    /// Account code
    pub code: String,
    /// Display name
    pub name: String,
}

impl Account {
    /// Whether a transaction on `node_id` may post to this account
    pub fn visible_from(&self, node_id: NodeId) -> bool {
        self.node_id == 0 || self.node_id == node_id
    }
}

/// Currency master row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    /// Currency id
    pub id: CurrencyId,
    /// Display name
    pub name: String,
    /// ISO 4217 code
    pub code: String,
}

fn checked_sum(mut values: impl Iterator<Item = Decimal>) -> Option<Decimal> {
    values.try_fold(Decimal::ZERO, |acc, v| acc.checked_add(v))
}
