//! Structural and business-rule validation of candidate transactions
//!
//! Validation never fails fast: every violated rule adds one [`FieldError`]
//! so the caller can fix the whole payload in one round trip. Nothing here
//! touches storage.

use crate::types::{Operation, Transaction, TransactionStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Maximum length (in characters) of free-text fields
pub const MAX_DESCRIPTION_LEN: usize = 255;

/// One violated rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Field path, e.g. `slots[1].debit`
    pub field: String,
    /// Machine-readable rule code
    pub code: String,
    /// Human-readable message
    pub message: String,
}

/// Accumulated validation failures
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    /// Empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a violation
    pub fn add(&mut self, field: impl Into<String>, code: &str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.into(),
            code: code.to_string(),
            message: message.into(),
        });
    }

    /// All recorded violations
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Whether no violation was recorded
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Whether a violation with this code was recorded
    pub fn has_code(&self, code: &str) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }

    /// Whether a violation was recorded against this field
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// Append another accumulator
    pub fn merge(&mut self, other: ValidationErrors) {
        self.errors.extend(other.errors);
    }

    /// `Ok(())` when empty, otherwise the accumulated error
    pub fn into_result(self) -> crate::Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(crate::Error::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for e in &self.errors {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", e.field, e.message)?;
            first = false;
        }
        Ok(())
    }
}

/// Rule codes
pub mod codes {
    /// Required field missing or zero
    pub const REQUIRED: &str = "REQUIRED";
    /// Text longer than [`super::MAX_DESCRIPTION_LEN`]
    pub const TOO_LONG: &str = "TOO_LONG";
    /// Σ debit != Σ credit
    pub const UNBALANCED: &str = "UNBALANCED";
    /// Negative debit or credit
    pub const NEGATIVE: &str = "NEGATIVE";
    /// Line with both or neither of debit/credit
    pub const ONE_SIDED: &str = "ONE_SIDED";
    /// Same account twice on update
    pub const DUPLICATE_ACCOUNT: &str = "DUPLICATE_ACCOUNT";
    /// Status not allowed for the type
    pub const STATUS: &str = "STATUS";
    /// Type not allowed on the route
    pub const ROUTE: &str = "ROUTE";
    /// Post date moved to another calendar year
    pub const YEAR_CHANGE: &str = "YEAR_CHANGE";
    /// Amount total outside the representable range
    pub const OVERFLOW: &str = "OVERFLOW";
}

/// Field rules for a candidate on the given operation.
///
/// Duplicate accounts are only rejected on update operations.
pub fn validate(tx: &Transaction, operation: Operation) -> ValidationErrors {
    let mut errors = check_transaction(tx);
    if operation.is_update() {
        errors.merge(check_unique_accounts(tx));
    }
    errors
}

/// Run every field rule and return the accumulated violations
pub fn check_transaction(tx: &Transaction) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    if tx.post_date.is_none() {
        errors.add("post_date", codes::REQUIRED, "post date is required");
    }
    if tx.slots.is_empty() {
        errors.add("slots", codes::REQUIRED, "at least one slot is required");
    }
    if tx.currency_id == 0 {
        errors.add("currency_id", codes::REQUIRED, "currency is required");
    }
    if tx.rate.is_zero() {
        errors.add("rate", codes::REQUIRED, "exchange rate must be non-zero");
    }

    check_status(tx, &mut errors);
    check_length("description", &tx.description, &mut errors);
    if let Some(invoice) = &tx.invoice {
        check_length("invoice", invoice, &mut errors);
    }

    for (i, slot) in tx.slots.iter().enumerate() {
        if slot.account_id == 0 {
            errors.add(
                format!("slots[{}].account_id", i),
                codes::REQUIRED,
                "account is required",
            );
        }
        if slot.debit < Decimal::ZERO {
            errors.add(
                format!("slots[{}].debit", i),
                codes::NEGATIVE,
                "debit must not be negative",
            );
        }
        if slot.credit < Decimal::ZERO {
            errors.add(
                format!("slots[{}].credit", i),
                codes::NEGATIVE,
                "credit must not be negative",
            );
        }
        if slot.debit.is_zero() == slot.credit.is_zero() {
            errors.add(
                format!("slots[{}]", i),
                codes::ONE_SIDED,
                "exactly one of debit or credit must be set",
            );
        }
        check_length(&format!("slots[{}].description", i), &slot.description, &mut errors);
    }

    match (tx.total_debit(), tx.total_credit()) {
        (Some(debit), Some(credit)) if debit != credit => errors.add(
            "slots",
            codes::UNBALANCED,
            format!("slots are unbalanced: debit {} != credit {}", debit, credit),
        ),
        (Some(_), Some(_)) => {}
        (debit, credit) => {
            let side = if debit.is_none() { "debit" } else { "credit" };
            errors.add(
                "slots",
                codes::OVERFLOW,
                format!("{} total exceeds {}", side, Decimal::MAX),
            );
        }
    }

    errors
}

/// Reject two slots referencing the same account
pub fn check_unique_accounts(tx: &Transaction) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    let mut seen = HashSet::new();
    for (i, slot) in tx.slots.iter().enumerate() {
        if !seen.insert(slot.account_id) {
            errors.add(
                format!("slots[{}].account_id", i),
                codes::DUPLICATE_ACCOUNT,
                format!("account {} appears more than once", slot.account_id),
            );
        }
    }
    errors
}

/// Check that the type belongs on the operation's route
pub fn check_route(tx: &Transaction, operation: Operation) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    let ty = tx.transaction_type;
    if ty.is_voucher() != operation.targets_voucher() {
        let hint = match ty.counterpart() {
            Some(pair) => format!(" (its paired form is {})", pair),
            None => String::new(),
        };
        errors.add(
            "transaction_type",
            codes::ROUTE,
            format!("{} cannot be submitted with {}{}", ty, operation, hint),
        );
    }
    errors
}

fn check_status(tx: &Transaction, errors: &mut ValidationErrors) {
    match (tx.transaction_type.is_voucher(), tx.status) {
        (true, None) => errors.add("status", codes::REQUIRED, "voucher status is required"),
        (false, Some(status)) => errors.add(
            "status",
            codes::STATUS,
            format!("{} does not carry a status (got {})", tx.transaction_type, status),
        ),
        (true, Some(TransactionStatus::Unapproved | TransactionStatus::Approved)) | (false, None) => {}
    }
}

fn check_length(field: &str, value: &str, errors: &mut ValidationErrors) {
    let len = value.chars().count();
    if len > MAX_DESCRIPTION_LEN {
        errors.add(
            field,
            codes::TOO_LONG,
            format!("{} characters exceeds the limit of {}", len, MAX_DESCRIPTION_LEN),
        );
    }
}
