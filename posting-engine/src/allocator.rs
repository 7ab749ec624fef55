//! Sequence allocation for new transactions
//!
//! Each function reads the highest committed value and returns the next one.
//! They are only called from the posting worker, which runs one request at a
//! time, so read-then-increment has no competitor. A request that fails
//! after allocation never commits, which leaves the sequence without a gap.

use crate::{
    storage::Storage,
    types::{CompanyId, TransactionId, TransactionType},
    Result,
};

/// Numbers assigned to a transaction at creation time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    /// Row id, unique per company
    pub id: TransactionId,
    /// Dense sequence per (company, type, year)
    pub year_counter: u64,
    /// Dense sequence per (company, year)
    pub year_cumulative: u64,
}

/// Next year counter for (company, type, year), starting at 1
pub fn next_year_counter(
    storage: &Storage,
    company_id: CompanyId,
    transaction_type: TransactionType,
    year: i32,
) -> Result<u64> {
    Ok(storage
        .last_year_counter(company_id, transaction_type, year)?
        .map_or(1, |last| last + 1))
}

/// Next year cumulative for (company, year) across all types, starting at 1
pub fn next_year_cumulative(storage: &Storage, company_id: CompanyId, year: i32) -> Result<u64> {
    Ok(storage
        .last_year_cumulative(company_id, year)?
        .map_or(1, |last| last + 1))
}

/// Next row id for a company, starting at 1; ids of deleted rows are never reused
pub fn next_transaction_id(storage: &Storage, company_id: CompanyId) -> Result<TransactionId> {
    Ok(storage.last_id(company_id)?.map_or(1, |last| last + 1))
}

/// Allocate every creation-time number in one call
pub fn allocate(
    storage: &Storage,
    company_id: CompanyId,
    transaction_type: TransactionType,
    year: i32,
) -> Result<Allocation> {
    Ok(Allocation {
        id: next_transaction_id(storage, company_id)?,
        year_counter: next_year_counter(storage, company_id, transaction_type, year)?,
        year_cumulative: next_year_cumulative(storage, company_id, year)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::transaction_hash;
    use crate::types::{Account, Currency, Slot, Transaction};
    use crate::Config;
    use chrono::{Datelike, NaiveDate};
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    fn test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        config.rocksdb.sync_writes = false;
        let storage = Storage::open(&config).unwrap();
        storage
            .put_currency(&Currency { id: 1, name: "Euro".into(), code: "EUR".into() })
            .unwrap();
        for id in [10, 20] {
            storage
                .put_account(&Account {
                    id,
                    company_id: 1,
                    node_id: 0,
                    parent_id: None,
                    code: id.to_string(),
                    name: format!("Account {}", id),
                })
                .unwrap();
        }
        (storage, temp_dir)
    }

    fn post(storage: &Storage, transaction_type: TransactionType, date: NaiveDate) -> Allocation {
        let alloc = allocate(storage, 1, transaction_type, date.year()).unwrap();
        let mut tx = Transaction::new(1, transaction_type);
        tx.id = alloc.id;
        tx.year_counter = alloc.year_counter;
        tx.year_cumulative = alloc.year_cumulative;
        tx.currency_id = 1;
        tx.rate = Decimal::ONE;
        tx.post_date = Some(date);
        tx.nonce = alloc.id;
        tx.slots = vec![Slot::debit(10, Decimal::ONE), Slot::credit(20, Decimal::ONE)];
        tx.hash = transaction_hash(&tx);
        storage.create(&tx).unwrap();
        alloc
    }

    #[test]
    fn test_first_allocation_starts_at_one() {
        let (storage, _temp) = test_storage();
        let alloc = allocate(&storage, 1, TransactionType::JournalEntry, 2024).unwrap();
        assert_eq!(
            alloc,
            Allocation { id: 1, year_counter: 1, year_cumulative: 1 }
        );
    }

    #[test]
    fn test_counters_per_type_cumulative_across_types() {
        let (storage, _temp) = test_storage();
        let jan = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();

        let a = post(&storage, TransactionType::JournalEntry, jan);
        let b = post(&storage, TransactionType::Manual, jan);
        let c = post(&storage, TransactionType::JournalEntry, jan);

        assert_eq!((a.year_counter, a.year_cumulative), (1, 1));
        assert_eq!((b.year_counter, b.year_cumulative), (1, 2));
        assert_eq!((c.year_counter, c.year_cumulative), (2, 3));
        assert_eq!(c.id, 3);
    }

    #[test]
    fn test_new_year_restarts_sequences() {
        let (storage, _temp) = test_storage();
        post(&storage, TransactionType::JournalEntry, NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
        post(&storage, TransactionType::JournalEntry, NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
        let next_year =
            post(&storage, TransactionType::JournalEntry, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());

        assert_eq!(next_year.year_counter, 1);
        assert_eq!(next_year.year_cumulative, 1);
        assert_eq!(next_year.id, 3);
    }

    #[test]
    fn test_deleted_newest_id_not_handed_out_again() {
        let (storage, _temp) = test_storage();
        let jan = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        post(&storage, TransactionType::JournalEntry, jan);
        let newest = post(&storage, TransactionType::JournalEntry, jan);

        storage.delete(1, newest.id).unwrap();

        let next = allocate(&storage, 1, TransactionType::JournalEntry, 2024).unwrap();
        assert_eq!(next.id, newest.id + 1);
        assert_eq!(next.year_counter, 2);
    }

    #[test]
    fn test_failed_create_leaves_no_gap() {
        let (storage, _temp) = test_storage();
        let jan = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        post(&storage, TransactionType::JournalEntry, jan);

        let alloc = allocate(&storage, 1, TransactionType::JournalEntry, 2024).unwrap();
        let mut bad = Transaction::new(1, TransactionType::JournalEntry);
        bad.id = alloc.id;
        bad.year_counter = alloc.year_counter;
        bad.year_cumulative = alloc.year_cumulative;
        bad.currency_id = 1;
        bad.post_date = Some(jan);
        bad.slots = vec![Slot::debit(99, Decimal::ONE), Slot::credit(20, Decimal::ONE)];
        assert!(storage.create(&bad).is_err());

        assert_eq!(allocate(&storage, 1, TransactionType::JournalEntry, 2024).unwrap(), alloc);
    }
}
