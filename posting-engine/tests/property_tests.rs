//! Property-based tests for posting invariants
//!
//! These tests use proptest to verify:
//! - Balance: only Σ(debits) == Σ(credits) is ever stored
//! - Density: counters form 1..N whatever the submission mix
//! - Idempotent rejection: identical payloads post once

use chrono::NaiveDate;
use posting_engine::{
    Account, CompanyId, Config, Currency, Error, Ledger, Operation, Slot, Transaction,
    TransactionType,
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use tempfile::TempDir;

const COMPANY: CompanyId = 5;

/// Strategy for generating valid amounts (positive decimals)
fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (1u64..1_000_000_00u64).prop_map(|cents| Decimal::new(cents as i64, 2))
}

/// Strategy for generating journal-route types
fn journal_type_strategy() -> impl Strategy<Value = TransactionType> {
    prop_oneof![
        Just(TransactionType::Manual),
        Just(TransactionType::JournalEntry),
        Just(TransactionType::PaymentEntry),
        Just(TransactionType::ReceiptEntry),
        Just(TransactionType::OpeningEntry),
    ]
}

/// Create test ledger with temp directory (the directory must outlive the ledger)
async fn create_test_ledger() -> (Ledger, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.data_dir = temp_dir.path().to_path_buf();
    config.rocksdb.sync_writes = false;

    let ledger = Ledger::open(config).await.unwrap();
    ledger
        .storage()
        .put_currency(&Currency { id: 1, name: "Euro".into(), code: "EUR".into() })
        .unwrap();
    for id in [1, 2, 3] {
        ledger
            .storage()
            .put_account(&Account {
                id,
                company_id: COMPANY,
                node_id: 0,
                parent_id: None,
                code: id.to_string(),
                name: format!("Account {}", id),
            })
            .unwrap();
    }
    (ledger, temp_dir)
}

fn candidate(transaction_type: TransactionType, debits: &[Decimal], credits: &[Decimal]) -> Transaction {
    let mut tx = Transaction::new(COMPANY, transaction_type);
    tx.currency_id = 1;
    tx.rate = Decimal::ONE;
    tx.post_date = NaiveDate::from_ymd_opt(2024, 6, 30);
    tx.slots = debits
        .iter()
        .map(|d| Slot::debit(1, *d))
        .chain(credits.iter().map(|c| Slot::credit(2, *c)))
        .collect();
    tx
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Property: a posting is stored iff it balances, and stored postings balance
    #[test]
    fn prop_only_balanced_postings_stored(
        debits in prop::collection::vec(amount_strategy(), 1..6),
        credits in prop::collection::vec(amount_strategy(), 1..6),
        force_balance in any::<bool>(),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (ledger, _temp) = create_test_ledger().await;

            let credits = if force_balance {
                vec![debits.iter().copied().sum::<Decimal>()]
            } else {
                credits
            };
            let balanced =
                debits.iter().copied().sum::<Decimal>() == credits.iter().copied().sum::<Decimal>();

            let result = ledger
                .submit(candidate(TransactionType::JournalEntry, &debits, &credits), Operation::CreateJournal)
                .await;

            prop_assert_eq!(result.is_ok(), balanced);
            match result {
                Ok(outcome) => {
                    let stored = ledger.storage().find_by_id(COMPANY, outcome.transaction.id).unwrap();
                    prop_assert!(stored.is_balanced());
                    prop_assert_eq!(Some(stored.amount), stored.total_debit());
                    let net: Decimal = ledger
                        .storage()
                        .slots_for_company(COMPANY)
                        .unwrap()
                        .iter()
                        .map(|s| s.net().unwrap())
                        .sum();
                    prop_assert_eq!(net, Decimal::ZERO);
                }
                Err(err) => {
                    prop_assert!(matches!(err, Error::Validation(_)));
                    prop_assert!(ledger.storage().last(COMPANY, None).unwrap().is_none());
                }
            }

            ledger.shutdown().await.unwrap();
            Ok(())
        })?;
    }

    /// Property: counters are dense per type and cumulatives dense per year
    #[test]
    fn prop_sequences_are_dense(
        types in prop::collection::vec(journal_type_strategy(), 1..16),
        reject_every in 2usize..5,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (ledger, _temp) = create_test_ledger().await;
            let amount = [Decimal::ONE];

            for (i, transaction_type) in types.iter().enumerate() {
                // Interleave rejected requests; they must not consume numbers
                if i % reject_every == 0 {
                    let bad = candidate(*transaction_type, &amount, &[Decimal::TWO]);
                    prop_assert!(ledger.submit(bad, Operation::CreateJournal).await.is_err());
                }
                let mut tx = candidate(*transaction_type, &amount, &amount);
                tx.nonce = i as u64;
                ledger.submit(tx, Operation::CreateJournal).await.unwrap();
            }

            let mut cumulatives = Vec::new();
            for transaction_type in TransactionType::ALL {
                let expected = types.iter().filter(|t| **t == transaction_type).count() as u64;
                for counter in 1..=expected {
                    let tx = ledger
                        .storage()
                        .find_by_year_counter(COMPANY, transaction_type, 2024, counter)
                        .unwrap();
                    cumulatives.push(tx.year_cumulative);
                }
                let last = ledger
                    .storage()
                    .last_year_counter(COMPANY, transaction_type, 2024)
                    .unwrap();
                prop_assert_eq!(last, (expected > 0).then_some(expected));
            }
            cumulatives.sort_unstable();
            prop_assert_eq!(cumulatives, (1..=types.len() as u64).collect::<Vec<_>>());

            ledger.shutdown().await.unwrap();
            Ok(())
        })?;
    }

    /// Property: resubmitting an identical payload never posts twice
    #[test]
    fn prop_identical_payload_posts_once(amount in amount_strategy(), repeats in 2usize..5) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (ledger, _temp) = create_test_ledger().await;
            let tx = candidate(TransactionType::Manual, &[amount], &[amount]);

            ledger.submit(tx.clone(), Operation::CreateJournal).await.unwrap();
            for _ in 1..repeats {
                let err = ledger.submit(tx.clone(), Operation::CreateJournal).await.unwrap_err();
                prop_assert!(matches!(err.root(), Error::Duplicate(_)));
            }
            prop_assert_eq!(ledger.storage().last_id(COMPANY).unwrap(), Some(1));

            ledger.shutdown().await.unwrap();
            Ok(())
        })?;
    }
}
