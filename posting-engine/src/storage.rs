//! Ledger store on RocksDB
//!
//! # Column Families
//!
//! - `transactions` - Transaction headers (key: company || id)
//! - `slots` - Balance lines (key: company || transaction id || line)
//! - `indices` - Hash, year-counter and year-cumulative indices
//! - `balances` - Running balance per account (key: company || account)
//! - `accounts` - Account master rows (key: company || account)
//! - `currencies` - Currency master rows (key: currency id)
//!
//! Every multi-row write goes through a single `WriteBatch`, so a header is
//! never visible without its slots, indices and balance updates.

use crate::{
    error::{Error, Result},
    types::{
        Account, AccountId, CompanyId, Currency, CurrencyId, NodeId, Slot, Transaction,
        TransactionHash, TransactionId, TransactionStatus, TransactionType,
    },
    validator::{codes, ValidationErrors},
    Config,
};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode, Options,
    SingleThreaded, WriteBatch, WriteOptions,
};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashSet};

/// Column family names
const CF_TRANSACTIONS: &str = "transactions";
const CF_SLOTS: &str = "slots";
const CF_INDICES: &str = "indices";
const CF_BALANCES: &str = "balances";
const CF_ACCOUNTS: &str = "accounts";
const CF_CURRENCIES: &str = "currencies";

const ALL_CFS: [&str; 6] = [
    CF_TRANSACTIONS,
    CF_SLOTS,
    CF_INDICES,
    CF_BALANCES,
    CF_ACCOUNTS,
    CF_CURRENCIES,
];

type Db = DBWithThreadMode<SingleThreaded>;

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Db,
    sync_writes: bool,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("path", &self.db.path())
            .field("sync_writes", &self.sync_writes)
            .finish()
    }
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;
        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);
        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Self::cf_options(name)))
            .collect::<Vec<_>>();

        let db = Db::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(
            path = ?path,
            column_families = ALL_CFS.len(),
            "Opened posting store"
        );

        Ok(Self {
            db,
            sync_writes: config.rocksdb.sync_writes,
        })
    }

    fn cf_options(name: &str) -> Options {
        let mut opts = Options::default();
        match name {
            CF_INDICES | CF_BALANCES => {
                opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
                // Point lookups on hash and counter keys
                let mut block_opts = rocksdb::BlockBasedOptions::default();
                block_opts.set_bloom_filter(10.0, false);
                opts.set_block_based_table_factory(&block_opts);
            }
            _ => opts.set_compression_type(rocksdb::DBCompressionType::Lz4),
        }
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.sync_writes);
        self.db.write_opt(batch, &opts)?;
        Ok(())
    }

    // Master data

    /// Insert or replace an account master row
    pub fn put_account(&self, account: &Account) -> Result<()> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;
        let key = keys::account(account.company_id, account.id);
        self.db.put_cf(cf, key, bincode::serialize(account)?)?;
        Ok(())
    }

    /// Insert or replace a currency master row
    pub fn put_currency(&self, currency: &Currency) -> Result<()> {
        let cf = self.cf_handle(CF_CURRENCIES)?;
        self.db
            .put_cf(cf, keys::currency(currency.id), bincode::serialize(currency)?)?;
        Ok(())
    }

    /// Account by company and id
    pub fn get_account(&self, company_id: CompanyId, account_id: AccountId) -> Result<Option<Account>> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;
        match self.db.get_cf(cf, keys::account(company_id, account_id))? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// Currency by id
    pub fn get_currency(&self, currency_id: CurrencyId) -> Result<Option<Currency>> {
        let cf = self.cf_handle(CF_CURRENCIES)?;
        match self.db.get_cf(cf, keys::currency(currency_id))? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// All accounts of a company, ordered by id
    pub fn accounts_for_company(&self, company_id: CompanyId) -> Result<Vec<Account>> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;
        self.scan_prefix(cf, &company_id.to_be_bytes())?
            .into_iter()
            .map(|(_, value)| Ok(bincode::deserialize(&value)?))
            .collect()
    }

    // Reads

    /// Transaction with its slots
    pub fn find_by_id(&self, company_id: CompanyId, id: TransactionId) -> Result<Transaction> {
        self.get_transaction(company_id, id)?
            .ok_or_else(|| Error::NotFound(format!("transaction {}/{}", company_id, id)))
    }

    /// Transaction by its year counter
    pub fn find_by_year_counter(
        &self,
        company_id: CompanyId,
        transaction_type: TransactionType,
        year: i32,
        counter: u64,
    ) -> Result<Transaction> {
        let cf = self.cf_handle(CF_INDICES)?;
        let key = keys::counter(company_id, transaction_type, year, counter);
        let value = self.db.get_cf(cf, key)?.ok_or_else(|| {
            Error::NotFound(format!(
                "{} #{} of {} for company {}",
                transaction_type, counter, year, company_id
            ))
        })?;
        self.find_by_id(company_id, keys::decode_u64(&value)?)
    }

    /// Transaction owning a hash
    pub fn find_by_hash(&self, hash: &TransactionHash) -> Result<Option<Transaction>> {
        let cf = self.cf_handle(CF_INDICES)?;
        match self.db.get_cf(cf, keys::hash(hash))? {
            Some(value) => {
                let (company_id, id) = keys::decode_transaction(&value)?;
                self.get_transaction(company_id, id)
            }
            None => Ok(None),
        }
    }

    /// Most recent transaction of a company, optionally restricted to one node
    pub fn last(&self, company_id: CompanyId, node_id: Option<NodeId>) -> Result<Option<Transaction>> {
        let cf = self.cf_handle(CF_TRANSACTIONS)?;
        let prefix = company_id.to_be_bytes();
        let seek = keys::upper_bound(&prefix);

        for item in self.db.iterator_cf(cf, IteratorMode::From(&seek, Direction::Reverse)) {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            let header: Transaction = bincode::deserialize(&value)?;
            if node_id.map_or(true, |node| node == header.node_id) {
                return self.with_slots(header).map(Some);
            }
        }
        Ok(None)
    }

    /// Highest row id ever used by a company, including deleted rows
    pub fn last_id(&self, company_id: CompanyId) -> Result<Option<TransactionId>> {
        let cf = self.cf_handle(CF_TRANSACTIONS)?;
        let newest = match self.last_with_prefix(cf, &company_id.to_be_bytes())? {
            Some(key) => Some(keys::decode_transaction(&key)?.1),
            None => None,
        };
        let mark = match self.db.get_cf(self.cf_handle(CF_INDICES)?, keys::id_mark(company_id))? {
            Some(value) => Some(keys::decode_u64(&value)?),
            None => None,
        };
        Ok(newest.max(mark))
    }

    /// Highest year counter for (company, type, year)
    pub fn last_year_counter(
        &self,
        company_id: CompanyId,
        transaction_type: TransactionType,
        year: i32,
    ) -> Result<Option<u64>> {
        let cf = self.cf_handle(CF_INDICES)?;
        let prefix = keys::counter_prefix(company_id, transaction_type, year);
        self.last_with_prefix(cf, &prefix)?
            .map(|key| keys::decode_u64(&key[prefix.len()..]))
            .transpose()
    }

    /// Highest year cumulative for (company, year)
    pub fn last_year_cumulative(&self, company_id: CompanyId, year: i32) -> Result<Option<u64>> {
        let cf = self.cf_handle(CF_INDICES)?;
        let prefix = keys::cumulative_prefix(company_id, year);
        self.last_with_prefix(cf, &prefix)?
            .map(|key| keys::decode_u64(&key[prefix.len()..]))
            .transpose()
    }

    /// Current running balance of an account
    pub fn account_balance(&self, company_id: CompanyId, account_id: AccountId) -> Result<Decimal> {
        let cf = self.cf_handle(CF_BALANCES)?;
        match self.db.get_cf(cf, keys::account(company_id, account_id))? {
            Some(value) => Ok(bincode::deserialize(&value)?),
            None => Ok(Decimal::ZERO),
        }
    }

    /// Every slot posted by a company
    pub fn slots_for_company(&self, company_id: CompanyId) -> Result<Vec<Slot>> {
        let cf = self.cf_handle(CF_SLOTS)?;
        self.scan_prefix(cf, &company_id.to_be_bytes())?
            .into_iter()
            .map(|(_, value)| Ok(bincode::deserialize(&value)?))
            .collect()
    }

    // Writes

    /// Persist a new transaction, its slots, indices and balance updates atomically
    pub fn create(&self, tx: &Transaction) -> Result<Transaction> {
        let year = year_of(tx)?;
        let tx_key = keys::transaction(tx.company_id, tx.id);

        if self.db.get_cf(self.cf_handle(CF_TRANSACTIONS)?, tx_key)?.is_some() {
            return Err(Error::Duplicate(format!(
                "transaction {}/{} already exists",
                tx.company_id, tx.id
            )));
        }
        self.check_indices_free(tx, year, &[])?;
        self.check_references(tx)?;

        let mut stored = tx.clone();
        let mut balances = self.load_balances(tx.company_id, tx.slots.iter().map(|s| s.account_id))?;
        let mut batch = WriteBatch::default();

        self.put_slots(&mut batch, &mut stored, &mut balances)?;
        self.put_balances(&mut batch, tx.company_id, &balances)?;
        let cf_indices = self.cf_handle(CF_INDICES)?;
        for (key, value) in index_entries(tx, year) {
            batch.put_cf(cf_indices, key, value);
        }
        if self.last_id(tx.company_id)?.map_or(true, |last| tx.id > last) {
            batch.put_cf(cf_indices, keys::id_mark(tx.company_id), tx.id.to_be_bytes());
        }
        batch.put_cf(
            self.cf_handle(CF_TRANSACTIONS)?,
            tx_key,
            bincode::serialize(&stored.header())?,
        );

        self.write(batch)?;

        tracing::debug!(
            company_id = tx.company_id,
            transaction_id = tx.id,
            transaction_type = %tx.transaction_type,
            year_counter = tx.year_counter,
            slots = stored.slots.len(),
            "Transaction created"
        );

        Ok(stored)
    }

    /// Replace a transaction's header and slots wholesale, atomically
    pub fn update(&self, tx: &Transaction) -> Result<Transaction> {
        let year = year_of(tx)?;
        let existing = self.find_by_id(tx.company_id, tx.id)?;
        let old_year = year_of(&existing)?;
        let old_entries = index_entries(&existing, old_year);

        self.check_indices_free(tx, year, &old_entries)?;
        self.check_references(tx)?;

        let accounts = existing
            .slots
            .iter()
            .chain(tx.slots.iter())
            .map(|s| s.account_id);
        let mut balances = self.load_balances(tx.company_id, accounts)?;
        for slot in &existing.slots {
            if let Some(balance) = balances.get_mut(&slot.account_id) {
                shift_balance(balance, slot, true)?;
            }
        }

        let mut batch = WriteBatch::default();
        let cf_slots = self.cf_handle(CF_SLOTS)?;
        for line in 0..existing.slots.len() {
            batch.delete_cf(cf_slots, keys::slot(tx.company_id, tx.id, line as u32));
        }

        let mut stored = tx.clone();
        self.put_slots(&mut batch, &mut stored, &mut balances)?;
        self.put_balances(&mut batch, tx.company_id, &balances)?;

        let new_entries = index_entries(tx, year);
        let cf_indices = self.cf_handle(CF_INDICES)?;
        for (key, _) in &old_entries {
            if !new_entries.iter().any(|(k, _)| k == key) {
                batch.delete_cf(cf_indices, key);
            }
        }
        for (key, value) in new_entries {
            batch.put_cf(cf_indices, key, value);
        }
        batch.put_cf(
            self.cf_handle(CF_TRANSACTIONS)?,
            keys::transaction(tx.company_id, tx.id),
            bincode::serialize(&stored.header())?,
        );

        self.write(batch)?;

        tracing::debug!(
            company_id = tx.company_id,
            transaction_id = tx.id,
            replaced_slots = existing.slots.len(),
            slots = stored.slots.len(),
            "Transaction updated"
        );

        Ok(stored)
    }

    /// Rewrite only the header's approval status; slots and balances are untouched
    pub fn set_status(
        &self,
        company_id: CompanyId,
        id: TransactionId,
        status: TransactionStatus,
    ) -> Result<Transaction> {
        let mut tx = self.find_by_id(company_id, id)?;
        tx.status = Some(status);

        let mut batch = WriteBatch::default();
        batch.put_cf(
            self.cf_handle(CF_TRANSACTIONS)?,
            keys::transaction(company_id, id),
            bincode::serialize(&tx.header())?,
        );
        self.write(batch)?;

        tracing::debug!(company_id, transaction_id = id, %status, "Transaction status changed");
        Ok(tx)
    }

    /// Remove a transaction and undo its balance effect (administrative path)
    pub fn delete(&self, company_id: CompanyId, id: TransactionId) -> Result<Transaction> {
        let existing = self.find_by_id(company_id, id)?;
        let year = year_of(&existing)?;

        let mut balances =
            self.load_balances(company_id, existing.slots.iter().map(|s| s.account_id))?;
        for slot in &existing.slots {
            if let Some(balance) = balances.get_mut(&slot.account_id) {
                shift_balance(balance, slot, true)?;
            }
        }

        let mut batch = WriteBatch::default();
        let cf_slots = self.cf_handle(CF_SLOTS)?;
        for line in 0..existing.slots.len() {
            batch.delete_cf(cf_slots, keys::slot(company_id, id, line as u32));
        }
        let cf_indices = self.cf_handle(CF_INDICES)?;
        for (key, _) in index_entries(&existing, year) {
            batch.delete_cf(cf_indices, key);
        }
        self.put_balances(&mut batch, company_id, &balances)?;
        batch.delete_cf(
            self.cf_handle(CF_TRANSACTIONS)?,
            keys::transaction(company_id, id),
        );

        self.write(batch)?;

        tracing::warn!(company_id, transaction_id = id, "Transaction deleted");
        Ok(existing)
    }

    // Helpers

    fn get_transaction(&self, company_id: CompanyId, id: TransactionId) -> Result<Option<Transaction>> {
        let cf = self.cf_handle(CF_TRANSACTIONS)?;
        match self.db.get_cf(cf, keys::transaction(company_id, id))? {
            Some(value) => {
                let header: Transaction = bincode::deserialize(&value)?;
                self.with_slots(header).map(Some)
            }
            None => Ok(None),
        }
    }

    fn with_slots(&self, mut header: Transaction) -> Result<Transaction> {
        let cf = self.cf_handle(CF_SLOTS)?;
        let prefix = keys::transaction(header.company_id, header.id);
        header.slots = self
            .scan_prefix(cf, &prefix)?
            .into_iter()
            .map(|(_, value)| bincode::deserialize(&value))
            .collect::<std::result::Result<_, _>>()?;
        Ok(header)
    }

    fn check_indices_free(
        &self,
        tx: &Transaction,
        year: i32,
        owned: &[(Vec<u8>, Vec<u8>)],
    ) -> Result<()> {
        let cf = self.cf_handle(CF_INDICES)?;
        for (key, _) in index_entries(tx, year) {
            if owned.iter().any(|(k, _)| *k == key) {
                continue;
            }
            if self.db.get_cf(cf, &key)?.is_some() {
                return Err(Error::Duplicate(match key[0] {
                    keys::HASH_TAG => format!("hash {} is already posted", tx.hash_hex()),
                    keys::COUNTER_TAG => format!(
                        "{} year counter {} of {} is taken",
                        tx.transaction_type, tx.year_counter, year
                    ),
                    _ => format!("year cumulative {} of {} is taken", tx.year_cumulative, year),
                }));
            }
        }
        Ok(())
    }

    fn check_references(&self, tx: &Transaction) -> Result<()> {
        let mut currencies = HashSet::new();
        currencies.insert(tx.currency_id);
        for slot in &tx.slots {
            if slot.currency_id != 0 {
                currencies.insert(slot.currency_id);
            }
        }
        for currency_id in currencies {
            if self.get_currency(currency_id)?.is_none() {
                return Err(Error::Foreign(format!("currency {} does not exist", currency_id)));
            }
        }

        let accounts: HashSet<AccountId> = tx.slots.iter().map(|s| s.account_id).collect();
        for account_id in accounts {
            match self.get_account(tx.company_id, account_id)? {
                Some(account) if account.visible_from(tx.node_id) => {}
                Some(account) => {
                    return Err(Error::Foreign(format!(
                        "account {} belongs to node {}, not node {}",
                        account_id, account.node_id, tx.node_id
                    )));
                }
                None => {
                    return Err(Error::Foreign(format!(
                        "account {} does not exist for company {}",
                        account_id, tx.company_id
                    )));
                }
            }
        }
        Ok(())
    }

    fn load_balances(
        &self,
        company_id: CompanyId,
        accounts: impl Iterator<Item = AccountId>,
    ) -> Result<BTreeMap<AccountId, Decimal>> {
        let mut balances = BTreeMap::new();
        for account_id in accounts {
            if !balances.contains_key(&account_id) {
                balances.insert(account_id, self.account_balance(company_id, account_id)?);
            }
        }
        Ok(balances)
    }

    /// Number the slots, thread running balances through them, and queue the rows
    fn put_slots(
        &self,
        batch: &mut WriteBatch,
        tx: &mut Transaction,
        balances: &mut BTreeMap<AccountId, Decimal>,
    ) -> Result<()> {
        let cf = self.cf_handle(CF_SLOTS)?;
        let (company_id, id, currency_id, post_date) =
            (tx.company_id, tx.id, tx.currency_id, tx.post_date);

        for (line, slot) in tx.slots.iter_mut().enumerate() {
            let balance = balances.entry(slot.account_id).or_insert(Decimal::ZERO);
            shift_balance(balance, slot, false)?;

            slot.transaction_id = id;
            slot.balance = *balance;
            slot.post_date = post_date;
            if slot.currency_id == 0 {
                slot.currency_id = currency_id;
            }
            batch.put_cf(
                cf,
                keys::slot(company_id, id, line as u32),
                bincode::serialize(slot)?,
            );
        }
        Ok(())
    }

    fn put_balances(
        &self,
        batch: &mut WriteBatch,
        company_id: CompanyId,
        balances: &BTreeMap<AccountId, Decimal>,
    ) -> Result<()> {
        let cf = self.cf_handle(CF_BALANCES)?;
        for (account_id, balance) in balances {
            batch.put_cf(cf, keys::account(company_id, *account_id), bincode::serialize(balance)?);
        }
        Ok(())
    }

    fn scan_prefix(&self, cf: &ColumnFamily, prefix: &[u8]) -> Result<Vec<(Box<[u8]>, Box<[u8]>)>> {
        let mut rows = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward)) {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            rows.push((key, value));
        }
        Ok(rows)
    }

    fn last_with_prefix(&self, cf: &ColumnFamily, prefix: &[u8]) -> Result<Option<Box<[u8]>>> {
        let seek = keys::upper_bound(prefix);
        let mut iter = self.db.iterator_cf(cf, IteratorMode::From(&seek, Direction::Reverse));
        match iter.next() {
            Some(item) => {
                let (key, _) = item?;
                Ok(key.starts_with(prefix).then_some(key))
            }
            None => Ok(None),
        }
    }

    // Statistics

    /// Get storage statistics
    pub fn get_stats(&self) -> Result<StorageStats> {
        Ok(StorageStats {
            total_transactions: self.approximate_count(self.cf_handle(CF_TRANSACTIONS)?)?,
            total_slots: self.approximate_count(self.cf_handle(CF_SLOTS)?)?,
            total_accounts: self.approximate_count(self.cf_handle(CF_ACCOUNTS)?)?,
        })
    }

    fn approximate_count(&self, cf: &ColumnFamily) -> Result<u64> {
        Ok(self
            .db
            .property_int_value_cf(cf, "rocksdb.estimate-num-keys")?
            .unwrap_or(0))
    }
}

/// Storage statistics (RocksDB estimates)
#[derive(Debug, Clone)]
pub struct StorageStats {
    /// Transaction headers
    pub total_transactions: u64,
    /// Slot rows
    pub total_slots: u64,
    /// Account master rows
    pub total_accounts: u64,
}

/// Add a slot's effect to its account balance, or remove it with `reverse`
fn shift_balance(balance: &mut Decimal, slot: &Slot, reverse: bool) -> Result<()> {
    let shifted = slot.net().and_then(|net| {
        if reverse {
            balance.checked_sub(net)
        } else {
            balance.checked_add(net)
        }
    });
    *balance = shifted.ok_or_else(|| {
        Error::Storage(format!(
            "running balance of account {} is out of range",
            slot.account_id
        ))
    })?;
    Ok(())
}

fn year_of(tx: &Transaction) -> Result<i32> {
    tx.year().ok_or_else(|| {
        let mut errors = ValidationErrors::new();
        errors.add("post_date", codes::REQUIRED, "post date is required");
        Error::Validation(errors)
    })
}

/// Index rows owned by a transaction: hash, year counter, year cumulative
fn index_entries(tx: &Transaction, year: i32) -> Vec<(Vec<u8>, Vec<u8>)> {
    let id = tx.id.to_be_bytes().to_vec();
    vec![
        (keys::hash(&tx.hash), keys::transaction(tx.company_id, tx.id).to_vec()),
        (
            keys::counter(tx.company_id, tx.transaction_type, year, tx.year_counter),
            id.clone(),
        ),
        (keys::cumulative(tx.company_id, year, tx.year_cumulative), id),
    ]
}

/// Big-endian key layouts so that RocksDB's byte order matches numeric order
mod keys {
    use super::*;

    pub(super) const HASH_TAG: u8 = b'h';
    pub(super) const COUNTER_TAG: u8 = b'c';
    pub(super) const CUMULATIVE_TAG: u8 = b'y';
    pub(super) const ID_MARK_TAG: u8 = b'n';

    pub(super) fn transaction(company_id: CompanyId, id: TransactionId) -> [u8; 12] {
        let mut key = [0u8; 12];
        key[..4].copy_from_slice(&company_id.to_be_bytes());
        key[4..].copy_from_slice(&id.to_be_bytes());
        key
    }

    pub(super) fn slot(company_id: CompanyId, id: TransactionId, line: u32) -> [u8; 16] {
        let mut key = [0u8; 16];
        key[..12].copy_from_slice(&transaction(company_id, id));
        key[12..].copy_from_slice(&line.to_be_bytes());
        key
    }

    pub(super) fn account(company_id: CompanyId, account_id: AccountId) -> [u8; 8] {
        let mut key = [0u8; 8];
        key[..4].copy_from_slice(&company_id.to_be_bytes());
        key[4..].copy_from_slice(&account_id.to_be_bytes());
        key
    }

    pub(super) fn currency(currency_id: CurrencyId) -> [u8; 4] {
        currency_id.to_be_bytes()
    }

    pub(super) fn hash(hash: &TransactionHash) -> Vec<u8> {
        let mut key = Vec::with_capacity(33);
        key.push(HASH_TAG);
        key.extend_from_slice(hash);
        key
    }

    /// Highest id ever assigned to a company; survives deletes
    pub(super) fn id_mark(company_id: CompanyId) -> [u8; 5] {
        let mut key = [0u8; 5];
        key[0] = ID_MARK_TAG;
        key[1..].copy_from_slice(&company_id.to_be_bytes());
        key
    }

    // Sign bit flipped so negative years sort before positive ones
    fn year(year: i32) -> [u8; 4] {
        ((year as u32) ^ 0x8000_0000).to_be_bytes()
    }

    pub(super) fn counter_prefix(
        company_id: CompanyId,
        transaction_type: TransactionType,
        y: i32,
    ) -> Vec<u8> {
        let mut key = Vec::with_capacity(18);
        key.push(COUNTER_TAG);
        key.extend_from_slice(&company_id.to_be_bytes());
        key.push(transaction_type.as_u8());
        key.extend_from_slice(&year(y));
        key
    }

    pub(super) fn counter(
        company_id: CompanyId,
        transaction_type: TransactionType,
        y: i32,
        counter: u64,
    ) -> Vec<u8> {
        let mut key = counter_prefix(company_id, transaction_type, y);
        key.extend_from_slice(&counter.to_be_bytes());
        key
    }

    pub(super) fn cumulative_prefix(company_id: CompanyId, y: i32) -> Vec<u8> {
        let mut key = Vec::with_capacity(17);
        key.push(CUMULATIVE_TAG);
        key.extend_from_slice(&company_id.to_be_bytes());
        key.extend_from_slice(&year(y));
        key
    }

    pub(super) fn cumulative(company_id: CompanyId, y: i32, cumulative: u64) -> Vec<u8> {
        let mut key = cumulative_prefix(company_id, y);
        key.extend_from_slice(&cumulative.to_be_bytes());
        key
    }

    /// Smallest key greater than every key starting with `prefix` (for reverse seeks)
    pub(super) fn upper_bound(prefix: &[u8]) -> Vec<u8> {
        let mut key = prefix.to_vec();
        key.extend_from_slice(&[0xFF; 16]);
        key
    }

    pub(super) fn decode_u64(bytes: &[u8]) -> Result<u64> {
        let raw: [u8; 8] = bytes
            .get(..8)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| Error::Storage(format!("malformed u64 key part ({} bytes)", bytes.len())))?;
        Ok(u64::from_be_bytes(raw))
    }

    pub(super) fn decode_transaction(bytes: &[u8]) -> Result<(CompanyId, TransactionId)> {
        let company: [u8; 4] = bytes
            .get(..4)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| Error::Storage("malformed transaction key".to_string()))?;
        Ok((u32::from_be_bytes(company), decode_u64(&bytes[4..])?))
    }
}
