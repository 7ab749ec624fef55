//! Interfaces to services the engine reads from but does not own

use crate::{
    config::DEFAULT_CASH_ACCOUNT_KEY,
    storage::Storage,
    types::{Account, AccountId, CompanyId, Currency, CurrencyId, NodeId},
    Error, Result,
};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Account master lookup
pub trait AccountLookup: Send + Sync {
    /// Account visible from `node_id` (company-wide accounts have node 0)
    fn find_account(
        &self,
        company_id: CompanyId,
        node_id: NodeId,
        account_id: AccountId,
    ) -> Result<Account>;
}

/// Currency master lookup
pub trait CurrencyLookup: Send + Sync {
    /// Currency by id
    fn find_currency(&self, currency_id: CurrencyId) -> Result<Currency>;
}

/// Read-only key/value settings
pub trait SettingsStore: Send + Sync {
    /// Raw value for a key
    fn get(&self, key: &str) -> Option<String>;

    /// Value parsed into `T`; unparsable values are a configuration error
    fn get_parsed<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>>
    where
        Self: Sized,
    {
        match self.get(key) {
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| Error::Config(format!("setting {} has invalid value {:?}", key, raw))),
            None => Ok(None),
        }
    }

    /// Account receiving the cash leg of payments and receipts
    fn default_cash_account(&self) -> Result<Option<AccountId>>
    where
        Self: Sized,
    {
        self.get_parsed(DEFAULT_CASH_ACCOUNT_KEY)
    }
}

impl AccountLookup for Storage {
    fn find_account(
        &self,
        company_id: CompanyId,
        node_id: NodeId,
        account_id: AccountId,
    ) -> Result<Account> {
        match self.get_account(company_id, account_id)? {
            Some(account) if account.visible_from(node_id) => Ok(account),
            _ => Err(Error::NotFound(format!(
                "account {} for company {} node {}",
                account_id, company_id, node_id
            ))),
        }
    }
}

impl CurrencyLookup for Storage {
    fn find_currency(&self, currency_id: CurrencyId) -> Result<Currency> {
        self.get_currency(currency_id)?
            .ok_or_else(|| Error::NotFound(format!("currency {}", currency_id)))
    }
}

/// Settings held in memory, seeded from configuration
#[derive(Debug, Default)]
pub struct InMemorySettings {
    values: RwLock<BTreeMap<String, String>>,
}

impl InMemorySettings {
    /// Settings seeded with initial values
    pub fn new(values: BTreeMap<String, String>) -> Self {
        Self {
            values: RwLock::new(values),
        }
    }

    /// Replace one value (used by the settings owner, never by the engine)
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values.write().insert(key.into(), value.into());
    }
}

impl SettingsStore for InMemorySettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }
}
