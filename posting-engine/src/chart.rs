//! Chart-of-accounts cache
//!
//! Each company gets an immutable [`AccountTree`] behind an `Arc`. Readers
//! clone the `Arc` and never block the posting worker. After a posting the
//! worker only records which accounts went stale; the tree keeps being served
//! until someone asks for a rebuild.

use crate::{
    storage::Storage,
    types::{Account, AccountId, CompanyId},
    Error, Result,
};
use dashmap::DashMap;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

/// One account in the tree with its aggregated balances
#[derive(Debug, Clone)]
pub struct ChartNode {
    /// Master row
    pub account: Account,
    /// Σ debit − Σ credit of the account's own slots
    pub own_balance: Decimal,
    /// Own balance plus every descendant's own balance
    pub total_balance: Decimal,
    /// Direct children, ordered by id
    pub children: Vec<AccountId>,
}

/// Aggregated chart of accounts for one company
#[derive(Debug)]
pub struct AccountTree {
    company_id: CompanyId,
    nodes: BTreeMap<AccountId, ChartNode>,
    roots: Vec<AccountId>,
    stale: RwLock<BTreeSet<AccountId>>,
}

impl AccountTree {
    /// Build a tree from master rows and per-account balances.
    ///
    /// Accounts whose parent is unknown, or whose parent chain loops back to
    /// themselves, become roots.
    pub fn build(
        company_id: CompanyId,
        accounts: Vec<Account>,
        balances: &BTreeMap<AccountId, Decimal>,
    ) -> Self {
        let parents: BTreeMap<AccountId, Option<AccountId>> =
            accounts.iter().map(|a| (a.id, a.parent_id)).collect();

        let mut nodes: BTreeMap<AccountId, ChartNode> = accounts
            .into_iter()
            .map(|account| {
                let own = balances.get(&account.id).copied().unwrap_or(Decimal::ZERO);
                (
                    account.id,
                    ChartNode {
                        account,
                        own_balance: own,
                        total_balance: own,
                        children: Vec::new(),
                    },
                )
            })
            .collect();

        let mut roots = Vec::new();
        for (&id, &parent) in &parents {
            match parent.filter(|p| parents.contains_key(p) && !reaches(&parents, *p, id)) {
                Some(parent_id) => {
                    if let Some(node) = nodes.get_mut(&parent_id) {
                        node.children.push(id);
                    }
                }
                None => roots.push(id),
            }
        }

        for &root in &roots {
            roll_up(&mut nodes, root);
        }

        Self {
            company_id,
            nodes,
            roots,
            stale: RwLock::new(BTreeSet::new()),
        }
    }

    /// Owning company
    pub fn company_id(&self) -> CompanyId {
        self.company_id
    }

    /// Top-level accounts, ordered by id
    pub fn roots(&self) -> &[AccountId] {
        &self.roots
    }

    /// Node for an account
    pub fn node(&self, account_id: AccountId) -> Option<&ChartNode> {
        self.nodes.get(&account_id)
    }

    /// Direct children of an account
    pub fn children(&self, account_id: AccountId) -> impl Iterator<Item = &ChartNode> {
        self.nodes
            .get(&account_id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(move |id| self.nodes.get(id))
    }

    /// Sum over the roots; zero for a balanced ledger
    pub fn total_balance(&self) -> Decimal {
        self.roots
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .fold(Decimal::ZERO, |acc, n| acc.saturating_add(n.total_balance))
    }

    /// Number of accounts in the tree
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the company has no accounts
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Accounts posted to since the tree was built
    pub fn stale_accounts(&self) -> BTreeSet<AccountId> {
        self.stale.read().clone()
    }

    /// Whether any account changed since the tree was built
    pub fn is_stale(&self) -> bool {
        !self.stale.read().is_empty()
    }

    fn mark_stale(&self, accounts: impl IntoIterator<Item = AccountId>) {
        self.stale.write().extend(accounts);
    }
}

// Whether walking up from `from` reaches `target`
fn reaches(parents: &BTreeMap<AccountId, Option<AccountId>>, from: AccountId, target: AccountId) -> bool {
    let mut seen = HashSet::new();
    let mut current = Some(from);
    while let Some(id) = current {
        if id == target {
            return true;
        }
        if !seen.insert(id) {
            return false;
        }
        current = parents.get(&id).copied().flatten();
    }
    false
}

fn roll_up(nodes: &mut BTreeMap<AccountId, ChartNode>, id: AccountId) -> Decimal {
    let children = match nodes.get(&id) {
        Some(node) => node.children.clone(),
        None => return Decimal::ZERO,
    };
    // Subtree totals saturate instead of overflowing
    let below = children
        .into_iter()
        .fold(Decimal::ZERO, |acc, child| acc.saturating_add(roll_up(nodes, child)));
    match nodes.get_mut(&id) {
        Some(node) => {
            node.total_balance = node.own_balance.saturating_add(below);
            node.total_balance
        }
        None => Decimal::ZERO,
    }
}

/// Per-company cache of account trees
#[derive(Debug, Default)]
pub struct ChartCache {
    trees: DashMap<CompanyId, Arc<AccountTree>>,
}

impl ChartCache {
    /// Empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Last built tree, without recomputation
    pub fn get(&self, company_id: CompanyId) -> Option<Arc<AccountTree>> {
        self.trees.get(&company_id).map(|entry| Arc::clone(entry.value()))
    }

    /// Rebuild a company's tree from the store and publish it
    pub fn refresh(&self, storage: &Storage, company_id: CompanyId) -> Result<Arc<AccountTree>> {
        let accounts = storage.accounts_for_company(company_id)?;

        let mut balances: BTreeMap<AccountId, Decimal> = BTreeMap::new();
        for slot in storage.slots_for_company(company_id)? {
            let balance = balances.entry(slot.account_id).or_insert(Decimal::ZERO);
            *balance = slot
                .net()
                .and_then(|net| balance.checked_add(net))
                .ok_or_else(|| {
                    Error::Storage(format!(
                        "balance of account {} is out of range",
                        slot.account_id
                    ))
                })?;
        }

        let tree = Arc::new(AccountTree::build(company_id, accounts, &balances));
        self.trees.insert(company_id, Arc::clone(&tree));

        tracing::debug!(
            company_id,
            accounts = tree.len(),
            roots = tree.roots().len(),
            "Chart of accounts rebuilt"
        );

        Ok(tree)
    }

    /// Record accounts touched by a posting; companies without a tree are skipped
    pub fn mark_stale(&self, company_id: CompanyId, accounts: impl IntoIterator<Item = AccountId>) {
        if let Some(tree) = self.trees.get(&company_id) {
            tree.mark_stale(accounts);
        }
    }

    /// Companies whose cached tree has stale accounts
    pub fn stale_companies(&self) -> Vec<CompanyId> {
        self.trees
            .iter()
            .filter(|entry| entry.value().is_stale())
            .map(|entry| *entry.key())
            .collect()
    }
}
