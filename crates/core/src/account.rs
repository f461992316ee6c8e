use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::error::LedgerError;

/// Full name of the implicit top-level account.
pub const ROOT_ACCOUNT: &str = "Root";

pub const ACCOUNT_SEPARATOR: char = ':';

/// A node of the balance tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub name: String,
    pub full_name: String,
    pub balance: Amount,
    pub children: Vec<Account>,
}

impl Account {
    /// A childless account whose name is the last segment of `full_name`.
    pub fn new(full_name: impl Into<String>, balance: Amount) -> Self {
        let full_name = full_name.into();
        Account {
            name: leaf_name(&full_name).to_string(),
            full_name,
            balance,
            children: Vec::new(),
        }
    }

    pub fn root(balance: Amount) -> Self {
        Account::new(ROOT_ACCOUNT, balance)
    }

    pub fn is_root(&self) -> bool {
        self.full_name == ROOT_ACCOUNT
    }

    pub fn find(&self, full_name: &str) -> Option<&Account> {
        if self.full_name == full_name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(full_name))
    }
}

pub fn leaf_name(full_name: &str) -> &str {
    full_name
        .rsplit_once(ACCOUNT_SEPARATOR)
        .map_or(full_name, |(_, leaf)| leaf)
}

pub fn parent_path(full_name: &str) -> &str {
    full_name
        .rsplit_once(ACCOUNT_SEPARATOR)
        .map_or(ROOT_ACCOUNT, |(parent, _)| parent)
}

fn depth(full_name: &str) -> usize {
    full_name.matches(ACCOUNT_SEPARATOR).count()
}

/// Builds the account hierarchy from a flat list of accounts in source order.
///
/// Every account is attached to its nearest ancestor present in the list, or to
/// `Root` when none is. A repeated full name replaces the earlier entry in place.
pub fn build_account_tree(accounts: Vec<Account>) -> Result<Account, LedgerError> {
    let mut nodes: Vec<Account> = Vec::with_capacity(accounts.len());
    let mut index: HashMap<String, usize> = HashMap::with_capacity(accounts.len());
    for account in accounts {
        match index.get(&account.full_name) {
            Some(&i) => nodes[i] = account,
            None => {
                index.insert(account.full_name.clone(), nodes.len());
                nodes.push(account);
            }
        }
    }

    let root = *index.get(ROOT_ACCOUNT).ok_or(LedgerError::RootNotFound)?;

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    let max_depth = nodes
        .iter()
        .filter(|n| !n.is_root())
        .map(|n| depth(&n.full_name))
        .max()
        .unwrap_or(0);

    for current in 0..=max_depth {
        for (i, node) in nodes.iter().enumerate() {
            if i == root || depth(&node.full_name) != current {
                continue;
            }
            let parent = nearest_ancestor(&index, &node.full_name);
            children[parent.unwrap_or(root)].push(i);
        }
    }

    let mut slots: Vec<Option<Account>> = nodes.into_iter().map(Some).collect();
    assemble(root, &children, &mut slots).ok_or(LedgerError::RootNotFound)
}

fn nearest_ancestor(index: &HashMap<String, usize>, full_name: &str) -> Option<usize> {
    let mut path = full_name;
    while let Some((parent, _)) = path.rsplit_once(ACCOUNT_SEPARATOR) {
        if let Some(&i) = index.get(parent) {
            return Some(i);
        }
        path = parent;
    }
    None
}

fn assemble(i: usize, children: &[Vec<usize>], slots: &mut [Option<Account>]) -> Option<Account> {
    let mut node = slots[i].take()?;
    for &c in &children[i] {
        if let Some(mut child) = assemble(c, children, slots) {
            child.name = relative_name(&node, &child.full_name);
            node.children.push(child);
        }
    }
    Some(node)
}

fn relative_name(parent: &Account, full_name: &str) -> String {
    if parent.is_root() {
        return full_name.to_string();
    }
    full_name
        .strip_prefix(parent.full_name.as_str())
        .and_then(|rest| rest.strip_prefix(ACCOUNT_SEPARATOR))
        .unwrap_or(full_name)
        .to_string()
}
