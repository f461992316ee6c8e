use serde::{Deserialize, Serialize};

/// Replacement templates applied to a matched transaction text. `$1`, `${name}`
/// refer to capture groups of the rule's pattern; absent templates fall back to
/// configured defaults.
///
/// A `$` reference takes the longest run of name characters after it, so
/// `$1Food` names a group called `1Food` (usually empty). Write `${1}Food` to
/// follow group 1 with literal text, and `$$` for a literal dollar sign.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Captures {
    pub account_to: Option<String>,
    pub account_from: Option<String>,
    pub payee: Option<String>,
    pub amount: Option<String>,
    pub commodity: Option<String>,
}

/// A user-defined rule turning free-form text (e.g. a bank SMS) into a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRegex {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    pub pattern: String,
    #[serde(default)]
    pub captures: Captures,
}

impl TransactionRegex {
    pub fn new(name: impl Into<String>, pattern: impl Into<String>, captures: Captures) -> Self {
        TransactionRegex {
            id: 0,
            name: name.into(),
            pattern: pattern.into(),
            captures,
        }
    }
}
