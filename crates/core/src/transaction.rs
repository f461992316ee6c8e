use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::amount::Amount;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountDetails {
    pub full_name: String,
    pub alias: Option<String>,
}

impl AccountDetails {
    pub fn new(full_name: impl Into<String>) -> Self {
        AccountDetails {
            full_name: full_name.into(),
            alias: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub account: AccountDetails,
    pub amount: Amount,
}

impl Posting {
    pub fn new(account: impl Into<String>, amount: Amount) -> Self {
        Posting {
            account: AccountDetails::new(account),
            amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub date: NaiveDate,
    pub payee: String,
    pub postings: Vec<Posting>,
}

impl Transaction {
    /// Sum of posting values, ignoring commodities.
    pub fn net_value(&self) -> f64 {
        self.postings.iter().map(|p| p.amount.value).sum()
    }
}

const TAB_WIDTH: usize = 8;

impl fmt::Display for Transaction {
    /// Renders the transaction as a ledger journal entry. Amounts are aligned on
    /// a tab stop past the longest account name; the second leg of a two-posting
    /// entry is left blank for ledger to balance. The payee is quoted so a
    /// leading `*`, `!` or `(` is not read as a state or code.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} \"{}\"", self.date.format("%Y-%m-%d"), self.payee)?;

        let longest = self
            .postings
            .iter()
            .map(|p| p.account.full_name.chars().count())
            .max()
            .unwrap_or(0);
        let column = (longest.div_ceil(TAB_WIDTH) + 1) * TAB_WIDTH;
        let elide_last = self.postings.len() == 2;

        for (i, posting) in self.postings.iter().enumerate() {
            write!(f, "\n\t{}", posting.account.full_name)?;
            if elide_last && i == 1 {
                continue;
            }
            let padding = column - posting.account.full_name.chars().count();
            let tabs = padding.div_ceil(TAB_WIDTH);
            write!(f, "{}{}", "\t".repeat(tabs), posting.amount)?;
        }
        Ok(())
    }
}

/// One line of a register report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterRow {
    pub date: NaiveDate,
    pub payee: String,
    pub account: AccountDetails,
    pub amount: Amount,
    pub total: Amount,
}

impl RegisterRow {
    /// Whether `other` is an adjacent posting to the same account by the same payee on the same day.
    pub fn same_entry(&self, other: &RegisterRow) -> bool {
        self.date == other.date && self.payee == other.payee && self.account == other.account
    }

    /// Nets a non-empty run of rows into the last one.
    pub fn combine(rows: Vec<RegisterRow>) -> Option<RegisterRow> {
        let net: f64 = rows.iter().map(|r| r.amount.value).sum();
        let mut last = rows.into_iter().last()?;
        last.amount.value = net;
        Some(last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn row(payee: &str, account: &str, value: f64, total: f64) -> RegisterRow {
        RegisterRow {
            date: date(2024, 1, 15),
            payee: payee.to_string(),
            account: AccountDetails::new(account),
            amount: Amount::new("INR", value),
            total: Amount::new("INR", total),
        }
    }

    #[test]
    fn combine_nets_into_last_row() {
        let combined = RegisterRow::combine(vec![
            row("Cafe", "Expenses:Food", 10.0, 10.0),
            row("Cafe", "Expenses:Food", -4.0, 6.0),
        ])
        .unwrap();
        assert_eq!(combined.amount.value, 6.0);
        assert_eq!(combined.total.value, 6.0);
    }

    #[test]
    fn combine_empty_is_none() {
        assert!(RegisterRow::combine(vec![]).is_none());
    }

    #[test]
    fn same_entry_compares_date_payee_account() {
        let a = row("Cafe", "Expenses:Food", 1.0, 1.0);
        assert!(a.same_entry(&row("Cafe", "Expenses:Food", 2.0, 3.0)));
        assert!(!a.same_entry(&row("Cafe", "Expenses:Fuel", 2.0, 3.0)));
        assert!(!a.same_entry(&row("Bar", "Expenses:Food", 2.0, 3.0)));
    }

    #[test]
    fn journal_entry_for_two_postings_elides_second_amount() {
        let tx = Transaction {
            date: date(2024, 1, 15),
            payee: "Starbucks".to_string(),
            postings: vec![
                Posting::new("Expenses:Coffee", Amount::new("INR", -4.5)),
                Posting::new("Assets:Checking", Amount::new("INR", 4.5)),
            ],
        };
        // Longest name is 15 chars: amounts start at column 24.
        assert_eq!(
            tx.to_string(),
            "2024-01-15 \"Starbucks\"\n\tExpenses:Coffee\t\tINR -4.5\n\tAssets:Checking"
        );
    }

    #[test]
    fn journal_entry_for_split_lists_every_amount() {
        let tx = Transaction {
            date: date(2024, 3, 1),
            payee: "Split".to_string(),
            postings: vec![
                Posting::new("Expenses:Food", Amount::new("INR", 6.0)),
                Posting::new("Expenses:Fun", Amount::new("INR", 4.0)),
                Posting::new("Assets:Cash", Amount::new("INR", -10.0)),
            ],
        };
        let text = tx.to_string();
        assert_eq!(text.lines().count(), 4);
        assert!(text.ends_with("\tAssets:Cash\t\tINR -10"));
    }

    #[test]
    fn journal_entry_quotes_payee_and_odd_commodities() {
        let tx = Transaction {
            date: date(2024, 3, 1),
            payee: "* Refund (store)".to_string(),
            postings: vec![
                Posting::new("Assets:Funds", Amount::new("VANGUARD 500", 2.0)),
                Posting::new("Assets:Cash", Amount::new("INR", -2.0)),
            ],
        };
        let text = tx.to_string();
        assert!(text.starts_with("2024-03-01 \"* Refund (store)\"\n"));
        assert!(text.contains("\t\"VANGUARD 500\" 2\n"));
    }

    #[test]
    fn net_value_of_balanced_transaction_is_zero() {
        let tx = Transaction {
            date: date(2024, 3, 1),
            payee: "x".to_string(),
            postings: vec![
                Posting::new("A", Amount::new("INR", 2.5)),
                Posting::new("B", Amount::new("INR", -2.5)),
            ],
        };
        assert_eq!(tx.net_value(), 0.0);
    }
}
