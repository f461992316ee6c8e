use std::fmt;

use serde::{Deserialize, Serialize};

use crate::pagination::Pageable;
use crate::period::{DateRange, Interval};

/// Query for a ledger report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerFilters {
    /// Account path prefixes (ledger account expressions).
    #[serde(default)]
    pub accounts: Vec<String>,
    #[serde(default)]
    pub payees: Vec<String>,
    /// Exclude virtual postings.
    #[serde(default)]
    pub real: bool,
    pub period: Option<DateRange>,
    pub pageable: Option<Pageable>,
    /// Carried with the query only; not rendered into ledger arguments. The
    /// time-bucketed reports take their interval as a parameter.
    pub interval: Option<Interval>,
}

impl LedgerFilters {
    pub fn with_pageable(&self, pageable: Option<Pageable>) -> Self {
        LedgerFilters {
            pageable,
            ..self.clone()
        }
    }

    /// Ledger arguments for this query, one element per argv entry.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.real {
            args.push("--real".to_string());
        }

        if let Some(period) = self.period {
            args.push("--period".to_string());
            args.push(period.ledger_expression());
        }

        if let Some(sort) = self.sort_expression() {
            args.push("--sort".to_string());
            args.push(sort);
        }

        args.extend(self.accounts.iter().cloned());
        args.extend(self.payees.iter().map(|p| format!("@{p}")));

        args
    }

    fn sort_expression(&self) -> Option<String> {
        let sort = &self.pageable.as_ref()?.sort;
        if sort.is_empty() {
            return None;
        }
        Some(
            sort.iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(","),
        )
    }
}

impl fmt::Display for LedgerFilters {
    /// The same arguments as [`LedgerFilters::to_args`], escaped for a shell command line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut args: Vec<String> = Vec::new();

        if self.real {
            args.push("--real".to_string());
        }

        if let Some(period) = self.period {
            args.push(format!("--period {}", quote(&period.ledger_expression())));
        }

        if let Some(pageable) = &self.pageable {
            if !pageable.sort.is_empty() {
                let keys: Vec<String> = pageable.sort.iter().map(|s| quote(&s.to_string())).collect();
                args.push(format!("--sort {}", keys.join(",")));
            }
        }

        for account in &self.accounts {
            args.push(escape(account));
        }

        for payee in &self.payees {
            args.push(format!("@{}", quote(payee)));
        }

        write!(f, "{}", args.join(" "))
    }
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

fn escape(s: &str) -> String {
    if s.chars().any(|c| c.is_whitespace() || "\"'$`\\;&|<>()*?!#".contains(c)) {
        quote(s)
    } else {
        s.to_string()
    }
}
