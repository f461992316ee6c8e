//! Row layouts of the CSV-shaped text ledger is asked to print, one struct per
//! `--format` string below. Fields are positional; the structs carry no header.

use std::io::Read;

use serde::Deserialize;

use crate::error::ReportError;

pub const BALANCE_FORMAT: &str = r"%(quoted(account)),%(quoted(display_total))\n";

pub const REGISTER_FORMAT: &str = concat!(
    r"true,%(quoted(date)),%(quoted(payee)),%(quoted(account)),%(quoted(amount_expr))\n",
    r"%/false,%(quoted(date)),%(quoted(payee)),%(quoted(account)),%(quoted(amount_expr))\n",
);

pub const REGISTER_WITH_TOTAL_FORMAT: &str = r"%(quoted(code)),%(quoted(date)),%(quoted(payee)),%(quoted(account)),%(quoted(amount_expr)),%(quoted(total_expr))\n";

pub const PERIOD_AMOUNT_FORMAT: &str = r"%(quoted(date)),%(abs(quantity(scrub(display_amount))))\n";

pub const PERIOD_TOTAL_FORMAT: &str = r"%(quoted(date)),%(abs(quantity(scrub(display_total))))\n";

pub const PERIOD_SIGNED_AMOUNT_FORMAT: &str = r"%(quoted(date)),%(quantity(scrub(display_amount)))\n";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BalanceRow {
    pub account_name: String,
    pub amount: String,
}

/// A register posting; `first_posting` marks the start of a transaction.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PostingRow {
    pub first_posting: bool,
    pub date: String,
    pub payee: String,
    pub account_name: String,
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RegisterTotalRow {
    pub code: String,
    pub date: String,
    pub payee: String,
    pub account_name: String,
    pub amount: String,
    pub total: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PeriodAmountRow {
    pub period: String,
    pub amount: f64,
}

/// Lazily deserializes rows of type `T` from ledger's output.
pub fn read_rows<R, T>(source: R) -> impl Iterator<Item = Result<T, ReportError>>
where
    R: Read,
    T: for<'de> Deserialize<'de>,
{
    csv::ReaderBuilder::new()
        .has_headers(false)
        .double_quote(false)
        .escape(Some(b'\\'))
        .from_reader(source)
        .into_deserialize::<T>()
        .map(|row| row.map_err(ReportError::from))
}
