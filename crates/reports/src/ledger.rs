use std::io;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tally_core::{
    build_account_tree, paginate, Account, AccountDetails, Amount, AmountParser, GroupingExt,
    LedgerError, LedgerFilters, NumberFormat, Page, Posting, RegisterRow, Sort, Transaction,
    ROOT_ACCOUNT,
};

use crate::error::ReportError;
use crate::rows::{
    read_rows, BalanceRow, PostingRow, RegisterTotalRow, BALANCE_FORMAT, REGISTER_FORMAT,
    REGISTER_WITH_TOTAL_FORMAT,
};
use crate::shell::{RunningProcess, Shell};

/// Date format ledger prints with `%(date)`.
pub const LEDGER_DATE_FORMAT: &str = "%Y/%m/%d";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub bin_path: String,
    pub file_path: PathBuf,
    pub default_commodity: String,
    #[serde(default)]
    pub number_format: NumberFormat,
}

/// Runs ledger reports and reshapes their output.
pub struct LedgerCli<S: Shell> {
    shell: S,
    config: LedgerConfig,
    amounts: AmountParser,
}

impl<S: Shell> LedgerCli<S> {
    pub fn new(shell: S, config: LedgerConfig) -> Self {
        let amounts = AmountParser::new(config.default_commodity.clone(), config.number_format);
        Self {
            shell,
            config,
            amounts,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn shell(&self) -> &S {
        &self.shell
    }

    /// Transactions matching `filters`, one page of them fully parsed.
    pub fn list_transactions(&self, filters: &LedgerFilters) -> Result<Page<Transaction>, ReportError> {
        tracing::debug!(%filters, "listing transactions");
        let mut args = self.command("register", &["--format", REGISTER_FORMAT]);
        args.extend(filters.to_args());

        self.run(args, |stdout| {
            let transactions = read_rows::<_, PostingRow>(stdout)
                .collect_until_changed(|_, next| matches!(next, Ok(row) if !row.first_posting))
                .map(|group| group.into_iter().collect::<Result<Vec<_>, _>>());

            paginate(
                transactions,
                |postings| touches_any(postings, &filters.accounts),
                |postings| self.parse_transaction(postings),
                filters.pageable.as_ref(),
            )
        })
    }

    /// Account balances as a tree rooted at [`ROOT_ACCOUNT`].
    pub fn balance_report(&self, filters: &LedgerFilters) -> Result<Account, ReportError> {
        tracing::debug!(%filters, "balance report");
        let mut args = self.command("balance", &["--format", BALANCE_FORMAT, "--empty"]);
        args.extend(filters.to_args());

        let accounts = self.run(args, |stdout| {
            read_rows::<_, BalanceRow>(stdout)
                .map(|row| {
                    let row = row?;
                    let full_name = if row.account_name.is_empty() {
                        ROOT_ACCOUNT.to_string()
                    } else {
                        row.account_name
                    };
                    Ok(Account::new(full_name, self.amounts.parse(&row.amount)?))
                })
                .collect::<Result<Vec<_>, ReportError>>()
        })?;

        if accounts.is_empty() {
            return Ok(Account::root(Amount::zero(self.amounts.default_commodity())));
        }
        Ok(build_account_tree(accounts)?)
    }

    /// Register lines, newest first. Adjacent lines for the same date, payee and
    /// account are netted when `combine_adjacent` is set; lines netting to zero
    /// are dropped when `hide_zero` is set.
    pub fn register_report(
        &self,
        filters: &LedgerFilters,
        combine_adjacent: bool,
        hide_zero: bool,
    ) -> Result<Page<RegisterRow>, ReportError> {
        let pageable = filters
            .pageable
            .clone()
            .unwrap_or_default()
            .with_sort(vec![Sort::desc("date")]);

        let mut args = self.command("register", &["--format", REGISTER_WITH_TOTAL_FORMAT]);
        args.extend(filters.with_pageable(Some(pageable)).to_args());

        self.run(args, |stdout| {
            let rows = read_rows::<_, RegisterTotalRow>(stdout)
                .map(|row| row.and_then(|row| self.parse_register_row(row)))
                .collect_until_changed(|prev, next| match (prev, next) {
                    (Ok(prev), Ok(next)) => combine_adjacent && prev.same_entry(next),
                    _ => false,
                })
                .filter_map(|group| match group.into_iter().collect::<Result<Vec<_>, _>>() {
                    Ok(rows) => RegisterRow::combine(rows).map(Ok),
                    Err(e) => Some(Err(e)),
                });

            paginate(
                rows,
                |row| !hide_zero || !row.amount.is_zero(),
                |row| Ok(row),
                filters.pageable.as_ref(),
            )
        })
    }

    /// Every posting under `account_prefix`, uncombined, for classifier training.
    pub fn training_history(&self, account_prefix: &str) -> Result<Vec<RegisterRow>, ReportError> {
        let filters = LedgerFilters {
            accounts: vec![account_prefix.to_string()],
            ..Default::default()
        };
        Ok(self.register_report(&filters, false, false)?.content)
    }

    // ── Plumbing ──────────────────────────────────────────────────────────────

    pub(crate) fn command(&self, report: &str, extra: &[&str]) -> Vec<String> {
        let mut args = vec![
            report.to_string(),
            "-f".to_string(),
            self.config.file_path.to_string_lossy().into_owned(),
        ];
        args.extend(extra.iter().map(|s| s.to_string()));
        args
    }

    /// Spawns ledger, hands its stdout to `consume`, drains whatever is left and
    /// fails unless ledger exits successfully.
    pub(crate) fn run<T, F>(&self, args: Vec<String>, consume: F) -> Result<T, ReportError>
    where
        F: FnOnce(&mut dyn RunningProcess) -> Result<T, ReportError>,
    {
        let mut process = self.shell.spawn(&self.config.bin_path, &args)?;
        let consumed = consume(&mut *process).and_then(|value| {
            io::copy(&mut *process, &mut io::sink())?;
            Ok(value)
        });
        let value = match consumed {
            Ok(value) => value,
            Err(err) => return Err(process.timed_out().map_or(err, ReportError::Timeout)),
        };

        let exit = process.wait()?;
        if !exit.success() {
            tracing::warn!(code = ?exit.code, stderr = %exit.stderr, ?args, "ledger failed");
            return Err(ReportError::ExternalToolFailure {
                code: exit.code,
                stderr: exit.stderr,
            });
        }
        Ok(value)
    }

    fn parse_transaction(&self, postings: Vec<PostingRow>) -> Result<Transaction, ReportError> {
        let first = postings
            .first()
            .ok_or_else(|| io::Error::other("empty posting group"))?;
        let date = parse_date(&first.date)?;
        let payee = first.payee.clone();

        let postings = postings
            .into_iter()
            .map(|row| {
                let amount = self.amounts.parse(&row.amount)?;
                Ok(Posting::new(row.account_name, amount))
            })
            .collect::<Result<Vec<_>, LedgerError>>()?;

        Ok(Transaction {
            date,
            payee,
            postings,
        })
    }

    fn parse_register_row(&self, row: RegisterTotalRow) -> Result<RegisterRow, ReportError> {
        Ok(RegisterRow {
            date: parse_date(&row.date)?,
            payee: row.payee,
            account: AccountDetails::new(row.account_name),
            amount: self.amounts.parse(&row.amount)?,
            total: self.amounts.parse(&row.total)?,
        })
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, LedgerError> {
    NaiveDate::parse_from_str(s.trim(), LEDGER_DATE_FORMAT)
        .map_err(|_| LedgerError::MalformedDate(s.to_string()))
}

fn touches_any(postings: &[PostingRow], prefixes: &[String]) -> bool {
    prefixes.is_empty()
        || postings
            .iter()
            .any(|p| prefixes.iter().any(|prefix| p.account_name.starts_with(prefix.as_str())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::MockShell;
    use tally_core::Pageable;

    fn cli(shell: MockShell) -> LedgerCli<MockShell> {
        LedgerCli::new(
            shell,
            LedgerConfig {
                bin_path: "ledger".to_string(),
                file_path: PathBuf::from("/books/main.ledger"),
                default_commodity: "INR".to_string(),
                number_format: NumberFormat::default(),
            },
        )
    }

    fn posting_lines(n: usize) -> String {
        (0..n)
            .map(|i| {
                format!(
                    "true,\"2024/01/{day:02}\",\"Payee {i}\",\"Expenses:Food\",\"INR {i}.00\"\n\
                     false,\"2024/01/{day:02}\",\"Payee {i}\",\"Assets:Cash\",\"INR -{i}.00\"\n",
                    day = i % 28 + 1
                )
            })
            .collect()
    }

    #[test]
    fn list_transactions_pages_and_counts() {
        let ledger = cli(MockShell::new(posting_lines(25)));
        let filters = LedgerFilters {
            pageable: Some(Pageable::new(2, 5)),
            ..Default::default()
        };

        let page = ledger.list_transactions(&filters).unwrap();

        assert_eq!(page.total, 25);
        assert_eq!(page.content.len(), 5);
        assert_eq!(page.content[0].payee, "Payee 10");
        assert_eq!(page.content[4].payee, "Payee 14");
        let tx = &page.content[0];
        assert_eq!(tx.date, NaiveDate::from_ymd_opt(2024, 1, 11).unwrap());
        assert_eq!(tx.postings.len(), 2);
        assert_eq!(tx.postings[1].account.full_name, "Assets:Cash");
        assert_eq!(tx.net_value(), 0.0);
    }

    #[test]
    fn list_transactions_filters_on_any_posting_account() {
        let data = "true,\"2024/01/01\",\"Shop\",\"Expenses:Food\",\"INR 5\"\n\
                    false,\"2024/01/01\",\"Shop\",\"Assets:Cash\",\"INR -5\"\n\
                    true,\"2024/01/02\",\"Salary\",\"Assets:Bank\",\"INR 100\"\n\
                    false,\"2024/01/02\",\"Salary\",\"Income:Job\",\"INR -100\"\n\
                    true,\"2024/01/03\",\"Rent\",\"Expenses:Rent\",\"INR 50\"\n\
                    false,\"2024/01/03\",\"Rent\",\"Assets:Bank\",\"INR -50\"\n";
        let ledger = cli(MockShell::new(data));
        let filters = LedgerFilters {
            accounts: vec!["Assets:Bank".to_string()],
            ..Default::default()
        };

        let page = ledger.list_transactions(&filters).unwrap();

        let payees: Vec<&str> = page.content.iter().map(|t| t.payee.as_str()).collect();
        assert_eq!(payees, ["Salary", "Rent"]);
        assert_eq!(page.total, 2);
    }

    #[test]
    fn list_transactions_passes_filters_as_arguments() {
        let shell = MockShell::new("");
        let ledger = cli(shell);
        let filters = LedgerFilters {
            real: true,
            payees: vec!["Cafe".to_string()],
            ..Default::default()
        };
        ledger.list_transactions(&filters).unwrap();

        let call = &ledger.shell.calls()[0];
        assert_eq!(call[0], "ledger");
        assert_eq!(call[1..4], ["register", "-f", "/books/main.ledger"]);
        assert_eq!(call[4], "--format");
        assert_eq!(call[5], REGISTER_FORMAT);
        assert_eq!(call[6..], ["--real", "@Cafe"]);
    }

    #[test]
    fn balance_report_builds_tree() {
        let data = "\"Expenses\",\"INR 10.00\"\n\
                    \"Expenses:Food\",\"INR 10.00\"\n\
                    \"\",\"0\"\n";
        let ledger = cli(MockShell::new(data));

        let root = ledger.balance_report(&LedgerFilters::default()).unwrap();

        assert_eq!(root.full_name, ROOT_ACCOUNT);
        assert_eq!(root.balance, Amount::new("INR", 0.0));
        let food = &root.children[0].children[0];
        assert_eq!(food.name, "Food");
        assert_eq!(food.full_name, "Expenses:Food");
        assert_eq!(food.balance.value, 10.0);
        assert!(ledger.shell.calls()[0].contains(&"--empty".to_string()));
    }

    #[test]
    fn empty_balance_is_zero_root() {
        let ledger = cli(MockShell::new(""));
        let root = ledger.balance_report(&LedgerFilters::default()).unwrap();
        assert_eq!(root, Account::root(Amount::zero("INR")));
    }

    #[test]
    fn balance_without_total_line_has_no_root() {
        let ledger = cli(MockShell::new("\"Expenses\",\"INR 10.00\"\n"));
        let result = ledger.balance_report(&LedgerFilters::default());
        assert!(matches!(result, Err(ReportError::Ledger(LedgerError::RootNotFound))));
    }

    #[test]
    fn non_zero_exit_is_external_tool_failure() {
        let ledger = cli(MockShell::failing("\"\",\"0\"\n", 1));
        let result = ledger.balance_report(&LedgerFilters::default());
        assert!(matches!(
            result,
            Err(ReportError::ExternalToolFailure { code: Some(1), .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn hung_ledger_times_out_while_output_is_read() {
        use crate::shell::LocalShell;
        use std::io::Read;
        use std::time::{Duration, Instant};

        let limit = Duration::from_millis(200);
        let ledger = LedgerCli::new(
            LocalShell::new(limit),
            LedgerConfig {
                bin_path: "sleep".to_string(),
                file_path: PathBuf::from("unused"),
                default_commodity: "INR".to_string(),
                number_format: NumberFormat::default(),
            },
        );

        let started = Instant::now();
        let result = ledger.run(vec!["5".to_string()], |stdout| {
            let mut out = String::new();
            stdout.read_to_string(&mut out)?;
            Ok(out)
        });

        assert!(matches!(result, Err(ReportError::Timeout(d)) if d == limit));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn malformed_amount_aborts_the_page() {
        let data = format!(
            "{}true,\"2024/02/01\",\"Bad\",\"Expenses:Food\",\"lots\"\n",
            posting_lines(3)
        );
        let ledger = cli(MockShell::new(data));
        let result = ledger.list_transactions(&LedgerFilters::default());
        assert!(matches!(
            result,
            Err(ReportError::Ledger(LedgerError::MalformedAmount(ref s))) if s == "lots"
        ));
    }

    fn register_line(date: &str, payee: &str, account: &str, amount: &str, total: &str) -> String {
        format!("\"\",\"{date}\",\"{payee}\",\"{account}\",\"{amount}\",\"{total}\"\n")
    }

    #[test]
    fn register_report_combines_adjacent_and_hides_zero() {
        let data = [
            register_line("2024/01/03", "Cafe", "Expenses:Food", "INR 3", "INR 3"),
            register_line("2024/01/03", "Cafe", "Expenses:Food", "INR 2", "INR 5"),
            register_line("2024/01/02", "Refund", "Expenses:Food", "INR 4", "INR 9"),
            register_line("2024/01/02", "Refund", "Expenses:Food", "INR -4", "INR 5"),
            register_line("2024/01/01", "Market", "Expenses:Food", "INR 1", "INR 6"),
        ]
        .concat();
        let ledger = cli(MockShell::new(data));

        let page = ledger
            .register_report(&LedgerFilters::default(), true, true)
            .unwrap();

        let summary: Vec<(&str, f64)> = page
            .content
            .iter()
            .map(|r| (r.payee.as_str(), r.amount.value))
            .collect();
        assert_eq!(summary, [("Cafe", 5.0), ("Market", 1.0)]);
        assert_eq!(page.total, 2);
        assert_eq!(page.content[0].total.value, 5.0);

        let call = &ledger.shell.calls()[0];
        let sort = call.iter().position(|a| a == "--sort").unwrap();
        assert_eq!(call[sort + 1], "-date");
    }

    #[test]
    fn register_report_without_combining_keeps_every_row() {
        let data = [
            register_line("2024/01/03", "Cafe", "Expenses:Food", "INR 3", "INR 3"),
            register_line("2024/01/03", "Cafe", "Expenses:Food", "INR 2", "INR 5"),
            register_line("2024/01/01", "Market", "Expenses:Food", "INR 0", "INR 5"),
        ]
        .concat();
        let ledger = cli(MockShell::new(data));

        let page = ledger
            .register_report(&LedgerFilters::default(), false, false)
            .unwrap();

        assert_eq!(page.total, 3);
        assert_eq!(page.content.last().map(|r| r.payee.as_str()), Some("Market"));
    }

    #[test]
    fn register_report_pages_after_combining() {
        let data: String = (0..12)
            .map(|i| register_line("2024/01/01", &format!("P{i}"), "Expenses:Food", "INR 1", "INR 1"))
            .collect();
        let ledger = cli(MockShell::new(data));
        let filters = LedgerFilters {
            pageable: Some(Pageable::new(1, 5)),
            ..Default::default()
        };

        let page = ledger.register_report(&filters, true, true).unwrap();

        assert_eq!(page.total, 12);
        assert_eq!(page.content.first().map(|r| r.payee.as_str()), Some("P5"));
        assert_eq!(page.pageable, Some(Pageable::new(1, 5)));
    }

    #[test]
    fn malformed_date_is_reported() {
        let data = register_line("15-01-2024", "Cafe", "Expenses:Food", "INR 3", "INR 3");
        let ledger = cli(MockShell::new(data));
        let result = ledger.register_report(&LedgerFilters::default(), true, true);
        assert!(matches!(result, Err(ReportError::Ledger(LedgerError::MalformedDate(_)))));
    }

    #[test]
    fn training_history_targets_prefix() {
        let data = register_line("2024/01/03", "Cafe", "Expenses:Food", "INR 3", "INR 3");
        let ledger = cli(MockShell::new(data));
        let rows = ledger.training_history("^Expenses").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(ledger.shell.calls()[0].last().map(String::as_str), Some("^Expenses"));
    }
}
