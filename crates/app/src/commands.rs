use std::collections::BTreeSet;
use std::io::{self, Write};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::Value;
use tally_core::{
    Captures, DateRange, Interval, LedgerFilters, Pageable, Sort, Transaction, TransactionRegex,
    DEFAULT_PAGE_SIZE,
};
use tally_import::{
    BayesClassifier, ModelStore, RegexExtractor, TransactionClassifier, TransactionIngestor,
};
use tally_reports::{LedgerCli, LocalShell, Shell};
use tally_storage::DbPool;

use crate::config::Config;

/// Account prefix whose postings the classifier learns from.
pub const TRAINING_PREFIX: &str = "^Expenses";

#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    /// Account prefix to include (repeatable)
    #[arg(long = "account")]
    pub accounts: Vec<String>,

    /// Payee to include (repeatable)
    #[arg(long = "payee")]
    pub payees: Vec<String>,

    /// Only real postings
    #[arg(long)]
    pub real: bool,

    /// First day, inclusive (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Last day, inclusive (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<NaiveDate>,

    /// Restrict to the current calendar month
    #[arg(long, conflicts_with_all = ["from", "to"])]
    pub this_month: bool,

    #[arg(long, default_value_t = 0)]
    pub page: usize,

    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub size: usize,

    /// Sort key such as `date`, `-date` or `payee,desc` (repeatable)
    #[arg(long = "sort", allow_hyphen_values = true)]
    pub sort: Vec<Sort>,
}

impl ReportArgs {
    /// The query these flags describe. A missing `--from` means the epoch and a
    /// missing `--to` means `today`; with neither, no period is applied.
    pub fn filters(&self, today: NaiveDate) -> LedgerFilters {
        let period = if self.this_month {
            Some(DateRange::current_month(today))
        } else {
            (self.from.is_some() || self.to.is_some()).then(|| {
                let epoch = DateRange::epoch_to(today).start;
                DateRange::new(self.from.unwrap_or(epoch), self.to.unwrap_or(today))
            })
        };

        LedgerFilters {
            accounts: self.accounts.clone(),
            payees: self.payees.clone(),
            real: self.real,
            period,
            pageable: Some(Pageable::new(self.page, self.size).with_sort(self.sort.clone())),
            interval: None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum GraphKind {
    IncomeExpenses,
    Cashflow,
    NetWorth,
    Differences,
}

#[derive(Args, Debug, Clone, Default)]
pub struct CaptureArgs {
    /// Template for the destination account, e.g. `Expenses:$1`
    #[arg(long)]
    pub account_to: Option<String>,
    #[arg(long)]
    pub account_from: Option<String>,
    #[arg(long)]
    pub payee: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    pub amount: Option<String>,
    #[arg(long)]
    pub commodity: Option<String>,
}

impl From<CaptureArgs> for Captures {
    fn from(args: CaptureArgs) -> Self {
        Captures {
            account_to: args.account_to,
            account_from: args.account_from,
            payee: args.payee,
            amount: args.amount,
            commodity: args.commodity,
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum RulesCommand {
    /// List rules in the order they are tried
    List,
    Show { id: i64 },
    Add {
        name: String,
        pattern: String,
        #[command(flatten)]
        captures: CaptureArgs,
    },
    Update {
        id: i64,
        name: String,
        pattern: String,
        #[command(flatten)]
        captures: CaptureArgs,
    },
    Delete { id: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetrainSummary {
    pub trained: bool,
    pub rows: usize,
    pub accounts: usize,
}

pub fn ledger(config: &Config) -> LedgerCli<LocalShell> {
    LedgerCli::new(LocalShell::new(config.timeout()), config.ledger_config())
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let mut out = io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

pub fn graph<S: Shell>(ledger: &LedgerCli<S>, kind: GraphKind, interval: Interval) -> Result<Value> {
    let value = match kind {
        GraphKind::IncomeExpenses => {
            serde_json::to_value(ledger.income_vs_expenses_report(interval, false)?)?
        }
        GraphKind::Cashflow => serde_json::to_value(ledger.cashflow_report(interval)?)?,
        GraphKind::NetWorth => serde_json::to_value(ledger.net_worth_report(interval)?)?,
        GraphKind::Differences => serde_json::to_value(ledger.differences_report(interval)?)?,
    };
    Ok(value)
}

/// Rebuilds the classifier from the expense history. Every account seen there
/// except the uncategorized one becomes a label.
pub fn retrain<S: Shell, M: ModelStore>(
    ledger: &LedgerCli<S>,
    classifier: &BayesClassifier<M>,
    uncategorized: &str,
) -> Result<RetrainSummary> {
    let history = ledger
        .training_history(TRAINING_PREFIX)
        .context("failed to read expense history")?;
    let accounts: BTreeSet<String> = history
        .iter()
        .map(|row| row.account.full_name.clone())
        .filter(|account| account != uncategorized)
        .collect();

    let trained = classifier.retrain(&history, &accounts)?;
    if !trained {
        tracing::warn!("no categorized expenses to learn from");
    }

    Ok(RetrainSummary {
        trained,
        rows: history.len(),
        accounts: accounts.len(),
    })
}

/// Turns `text` into a transaction with the stored rules, classifies it and
/// appends it to the journal. `None` when no rule matches.
pub async fn add<C: TransactionClassifier>(
    pool: &DbPool,
    classifier: &C,
    config: &Config,
    text: &str,
    today: NaiveDate,
) -> Result<Option<Transaction>> {
    let rules = tally_storage::list_rules(pool).await?;
    let extractor = RegexExtractor::new(rules, config.extraction_defaults());
    let ingestor =
        TransactionIngestor::new(&extractor, classifier, config.ledger.accounts.uncategorized.as_str());

    let Some(tx) = ingestor.ingest(text, today)? else {
        return Ok(None);
    };

    tally_storage::append_transaction(&config.ledger.file_path, &tx)
        .await
        .with_context(|| format!("failed to append to {}", config.ledger.file_path.display()))?;
    Ok(Some(tx))
}

pub async fn rules(pool: &DbPool, command: RulesCommand) -> Result<Value> {
    let value = match command {
        RulesCommand::List => serde_json::to_value(tally_storage::list_rules(pool).await?)?,
        RulesCommand::Show { id } => match tally_storage::get_rule(pool, id).await? {
            Some(rule) => serde_json::to_value(rule)?,
            None => bail!("no rule with id {id}"),
        },
        RulesCommand::Add {
            name,
            pattern,
            captures,
        } => {
            validate_pattern(&pattern)?;
            let mut rule = TransactionRegex::new(name, pattern, captures.into());
            rule.id = tally_storage::insert_rule(pool, &rule).await?;
            tracing::info!(id = rule.id, name = %rule.name, "rule added");
            serde_json::to_value(rule)?
        }
        RulesCommand::Update {
            id,
            name,
            pattern,
            captures,
        } => {
            validate_pattern(&pattern)?;
            let mut rule = TransactionRegex::new(name, pattern, captures.into());
            rule.id = id;
            if !tally_storage::update_rule(pool, &rule).await? {
                bail!("no rule with id {id}");
            }
            serde_json::to_value(rule)?
        }
        RulesCommand::Delete { id } => match tally_storage::delete_rule(pool, id).await? {
            Some(rule) => serde_json::to_value(rule)?,
            None => bail!("no rule with id {id}"),
        },
    };
    Ok(value)
}

fn validate_pattern(pattern: &str) -> Result<()> {
    regex::Regex::new(pattern).with_context(|| format!("invalid pattern {pattern:?}"))?;
    Ok(())
}
