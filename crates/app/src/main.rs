use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tally_core::Interval;
use tally_import::{BayesClassifier, FileModelStore};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{print_json, GraphKind, ReportArgs, RulesCommand};
use config::Config;

#[derive(Parser, Debug)]
#[command(name = "tally", version, about = "Reports, text capture and auto-categorization for a ledger journal")]
struct Cli {
    /// Config file (default: $TALLY_CONFIG, then the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `tally_reports=trace` (default: $RUST_LOG, then `info`)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Account balances as a tree
    Balance(ReportArgs),
    /// Postings, newest first
    Register {
        #[command(flatten)]
        report: ReportArgs,
        /// Keep adjacent postings to the same account separate
        #[arg(long)]
        no_combine: bool,
        /// Keep postings that net to zero
        #[arg(long)]
        show_zero: bool,
    },
    /// Whole transactions with all their postings
    Transactions(ReportArgs),
    /// Per-period series for charts
    Graph {
        #[arg(value_enum)]
        kind: GraphKind,
        #[arg(long, default_value = "monthly")]
        interval: Interval,
    },
    /// Record a transaction described by free-form text, e.g. a bank SMS
    Add { text: String },
    /// Rebuild the categorization model from the expense history
    Retrain,
    /// Manage the rules used by `add`
    Rules {
        #[command(subcommand)]
        action: RulesCommand,
    },
}

fn init_tracing(level: Option<&str>) {
    // stdout carries the JSON output.
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    let config = Config::load(cli.config.as_deref())?;
    let today = chrono::Local::now().date_naive();

    match cli.command {
        Command::Balance(report) => {
            print_json(&commands::ledger(&config).balance_report(&report.filters(today))?)
        }
        Command::Register {
            report,
            no_combine,
            show_zero,
        } => print_json(&commands::ledger(&config).register_report(
            &report.filters(today),
            !no_combine,
            !show_zero,
        )?),
        Command::Transactions(report) => {
            print_json(&commands::ledger(&config).list_transactions(&report.filters(today))?)
        }
        Command::Graph { kind, interval } => {
            print_json(&commands::graph(&commands::ledger(&config), kind, interval)?)
        }
        Command::Add { text } => {
            let pool = tally_storage::create_db(&config.rules_db_path()).await?;
            let classifier = BayesClassifier::new(FileModelStore::new(config.model_path()));
            match commands::add(&pool, &classifier, &config, &text, today).await? {
                Some(tx) => print_json(&tx),
                None => bail!("no rule matched the text"),
            }
        }
        Command::Retrain => {
            let classifier = BayesClassifier::new(FileModelStore::new(config.model_path()));
            let summary = commands::retrain(
                &commands::ledger(&config),
                &classifier,
                &config.ledger.accounts.uncategorized,
            )?;
            print_json(&summary)
        }
        Command::Rules { action } => {
            let pool = tally_storage::create_db(&config.rules_db_path()).await?;
            print_json(&commands::rules(&pool, action).await?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_graph_subcommand() {
        let cli = Cli::try_parse_from(["tally", "graph", "net-worth", "--interval", "weekly"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Graph {
                kind: GraphKind::NetWorth,
                interval: Interval::Weekly
            }
        ));
    }

    #[test]
    fn parses_register_flags() {
        let cli = Cli::try_parse_from([
            "tally",
            "register",
            "--account",
            "Expenses",
            "--sort",
            "-date",
            "--show-zero",
        ])
        .unwrap();
        match cli.command {
            Command::Register {
                report,
                no_combine,
                show_zero,
            } => {
                assert_eq!(report.accounts, ["Expenses"]);
                assert!(!no_combine);
                assert!(show_zero);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parses_rule_add() {
        let cli = Cli::try_parse_from([
            "tally",
            "rules",
            "add",
            "coffee",
            "STARBUCKS (.*)",
            "--amount",
            "$1",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Rules {
                action: RulesCommand::Add { .. }
            }
        ));
    }
}
