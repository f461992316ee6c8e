//! Per-period series for charts, built from ledger's `--collapse` register output.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tally_core::Interval;

use crate::error::ReportError;
use crate::ledger::LedgerCli;
use crate::rows::{
    read_rows, PeriodAmountRow, PERIOD_AMOUNT_FORMAT, PERIOD_SIGNED_AMOUNT_FORMAT,
    PERIOD_TOTAL_FORMAT,
};
use crate::shell::Shell;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodIncomeAndExpenses {
    pub period: String,
    pub income: f64,
    pub expenses: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodNetWorth {
    pub period: String,
    pub net_worth: f64,
}

/// Movement within the current period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Differences {
    pub assets: f64,
    pub expenses: f64,
    pub net_worth: f64,
}

impl<S: Shell> LedgerCli<S> {
    /// Income and expenses side by side per period. With `cumulative`, each
    /// value is the running total and a period missing from one side carries
    /// the previous period's value forward.
    pub fn income_vs_expenses_report(
        &self,
        interval: Interval,
        cumulative: bool,
    ) -> Result<Vec<PeriodIncomeAndExpenses>, ReportError> {
        let income = self.period_amounts(interval, cumulative, "^Income")?;
        let expenses = self.period_amounts(interval, cumulative, "^Expenses")?;

        let mut periods: Vec<&String> = income.keys().chain(expenses.keys()).collect();
        periods.sort();
        periods.dedup();

        let mut series: Vec<PeriodIncomeAndExpenses> = Vec::with_capacity(periods.len());
        for period in periods {
            let carried = series
                .last()
                .filter(|_| cumulative)
                .map(|prev| (prev.income, prev.expenses))
                .unwrap_or((0.0, 0.0));

            series.push(PeriodIncomeAndExpenses {
                period: period.clone(),
                income: income.get(period).copied().unwrap_or(carried.0),
                expenses: expenses.get(period).copied().unwrap_or(carried.1),
            });
        }
        Ok(series)
    }

    pub fn cashflow_report(
        &self,
        interval: Interval,
    ) -> Result<Vec<PeriodIncomeAndExpenses>, ReportError> {
        self.income_vs_expenses_report(interval, true)
    }

    /// Running total of assets and liabilities per period.
    pub fn net_worth_report(&self, interval: Interval) -> Result<Vec<PeriodNetWorth>, ReportError> {
        let args = self.graph_command(
            interval,
            &["-J", "--plot-total-format", PERIOD_TOTAL_FORMAT],
            &["^Assets", "^Liabilities"],
        );

        self.run(args, |stdout| {
            read_rows::<_, PeriodAmountRow>(stdout)
                .map(|row| {
                    row.map(|row| PeriodNetWorth {
                        period: row.period,
                        net_worth: row.amount,
                    })
                })
                .collect()
        })
    }

    /// Signed change of assets, expenses and net worth in the current month or week.
    pub fn differences_report(&self, interval: Interval) -> Result<Differences, ReportError> {
        let change = |accounts: &[&str]| -> Result<f64, ReportError> {
            let args = self.graph_command(
                interval,
                &[
                    "-j",
                    "--plot-amount-format",
                    PERIOD_SIGNED_AMOUNT_FORMAT,
                    "--period",
                    interval.current_period(),
                ],
                accounts,
            );
            self.run(args, |stdout| {
                read_rows::<_, PeriodAmountRow>(stdout)
                    .next()
                    .transpose()
                    .map(|row| row.map_or(0.0, |row| row.amount))
            })
        };

        Ok(Differences {
            assets: change(&["^Assets"])?,
            expenses: change(&["^Expenses"])?,
            net_worth: change(&["^Assets", "^Liabilities"])?,
        })
    }

    fn period_amounts(
        &self,
        interval: Interval,
        cumulative: bool,
        account: &str,
    ) -> Result<BTreeMap<String, f64>, ReportError> {
        let args = self.graph_command(
            interval,
            &[
                if cumulative { "-J" } else { "-j" },
                "--plot-amount-format",
                PERIOD_AMOUNT_FORMAT,
                "--plot-total-format",
                PERIOD_TOTAL_FORMAT,
            ],
            &[account],
        );

        self.run(args, |stdout| {
            read_rows::<_, PeriodAmountRow>(stdout)
                .map(|row| row.map(|row| (row.period, row.amount)))
                .collect()
        })
    }

    fn graph_command(&self, interval: Interval, plot: &[&str], accounts: &[&str]) -> Vec<String> {
        let mut args = self.command("register", plot);
        args.extend(
            ["--collapse", "--real", interval.ledger_flag()]
                .iter()
                .chain(accounts)
                .map(|s| s.to_string()),
        );
        args
    }
}
