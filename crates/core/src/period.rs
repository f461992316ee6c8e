use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Bucket size for time-series reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Interval {
    Monthly,
    Weekly,
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interval::Monthly => write!(f, "MONTHLY"),
            Interval::Weekly => write!(f, "WEEKLY"),
        }
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "monthly" => Ok(Interval::Monthly),
            "weekly" => Ok(Interval::Weekly),
            other => Err(format!("Unknown interval: '{other}'")),
        }
    }
}

impl Interval {
    pub fn ledger_flag(self) -> &'static str {
        match self {
            Interval::Monthly => "--monthly",
            Interval::Weekly => "--weekly",
        }
    }

    /// Ledger period expression for the bucket containing today.
    pub fn current_period(self) -> &'static str {
        match self {
            Interval::Monthly => "this month",
            Interval::Weekly => "this week",
        }
    }
}

/// An inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        DateRange { start, end }
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// First through last day of the month containing `today`.
    pub fn current_month(today: NaiveDate) -> Self {
        let start = today.with_day(1).unwrap_or(today);
        let end = start
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .unwrap_or(today);
        DateRange { start, end }
    }

    /// From the Unix epoch up to the first day of the year after `today`.
    pub fn epoch_to(today: NaiveDate) -> Self {
        let start = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or(NaiveDate::MIN);
        let end = NaiveDate::from_ymd_opt(today.year() + 1, 1, 1).unwrap_or(today);
        DateRange { start, end }
    }

    /// Ledger's `--period` expression; ledger treats the end as exclusive,
    /// so one day is added to keep `end` inside the range.
    pub fn ledger_expression(self) -> String {
        let end = self.end.checked_add_days(Days::new(1)).unwrap_or(self.end);
        format!("from {} to {}", self.start, end)
    }
}
