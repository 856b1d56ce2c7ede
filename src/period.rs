//! Partition transactions into period files

use crate::core::Transaction;
use chrono::NaiveDate;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Granularity {
    Day,
    Month,
    Year,
}

impl Granularity {
    /// `YYYY-MM-DD`, `YYYY-MM` or `YYYY`
    pub fn period_key(&self, date: NaiveDate) -> String {
        let format = match self {
            Granularity::Day => "%Y-%m-%d",
            Granularity::Month => "%Y-%m",
            Granularity::Year => "%Y",
        };
        date.format(format).to_string()
    }
}

/// Group by period key; within a period, rows are stably sorted by date.
pub fn split_by_period(
    transactions: Vec<Transaction>,
    granularity: Granularity,
) -> BTreeMap<String, Vec<Transaction>> {
    let mut periods: BTreeMap<String, Vec<Transaction>> = BTreeMap::new();
    for txn in transactions {
        periods
            .entry(granularity.period_key(txn.date))
            .or_default()
            .push(txn);
    }
    for txns in periods.values_mut() {
        txns.sort_by_key(|t| t.date);
    }
    periods
}

pub fn period_file_name(period: &str) -> String {
    format!("{period}-transactions.csv")
}
