//! List command - filtered transaction listing with optional suggestions

use crate::cmd::read_transactions;
use crate::config::Config;
use crate::core::{format_amount, write_transactions_csv, HistoryIndex, Transaction, DATE_FORMAT};
use crate::filter::{matches_all, Filter};
use crate::utils;
use clap::Args;
use std::io;
use std::path::PathBuf;
use tabled::{
    settings::{object::Columns, Alignment, Modify, Style},
    Table, Tabled,
};

/// Suggestions shown per transaction in the listing
const LISTED_SUGGESTIONS: usize = 3;

#[derive(Args, Debug)]
pub struct ListCommand {
    /// Canonical transaction files ("-" for stdin)
    #[arg(default_value = "-")]
    inputs: Vec<PathBuf>,

    /// Filter expression, e.g. `amount<-50`, `desc~coffee`, `date>=2025-01-01`. Repeatable.
    #[arg(short, long = "filter")]
    filters: Vec<Filter>,

    /// Only show uncategorized transactions
    #[arg(long)]
    uncategorized: bool,

    /// Show category suggestions (history from --categorized)
    #[arg(long)]
    suggest: bool,

    /// Categorized transaction files used as suggestion history
    #[arg(long, num_args = 1.., requires = "suggest")]
    categorized: Vec<PathBuf>,

    /// Output as CSV instead of a table
    #[arg(long)]
    csv: bool,
}

impl ListCommand {
    pub fn exec(&self, config: &Config) -> anyhow::Result<()> {
        let transactions: Vec<Transaction> = read_transactions(&self.inputs)?
            .into_iter()
            .filter(|t| !(self.uncategorized && t.is_categorized()))
            .filter(|t| matches_all(&self.filters, t))
            .collect();

        let index = if self.suggest {
            let history = read_transactions(&self.categorized)?;
            Some(config.suggestions.suggester().index(&history))
        } else {
            None
        };

        if self.csv && index.is_none() {
            write_transactions_csv(&transactions, io::stdout())?;
            return Ok(());
        }

        let rows = build_rows(&transactions, index.as_ref());
        if self.csv {
            utils::write_csv(&rows, io::stdout())?;
        } else {
            print_table(&rows);
        }
        Ok(())
    }
}

fn print_table(rows: &[ListRow]) {
    if rows.is_empty() {
        println!("No transactions found matching filters");
        return;
    }
    println!("{}", render_table(rows));
    println!("{} transactions", rows.len());
}

fn render_table(rows: &[ListRow]) -> String {
    Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::one(3)).with(Alignment::right()))
        .to_string()
}

/// Row for the list table output
#[derive(Debug, Clone, Tabled, serde::Serialize)]
pub struct ListRow {
    #[tabled(rename = "ID")]
    pub id: String,

    #[tabled(rename = "Date")]
    pub date: String,

    #[tabled(rename = "Description")]
    pub description: String,

    #[tabled(rename = "Amount")]
    pub amount: String,

    #[tabled(rename = "Account")]
    pub account: String,

    #[tabled(rename = "Category")]
    pub category: String,

    #[tabled(rename = "Suggestions")]
    pub suggestions: String,
}

fn build_rows(transactions: &[Transaction], index: Option<&HistoryIndex>) -> Vec<ListRow> {
    transactions
        .iter()
        .map(|txn| ListRow {
            id: txn.id.clone(),
            date: txn.date.format(DATE_FORMAT).to_string(),
            description: txn.description.clone(),
            amount: format_amount(txn.amount),
            account: txn.account.clone(),
            category: txn.category.clone().unwrap_or_default(),
            suggestions: index
                .filter(|_| !txn.is_categorized())
                .map(|index| {
                    index
                        .suggest(&txn.description)
                        .iter()
                        .take(LISTED_SUGGESTIONS)
                        .map(|s| format!("{} ({:.2})", s.category, s.score))
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .unwrap_or_default(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{parse_date, Suggester};
    use rust_decimal_macros::dec;

    #[test]
    fn rows_show_suggestions_for_uncategorized_only() {
        let txn = |id: &str, desc: &str, cat: Option<&str>| Transaction {
            id: id.to_string(),
            date: parse_date("2025-01-10").unwrap(),
            description: desc.to_string(),
            amount: dec!(-3),
            account: "Checking".to_string(),
            category: cat.map(str::to_string),
            note: None,
        };
        let history = vec![txn("h1", "BLUE BOTTLE COFFEE", Some("Coffee"))];
        let index = Suggester::default().index(&history);
        let rows = build_rows(
            &[txn("a", "BLUE BOTTLE #9", None), txn("b", "BLUE BOTTLE", Some("Treats"))],
            Some(&index),
        );
        assert_eq!(rows[0].suggestions, "Coffee (1.00)");
        assert_eq!(rows[0].amount, "-3.00");
        assert_eq!(rows[1].suggestions, "");
        assert_eq!(rows[1].category, "Treats");
    }

    #[test]
    fn table_right_aligns_amounts() {
        let row = ListRow {
            id: "a1".to_string(),
            date: "2025-01-10".to_string(),
            description: "COFFEE".to_string(),
            amount: "-3.00".to_string(),
            account: "Checking".to_string(),
            category: String::new(),
            suggestions: String::new(),
        };
        let table = render_table(&[row]);
        assert!(table.contains("│  -3.00 │"), "{table}");
        assert!(table.contains("│ COFFEE      │"), "{table}");
    }
}
