//! Report command - budget vs. actual

use crate::budget::{self, ReportRow, Section};
use crate::cmd::read_transactions;
use crate::core::{format_amount, DATE_FORMAT};
use crate::utils;
use anyhow::Context;
use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use std::path::PathBuf;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Args, Debug)]
pub struct ReportCommand {
    /// Budget file (.json or .csv)
    #[arg(long)]
    budget: PathBuf,

    /// Canonical transaction files
    #[arg(long, required = true, num_args = 1..)]
    transactions: Vec<PathBuf>,

    /// Only transactions whose date starts with this prefix (e.g. 2025-05),
    /// and budget entries for that period or none
    #[arg(long)]
    period: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Txt)]
    format: ReportFormat,

    /// Output file ("-" for stdout)
    #[arg(short, long, default_value = "-")]
    output: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Tables
    Txt,
    /// One row per entry plus summary rows
    Csv,
}

impl ReportCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let mut entries = budget::read_budget(&self.budget)
            .with_context(|| format!("reading budget {}", self.budget.display()))?;
        let mut transactions = read_transactions(&self.transactions)?;

        if let Some(period) = &self.period {
            entries.retain(|e| e.in_period(period));
            transactions.retain(|t| t.date.format(DATE_FORMAT).to_string().starts_with(period.as_str()));
        }

        let rows = budget::aggregate(&entries, &transactions);
        utils::write_output(&self.output, |out| {
            match self.format {
                ReportFormat::Csv => utils::write_csv(&rows, out)?,
                ReportFormat::Txt => write!(out, "{}", render_text(&rows, self.period.as_deref()))?,
            }
            Ok(())
        })
    }
}

#[derive(Debug, Clone, Tabled)]
struct CategoryRow {
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Category")]
    name: String,
    #[tabled(rename = "Budget")]
    budget: String,
    #[tabled(rename = "Actual")]
    actual: String,
    #[tabled(rename = "Variance")]
    variance: String,
}

#[derive(Debug, Clone, Tabled)]
struct FundRow {
    #[tabled(rename = "Fund")]
    name: String,
    #[tabled(rename = "Start")]
    start: String,
    #[tabled(rename = "Contribution")]
    contribution: String,
    #[tabled(rename = "Activity")]
    activity: String,
    #[tabled(rename = "End")]
    end: String,
    #[tabled(rename = "Goal")]
    goal: String,
    #[tabled(rename = "Reconcile")]
    reconcile: String,
}

#[derive(Debug, Clone, Tabled)]
struct SummaryRow {
    #[tabled(rename = "Summary")]
    name: String,
    #[tabled(rename = "Amount")]
    amount: String,
}

fn amount(value: Option<Decimal>) -> String {
    value.map(format_amount).unwrap_or_default()
}

fn table<T: Tabled>(rows: Vec<T>) -> String {
    Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
        .to_string()
}

pub fn render_text(rows: &[ReportRow], period: Option<&str>) -> String {
    let in_section = |section: Section| rows.iter().filter(move |r| r.section == section);

    let categories: Vec<CategoryRow> = in_section(Section::Category)
        .map(|r| CategoryRow {
            kind: r.kind.map(|k| k.to_string()).unwrap_or_default(),
            name: r.name.clone(),
            budget: amount(r.budget),
            actual: amount(r.actual),
            variance: amount(r.variance),
        })
        .collect();
    let funds: Vec<FundRow> = in_section(Section::Fund)
        .map(|r| FundRow {
            name: r.name.clone(),
            start: amount(r.start_balance),
            contribution: amount(r.budget),
            activity: amount(r.actual),
            end: amount(r.end_balance),
            goal: amount(r.goal),
            reconcile: amount(r.reconcile_amount),
        })
        .collect();
    let summary: Vec<SummaryRow> = in_section(Section::Summary)
        .map(|r| SummaryRow {
            name: r.name.clone(),
            amount: amount(r.actual),
        })
        .collect();

    let mut text = format!("BUDGET REPORT ({})\n\n", period.unwrap_or("all periods"));
    if !categories.is_empty() {
        text.push_str(&table(categories));
        text.push_str("\n\n");
    }
    if !funds.is_empty() {
        text.push_str(&table(funds));
        text.push_str("\n\n");
    }
    text.push_str(&table(summary));
    text.push('\n');
    text
}
