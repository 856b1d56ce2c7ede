//! Budget definitions and budget-vs-actual aggregation

use crate::core::{format_amount, numbers_as_text, Transaction};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum BudgetError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("unsupported budget format: {0} (expected .csv or .json)")]
    UnsupportedFormat(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Income,
    Expense,
    Fund,
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntryType::Income => "income",
            EntryType::Expense => "expense",
            EntryType::Fund => "fund",
        })
    }
}

/// One line of a budget file. `name` matches transaction categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetEntry {
    #[serde(default)]
    pub period: String,
    #[serde(rename = "type")]
    pub kind: EntryType,
    pub name: String,
    /// Planned amount, or the contribution for a fund
    #[serde(default, deserialize_with = "lenient_decimal", serialize_with = "amount_cell")]
    pub budget: Option<Decimal>,
    /// Fund starting balance
    #[serde(default, deserialize_with = "lenient_decimal", serialize_with = "amount_cell")]
    pub balance: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal", serialize_with = "amount_cell")]
    pub goal: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal", serialize_with = "amount_cell")]
    pub reconcile_amount: Option<Decimal>,
    /// Replaces the actual computed from transactions
    #[serde(default, deserialize_with = "lenient_decimal", serialize_with = "amount_cell")]
    pub override_actual: Option<Decimal>,
    #[serde(default)]
    pub notes: String,
}

impl BudgetEntry {
    pub fn new(period: &str, kind: EntryType, name: &str, budget: Decimal) -> Self {
        BudgetEntry {
            period: period.to_string(),
            kind,
            name: name.to_string(),
            budget: Some(budget),
            balance: None,
            goal: None,
            reconcile_amount: None,
            override_actual: None,
            notes: String::new(),
        }
    }

    /// Applies to `period` when it names no period or the same one
    pub fn in_period(&self, period: &str) -> bool {
        self.period.is_empty() || self.period == period
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Category,
    Fund,
    Summary,
}

/// One row of a budget report, in report CSV column order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub section: Section,
    #[serde(default)]
    pub period: String,
    #[serde(rename = "type", default)]
    pub kind: Option<EntryType>,
    pub name: String,
    #[serde(default, deserialize_with = "lenient_decimal", serialize_with = "amount_cell")]
    pub budget: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal", serialize_with = "amount_cell")]
    pub actual: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal", serialize_with = "amount_cell")]
    pub variance: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal", serialize_with = "amount_cell")]
    pub start_balance: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal", serialize_with = "amount_cell")]
    pub end_balance: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal", serialize_with = "amount_cell")]
    pub goal: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal", serialize_with = "amount_cell")]
    pub reconcile_amount: Option<Decimal>,
    #[serde(default)]
    pub notes: String,
}

impl ReportRow {
    fn summary(name: &str, actual: Decimal) -> Self {
        ReportRow {
            section: Section::Summary,
            period: String::new(),
            kind: None,
            name: name.to_string(),
            budget: None,
            actual: Some(actual),
            variance: None,
            start_balance: None,
            end_balance: None,
            goal: None,
            reconcile_amount: None,
            notes: String::new(),
        }
    }
}

/// Compare budget entries with per-category transaction totals.
///
/// Income actual is the category sum; expense actual is the negated sum, so
/// spending reads positive. A fund ends at start balance + contribution +
/// the sum of its transactions. Summary rows follow the entries.
pub fn aggregate(entries: &[BudgetEntry], transactions: &[Transaction]) -> Vec<ReportRow> {
    let mut totals: HashMap<&str, Decimal> = HashMap::new();
    for txn in transactions {
        let category = txn.category.as_deref().unwrap_or("").trim();
        *totals.entry(category).or_default() += txn.amount;
    }
    let total = |name: &str| totals.get(name.trim()).copied().unwrap_or_default();

    let mut rows = Vec::with_capacity(entries.len() + 6);
    let (mut income, mut expenses) = (Decimal::ZERO, Decimal::ZERO);
    let (mut under, mut over) = (Decimal::ZERO, Decimal::ZERO);

    for entry in entries {
        let budget = entry.budget.unwrap_or_default();
        let mut row = ReportRow {
            section: Section::Category,
            period: entry.period.clone(),
            kind: Some(entry.kind),
            name: entry.name.clone(),
            budget: Some(budget),
            actual: None,
            variance: None,
            start_balance: None,
            end_balance: None,
            goal: entry.goal,
            reconcile_amount: entry.reconcile_amount,
            notes: entry.notes.clone(),
        };

        match entry.kind {
            EntryType::Income | EntryType::Expense => {
                let computed = match entry.kind {
                    EntryType::Expense => -total(&entry.name),
                    _ => total(&entry.name),
                };
                let actual = entry.override_actual.unwrap_or(computed);
                row.actual = Some(actual);
                row.variance = Some(actual - budget);
                if entry.kind == EntryType::Income {
                    income += actual;
                } else {
                    expenses += actual;
                    under += (budget - actual).max(Decimal::ZERO);
                    over += (actual - budget).max(Decimal::ZERO);
                }
            }
            EntryType::Fund => {
                let activity = entry.override_actual.unwrap_or_else(|| total(&entry.name));
                let start = entry.balance.unwrap_or_default();
                row.section = Section::Fund;
                row.actual = Some(activity);
                row.start_balance = Some(start);
                row.end_balance = Some(start + budget + activity);
            }
        }
        rows.push(row);
    }

    rows.extend([
        ReportRow::summary("Income", income),
        ReportRow::summary("Expenses", expenses),
        ReportRow::summary("Cash flow", income - expenses),
        ReportRow::summary("Under budget", under),
        ReportRow::summary("Over budget", over),
        ReportRow::summary("Net variance", under - over),
    ]);
    rows
}

/// Starter budget written by `init budget`
pub fn starter_budget(period: &str) -> Vec<BudgetEntry> {
    let mut fund = BudgetEntry::new(period, EntryType::Fund, "Emergency Fund", dec!(100));
    fund.balance = Some(dec!(1500));
    fund.goal = Some(dec!(2000));
    vec![
        BudgetEntry::new(period, EntryType::Income, "Salary", dec!(3000)),
        BudgetEntry::new(period, EntryType::Expense, "Rent", dec!(1200)),
        fund,
    ]
}

/// Carry a previous report forward: categories keep their budget, funds
/// start from their end balance with no contribution.
pub fn budget_from_report(period: &str, report: &[ReportRow]) -> Vec<BudgetEntry> {
    report
        .iter()
        .filter_map(|row| match row.section {
            Section::Category => Some(BudgetEntry::new(
                period,
                row.kind.unwrap_or(EntryType::Expense),
                &row.name,
                row.budget.unwrap_or_default(),
            )),
            Section::Fund => {
                let mut entry = BudgetEntry::new(period, EntryType::Fund, &row.name, Decimal::ZERO);
                entry.balance = row.end_balance;
                entry.goal = row.goal;
                Some(entry)
            }
            Section::Summary => None,
        })
        .collect()
}

pub fn read_budget(path: &Path) -> Result<Vec<BudgetEntry>, BudgetError> {
    let reader = BufReader::new(File::open(path)?);
    let entries = match extension(path).as_deref() {
        Some("json") => read_budget_json(reader)?,
        Some("csv") => read_budget_csv(reader)?,
        _ => return Err(BudgetError::UnsupportedFormat(path.to_path_buf())),
    };
    log::info!("Read {} budget entries from {}", entries.len(), path.display());
    Ok(entries)
}

/// Numbers are read from their literal text, like CSV cells.
pub fn read_budget_json<R: Read>(reader: R) -> Result<Vec<BudgetEntry>, BudgetError> {
    let mut value: serde_json::Value = serde_json::from_reader(reader)?;
    if let serde_json::Value::Array(items) = &mut value {
        for item in items {
            if let serde_json::Value::Object(fields) = item {
                numbers_as_text(fields);
            }
        }
    }
    Ok(serde_json::from_value(value)?)
}

pub fn read_budget_csv<R: Read>(reader: R) -> Result<Vec<BudgetEntry>, BudgetError> {
    read_csv(reader)
}

pub fn read_report_csv<R: Read>(reader: R) -> Result<Vec<ReportRow>, BudgetError> {
    read_csv(reader)
}

fn read_csv<R: Read, T: serde::de::DeserializeOwned>(reader: R) -> Result<Vec<T>, BudgetError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    Ok(rdr.deserialize().collect::<Result<Vec<T>, _>>()?)
}

pub fn write_budget<W: Write>(entries: &[BudgetEntry], json: bool, mut writer: W) -> Result<(), BudgetError> {
    if json {
        serde_json::to_writer_pretty(&mut writer, entries)?;
        writeln!(writer)?;
    } else {
        crate::utils::write_csv(entries, writer)?;
    }
    Ok(())
}

pub fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
}

fn amount_cell<S: Serializer>(value: &Option<Decimal>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(amount) => serializer.serialize_str(&format_amount(*amount)),
        None => serializer.serialize_str(""),
    }
}

/// Reads the field's text: a numeric string, an empty string or null.
/// JSON numbers reach here as text (see `read_budget_json`).
fn lenient_decimal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Decimal>, D::Error> {
    let Some(text) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .map(Some)
        .map_err(|_| de::Error::custom(format!("'{text}' is not a decimal")))
}
