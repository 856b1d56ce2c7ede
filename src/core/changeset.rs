use super::transaction::{
    format_amount, parse_amount, parse_date, CsvField, Transaction, DATE_FORMAT,
};
use super::validation::ValidationError;
use budgetc_derive::CsvSchema;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum ChangesetError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("JSON changeset must be an array of objects")]
    NotAnArray,
    #[error("unsupported changeset format: {0} (expected .csv or .json)")]
    UnsupportedFormat(PathBuf),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Add,
    Update,
    Delete,
    Split,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Add => "add",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
            ChangeKind::Split => "split",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "add" => Ok(ChangeKind::Add),
            "update" => Ok(ChangeKind::Update),
            "delete" => Ok(ChangeKind::Delete),
            "split" => Ok(ChangeKind::Split),
            "" => Err("missing change type".to_string()),
            other => Err(format!("unknown change type: '{other}'")),
        }
    }
}

/// Partial field set carried by `update` and `split` records.
///
/// `None` means the field is absent and left untouched. For `category` and
/// `note`, `Some("")` clears the field; the other fields cannot be cleared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionPatch {
    pub date: Option<NaiveDate>,
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    pub account: Option<String>,
    pub category: Option<String>,
    pub note: Option<String>,
}

impl TransactionPatch {
    pub fn category(category: impl Into<String>) -> Self {
        TransactionPatch {
            category: Some(category.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &TransactionPatch::default()
    }

    /// Overwrite every present field on `txn`. The id is never touched.
    pub fn apply_to(&self, txn: &mut Transaction) {
        if let Some(date) = self.date {
            txn.date = date;
        }
        if let Some(description) = &self.description {
            txn.description = description.clone();
        }
        if let Some(amount) = self.amount {
            txn.amount = amount;
        }
        if let Some(account) = &self.account {
            txn.account = account.clone();
        }
        if let Some(category) = &self.category {
            txn.category = Some(category.clone()).filter(|c| !c.is_empty());
        }
        if let Some(note) = &self.note {
            txn.note = Some(note.clone()).filter(|n| !n.is_empty());
        }
    }

    fn into_new_transaction(self) -> Result<NewTransaction, ValidationError> {
        let missing: Vec<&str> = [
            ("date", self.date.is_none()),
            ("description", self.description.is_none()),
            ("amount", self.amount.is_none()),
            ("account", self.account.is_none()),
        ]
        .iter()
        .filter(|(_, absent)| *absent)
        .map(|(name, _)| *name)
        .collect();

        match (self.date, self.description, self.amount, self.account) {
            (Some(date), Some(description), Some(amount), Some(account)) => Ok(NewTransaction {
                date,
                description,
                amount,
                account,
                category: self.category.filter(|c| !c.is_empty()),
                note: self.note.filter(|n| !n.is_empty()),
            }),
            _ => Err(ValidationError::new(format!(
                "add requires date, description, amount and account (missing: {})",
                missing.join(", ")
            ))),
        }
    }
}

/// Full field set for a transaction that has no id yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub date: NaiveDate,
    pub description: String,
    pub amount: Decimal,
    pub account: String,
    pub category: Option<String>,
    pub note: Option<String>,
}

impl NewTransaction {
    pub fn identity_key(&self) -> String {
        super::transaction::identity_key(self.date, &self.description, self.amount, &self.account)
    }

    pub fn into_transaction(self, id: String) -> Transaction {
        Transaction {
            id,
            date: self.date,
            description: self.description,
            amount: self.amount,
            account: self.account,
            category: self.category,
            note: self.note,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeRecord {
    /// Append a new transaction; the id is minted unless supplied
    Add {
        id: Option<String>,
        transaction: NewTransaction,
    },
    /// Overwrite the present fields of an existing transaction
    Update { id: String, patch: TransactionPatch },
    /// Remove an existing transaction
    Delete { id: String },
    /// Replace one transaction by two or more, in its position.
    /// Fields absent from a part are inherited from the source.
    Split {
        id: String,
        parts: Vec<TransactionPatch>,
    },
}

/// Ordered change records read from one file
pub type ChangeSet = Vec<ChangeRecord>;

impl ChangeRecord {
    pub fn set_category(id: impl Into<String>, category: impl Into<String>) -> Self {
        ChangeRecord::Update {
            id: id.into(),
            patch: TransactionPatch::category(category),
        }
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeRecord::Add { .. } => ChangeKind::Add,
            ChangeRecord::Update { .. } => ChangeKind::Update,
            ChangeRecord::Delete { .. } => ChangeKind::Delete,
            ChangeRecord::Split { .. } => ChangeKind::Split,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            ChangeRecord::Add { id, .. } => id.as_deref(),
            ChangeRecord::Update { id, .. }
            | ChangeRecord::Delete { id }
            | ChangeRecord::Split { id, .. } => Some(id),
        }
    }

    /// Flatten back into file rows; a split yields one row per part.
    pub fn to_rows(&self) -> Vec<ChangeRow> {
        let kind = self.kind().to_string();
        match self {
            ChangeRecord::Add { id, transaction } => vec![ChangeRow {
                kind,
                id: id.clone(),
                date: Some(transaction.date.format(DATE_FORMAT).to_string()),
                description: Some(transaction.description.clone()),
                amount: Some(format_amount(transaction.amount)),
                account: Some(transaction.account.clone()),
                category: transaction.category.clone(),
                note: transaction.note.clone(),
            }],
            ChangeRecord::Update { id, patch } => vec![ChangeRow::from_patch(kind, id, patch)],
            ChangeRecord::Delete { id } => vec![ChangeRow {
                kind,
                id: Some(id.clone()),
                ..Default::default()
            }],
            ChangeRecord::Split { id, parts } => parts
                .iter()
                .map(|part| ChangeRow::from_patch(kind.clone(), id, part))
                .collect(),
        }
    }
}

/// One changeset row, shared by the CSV and JSON formats
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema, CsvSchema)]
pub struct ChangeRow {
    /// Change type: add, update, delete or split
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Target transaction id (optional for add)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Calendar date (YYYY-MM-DD)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Free-text description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Signed decimal amount
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    /// Account label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    /// Category (in JSON, "" clears it)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Free-text note (in JSON, "" clears it)
    #[serde(default, alias = "notes", skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl ChangeRow {
    fn from_patch(kind: String, id: &str, patch: &TransactionPatch) -> Self {
        ChangeRow {
            kind,
            id: Some(id.to_string()),
            date: patch.date.map(|d| d.format(DATE_FORMAT).to_string()),
            description: patch.description.clone(),
            amount: patch.amount.map(format_amount),
            account: patch.account.clone(),
            category: patch.category.clone(),
            note: patch.note.clone(),
        }
    }

    fn target_id(&self) -> Option<String> {
        self.id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    }

    fn patch(&self) -> Result<TransactionPatch, ValidationError> {
        let required = |name: &str, value: &Option<String>| -> Result<Option<String>, ValidationError> {
            match value.as_deref().map(str::trim) {
                Some("") => Err(ValidationError::new(format!("{name} cannot be empty"))),
                Some(v) => Ok(Some(v.to_string())),
                None => Ok(None),
            }
        };

        Ok(TransactionPatch {
            date: required("date", &self.date)?
                .map(|d| parse_date(&d))
                .transpose()?,
            description: required("description", &self.description)?,
            amount: required("amount", &self.amount)?
                .map(|a| parse_amount(&a))
                .transpose()?,
            account: required("account", &self.account)?,
            category: self.category.as_deref().map(|c| c.trim().to_string()),
            note: self.note.as_deref().map(|n| n.trim().to_string()),
        })
    }

    fn csv_record(&self) -> [&str; 8] {
        fn field(value: &Option<String>) -> &str {
            value.as_deref().unwrap_or("")
        }
        [
            self.kind.as_str(),
            field(&self.id),
            field(&self.date),
            field(&self.description),
            field(&self.amount),
            field(&self.account),
            field(&self.category),
            field(&self.note),
        ]
    }
}

/// Validate rows into change records.
///
/// Split rows sharing a source id are grouped into one record at the
/// position of the first such row.
pub fn parse_rows(rows: Vec<ChangeRow>) -> Result<ChangeSet, ValidationError> {
    let mut records: ChangeSet = Vec::with_capacity(rows.len());
    // first row number of each record
    let mut numbers: Vec<usize> = Vec::with_capacity(rows.len());
    // source id -> index into records
    let mut splits: HashMap<String, usize> = HashMap::new();

    for (index, row) in rows.iter().enumerate() {
        let number = index + 1;
        let kind: ChangeKind = row
            .kind
            .parse()
            .map_err(|reason: String| ValidationError::new(reason).at_record(number))?;
        let id = row.target_id();
        let context = |err: ValidationError| err.at_record(number).for_kind(kind).with_id(id.clone());
        let patch = row.patch().map_err(context)?;

        let record = match kind {
            ChangeKind::Add => ChangeRecord::Add {
                id: id.clone(),
                transaction: patch.into_new_transaction().map_err(context)?,
            },
            ChangeKind::Update => {
                let id = id.clone().ok_or_else(|| context(ValidationError::new("update requires an id")))?;
                if patch.is_empty() {
                    return Err(context(ValidationError::new("update carries no fields")));
                }
                ChangeRecord::Update { id, patch }
            }
            ChangeKind::Delete => {
                let id = id.clone().ok_or_else(|| context(ValidationError::new("delete requires an id")))?;
                if !patch.is_empty() {
                    return Err(context(ValidationError::new("delete must carry only an id")));
                }
                ChangeRecord::Delete { id }
            }
            ChangeKind::Split => {
                let id = id.clone().ok_or_else(|| context(ValidationError::new("split requires an id")))?;
                if patch.amount.is_none() {
                    return Err(context(ValidationError::new("split row requires an amount")));
                }
                if let Some(&slot) = splits.get(&id) {
                    if let ChangeRecord::Split { parts, .. } = &mut records[slot] {
                        parts.push(patch);
                    }
                    continue;
                }
                splits.insert(id.clone(), records.len());
                ChangeRecord::Split { id, parts: vec![patch] }
            }
        };
        records.push(record);
        numbers.push(number);
    }

    // In record order: the earliest short split is reported.
    for (record, &number) in records.iter().zip(&numbers) {
        if let ChangeRecord::Split { id, parts } = record {
            if parts.len() < 2 {
                return Err(ValidationError::new("split needs at least two replacement rows")
                    .at_record(number)
                    .for_kind(ChangeKind::Split)
                    .with_id(Some(id.clone())));
            }
        }
    }

    Ok(records)
}

pub fn read_changeset_csv<R: Read>(reader: R) -> Result<ChangeSet, ChangesetError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let rows = rdr
        .deserialize::<ChangeRow>()
        .collect::<Result<Vec<_>, _>>()?;
    Ok(parse_rows(rows)?)
}

/// Read a JSON changeset: an array of objects with the CSV column names.
/// Numeric values (e.g. `"amount": -12.5`) are read as their decimal text.
pub fn read_changeset_json<R: Read>(reader: R) -> Result<ChangeSet, ChangesetError> {
    let value: serde_json::Value = serde_json::from_reader(reader)?;
    let items = match value {
        serde_json::Value::Array(items) => items,
        _ => return Err(ChangesetError::NotAnArray),
    };
    let rows = items
        .into_iter()
        .map(|item| -> Result<ChangeRow, ChangesetError> {
            let serde_json::Value::Object(mut fields) = item else {
                return Err(ChangesetError::NotAnArray);
            };
            numbers_as_text(&mut fields);
            Ok(serde_json::from_value(serde_json::Value::Object(fields))?)
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(parse_rows(rows)?)
}

/// Replace JSON numbers by their literal text, so `12.50` reads exactly as
/// the CSV cell `12.50` would.
pub fn numbers_as_text(fields: &mut serde_json::Map<String, serde_json::Value>) {
    for value in fields.values_mut() {
        if let serde_json::Value::Number(n) = value {
            let text = n.to_string();
            *value = serde_json::Value::String(text);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangesetFormat {
    Csv,
    Json,
}

impl ChangesetFormat {
    pub fn from_path(path: &Path) -> Result<Self, ChangesetError> {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .as_deref()
        {
            Some("csv") => Ok(ChangesetFormat::Csv),
            Some("json") => Ok(ChangesetFormat::Json),
            _ => Err(ChangesetError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// Load a changeset, dispatching on the file extension
pub fn load_changeset(path: &Path) -> Result<ChangeSet, ChangesetError> {
    let format = ChangesetFormat::from_path(path)?;
    let reader = BufReader::new(File::open(path)?);
    let records = match format {
        ChangesetFormat::Csv => read_changeset_csv(reader)?,
        ChangesetFormat::Json => read_changeset_json(reader)?,
    };
    log::info!("Read {} change records from {}", records.len(), path.display());
    Ok(records)
}

pub fn write_changeset_csv<W: Write>(records: &[ChangeRecord], writer: W) -> Result<(), ChangesetError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(ChangeRow::csv_header().split(','))?;
    for row in records.iter().flat_map(ChangeRecord::to_rows) {
        wtr.write_record(row.csv_record())?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_changeset_json<W: Write>(records: &[ChangeRecord], mut writer: W) -> Result<(), ChangesetError> {
    let rows: Vec<ChangeRow> = records.iter().flat_map(ChangeRecord::to_rows).collect();
    serde_json::to_writer_pretty(&mut writer, &rows)?;
    writeln!(writer)?;
    Ok(())
}

pub fn write_changeset<W: Write>(
    records: &[ChangeRecord],
    format: ChangesetFormat,
    writer: W,
) -> Result<(), ChangesetError> {
    match format {
        ChangesetFormat::Csv => write_changeset_csv(records, writer),
        ChangesetFormat::Json => write_changeset_json(records, writer),
    }
}
