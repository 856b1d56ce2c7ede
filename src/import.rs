//! Bank export normalization: importer mappings, auto-matching and row mapping

use crate::core::{IdMinter, Transaction, DATE_FORMAT};
use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("importer '{importer}': invalid {field}: {source}")]
    Pattern {
        importer: String,
        field: &'static str,
        #[source]
        source: regex::Error,
    },
    #[error("importer '{0}' needs either accountColumn or accountValue")]
    NoAccount(String),
    #[error("unknown importer '{0}'")]
    UnknownImporter(String),
    #[error("no importer matched {file} (header: {header})")]
    NoMatch { file: String, header: String },
    #[error("importer '{importer}': column '{column}' not in header")]
    MissingColumn { importer: String, column: String },
    #[error("row {row}: {reason}")]
    Row { row: usize, reason: String },
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// Auto-match criteria. Every criterion given must hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Matcher {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename_contains: Option<String>,
    /// Regex over the whole file name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name_pattern: Option<String>,
    /// Header names that must all be present
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<String>,
    /// Regex over the whole comma-joined header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_pattern: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImporterConfig {
    pub name: String,
    #[serde(default)]
    pub matcher: Matcher,
    pub date_column: String,
    pub description_column: String,
    pub amount_column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_column: Option<String>,
    #[serde(default, alias = "notesColumn", skip_serializing_if = "Option::is_none")]
    pub note_column: Option<String>,
    #[serde(default)]
    pub flip_sign: bool,
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

fn default_date_format() -> String {
    DATE_FORMAT.to_string()
}

/// A validated importer with compiled match patterns
#[derive(Debug, Clone)]
pub struct Importer {
    config: ImporterConfig,
    file_name_pattern: Option<Regex>,
    header_pattern: Option<Regex>,
}

impl Importer {
    pub fn new(config: ImporterConfig) -> Result<Self, ImportError> {
        if config.account_column.is_none() && config.account_value.is_none() {
            return Err(ImportError::NoAccount(config.name));
        }
        let compile = |field: &'static str, pattern: &Option<String>| {
            pattern
                .as_deref()
                .map(|p| Regex::new(&format!("^(?:{p})$")))
                .transpose()
                .map_err(|source| ImportError::Pattern {
                    importer: config.name.clone(),
                    field,
                    source,
                })
        };
        let file_name_pattern = compile("fileNamePattern", &config.matcher.file_name_pattern)?;
        let header_pattern = compile("headerPattern", &config.matcher.header_pattern)?;

        let importer = Importer {
            config,
            file_name_pattern,
            header_pattern,
        };
        if !importer.has_criteria() {
            log::warn!(
                "importer '{}' has no matcher criteria and is only used with --importer",
                importer.name()
            );
        }
        Ok(importer)
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    fn has_criteria(&self) -> bool {
        let matcher = &self.config.matcher;
        matcher.filename_contains.is_some()
            || self.file_name_pattern.is_some()
            || !matcher.headers.is_empty()
            || self.header_pattern.is_some()
    }

    /// Whether this importer claims a file with the given header and file name.
    pub fn matches(&self, header: &[String], file_name: &str) -> bool {
        if !self.has_criteria() {
            return false;
        }
        let matcher = &self.config.matcher;

        if let Some(needle) = &matcher.filename_contains {
            if !file_name.contains(needle.as_str()) {
                return false;
            }
        }
        if let Some(pattern) = &self.file_name_pattern {
            if !pattern.is_match(file_name) {
                return false;
            }
        }
        if !matcher
            .headers
            .iter()
            .all(|required| header.iter().any(|h| h.trim() == required.trim()))
        {
            return false;
        }
        if let Some(pattern) = &self.header_pattern {
            if !pattern.is_match(&header.join(",")) {
                return false;
            }
        }
        true
    }

    /// Map raw bank rows to canonical transactions, minting an id for each.
    pub fn normalize<I>(
        &self,
        header: &[String],
        rows: I,
        minter: &mut IdMinter,
    ) -> Result<Vec<Transaction>, ImportError>
    where
        I: IntoIterator<Item = csv::Result<csv::StringRecord>>,
    {
        let columns: HashMap<&str, usize> = header
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim(), i))
            .collect();
        let column = |name: &str| -> Result<usize, ImportError> {
            columns
                .get(name.trim())
                .copied()
                .ok_or_else(|| ImportError::MissingColumn {
                    importer: self.config.name.clone(),
                    column: name.to_string(),
                })
        };
        let optional = |name: &Option<String>| name.as_deref().map(column).transpose();

        let date_col = column(&self.config.date_column)?;
        let description_col = column(&self.config.description_column)?;
        let amount_col = column(&self.config.amount_column)?;
        let account_col = optional(&self.config.account_column)?;
        let category_col = optional(&self.config.category_column)?;
        let note_col = optional(&self.config.note_column)?;

        let mut transactions = Vec::new();
        for (index, row) in rows.into_iter().enumerate() {
            let record = row?;
            let number = index + 1;
            if record.iter().all(|field| field.trim().is_empty()) {
                log::warn!("{}: skipping blank row {number}", self.config.name);
                continue;
            }
            let cell = |col: usize| record.get(col).unwrap_or("").trim();
            let text = |col: Option<usize>| col.map(cell).filter(|v| !v.is_empty()).map(str::to_string);
            let row_err = |reason: String| ImportError::Row { row: number, reason };

            let date = parse_raw_date(cell(date_col), &self.config.date_format).map_err(row_err)?;
            let mut amount = parse_raw_amount(cell(amount_col)).map_err(row_err)?;
            if self.config.flip_sign {
                amount = -amount;
            }
            let account = match (account_col, &self.config.account_value) {
                (Some(col), fallback) => Some(cell(col))
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
                    .or_else(|| fallback.clone()),
                (None, value) => value.clone(),
            }
            .ok_or_else(|| row_err("empty account".to_string()))?;

            let description = cell(description_col).to_string();
            let key = crate::core::transaction::identity_key(date, &description, amount, &account);
            transactions.push(Transaction {
                id: minter.mint(&key),
                date,
                description,
                amount,
                account,
                category: text(category_col),
                note: text(note_col),
            });
        }
        log::info!("{}: normalized {} rows", self.config.name, transactions.len());
        Ok(transactions)
    }
}

/// Pick the importer for a file: the one named by `forced`, otherwise the first that matches.
pub fn select_importer<'a>(
    importers: &'a [Importer],
    header: &[String],
    file_name: &str,
    forced: Option<&str>,
) -> Result<&'a Importer, ImportError> {
    if let Some(name) = forced {
        return importers
            .iter()
            .find(|i| i.name() == name)
            .ok_or_else(|| ImportError::UnknownImporter(name.to_string()));
    }
    let importer = importers
        .iter()
        .find(|i| i.matches(header, file_name))
        .ok_or_else(|| ImportError::NoMatch {
            file: file_name.to_string(),
            header: header.join(","),
        })?;
    log::info!("{file_name}: matched importer '{}'", importer.name());
    Ok(importer)
}

fn parse_raw_date(value: &str, format: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, format)
        .or_else(|_| NaiveDateTime::parse_from_str(value, format).map(|dt| dt.date()))
        .map_err(|_| format!("date '{value}' does not match format '{format}'"))
}

/// Parse a bank-formatted amount: currency symbols, thousands separators
/// and parentheses for negatives are accepted.
pub fn parse_raw_amount(value: &str) -> Result<Decimal, String> {
    let trimmed = value.trim();
    let (negative, inner) = match trimmed.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, trimmed),
    };
    let cleaned: String = inner
        .chars()
        .filter(|c| !matches!(c, '$' | '£' | '€' | ',' | ' '))
        .collect();
    if cleaned.is_empty() {
        return Err("empty amount".to_string());
    }
    let amount = Decimal::from_str(&cleaned).map_err(|_| format!("amount '{value}' is not a number"))?;
    Ok(if negative { -amount } else { amount })
}
