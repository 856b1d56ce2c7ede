use super::validation::ValidationError;
use budgetc_derive::CsvSchema;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::str::FromStr;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Column documentation generated by `#[derive(CsvSchema)]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvField {
    pub name: &'static str,
    pub required: bool,
    pub description: &'static str,
}

/// Canonical transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Stable identifier, unique within a transaction set
    pub id: String,
    pub date: NaiveDate,
    pub description: String,
    /// Negative for outflows
    pub amount: Decimal,
    pub account: String,
    /// `None` means uncategorized
    pub category: Option<String>,
    pub note: Option<String>,
}

impl Transaction {
    pub fn is_categorized(&self) -> bool {
        self.category.is_some()
    }

    /// The fields that identify a transaction for id minting.
    pub fn identity_key(&self) -> String {
        identity_key(self.date, &self.description, self.amount, &self.account)
    }
}

pub fn identity_key(date: NaiveDate, description: &str, amount: Decimal, account: &str) -> String {
    format!(
        "{}|{}|{}|{}",
        date.format(DATE_FORMAT),
        description.trim(),
        format_amount(amount),
        account.trim()
    )
}

/// CSV record format for canonical transactions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, CsvSchema)]
pub struct TransactionRecord {
    /// Stable identifier assigned at import, never reused
    pub id: String,
    /// Calendar date (YYYY-MM-DD)
    pub date: String,
    /// Free-text description from the bank export
    pub description: String,
    /// Signed decimal, negative for outflows, no currency symbols
    pub amount: String,
    /// Account label
    pub account: String,
    /// Category, empty when uncategorized
    #[serde(default)]
    pub category: Option<String>,
    /// Free-text note
    #[serde(default, alias = "notes")]
    pub note: Option<String>,
}

impl TryFrom<TransactionRecord> for Transaction {
    type Error = ValidationError;

    fn try_from(record: TransactionRecord) -> Result<Self, Self::Error> {
        let id = record.id.trim().to_string();
        if id.is_empty() {
            return Err(ValidationError::new("missing id"));
        }
        let with_id = |err: ValidationError| err.with_id(Some(id.clone()));
        let date = parse_date(&record.date).map_err(with_id)?;
        let amount = parse_amount(&record.amount).map_err(with_id)?;

        Ok(Transaction {
            id: id.clone(),
            date,
            description: record.description.trim().to_string(),
            amount,
            account: record.account.trim().to_string(),
            category: non_empty(record.category),
            note: non_empty(record.note),
        })
    }
}

impl From<&Transaction> for TransactionRecord {
    fn from(txn: &Transaction) -> Self {
        TransactionRecord {
            id: txn.id.clone(),
            date: txn.date.format(DATE_FORMAT).to_string(),
            description: txn.description.clone(),
            amount: format_amount(txn.amount),
            account: txn.account.clone(),
            category: txn.category.clone(),
            note: txn.note.clone(),
        }
    }
}

/// Read canonical transactions from CSV, preserving file order
pub fn read_transactions_csv<R: Read>(reader: R) -> anyhow::Result<Vec<Transaction>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut transactions = Vec::new();
    for (index, record) in rdr.deserialize::<TransactionRecord>().enumerate() {
        let txn = Transaction::try_from(record?).map_err(|err| err.at_record(index + 1))?;
        transactions.push(txn);
    }
    Ok(transactions)
}

pub fn write_transactions_csv<W: Write>(transactions: &[Transaction], writer: W) -> csv::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    if transactions.is_empty() {
        wtr.write_record(TransactionRecord::csv_header().split(','))?;
    }
    for txn in transactions {
        wtr.serialize(TransactionRecord::from(txn))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn parse_date(s: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .map_err(|_| ValidationError::new(format!("date is not YYYY-MM-DD: '{s}'")))
}

pub fn parse_amount(s: &str) -> Result<Decimal, ValidationError> {
    let s = s.trim();
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .map_err(|_| ValidationError::new(format!("amount is not a decimal: '{s}'")))
}

/// Plain decimal with at least two places, never in exponent form
pub fn format_amount(amount: Decimal) -> String {
    let mut amount = amount;
    if amount.scale() < 2 {
        amount.rescale(2);
    }
    amount.to_string()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const CSV: &str = "id,date,description,amount,account,category,note
a1,2025-01-02,WM SUPERCENTER #44,-54.20,Checking,Groceries,
a2,2025-01-03,PAYROLL ACME,2500,Checking,,
a3,2025-01-04,SHELL OIL 5544,-40.1,Credit Card,Fuel,fill up
";

    #[test]
    fn read_csv_preserves_order_and_fields() {
        let txns = read_transactions_csv(CSV.as_bytes()).unwrap();
        assert_eq!(txns.len(), 3);
        assert_eq!(txns[0].id, "a1");
        assert_eq!(txns[0].date, NaiveDate::from_ymd_opt(2025, 1, 2).unwrap());
        assert_eq!(txns[0].amount, dec!(-54.20));
        assert_eq!(txns[0].category.as_deref(), Some("Groceries"));
        assert_eq!(txns[0].note, None);
        assert!(!txns[1].is_categorized());
        assert_eq!(txns[2].note.as_deref(), Some("fill up"));
    }

    #[test]
    fn notes_column_is_accepted() {
        let csv = "id,date,description,amount,account,category,notes
b1,2025-02-01,RENT,-1200,Checking,Rent,february
";
        let txns = read_transactions_csv(csv.as_bytes()).unwrap();
        assert_eq!(txns[0].note.as_deref(), Some("february"));
    }

    #[test]
    fn bad_amount_names_the_row() {
        let csv = "id,date,description,amount,account,category,note
c1,2025-02-01,OK,-1,Checking,,
c2,2025-02-01,BROKEN,$12,Checking,,
";
        let err = read_transactions_csv(csv.as_bytes()).unwrap_err();
        let err = err.downcast::<ValidationError>().unwrap();
        assert_eq!(err.record, Some(2));
        assert_eq!(err.id.as_deref(), Some("c2"));
    }

    #[test]
    fn missing_id_is_rejected() {
        let csv = "id,date,description,amount,account,category,note
,2025-02-01,NO ID,-1,Checking,,
";
        let err = read_transactions_csv(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("missing id"));
    }

    #[test]
    fn write_csv_formats_amounts() {
        let txns = read_transactions_csv(CSV.as_bytes()).unwrap();
        let mut out = Vec::new();
        write_transactions_csv(&txns, &mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines[0], "id,date,description,amount,account,category,note");
        assert_eq!(lines[2], "a2,2025-01-03,PAYROLL ACME,2500.00,Checking,,");
        assert_eq!(lines[3], "a3,2025-01-04,SHELL OIL 5544,-40.10,Credit Card,Fuel,fill up");
    }

    #[test]
    fn empty_set_still_writes_header() {
        let mut out = Vec::new();
        write_transactions_csv(&[], &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "id,date,description,amount,account,category,note\n"
        );
    }

    #[test]
    fn format_amount_keeps_extra_precision() {
        assert_eq!(format_amount(dec!(3)), "3.00");
        assert_eq!(format_amount(dec!(-0.125)), "-0.125");
    }

    #[test]
    fn csv_schema_lists_canonical_columns() {
        let schema = TransactionRecord::csv_schema();
        assert_eq!(schema.len(), 7);
        assert!(schema[0].required);
        assert!(!schema[5].required);
        assert_eq!(schema[6].name, "note");
    }
}
