//! Transaction filter expressions such as `amount<-50` or `desc~wm`

use crate::core::{format_amount, parse_amount, parse_date, Transaction, DATE_FORMAT};
use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::str::FromStr;
use std::sync::OnceLock;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("invalid filter '{0}', expected <field><op><value>")]
    Syntax(String),
    #[error("unknown filter field '{0}'")]
    UnknownField(String),
    #[error("unknown filter operator '{0}'")]
    UnknownOp(String),
    #[error("invalid {field} value '{value}'")]
    Value { field: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Id,
    Date,
    Description,
    Amount,
    Account,
    Category,
    Note,
}

impl Field {
    fn name(&self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::Date => "date",
            Field::Description => "description",
            Field::Amount => "amount",
            Field::Account => "account",
            Field::Category => "category",
            Field::Note => "note",
        }
    }

    fn text(&self, txn: &Transaction) -> String {
        match self {
            Field::Id => txn.id.clone(),
            Field::Date => txn.date.format(DATE_FORMAT).to_string(),
            Field::Description => txn.description.clone(),
            Field::Amount => format_amount(txn.amount),
            Field::Account => txn.account.clone(),
            Field::Category => txn.category.clone().unwrap_or_default(),
            Field::Note => txn.note.clone().unwrap_or_default(),
        }
    }
}

impl FromStr for Field {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "id" => Ok(Field::Id),
            "date" => Ok(Field::Date),
            "description" | "desc" => Ok(Field::Description),
            "amount" => Ok(Field::Amount),
            "account" => Ok(Field::Account),
            "category" => Ok(Field::Category),
            "note" | "notes" => Ok(Field::Note),
            _ => Err(FilterError::UnknownField(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Case-insensitive substring
    Contains,
    NotContains,
}

impl FromStr for Op {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "=" | "==" => Ok(Op::Eq),
            "!=" => Ok(Op::Ne),
            "<" => Ok(Op::Lt),
            "<=" => Ok(Op::Le),
            ">" => Ok(Op::Gt),
            ">=" => Ok(Op::Ge),
            "~" => Ok(Op::Contains),
            "!~" => Ok(Op::NotContains),
            _ => Err(FilterError::UnknownOp(s.to_string())),
        }
    }
}

impl Op {
    fn holds(&self, ordering: Ordering) -> bool {
        match self {
            Op::Eq => ordering == Ordering::Equal,
            Op::Ne => ordering != Ordering::Equal,
            Op::Lt => ordering == Ordering::Less,
            Op::Le => ordering != Ordering::Greater,
            Op::Gt => ordering == Ordering::Greater,
            Op::Ge => ordering != Ordering::Less,
            Op::Contains | Op::NotContains => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Operand {
    Date(NaiveDate),
    Amount(Decimal),
    /// Lowercased
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    field: Field,
    op: Op,
    operand: Operand,
}

fn expression() -> &'static Regex {
    static EXPRESSION: OnceLock<Regex> = OnceLock::new();
    EXPRESSION.get_or_init(|| {
        Regex::new(r"^\s*(\w+)\s*([!=<>~]{1,2})\s*(.*?)\s*$").expect("filter expression regex")
    })
}

impl FromStr for Filter {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = expression()
            .captures(s)
            .ok_or_else(|| FilterError::Syntax(s.to_string()))?;
        let field: Field = caps[1].parse()?;
        let op: Op = caps[2].parse()?;
        let value = &caps[3];
        let invalid = || FilterError::Value {
            field: field.name(),
            value: value.to_string(),
        };

        let operand = match (field, op) {
            (_, Op::Contains | Op::NotContains) => Operand::Text(value.to_lowercase()),
            (Field::Date, _) => Operand::Date(parse_date(value).map_err(|_| invalid())?),
            (Field::Amount, _) => Operand::Amount(parse_amount(value).map_err(|_| invalid())?),
            _ => Operand::Text(value.to_lowercase()),
        };
        Ok(Filter { field, op, operand })
    }
}

impl Filter {
    pub fn matches(&self, txn: &Transaction) -> bool {
        match &self.operand {
            Operand::Text(needle) if matches!(self.op, Op::Contains | Op::NotContains) => {
                let found = self.field.text(txn).to_lowercase().contains(needle.as_str());
                found == (self.op == Op::Contains)
            }
            Operand::Date(date) => self.op.holds(txn.date.cmp(date)),
            Operand::Amount(amount) => self.op.holds(txn.amount.cmp(amount)),
            Operand::Text(text) => self.op.holds(self.field.text(txn).to_lowercase().cmp(text)),
        }
    }
}

/// True when `txn` satisfies every filter
pub fn matches_all(filters: &[Filter], txn: &Transaction) -> bool {
    filters.iter().all(|f| f.matches(txn))
}
