//! Schema command - print expected file formats

use crate::core::{ChangeRow, CsvField, TransactionRecord};
use clap::Args;
use schemars::schema_for;

#[derive(Args, Debug)]
pub struct SchemaCommand {
    /// What to print
    #[arg(value_enum, default_value = "json-schema")]
    format: SchemaFormat,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum SchemaFormat {
    /// JSON Schema for JSON changesets
    JsonSchema,
    /// Canonical transaction CSV header row
    TransactionHeader,
    /// Changeset CSV header row
    ChangesetHeader,
    /// Canonical transaction column descriptions
    TransactionFields,
    /// Changeset column descriptions
    ChangesetFields,
}

impl SchemaCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        match self.format {
            SchemaFormat::JsonSchema => {
                let schema = schema_for!(Vec<ChangeRow>);
                println!("{}", serde_json::to_string_pretty(&schema)?);
            }
            SchemaFormat::TransactionHeader => println!("{}", TransactionRecord::csv_header()),
            SchemaFormat::ChangesetHeader => println!("{}", ChangeRow::csv_header()),
            SchemaFormat::TransactionFields => {
                print_fields("Transaction CSV Format", TransactionRecord::csv_schema());
                println!("Amounts are signed decimals, negative for outflows.");
            }
            SchemaFormat::ChangesetFields => {
                print_fields("Changeset CSV Format", ChangeRow::csv_schema());
                println!("add: date, description, amount and account; id optional");
                println!("update: id plus at least one field");
                println!("delete: id only");
                println!("split: one row per part, each with the source id and an amount");
                println!();
                println!("Empty CSV cells leave a field unchanged. In JSON, \"\" clears category or note.");
            }
        }
        Ok(())
    }
}

fn print_fields(title: &str, fields: &[CsvField]) {
    println!("{title}");
    println!("{}", "=".repeat(title.len()));
    println!();
    for field in fields {
        let req = if field.required { "required" } else { "optional" };
        println!("{:12} ({:8})  {}", field.name, req, field.description);
    }
    println!();
}
