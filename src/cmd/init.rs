//! Init command - starter budget, config and changeset files

use crate::budget::{self, budget_from_report, starter_budget};
use crate::config::{Config, DEFAULT_CONFIG_FILE};
use crate::core::{write_changeset, ChangeRecord, ChangesetFormat, NewTransaction};
use crate::utils;
use anyhow::Context;
use clap::{Args, Subcommand};
use rust_decimal_macros::dec;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct InitCommand {
    #[command(subcommand)]
    target: InitTarget,
}

#[derive(Subcommand, Debug)]
enum InitTarget {
    /// Budget file for a period (.json or .csv)
    Budget {
        /// Period the entries apply to, e.g. 2025-06
        #[arg(long)]
        period: String,

        /// Carry categories and fund balances forward from a CSV report
        #[arg(long)]
        from_report: Option<PathBuf>,

        #[command(flatten)]
        output: Output,
    },
    /// Config file with an example importer
    Config {
        #[command(flatten)]
        output: ConfigOutput,
    },
    /// Changeset with example records (.csv or .json)
    Changeset {
        #[command(flatten)]
        output: Output,
    },
}

#[derive(Args, Debug)]
struct Output {
    /// File to create
    #[arg(short, long)]
    output: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    force: bool,
}

#[derive(Args, Debug)]
struct ConfigOutput {
    /// File to create
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    output: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    force: bool,
}

impl InitCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        match &self.target {
            InitTarget::Budget {
                period,
                from_report,
                output,
            } => {
                ensure_writable(&output.output, output.force)?;
                let entries = match from_report {
                    Some(path) => {
                        let file = File::open(path)
                            .with_context(|| format!("opening report {}", path.display()))?;
                        let report = budget::read_report_csv(BufReader::new(file))
                            .with_context(|| format!("reading report {}", path.display()))?;
                        budget_from_report(period, &report)
                    }
                    None => starter_budget(period),
                };
                let json = budget::extension(&output.output).as_deref() != Some("csv");
                utils::write_output(&output.output, |out| {
                    budget::write_budget(&entries, json, out)?;
                    Ok(())
                })
            }
            InitTarget::Config { output } => {
                ensure_writable(&output.output, output.force)?;
                utils::write_output(&output.output, |out| {
                    serde_json::to_writer_pretty(&mut *out, &Config::starter())?;
                    writeln!(out)?;
                    Ok(())
                })
            }
            InitTarget::Changeset { output } => {
                ensure_writable(&output.output, output.force)?;
                let format = ChangesetFormat::from_path(&output.output)?;
                let records = starter_changeset();
                utils::write_output(&output.output, |out| {
                    write_changeset(&records, format, out)?;
                    Ok(())
                })
            }
        }
    }
}

fn ensure_writable(path: &Path, force: bool) -> anyhow::Result<()> {
    if !utils::is_stdio(path) && path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    Ok(())
}

fn starter_changeset() -> Vec<ChangeRecord> {
    vec![
        ChangeRecord::set_category("example123", "Groceries"),
        ChangeRecord::Add {
            id: None,
            transaction: NewTransaction {
                date: chrono::NaiveDate::from_ymd_opt(2025, 1, 15).unwrap_or_default(),
                description: "CASH PURCHASE".to_string(),
                amount: dec!(-25.50),
                account: "Wallet".to_string(),
                category: Some("Snacks".to_string()),
                note: None,
            },
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starter_changeset_reads_back() {
        let records = starter_changeset();
        let mut csv = Vec::new();
        write_changeset(&records, ChangesetFormat::Csv, &mut csv).unwrap();
        assert_eq!(crate::core::changeset::read_changeset_csv(csv.as_slice()).unwrap(), records);
    }

    #[test]
    fn existing_file_needs_force() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(ensure_writable(file.path(), false).is_err());
        assert!(ensure_writable(file.path(), true).is_ok());
        assert!(ensure_writable(Path::new("-"), false).is_ok());
    }
}
