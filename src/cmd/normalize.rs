//! Normalize command - bank exports to canonical transactions

use crate::cmd::write_transactions;
use crate::config::Config;
use crate::core::IdMinter;
use crate::import::select_importer;
use crate::utils;
use anyhow::Context;
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct NormalizeCommand {
    /// Raw bank CSV exports ("-" for stdin)
    #[arg(default_value = "-")]
    inputs: Vec<PathBuf>,

    /// Output file ("-" for stdout)
    #[arg(short, long, default_value = "-")]
    output: PathBuf,

    /// Use this importer instead of auto-matching
    #[arg(long)]
    importer: Option<String>,
}

impl NormalizeCommand {
    pub fn exec(&self, config: &Config) -> anyhow::Result<()> {
        let importers = config.importers()?;
        if importers.is_empty() {
            anyhow::bail!("No importers configured. Run `budgetc init config` to create one.");
        }
        let mut minter = IdMinter::new(config.id_seed.as_str());
        let mut transactions = Vec::new();

        for path in &self.inputs {
            let reader = utils::open_input(path)?;
            let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
            let header: Vec<String> = rdr
                .headers()
                .with_context(|| format!("reading header of {}", path.display()))?
                .iter()
                .map(|h| h.trim().to_string())
                .collect();
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "-".to_string());

            let importer = select_importer(&importers, &header, &file_name, self.importer.as_deref())?;
            let txns = importer
                .normalize(&header, rdr.records(), &mut minter)
                .with_context(|| format!("normalizing {}", path.display()))?;
            transactions.extend(txns);
        }

        write_transactions(&self.output, &transactions)
    }
}
