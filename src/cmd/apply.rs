//! Apply command - reconcile a transaction file with changesets

use crate::cmd::{read_transactions, write_transactions};
use crate::config::Config;
use crate::core::{apply_with, load_changeset, ApplyOptions};
use anyhow::Context;
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ApplyCommand {
    /// Base transaction file
    base: PathBuf,

    /// Changeset files (.csv or .json), applied in order
    #[arg(required = true)]
    changesets: Vec<PathBuf>,

    /// Output file ("-" for stdout). Written only if every record applies.
    #[arg(short, long, default_value = "-")]
    output: PathBuf,

    /// Reject splits whose parts do not sum to the source amount
    #[arg(long)]
    balanced_splits: bool,

    /// Stable-sort the result by date
    #[arg(long)]
    sort_by_date: bool,

    /// Seed for minted ids (defaults to the config's id_seed)
    #[arg(long)]
    seed: Option<String>,
}

impl ApplyCommand {
    pub fn exec(&self, config: &Config) -> anyhow::Result<()> {
        let base = read_transactions(std::slice::from_ref(&self.base))?;
        let changesets = self
            .changesets
            .iter()
            .map(|path| {
                load_changeset(path).with_context(|| format!("reading changeset {}", path.display()))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let options = ApplyOptions {
            balanced_splits: self.balanced_splits,
            seed: self.seed.clone().unwrap_or_else(|| config.id_seed.clone()),
        };
        let mut result = apply_with(base, &changesets, &options).context("applying changesets")?;
        if self.sort_by_date {
            result.sort_by_key(|t| t.date);
        }

        write_transactions(&self.output, &result)
    }
}
