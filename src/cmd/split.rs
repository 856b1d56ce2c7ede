//! Split command - one transaction file per period

use crate::cmd::{read_transactions, write_transactions};
use crate::period::{period_file_name, split_by_period, Granularity};
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct SplitCommand {
    /// Canonical transaction files ("-" for stdin)
    #[arg(default_value = "-")]
    inputs: Vec<PathBuf>,

    /// Period length
    #[arg(long, value_enum, default_value_t = Granularity::Month)]
    by: Granularity,

    /// Directory for the `<period>-transactions.csv` files
    #[arg(short = 'o', long = "output-dir")]
    output_dir: PathBuf,
}

impl SplitCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let transactions = read_transactions(&self.inputs)?;
        let periods = split_by_period(transactions, self.by);
        for (period, txns) in &periods {
            write_transactions(&self.output_dir.join(period_file_name(period)), txns)?;
        }
        log::info!("Split into {} period files", periods.len());
        Ok(())
    }
}
