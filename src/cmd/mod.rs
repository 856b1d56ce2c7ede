pub mod apply;
pub mod categorize;
pub mod init;
pub mod list;
pub mod normalize;
pub mod report;
pub mod schema;
pub mod split;

use crate::core::{read_transactions_csv, write_transactions_csv, Transaction};
use crate::utils;
use anyhow::Context;
use std::path::{Path, PathBuf};

/// Read canonical transaction files (or stdin with "-") in argument order
pub fn read_transactions(paths: &[PathBuf]) -> anyhow::Result<Vec<Transaction>> {
    let mut transactions = Vec::new();
    for path in paths {
        let reader = utils::open_input(path)?;
        let txns = read_transactions_csv(reader)
            .with_context(|| format!("reading transactions from {}", path.display()))?;
        log::info!("Read {} transactions from {}", txns.len(), path.display());
        transactions.extend(txns);
    }
    Ok(transactions)
}

pub fn write_transactions(path: &Path, transactions: &[Transaction]) -> anyhow::Result<()> {
    utils::write_output(path, |out| {
        write_transactions_csv(transactions, out)?;
        Ok(())
    })
    .with_context(|| format!("writing transactions to {}", path.display()))
}
