use super::changeset::{ChangeKind, ChangeRecord, ChangeSet, NewTransaction, TransactionPatch};
use super::id::IdMinter;
use super::transaction::{format_amount, Transaction};
use super::validation::ValidationError;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{kind} references unknown id '{id}'")]
    UnknownId { kind: ChangeKind, id: String },
    #[error("{}: duplicate id '{id}'", duplicate_source(.kind))]
    DuplicateId {
        /// `None` when the duplicate is already in the base set
        kind: Option<ChangeKind>,
        id: String,
    },
}

fn duplicate_source(kind: &Option<ChangeKind>) -> String {
    match kind {
        Some(kind) => kind.to_string(),
        None => "base transactions".to_string(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    /// Reject splits whose parts do not sum to the source amount
    pub balanced_splits: bool,
    /// Seed for minting ids of added and split transactions
    pub seed: String,
}

/// Apply changesets in order to a base transaction set.
///
/// Either every record applies and the new set is returned, or the first
/// failing record aborts the run and nothing is returned. When two records
/// set the same field of one transaction, the later one wins.
pub fn apply_with(
    base: Vec<Transaction>,
    changesets: &[ChangeSet],
    options: &ApplyOptions,
) -> Result<Vec<Transaction>, ApplyError> {
    let mut ledger = Ledger::new(base, &options.seed)?;

    for (set, changeset) in changesets.iter().enumerate() {
        for (index, record) in changeset.iter().enumerate() {
            ledger.apply(record, options).map_err(|err| match err {
                ApplyError::Validation(err) => ApplyError::Validation(
                    err.at_record(index + 1)
                        .for_kind(record.kind())
                        .with_id(record.id().map(str::to_string)),
                ),
                other => other,
            })?;
        }
        log::info!(
            "Applied changeset {} ({} records), {} transactions",
            set + 1,
            changeset.len(),
            ledger.rows.len()
        );
    }

    Ok(ledger.into_transactions())
}

/// Working set keyed by position.
///
/// Base rows sit at `[i]`, adds at `[n, n+1, ..]` past the base, and the parts
/// of a split at the source position extended by the part index, so ordering
/// the keys lexicographically yields the result order.
struct Ledger {
    rows: BTreeMap<Vec<usize>, Transaction>,
    index: HashMap<String, Vec<usize>>,
    minter: IdMinter,
    next_slot: usize,
}

impl Ledger {
    fn new(base: Vec<Transaction>, seed: &str) -> Result<Self, ApplyError> {
        let mut ledger = Ledger {
            rows: BTreeMap::new(),
            index: HashMap::with_capacity(base.len()),
            minter: IdMinter::new(seed),
            next_slot: base.len(),
        };
        for (slot, txn) in base.into_iter().enumerate() {
            if !ledger.minter.reserve(&txn.id) {
                return Err(ApplyError::DuplicateId { kind: None, id: txn.id });
            }
            ledger.insert(vec![slot], txn);
        }
        Ok(ledger)
    }

    fn apply(&mut self, record: &ChangeRecord, options: &ApplyOptions) -> Result<(), ApplyError> {
        match record {
            ChangeRecord::Add { id, transaction } => self.add(id.as_deref(), transaction),
            ChangeRecord::Update { id, patch } => self.update(id, patch),
            ChangeRecord::Delete { id } => {
                self.remove(ChangeKind::Delete, id)?;
                log::debug!("delete {id}");
                Ok(())
            }
            ChangeRecord::Split { id, parts } => self.split(id, parts, options.balanced_splits),
        }
    }

    fn add(&mut self, id: Option<&str>, transaction: &NewTransaction) -> Result<(), ApplyError> {
        let id = match id {
            Some(id) if !self.minter.reserve(id) => {
                return Err(ApplyError::DuplicateId {
                    kind: Some(ChangeKind::Add),
                    id: id.to_string(),
                })
            }
            Some(id) => id.to_string(),
            None => self.minter.mint(&transaction.identity_key()),
        };
        log::debug!("add {id} at end");
        let slot = self.next_slot;
        self.next_slot += 1;
        self.insert(vec![slot], transaction.clone().into_transaction(id));
        Ok(())
    }

    fn update(&mut self, id: &str, patch: &TransactionPatch) -> Result<(), ApplyError> {
        let txn = self
            .index
            .get(id)
            .and_then(|pos| self.rows.get_mut(pos))
            .ok_or_else(|| unknown(ChangeKind::Update, id))?;
        patch.apply_to(txn);
        log::debug!("update {id}");
        Ok(())
    }

    fn split(&mut self, id: &str, parts: &[TransactionPatch], balanced: bool) -> Result<(), ApplyError> {
        if parts.len() < 2 {
            return Err(ValidationError::new("split needs at least two replacement rows").into());
        }
        let (pos, source) = self.remove(ChangeKind::Split, id)?;

        if balanced {
            let total: Decimal = parts.iter().map(|p| p.amount.unwrap_or(source.amount)).sum();
            if total != source.amount {
                return Err(ValidationError::new(format!(
                    "split parts sum to {}, source amount is {}",
                    format_amount(total),
                    format_amount(source.amount)
                ))
                .into());
            }
        }

        for (i, part) in parts.iter().enumerate() {
            let mut txn = source.clone();
            part.apply_to(&mut txn);
            txn.id = self.minter.mint(&txn.identity_key());
            log::debug!("split {id} part {} -> {}", i + 1, txn.id);
            let mut part_pos = pos.clone();
            part_pos.push(i);
            self.insert(part_pos, txn);
        }
        Ok(())
    }

    fn insert(&mut self, pos: Vec<usize>, txn: Transaction) {
        self.index.insert(txn.id.clone(), pos.clone());
        self.rows.insert(pos, txn);
    }

    /// Take a live transaction out of the set. Its id stays known to the
    /// minter and is never handed out again.
    fn remove(&mut self, kind: ChangeKind, id: &str) -> Result<(Vec<usize>, Transaction), ApplyError> {
        let pos = self.index.remove(id).ok_or_else(|| unknown(kind, id))?;
        let txn = self.rows.remove(&pos).ok_or_else(|| unknown(kind, id))?;
        Ok((pos, txn))
    }

    fn into_transactions(self) -> Vec<Transaction> {
        self.rows.into_values().collect()
    }
}

fn unknown(kind: ChangeKind, id: &str) -> ApplyError {
    ApplyError::UnknownId {
        kind,
        id: id.to_string(),
    }
}
