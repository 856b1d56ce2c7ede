pub mod apply;
pub mod changeset;
pub mod id;
pub mod suggest;
pub mod transaction;
pub mod validation;

// Flat public surface for domain types and functions.
pub use apply::{apply_with, ApplyOptions};
pub use changeset::{
    load_changeset, numbers_as_text, write_changeset, ChangeRecord, ChangeRow, ChangesetFormat,
    NewTransaction,
};
pub use id::IdMinter;
pub use suggest::{HistoryIndex, SuggestionCandidate, Suggester, MAX_SUGGESTIONS};
pub use transaction::{
    format_amount, parse_amount, parse_date, read_transactions_csv, write_transactions_csv,
    CsvField, Transaction, TransactionRecord, DATE_FORMAT,
};
