use super::changeset::ChangeKind;
use std::fmt;

/// A record that cannot be accepted as written: wrong field combination for
/// its change type, an unparsable date or amount, or a missing required field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// 1-based row/record number within its file, when known
    pub record: Option<usize>,
    pub kind: Option<ChangeKind>,
    pub id: Option<String>,
    pub reason: String,
}

impl ValidationError {
    pub fn new(reason: impl Into<String>) -> Self {
        ValidationError {
            record: None,
            kind: None,
            id: None,
            reason: reason.into(),
        }
    }

    /// Attach a record number unless one is already set.
    pub fn at_record(mut self, record: usize) -> Self {
        self.record.get_or_insert(record);
        self
    }

    pub fn for_kind(mut self, kind: ChangeKind) -> Self {
        self.kind.get_or_insert(kind);
        self
    }

    pub fn with_id(mut self, id: Option<String>) -> Self {
        if self.id.is_none() {
            self.id = id;
        }
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(record) = self.record {
            write!(f, "record {record}: ")?;
        }
        match (&self.kind, &self.id) {
            (Some(kind), Some(id)) => write!(f, "{kind} {id}: ")?,
            (Some(kind), None) => write!(f, "{kind}: ")?,
            (None, Some(id)) => write!(f, "{id}: ")?,
            (None, None) => {}
        }
        write!(f, "{}", self.reason)
    }
}

impl std::error::Error for ValidationError {}
