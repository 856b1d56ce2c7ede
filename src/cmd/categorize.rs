//! Categorize command - interactive category assignment producing a changeset

use crate::cmd::read_transactions;
use crate::config::Config;
use crate::core::{
    format_amount, load_changeset, write_changeset, ChangeRecord, ChangesetFormat, HistoryIndex,
    SuggestionCandidate, Transaction, MAX_SUGGESTIONS,
};
use crate::utils;
use anyhow::Context;
use clap::Args;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::str::FromStr;

/// Prefix for categories proposed without operator confirmation
pub const SUGGESTED_PREFIX: &str = "suggested:";

#[derive(Args, Debug)]
pub struct CategorizeCommand {
    /// Transaction files to categorize
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Categorized transaction files used as suggestion history
    #[arg(long, num_args = 1..)]
    categorized: Vec<PathBuf>,

    /// Changeset to write (.csv or .json)
    #[arg(short, long)]
    output: PathBuf,

    /// Don't prompt; write the top suggestion for each transaction
    #[arg(long)]
    no_input: bool,

    /// With --no-input, write suggestions as plain categories instead of `suggested:<category>`
    #[arg(long, requires = "no_input")]
    auto_confirm: bool,

    /// Replace an existing output changeset instead of appending to it.
    /// When nothing is recorded, the existing file is removed.
    #[arg(long)]
    overwrite: bool,
}

impl CategorizeCommand {
    pub fn exec(&self, config: &Config) -> anyhow::Result<()> {
        let format = ChangesetFormat::from_path(&self.output)?;
        let transactions = read_transactions(&self.inputs)?;
        let history = read_transactions(&self.categorized)?;

        let suggester = config.suggestions.suggester();
        let index = suggester.index(history.iter().chain(transactions.iter()));
        if index.is_empty() {
            log::warn!("No categorized history, suggestions unavailable");
        }
        let targets: Vec<Transaction> = transactions
            .into_iter()
            .filter(|t| !t.is_categorized())
            .collect();
        log::info!(
            "{} uncategorized transactions, {} known categories",
            targets.len(),
            index.categories().count()
        );

        let records = if self.no_input {
            suggest_all(&index, &targets, self.auto_confirm)
        } else {
            let stdin = io::stdin();
            let stdout = io::stdout();
            Session::new(stdin.lock(), stdout.lock(), index).run(&targets)?
        };
        if records.is_empty() {
            if self.overwrite && !utils::is_stdio(&self.output) && self.output.exists() {
                fs::remove_file(&self.output)
                    .with_context(|| format!("removing {}", self.output.display()))?;
                log::warn!("No categories recorded, removed {}", self.output.display());
            } else {
                log::warn!("No categories recorded, {} left unchanged", self.output.display());
            }
            return Ok(());
        }

        let mut changes = Vec::new();
        if !self.overwrite && self.output.exists() {
            changes = load_changeset(&self.output)
                .with_context(|| format!("reading existing changeset {}", self.output.display()))?;
        }
        changes.extend(records);

        utils::write_output(&self.output, |out| {
            write_changeset(&changes, format, out)?;
            Ok(())
        })
    }
}

/// Top suggestion for every target that has one
pub fn suggest_all(index: &HistoryIndex, targets: &[Transaction], confirmed: bool) -> Vec<ChangeRecord> {
    targets
        .iter()
        .filter_map(|txn| {
            let top = index.suggest(&txn.description).into_iter().next()?;
            let category = if confirmed {
                top.category
            } else {
                format!("{SUGGESTED_PREFIX}{}", top.category)
            };
            Some(ChangeRecord::set_category(txn.id.clone(), category))
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Choice {
    Next,
    Prev,
    Confirm,
    Pick(usize),
    Edit,
    Quit,
}

impl FromStr for Choice {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "n" | "" => Ok(Choice::Next),
            "p" => Ok(Choice::Prev),
            "c" => Ok(Choice::Confirm),
            "e" => Ok(Choice::Edit),
            "q" => Ok(Choice::Quit),
            digit => match digit.parse::<usize>() {
                Ok(n) if (1..=MAX_SUGGESTIONS).contains(&n) => Ok(Choice::Pick(n)),
                _ => Err(()),
            },
        }
    }
}

/// Prompt loop over uncategorized transactions.
///
/// Answers are collected as `update` records, one per transaction; answering
/// the same transaction again replaces the earlier answer. Every answer is
/// recorded in the history index so later prompts learn from it.
pub struct Session<R, W> {
    input: R,
    output: W,
    index: HistoryIndex,
    answers: Vec<(String, String)>,
}

impl<R: BufRead, W: Write> Session<R, W> {
    pub fn new(input: R, output: W, index: HistoryIndex) -> Self {
        Session {
            input,
            output,
            index,
            answers: Vec::new(),
        }
    }

    pub fn run(mut self, targets: &[Transaction]) -> io::Result<Vec<ChangeRecord>> {
        let mut cursor = 0;
        while cursor < targets.len() {
            let txn = &targets[cursor];
            let suggestions = self.index.suggest(&txn.description);
            self.show(cursor, targets.len(), txn, &suggestions)?;

            let Some(line) = self.prompt("[n]ext [p]rev [c]onfirm [1-9] pick [e]dit [q]uit > ")? else {
                break;
            };
            match line.parse::<Choice>() {
                Ok(Choice::Next) => cursor += 1,
                Ok(Choice::Prev) => cursor = cursor.saturating_sub(1),
                Ok(Choice::Quit) => break,
                Ok(Choice::Confirm) => match suggestions.first() {
                    Some(top) => {
                        self.answer(txn, &top.category)?;
                        cursor += 1;
                    }
                    None => writeln!(self.output, "No suggestion to confirm")?,
                },
                Ok(Choice::Pick(n)) => match suggestions.get(n - 1) {
                    Some(pick) => {
                        self.answer(txn, &pick.category)?;
                        cursor += 1;
                    }
                    None => writeln!(self.output, "No suggestion {n}")?,
                },
                Ok(Choice::Edit) => {
                    let default = suggestions.first().map(|s| s.category.as_str()).unwrap_or("");
                    let Some(entered) = self.prompt(&format!("category [{default}]: "))? else {
                        break;
                    };
                    let category = match entered.trim() {
                        "" => default.to_string(),
                        typed => typed.to_string(),
                    };
                    if category.is_empty() {
                        writeln!(self.output, "No category entered")?;
                    } else {
                        self.answer(txn, &category)?;
                        cursor += 1;
                    }
                }
                Err(()) => writeln!(self.output, "Unrecognized choice '{}'", line.trim())?,
            }
        }

        Ok(self
            .answers
            .into_iter()
            .map(|(id, category)| ChangeRecord::set_category(id, category))
            .collect())
    }

    fn show(
        &mut self,
        cursor: usize,
        total: usize,
        txn: &Transaction,
        suggestions: &[SuggestionCandidate],
    ) -> io::Result<()> {
        writeln!(self.output)?;
        writeln!(
            self.output,
            "[{}/{}] {}  {}  {}  {}",
            cursor + 1,
            total,
            txn.date,
            format_amount(txn.amount),
            txn.account,
            txn.description
        )?;
        if let Some((_, category)) = self.answers.iter().find(|(id, _)| id == &txn.id) {
            writeln!(self.output, "    current answer: {category}")?;
        }
        if suggestions.is_empty() {
            writeln!(self.output, "    (no suggestions)")?;
        }
        for (i, s) in suggestions.iter().enumerate() {
            writeln!(self.output, "    {}) {} ({:.2})", i + 1, s.category, s.score)?;
        }
        Ok(())
    }

    /// `None` at end of input
    fn prompt(&mut self, text: &str) -> io::Result<Option<String>> {
        write!(self.output, "{text}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }

    fn answer(&mut self, txn: &Transaction, category: &str) -> io::Result<()> {
        match self.answers.iter_mut().find(|(id, _)| id == &txn.id) {
            Some(answer) => answer.1 = category.to_string(),
            None => self.answers.push((txn.id.clone(), category.to_string())),
        }
        self.index.record(&txn.description, category);
        writeln!(self.output, "    -> {category}")
    }
}
