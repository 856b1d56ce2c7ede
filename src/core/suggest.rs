use super::transaction::Transaction;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// One per single-digit selection key
pub const MAX_SUGGESTIONS: usize = 9;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestionCandidate {
    pub category: String,
    /// Fraction of the target's tokens seen in this category's history, in `[0, 1]`
    pub score: f64,
}

/// Lowercased word tokens of a description.
///
/// Anything that is not alphanumeric separates tokens. Tokens made only of
/// digits (store numbers, references) and stopwords are dropped.
pub fn tokenize(text: &str, stopwords: &HashSet<String>) -> BTreeSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .filter(|token| !token.chars().all(|c| c.is_ascii_digit()))
        .filter(|token| !stopwords.contains(*token))
        .map(str::to_string)
        .collect()
}

fn usable_category(category: Option<&str>) -> Option<&str> {
    category
        .map(str::trim)
        .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case("uncategorized"))
}

#[derive(Debug, Clone)]
pub struct Suggester {
    limit: usize,
    min_score: f64,
    stopwords: HashSet<String>,
}

impl Default for Suggester {
    fn default() -> Self {
        Suggester {
            limit: MAX_SUGGESTIONS,
            min_score: 0.0,
            stopwords: HashSet::new(),
        }
    }
}

impl Suggester {
    /// `limit` is clamped to `1..=9`.
    pub fn new<I, S>(limit: usize, min_score: f64, stopwords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Suggester {
            limit: limit.clamp(1, MAX_SUGGESTIONS),
            min_score,
            stopwords: stopwords
                .into_iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    #[cfg(test)]
    pub(crate) fn limit(&self) -> usize {
        self.limit
    }

    pub fn index<'a, I>(&self, history: I) -> HistoryIndex
    where
        I: IntoIterator<Item = &'a Transaction>,
    {
        let mut index = HistoryIndex {
            suggester: self.clone(),
            categories: BTreeMap::new(),
        };
        for txn in history {
            index.record(&txn.description, txn.category.as_deref().unwrap_or(""));
        }
        index
    }
}

/// Category to token-set index over categorized history
#[derive(Debug, Clone)]
pub struct HistoryIndex {
    suggester: Suggester,
    categories: BTreeMap<String, HashSet<String>>,
}

impl HistoryIndex {
    /// Add one categorized description. Empty and "uncategorized" categories are ignored.
    pub fn record(&mut self, description: &str, category: &str) {
        let Some(category) = usable_category(Some(category)) else {
            return;
        };
        let tokens = tokenize(description, &self.suggester.stopwords);
        self.categories
            .entry(category.to_string())
            .or_default()
            .extend(tokens);
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Ranked by descending score, then category name.
    pub fn suggest(&self, description: &str) -> Vec<SuggestionCandidate> {
        let target = tokenize(description, &self.suggester.stopwords);
        if target.is_empty() {
            return Vec::new();
        }

        let mut candidates: Vec<SuggestionCandidate> = self
            .categories
            .iter()
            .filter_map(|(category, tokens)| {
                let shared = target.iter().filter(|t| tokens.contains(*t)).count();
                let score = shared as f64 / target.len() as f64;
                (shared > 0 && score >= self.suggester.min_score).then(|| SuggestionCandidate {
                    category: category.clone(),
                    score,
                })
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.category.cmp(&b.category))
        });
        candidates.truncate(self.suggester.limit);
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transaction::parse_date;
    use rust_decimal_macros::dec;

    fn txn(description: &str, category: Option<&str>) -> Transaction {
        Transaction {
            id: description.to_string(),
            date: parse_date("2025-01-01").unwrap(),
            description: description.to_string(),
            amount: dec!(-10),
            account: "Checking".to_string(),
            category: category.map(str::to_string),
            note: None,
        }
    }

    fn suggest(target: &Transaction, history: &[Transaction]) -> Vec<SuggestionCandidate> {
        Suggester::default().index(history).suggest(&target.description)
    }

    fn history() -> Vec<Transaction> {
        vec![
            txn("WM SUPERCENTER", Some("Groceries")),
            txn("WM SUPERCENTER #44", Some("Groceries")),
            txn("WM NEIGHBORHOOD MKT", Some("Household")),
        ]
    }

    #[test]
    fn store_number_does_not_dilute_score() {
        let result = suggest(&txn("WM SUPERCENTER #1234", None), &history());
        assert_eq!(
            result,
            vec![
                SuggestionCandidate { category: "Groceries".to_string(), score: 1.0 },
                SuggestionCandidate { category: "Household".to_string(), score: 0.5 },
            ]
        );
    }

    #[test]
    fn tokenizer_splits_on_punctuation() {
        let tokens = tokenize("AMZN Mktp*US 12/03 Co.", &HashSet::new());
        let tokens: Vec<_> = tokens.iter().map(String::as_str).collect();
        assert_eq!(tokens, ["amzn", "co", "mktp", "us"]);
    }

    #[test]
    fn empty_or_uncategorized_history_yields_nothing() {
        let target = txn("WM SUPERCENTER", None);
        assert!(suggest(&target, &[]).is_empty());
        let history = vec![
            txn("WM SUPERCENTER", None),
            txn("WM SUPERCENTER", Some("Uncategorized")),
            txn("WM SUPERCENTER", Some("  ")),
        ];
        assert!(suggest(&target, &history).is_empty());
    }

    #[test]
    fn no_shared_tokens_yields_nothing() {
        assert!(suggest(&txn("SHELL OIL", None), &history()).is_empty());
        assert!(suggest(&txn("#1234", None), &history()).is_empty());
    }

    #[test]
    fn ties_break_by_category_name() {
        let history = vec![txn("CORNER SHOP", Some("Snacks")), txn("CORNER SHOP", Some("Coffee"))];
        let names: Vec<_> = suggest(&txn("CORNER SHOP", None), &history)
            .into_iter()
            .map(|c| c.category)
            .collect();
        assert_eq!(names, ["Coffee", "Snacks"]);
    }

    #[test]
    fn bounded_to_nine_and_deterministic() {
        let history: Vec<_> = (0..15)
            .map(|i| txn(&format!("MARKET STALL{i}"), Some(&format!("Cat{i:02}"))))
            .collect();
        let target = txn("MARKET", None);
        let first = suggest(&target, &history);
        assert_eq!(first.len(), MAX_SUGGESTIONS);
        assert_eq!(first, suggest(&target, &history));
        assert!(first.iter().all(|c| (0.0..=1.0).contains(&c.score)));
        assert_eq!(first[0].category, "Cat00");
    }

    #[test]
    fn limit_min_score_and_stopwords() {
        let result = Suggester::new(1, 0.0, ["wm"]).index(&history()).suggest("WM SUPERCENTER");
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].category, "Groceries");

        let strict = Suggester::new(0, 0.75, Vec::<String>::new()).index(&history());
        assert_eq!(strict.suggest("WM SUPERCENTER #1234").len(), 1);

        let many: Vec<_> = (0..15)
            .map(|i| txn(&format!("MARKET STALL{i}"), Some(&format!("Cat{i:02}"))))
            .collect();
        let wide = Suggester::new(20, 0.0, Vec::<String>::new()).index(&many);
        assert_eq!(wide.suggest("MARKET").len(), MAX_SUGGESTIONS);
        assert!(!wide.is_empty());
        assert!(Suggester::default().index(&[]).is_empty());
    }

    #[test]
    fn recorded_answers_feed_later_suggestions() {
        let mut index = Suggester::default().index(&history());
        assert!(index.suggest("SHELL OIL 5544").is_empty());
        index.record("SHELL OIL 5544", "Fuel");
        let result = index.suggest("SHELL OIL 9911");
        assert_eq!(result[0].category, "Fuel");
        assert_eq!(result[0].score, 1.0);
        assert_eq!(index.categories().collect::<Vec<_>>(), ["Fuel", "Groceries", "Household"]);
    }
}
