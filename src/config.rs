//! Optional JSON configuration: importers, suggestion tuning and the id seed

use crate::core::{Suggester, MAX_SUGGESTIONS};
use crate::import::{Importer, ImporterConfig, ImportError, Matcher};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Read from the working directory when no `--config` is given
pub const DEFAULT_CONFIG_FILE: &str = "budgetc.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub importers: Vec<ImporterConfig>,
    pub suggestions: SuggestionConfig,
    /// Mixed into every minted id
    pub id_seed: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestionConfig {
    pub limit: usize,
    pub min_score: f64,
    pub stopwords: Vec<String>,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        SuggestionConfig {
            limit: MAX_SUGGESTIONS,
            min_score: 0.0,
            stopwords: Vec::new(),
        }
    }
}

impl SuggestionConfig {
    pub fn suggester(&self) -> Suggester {
        Suggester::new(self.limit, self.min_score, &self.stopwords)
    }
}

impl Config {
    /// Load `path` if given (it must exist), else `budgetc.json` if present, else defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::read(path),
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => Self::read(Path::new(DEFAULT_CONFIG_FILE)),
            None => {
                log::debug!("no config file, using defaults");
                Ok(Config::default())
            }
        }
    }

    fn read(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path).with_context(|| format!("opening config {}", path.display()))?;
        let config: Config = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("parsing config {}", path.display()))?;
        log::info!(
            "Loaded config {} ({} importers)",
            path.display(),
            config.importers.len()
        );
        Ok(config)
    }

    pub fn importers(&self) -> Result<Vec<Importer>, ImportError> {
        self.importers.iter().cloned().map(Importer::new).collect()
    }

    /// Starter config written by `init config`
    pub fn starter() -> Self {
        Config {
            importers: vec![ImporterConfig {
                name: "checking".to_string(),
                matcher: Matcher {
                    filename_contains: Some("checking".to_string()),
                    headers: vec![
                        "Date".to_string(),
                        "Description".to_string(),
                        "Amount".to_string(),
                    ],
                    ..Default::default()
                },
                date_column: "Date".to_string(),
                description_column: "Description".to_string(),
                amount_column: "Amount".to_string(),
                account_column: None,
                account_value: Some("Checking".to_string()),
                category_column: None,
                note_column: None,
                flip_sign: false,
                date_format: "%m/%d/%Y".to_string(),
            }],
            suggestions: SuggestionConfig::default(),
            id_seed: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_sections_use_defaults() {
        let config: Config = serde_json::from_str(r#"{"id_seed": "household"}"#).unwrap();
        assert_eq!(config.id_seed, "household");
        assert!(config.importers.is_empty());
        assert_eq!(config.suggestions.limit, MAX_SUGGESTIONS);
    }

    #[test]
    fn suggestion_limit_is_clamped() {
        let config: Config =
            serde_json::from_str(r#"{"suggestions": {"limit": 0, "stopwords": ["pos"]}}"#).unwrap();
        assert_eq!(config.suggestions.suggester().limit(), 1);
    }

    #[test]
    fn starter_round_trips_and_builds_importers() {
        let json = serde_json::to_string_pretty(&Config::starter()).unwrap();
        let config: Config = serde_json::from_str(&json).unwrap();
        let importers = config.importers().unwrap();
        assert_eq!(importers.len(), 1);
        assert_eq!(importers[0].name(), "checking");
    }

    #[test]
    fn load_reads_explicit_path() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"id_seed": "from-file"}}"#).unwrap();
        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.id_seed, "from-file");

        assert!(Config::load(Some(Path::new("/nonexistent/budgetc.json"))).is_err());
    }
}
