//! Checker configuration, loaded from TOML with every field defaulted.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CheckError, CheckResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckerConfig {
    /// JSON array of `{event, dates}` records.
    #[serde(default = "default_knowledge_base")]
    pub knowledge_base: PathBuf,
    /// Optional `form<TAB>lemma` table from a morphological analyzer.
    #[serde(default)]
    pub lemma_dictionary: Option<PathBuf>,
    /// Best-candidate score must be strictly above this to compare dates.
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f32,
    #[serde(default = "default_examined_candidates")]
    pub examined_candidates: usize,
    /// How many top-ranked events survive before the year filter applies.
    #[serde(default = "default_retrieval_depth")]
    pub retrieval_depth: usize,
    /// Per-token fuzzy ratio (0–100) for locating a date in the parse.
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,
    #[serde(default = "default_max_features")]
    pub max_features: usize,
    /// Only essays on these subjects are checked.
    #[serde(default = "default_subjects")]
    pub subjects: Vec<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_knowledge_base() -> PathBuf {
    PathBuf::from("history_dates.json")
}

fn default_score_threshold() -> f32 {
    0.2
}

fn default_examined_candidates() -> usize {
    5
}

fn default_retrieval_depth() -> usize {
    100
}

fn default_fuzzy_threshold() -> f64 {
    80.0
}

fn default_max_features() -> usize {
    100_000
}

fn default_subjects() -> Vec<String> {
    vec!["история".to_string()]
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            knowledge_base: default_knowledge_base(),
            lemma_dictionary: None,
            score_threshold: default_score_threshold(),
            examined_candidates: default_examined_candidates(),
            retrieval_depth: default_retrieval_depth(),
            fuzzy_threshold: default_fuzzy_threshold(),
            max_features: default_max_features(),
            subjects: default_subjects(),
            log_level: default_log_level(),
        }
    }
}

impl CheckerConfig {
    pub fn validate(&self) -> CheckResult<()> {
        if !(0.0..=100.0).contains(&self.fuzzy_threshold) {
            return Err(CheckError::Config(format!(
                "fuzzy_threshold must lie in [0, 100], got {}",
                self.fuzzy_threshold
            )));
        }
        if self.examined_candidates == 0 {
            return Err(CheckError::Config(
                "examined_candidates must be at least 1".to_string(),
            ));
        }
        if self.retrieval_depth == 0 || self.max_features == 0 {
            return Err(CheckError::Config(
                "retrieval_depth and max_features must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load configuration from a TOML file.
pub fn load_config(path: &Path) -> CheckResult<CheckerConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        CheckError::Io(std::io::Error::other(format!(
            "cannot read config file {}: {e}",
            path.display()
        )))
    })?;
    let config: CheckerConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}
