//! Error types for the date checker.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CheckError {
    /// The knowledge base is empty or one of its records is unusable.
    #[error("cannot build event index: {0}")]
    IndexBuild(String),

    /// Sentences, parses and offsets must correspond one to one.
    #[error(
        "annotation counts disagree: {sentences} sentences, {parses} parses, {offsets} offset pairs"
    )]
    ContractViolation {
        sentences: usize,
        parses: usize,
        offsets: usize,
    },

    /// A dependency parse could not be turned into a tree.
    #[error("malformed parse tree: {0}")]
    ParseTree(String),

    /// Some request files of a batch run could not be checked.
    #[error("{failed} of {total} request file(s) failed")]
    BatchFailures { failed: usize, total: usize },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type CheckResult<T> = Result<T, CheckError>;
