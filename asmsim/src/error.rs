use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Which blob of a problem is absent.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Missing {
    Generated,
    Reference,
    Both,
}

impl Missing {
    pub fn of(has_generated: bool, has_reference: bool) -> Option<Missing> {
        match (has_generated, has_reference) {
            (true, true) => None,
            (false, true) => Some(Missing::Generated),
            (true, false) => Some(Missing::Reference),
            (false, false) => Some(Missing::Both),
        }
    }
}

impl fmt::Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Missing::Generated => write!(f, "generated assembly"),
            Missing::Reference => write!(f, "reference assembly"),
            Missing::Both => write!(f, "generated and reference assembly"),
        }
    }
}

/// A problem-local issue. These never stop a batch; they are collected in the report.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProblemWarning {
    #[error("{id}: skipped, missing {missing}")]
    MissingInput { id: String, missing: Missing },
    /// A blob exists but could not be read. The problem is treated as if the blob were missing.
    #[error("{id}: unable to read {reason}")]
    Unreadable { id: String, reason: String },
    #[error("{id}: metadata not merged: {reason}")]
    MalformedMetadata { id: String, reason: String },
    #[error("{id}: unable to save metadata: {reason}")]
    SaveFailed { id: String, reason: String },
}

impl ProblemWarning {
    pub fn id(&self) -> &str {
        match self {
            ProblemWarning::MissingInput { id, .. }
            | ProblemWarning::Unreadable { id, .. }
            | ProblemWarning::MalformedMetadata { id, .. }
            | ProblemWarning::SaveFailed { id, .. } => id,
        }
    }
}

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("no problems to process")]
    NoProblems,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("no metadata for {0}")]
    NotFound(String),
    #[error("I/O error on {path:?}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("invalid JSON in {path:?}: {source}")]
    Json { path: PathBuf, source: serde_json::Error },
    #[error("metadata of {0} is not a JSON object")]
    NotAnObject(String),
}

#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("directory does not exist: {0:?}")]
    MissingBaseDir(PathBuf),
    #[error("no directories starting with {prefix:?} found in {base:?}")]
    NoProblemDirs { base: PathBuf, prefix: String },
    #[error("unable to read {path:?}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("the dump is not a JSON object")]
    NotAnObject,
    #[error("unable to write {path:?}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("unable to serialize {path:?}: {source}")]
    Json { path: PathBuf, source: serde_json::Error },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    #[error("merge target {0} is missing or not an object")]
    MissingTarget(String),
}
