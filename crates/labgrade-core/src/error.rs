//! Error types for labgrade-core

use std::path::PathBuf;

use thiserror::Error;

/// Errors reported by a repository collaborator (GitHub or a fake).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepoError {
    /// Network or client-side failure before a response arrived
    #[error("transport error: {0}")]
    Transport(String),

    /// The provider answered with an unexpected HTTP status
    #[error("unexpected HTTP status {status} for {url}")]
    Status { status: u16, url: String },

    /// The response body could not be decoded
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The repository itself does not exist or is not visible
    #[error("repository not found: {0}")]
    NotFound(String),
}

/// Errors reported by a spreadsheet collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SheetError {
    #[error("sheet request failed: {0}")]
    Request(String),

    #[error("cell {row}:{col} is out of range")]
    OutOfRange { row: usize, col: usize },
}

/// Errors raised while loading or resolving course configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid course YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid lab id: {0}")]
    InvalidLabId(String),

    #[error("lab not found in course: {0}")]
    LabNotFound(String),

    #[error("course configuration is missing {0}")]
    MissingField(&'static str),
}

/// Errors produced by the grading helpers outside the orchestrator boundary.
///
/// The orchestrator itself never returns these; it folds every failure into a
/// terminal [`crate::GradeResult`].
#[derive(Error, Debug)]
pub enum GradeError {
    #[error("taskid max must be positive, got {0}")]
    InvalidTaskIdMax(i64),

    #[error("invalid deadline value: {0:?}")]
    InvalidDeadline(String),

    #[error("invalid task order value: {0:?}")]
    InvalidTaskOrder(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error(transparent)]
    Sheet(#[from] SheetError),
}

/// Result type for labgrade-core helpers
pub type Result<T> = std::result::Result<T, GradeError>;
