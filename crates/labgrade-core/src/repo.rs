//! Repository collaborator contract.
//!
//! The grader never talks to a code host directly. Everything it learns about
//! a submission arrives through [`RepositoryClient`]:
//! - which required files are missing
//! - whether CI is configured at all
//! - the latest commit and its changed files
//! - every file touched across the repository history
//! - check runs for a commit, and the logs of individual jobs
//!
//! In-memory fakes for tests live in [`crate::fakes`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RepoError;

/// Result type for repository collaborator calls
pub type RepoResult<T> = std::result::Result<T, RepoError>;

/// Owner/name pair identifying a student repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Student repositories are named `{prefix}-{username}` inside the course organization.
    pub fn for_student(org: &str, prefix: &str, username: &str) -> Self {
        Self::new(org, format!("{prefix}-{username}"))
    }
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Change status of a file within one commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    Modified,
    Removed,
    Renamed,
    Copied,
    Changed,
    Unchanged,
    #[default]
    #[serde(other)]
    Unknown,
}

/// A file entry from a commit's change list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub filename: String,
    #[serde(default)]
    pub status: FileStatus,
}

impl ChangedFile {
    pub fn new(filename: impl Into<String>, status: FileStatus) -> Self {
        Self {
            filename: filename.into(),
            status,
        }
    }
}

/// The latest commit of a repository together with the files it changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub sha: String,
    #[serde(default)]
    pub files: Vec<ChangedFile>,
}

/// A check-run record exactly as the provider reported it.
///
/// Every field is optional; interpretation happens in [`crate::ci::parse_check_runs`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawCheckRun {
    pub id: Option<u64>,
    pub name: Option<String>,
    pub status: Option<String>,
    pub conclusion: Option<String>,
    pub html_url: Option<String>,
    pub completed_at: Option<String>,
}

/// Read-only view of a student repository.
///
/// Implementations perform the actual I/O. The grader calls these methods in a
/// fixed order and stops calling them as soon as a terminal result is known.
#[async_trait]
pub trait RepositoryClient: Send + Sync {
    /// Return the subset of `required` paths that do not exist, in input order.
    async fn missing_files(&self, repo: &RepoRef, required: &[String]) -> RepoResult<Vec<String>>;

    /// Whether the repository carries a CI configuration directory.
    async fn has_ci_config(&self, repo: &RepoRef) -> RepoResult<bool>;

    /// Latest commit with its changed files, or `None` for an empty repository.
    async fn latest_commit(&self, repo: &RepoRef) -> RepoResult<Option<CommitInfo>>;

    /// Every path touched by any commit in the repository history.
    async fn all_modified_files(&self, repo: &RepoRef) -> RepoResult<Vec<String>>;

    /// Check runs attached to a commit.
    async fn check_runs(&self, repo: &RepoRef, sha: &str) -> RepoResult<Vec<RawCheckRun>>;

    /// Plain-text logs of one CI job, or `None` when they are not available.
    async fn job_logs(&self, repo: &RepoRef, job_id: u64) -> RepoResult<Option<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn student_repo_name_joins_prefix_and_username() {
        let repo = RepoRef::for_student("suai-os", "os-task2", "octocat");
        assert_eq!(repo.name, "os-task2-octocat");
        assert_eq!(repo.to_string(), "suai-os/os-task2-octocat");
    }

    #[test]
    fn unknown_file_status_deserializes_as_unknown() {
        let file: ChangedFile =
            serde_json::from_str(r#"{"filename": "a.py", "status": "exploded"}"#).unwrap();
        assert_eq!(file.status, FileStatus::Unknown);

        let file: ChangedFile = serde_json::from_str(r#"{"filename": "b.py"}"#).unwrap();
        assert_eq!(file.status, FileStatus::Unknown);
    }

    #[test]
    fn raw_check_run_tolerates_missing_fields() {
        let run: RawCheckRun = serde_json::from_str(r#"{"conclusion": "success"}"#).unwrap();
        assert_eq!(run.name, None);
        assert_eq!(run.conclusion.as_deref(), Some("success"));
    }
}
