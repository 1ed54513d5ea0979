//! Response bodies of the GitHub REST endpoints the client reads.
//!
//! Only the fields the grader needs are declared; everything else in the
//! payload is ignored.

use labgrade_core::{ChangedFile, RawCheckRun};
use serde::Deserialize;

/// Entry of `GET /repos/{o}/{r}/commits`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CommitSummary {
    pub sha: String,
}

/// Body of `GET /repos/{o}/{r}/commits/{sha}`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CommitDetail {
    pub sha: String,
    #[serde(default)]
    pub files: Vec<ChangedFile>,
}

/// Body of `GET /repos/{o}/{r}/commits/{sha}/check-runs`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct CheckRunsPage {
    pub total_count: u64,
    pub check_runs: Vec<RawCheckRun>,
}
