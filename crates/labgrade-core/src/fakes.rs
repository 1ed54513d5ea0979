//! In-memory fakes for the collaborator traits (testing only)
//!
//! Provides `MemoryRepository`, `MemorySheet` and `RecordingSink`. The
//! repository fake logs every call so tests can assert which steps did I/O.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};

use crate::ci::CheckConclusion;
use crate::diagnostics::{DiagnosticSink, GradeEvent, Step};
use crate::error::{RepoError, SheetError};
use crate::repo::{ChangedFile, CommitInfo, RawCheckRun, RepoRef, RepoResult, RepositoryClient};
use crate::sheets::{CellRef, GradeSheet, SheetResult};

// ---------------------------------------------------------------------------
// MemoryRepository
// ---------------------------------------------------------------------------

/// Repository collaborator operations, as recorded by [`MemoryRepository`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepoCall {
    MissingFiles,
    HasCiConfig,
    LatestCommit,
    AllModifiedFiles,
    CheckRuns,
    JobLogs,
}

/// A single student repository held in memory.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    files: HashSet<String>,
    ci_config: bool,
    commit: Option<CommitInfo>,
    history: Vec<String>,
    check_runs: Vec<RawCheckRun>,
    job_logs: HashMap<u64, String>,
    failures: HashMap<RepoCall, RepoError>,
    calls: Mutex<Vec<RepoCall>>,
    fetched_jobs: Mutex<Vec<u64>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.files.extend(files.into_iter().map(Into::into));
        self
    }

    pub fn with_ci_config(mut self, present: bool) -> Self {
        self.ci_config = present;
        self
    }

    pub fn with_commit(mut self, sha: impl Into<String>, files: Vec<ChangedFile>) -> Self {
        self.commit = Some(CommitInfo {
            sha: sha.into(),
            files,
        });
        self
    }

    /// Paths reported by the whole-history scan.
    pub fn with_history<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.history.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn with_raw_check_run(mut self, run: RawCheckRun) -> Self {
        self.check_runs.push(run);
        self
    }

    /// Add a check run whose URL points at Actions job `job_id`.
    pub fn with_check_run(self, name: &str, conclusion: CheckConclusion, job_id: u64) -> Self {
        self.with_raw_check_run(raw_run(name, conclusion, job_id, None))
    }

    pub fn with_check_run_at(
        self,
        name: &str,
        conclusion: CheckConclusion,
        job_id: u64,
        completed_at: DateTime<Utc>,
    ) -> Self {
        self.with_raw_check_run(raw_run(name, conclusion, job_id, Some(completed_at)))
    }

    pub fn with_job_log(mut self, job_id: u64, logs: impl Into<String>) -> Self {
        self.job_logs.insert(job_id, logs.into());
        self
    }

    /// Make every call of `call` fail with `err`.
    pub fn failing(mut self, call: RepoCall, err: RepoError) -> Self {
        self.failures.insert(call, err);
        self
    }

    /// Calls received so far, in order.
    pub fn calls(&self) -> Vec<RepoCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called(&self, call: RepoCall) -> bool {
        self.calls.lock().unwrap().contains(&call)
    }

    /// Job ids whose logs were requested, in order.
    pub fn fetched_jobs(&self) -> Vec<u64> {
        self.fetched_jobs.lock().unwrap().clone()
    }

    fn enter(&self, call: RepoCall) -> RepoResult<()> {
        self.calls.lock().unwrap().push(call);
        match self.failures.get(&call) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

fn raw_run(
    name: &str,
    conclusion: CheckConclusion,
    job_id: u64,
    completed_at: Option<DateTime<Utc>>,
) -> RawCheckRun {
    let (status, conclusion) = match conclusion {
        CheckConclusion::Success => ("completed", Some("success")),
        CheckConclusion::Failure => ("completed", Some("failure")),
        CheckConclusion::Pending => ("in_progress", None),
    };
    RawCheckRun {
        id: Some(job_id),
        name: Some(name.to_string()),
        status: Some(status.to_string()),
        conclusion: conclusion.map(str::to_string),
        html_url: Some(format!(
            "https://github.com/org/repo/actions/runs/1000/job/{job_id}"
        )),
        completed_at: completed_at.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true)),
    }
}

#[async_trait]
impl RepositoryClient for MemoryRepository {
    async fn missing_files(&self, _repo: &RepoRef, required: &[String]) -> RepoResult<Vec<String>> {
        self.enter(RepoCall::MissingFiles)?;
        Ok(required
            .iter()
            .filter(|f| !self.files.contains(*f))
            .cloned()
            .collect())
    }

    async fn has_ci_config(&self, _repo: &RepoRef) -> RepoResult<bool> {
        self.enter(RepoCall::HasCiConfig)?;
        Ok(self.ci_config)
    }

    async fn latest_commit(&self, _repo: &RepoRef) -> RepoResult<Option<CommitInfo>> {
        self.enter(RepoCall::LatestCommit)?;
        Ok(self.commit.clone())
    }

    async fn all_modified_files(&self, _repo: &RepoRef) -> RepoResult<Vec<String>> {
        self.enter(RepoCall::AllModifiedFiles)?;
        Ok(self.history.clone())
    }

    async fn check_runs(&self, _repo: &RepoRef, _sha: &str) -> RepoResult<Vec<RawCheckRun>> {
        self.enter(RepoCall::CheckRuns)?;
        Ok(self.check_runs.clone())
    }

    async fn job_logs(&self, _repo: &RepoRef, job_id: u64) -> RepoResult<Option<String>> {
        self.fetched_jobs.lock().unwrap().push(job_id);
        self.enter(RepoCall::JobLogs)?;
        Ok(self.job_logs.get(&job_id).cloned())
    }
}

// ---------------------------------------------------------------------------
// MemorySheet
// ---------------------------------------------------------------------------

/// One group's grade sheet held in memory.
#[derive(Debug, Default)]
pub struct MemorySheet {
    grades: Mutex<HashMap<CellRef, String>>,
    deadlines: HashMap<usize, String>,
    task_orders: HashMap<usize, String>,
    writes: Mutex<Vec<(CellRef, String)>>,
    read_error: Option<SheetError>,
    write_error: Option<SheetError>,
}

impl MemorySheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_grade(self, cell: CellRef, value: impl Into<String>) -> Self {
        self.grades.lock().unwrap().insert(cell, value.into());
        self
    }

    pub fn with_deadline(mut self, lab_col: usize, value: impl Into<String>) -> Self {
        self.deadlines.insert(lab_col, value.into());
        self
    }

    pub fn with_task_order(mut self, row: usize, value: impl Into<String>) -> Self {
        self.task_orders.insert(row, value.into());
        self
    }

    pub fn failing_reads(mut self, err: SheetError) -> Self {
        self.read_error = Some(err);
        self
    }

    pub fn failing_writes(mut self, err: SheetError) -> Self {
        self.write_error = Some(err);
        self
    }

    pub fn value(&self, cell: CellRef) -> Option<String> {
        self.grades.lock().unwrap().get(&cell).cloned()
    }

    /// Successful writes, in order.
    pub fn writes(&self) -> Vec<(CellRef, String)> {
        self.writes.lock().unwrap().clone()
    }

    fn check_read(&self) -> SheetResult<()> {
        match &self.read_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl GradeSheet for MemorySheet {
    async fn current_grade(&self, cell: CellRef) -> SheetResult<String> {
        self.check_read()?;
        Ok(self.value(cell).unwrap_or_default())
    }

    async fn deadline(&self, lab_col: usize) -> SheetResult<Option<String>> {
        self.check_read()?;
        Ok(self.deadlines.get(&lab_col).cloned())
    }

    async fn task_order(&self, row: usize) -> SheetResult<Option<String>> {
        self.check_read()?;
        Ok(self.task_orders.get(&row).cloned())
    }

    async fn write_grade(&self, cell: CellRef, value: &str) -> SheetResult<()> {
        if let Some(err) = &self.write_error {
            return Err(err.clone());
        }
        self.grades.lock().unwrap().insert(cell, value.to_string());
        self.writes.lock().unwrap().push((cell, value.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RecordingSink
// ---------------------------------------------------------------------------

/// Diagnostic sink that keeps every event for later assertions.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<GradeEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<GradeEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Steps entered, in order.
    pub fn steps(&self) -> Vec<Step> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                GradeEvent::StepEntered(step) => Some(*step),
                _ => None,
            })
            .collect()
    }
}

impl DiagnosticSink for RecordingSink {
    fn record(&self, event: &GradeEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
