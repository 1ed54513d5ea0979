//! CI check-run parsing, filtering and aggregation.
//!
//! Raw provider records become [`CheckRun`]s, are narrowed to the jobs a lab
//! cares about, and are folded into a single [`CiResult`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::repo::RawCheckRun;

/// Job names checked when a lab does not configure its own list.
pub const DEFAULT_JOB_NAMES: &[&str] = &[
    "run-autograding-tests",
    "test",
    "build",
    "Autograding",
    "autograding",
];

/// Name given to records that arrive without one.
pub const UNNAMED_CHECK: &str = "Unnamed check";

/// Outcome of one check run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckConclusion {
    Success,
    Failure,
    /// No conclusion reported yet.
    Pending,
}

impl CheckConclusion {
    /// Interpret a provider conclusion string.
    ///
    /// Absent or empty means the run has not concluded. Every concluded value
    /// other than `success` (cancelled, timed_out, skipped, ...) counts as a failure.
    pub fn from_provider(conclusion: Option<&str>) -> Self {
        match conclusion.map(str::trim) {
            None | Some("") => CheckConclusion::Pending,
            Some(c) if c.eq_ignore_ascii_case("success") => CheckConclusion::Success,
            Some(_) => CheckConclusion::Failure,
        }
    }

    /// Status glyph used in summary lines.
    pub fn glyph(self) -> &'static str {
        match self {
            CheckConclusion::Success => "✅",
            CheckConclusion::Failure => "❌",
            CheckConclusion::Pending => "⏳",
        }
    }
}

/// One CI job outcome for a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRun {
    pub name: String,
    pub conclusion: CheckConclusion,
    pub url: String,
    pub completed_at: Option<DateTime<Utc>>,
}

impl CheckRun {
    pub fn new(name: impl Into<String>, conclusion: CheckConclusion, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            conclusion,
            url: url.into(),
            completed_at: None,
        }
    }

    pub fn with_completed_at(mut self, completed_at: DateTime<Utc>) -> Self {
        self.completed_at = Some(completed_at);
        self
    }

    pub fn succeeded(&self) -> bool {
        self.conclusion == CheckConclusion::Success
    }

    /// Job identifier embedded in the run URL, if any.
    pub fn job_id(&self) -> Option<u64> {
        job_id_from_url(&self.url)
    }
}

/// Aggregate verdict over a filtered set of check runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiResult {
    /// All runs succeeded and none is pending.
    pub passed: bool,
    pub passed_count: usize,
    pub total_count: usize,
    /// One line per run, in input order.
    pub summary: Vec<String>,
    /// Latest completion time among successful runs.
    pub latest_success_time: Option<DateTime<Utc>>,
    pub has_pending: bool,
}

/// Convert raw provider records into check runs.
///
/// Never fails: a missing name becomes [`UNNAMED_CHECK`] and an unparsable
/// completion time is dropped.
pub fn parse_check_runs(raw: &[RawCheckRun]) -> Vec<CheckRun> {
    raw.iter()
        .map(|record| CheckRun {
            name: record
                .name
                .clone()
                .unwrap_or_else(|| UNNAMED_CHECK.to_string()),
            conclusion: CheckConclusion::from_provider(record.conclusion.as_deref()),
            url: record.html_url.clone().unwrap_or_default(),
            completed_at: record.completed_at.as_deref().and_then(parse_timestamp),
        })
        .collect()
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Narrow check runs to the jobs that decide the grade.
///
/// - `Some(names)`: exactly the runs named in the list; an empty list selects nothing.
/// - `None`: runs named in [`DEFAULT_JOB_NAMES`], or every run when none of them matches.
pub fn filter_relevant_jobs(runs: &[CheckRun], configured: Option<&[String]>) -> Vec<CheckRun> {
    if let Some(names) = configured {
        return runs
            .iter()
            .filter(|run| names.iter().any(|n| n == &run.name))
            .cloned()
            .collect();
    }

    let defaults: Vec<CheckRun> = runs
        .iter()
        .filter(|run| DEFAULT_JOB_NAMES.contains(&run.name.as_str()))
        .cloned()
        .collect();

    if defaults.is_empty() {
        runs.to_vec()
    } else {
        defaults
    }
}

/// Fold check runs into a [`CiResult`].
///
/// An empty list is reported as pending rather than failed.
pub fn evaluate_ci_results(runs: &[CheckRun]) -> CiResult {
    if runs.is_empty() {
        return CiResult {
            passed: false,
            passed_count: 0,
            total_count: 0,
            summary: Vec::new(),
            latest_success_time: None,
            has_pending: true,
        };
    }

    let mut passed_count = 0;
    let mut has_pending = false;
    let mut latest_success: Option<DateTime<Utc>> = None;
    let mut summary = Vec::with_capacity(runs.len());

    for run in runs {
        match run.conclusion {
            CheckConclusion::Success => {
                passed_count += 1;
                if let Some(done) = run.completed_at {
                    latest_success = Some(latest_success.map_or(done, |t| t.max(done)));
                }
            }
            CheckConclusion::Failure => {}
            CheckConclusion::Pending => has_pending = true,
        }
        summary.push(format!("{} {} — {}", run.conclusion.glyph(), run.name, run.url));
    }

    CiResult {
        passed: passed_count == runs.len() && !has_pending,
        passed_count,
        total_count: runs.len(),
        summary,
        latest_success_time: latest_success,
        has_pending,
    }
}

/// `"{passed}/{total} {phrase}"`, e.g. `"3/4 тестов пройдено"`.
pub fn format_ci_summary(passed_count: usize, total_count: usize, phrase: &str) -> String {
    format!("{passed_count}/{total_count} {phrase}")
}

/// Extract the numeric job id from a check-run URL.
///
/// Understands `.../actions/runs/<run>/job/<id>` and `.../jobs/<id>`, and falls
/// back to a trailing numeric path segment.
pub fn job_id_from_url(url: &str) -> Option<u64> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    for pair in segments.windows(2) {
        if pair[0] == "job" || pair[0] == "jobs" {
            if let Ok(id) = pair[1].parse() {
                return Some(id);
            }
        }
    }

    segments.last().and_then(|s| s.parse().ok())
}
