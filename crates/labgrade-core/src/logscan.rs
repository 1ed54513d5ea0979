//! Finite scan over successful CI jobs' logs.
//!
//! TASKID and score lookups share one rule: walk successful runs in order,
//! fetch each job's log, and stop at the first run that yields a value or a
//! conflict. A run whose log is unavailable or holds nothing is skipped.

use std::collections::HashMap;

use crate::ci::CheckRun;
use crate::diagnostics::{DiagnosticSink, GradeEvent};
use crate::repo::{RepoRef, RepositoryClient};

/// What one log said about the value being looked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction<T> {
    Found(T),
    Conflict(Vec<T>),
    Missing,
}

/// Exit reason of a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogScan<T> {
    /// First run that produced a value.
    Found { value: T, job_id: u64 },
    /// A run's log held several distinct values; the scan stopped there.
    Conflict { values: Vec<T>, job_id: u64 },
    /// No run produced a value.
    Exhausted,
}

/// Job logs fetched during one grading attempt, keyed by job id.
///
/// A `None` entry records a job whose log could not be obtained.
#[derive(Debug, Default)]
pub struct LogCache {
    logs: HashMap<u64, Option<String>>,
}

impl LogCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }

    async fn fetch(
        &mut self,
        client: &dyn RepositoryClient,
        repo: &RepoRef,
        job_id: u64,
        sink: &dyn DiagnosticSink,
    ) -> Option<&str> {
        if !self.logs.contains_key(&job_id) {
            let logs = match client.job_logs(repo, job_id).await {
                Ok(logs) => logs,
                Err(err) => {
                    sink.record(&GradeEvent::JobLogMissing {
                        job_id: Some(job_id),
                        reason: err.to_string(),
                    });
                    None
                }
            };
            self.logs.insert(job_id, logs);
        }
        self.logs.get(&job_id).and_then(|l| l.as_deref())
    }
}

/// Scan successful `runs` in order with `extract`.
pub async fn scan_job_logs<T, F>(
    client: &dyn RepositoryClient,
    repo: &RepoRef,
    runs: &[CheckRun],
    cache: &mut LogCache,
    sink: &dyn DiagnosticSink,
    extract: F,
) -> LogScan<T>
where
    F: Fn(&str) -> Extraction<T>,
{
    for run in runs.iter().filter(|r| r.succeeded()) {
        let Some(job_id) = run.job_id() else {
            sink.record(&GradeEvent::JobLogMissing {
                job_id: None,
                reason: format!("no job id in {}", run.url),
            });
            continue;
        };

        let Some(logs) = cache.fetch(client, repo, job_id, sink).await else {
            sink.record(&GradeEvent::JobLogMissing {
                job_id: Some(job_id),
                reason: "logs unavailable".to_string(),
            });
            continue;
        };

        match extract(logs) {
            Extraction::Found(value) => return LogScan::Found { value, job_id },
            Extraction::Conflict(values) => return LogScan::Conflict { values, job_id },
            Extraction::Missing => continue,
        }
    }
    LogScan::Exhausted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ci::CheckConclusion;
    use crate::fakes::{MemoryRepository, RecordingSink};
    use crate::taskid::{extract_taskid, TaskIdExtraction};

    fn run(name: &str, conclusion: CheckConclusion, job: u64) -> CheckRun {
        CheckRun::new(
            name,
            conclusion,
            format!("https://github.com/o/r/actions/runs/1/job/{job}"),
        )
    }

    fn taskid(logs: &str) -> Extraction<u32> {
        match extract_taskid(logs) {
            TaskIdExtraction::Found(v) => Extraction::Found(v),
            TaskIdExtraction::Conflict(vs) => Extraction::Conflict(vs),
            TaskIdExtraction::NotFound | TaskIdExtraction::EmptyLog => Extraction::Missing,
        }
    }

    fn repo() -> RepoRef {
        RepoRef::new("o", "r")
    }

    #[tokio::test]
    async fn first_found_wins_and_skips_missing() {
        let client = MemoryRepository::new()
            .with_job_log(1, "2024-01-01T00:00:00Z nothing here")
            .with_job_log(2, "2024-01-01T00:00:00Z TASKID is 4")
            .with_job_log(3, "2024-01-01T00:00:00Z TASKID is 9");
        let runs = vec![
            run("a", CheckConclusion::Success, 1),
            run("b", CheckConclusion::Success, 2),
            run("c", CheckConclusion::Success, 3),
        ];
        let sink = RecordingSink::new();
        let mut cache = LogCache::new();

        let scan = scan_job_logs(&client, &repo(), &runs, &mut cache, &sink, taskid).await;
        assert_eq!(scan, LogScan::Found { value: 4, job_id: 2 });
        assert_eq!(client.fetched_jobs(), vec![1, 2]);
    }

    #[tokio::test]
    async fn conflict_aborts_the_scan() {
        let client = MemoryRepository::new()
            .with_job_log(1, "2024-01-01T00:00:00Z TASKID is 1\n2024-01-01T00:00:01Z TASKID is 2")
            .with_job_log(2, "2024-01-01T00:00:00Z TASKID is 4");
        let runs = vec![
            run("a", CheckConclusion::Success, 1),
            run("b", CheckConclusion::Success, 2),
        ];
        let sink = RecordingSink::new();
        let mut cache = LogCache::new();

        let scan = scan_job_logs(&client, &repo(), &runs, &mut cache, &sink, taskid).await;
        assert_eq!(scan, LogScan::Conflict { values: vec![1, 2], job_id: 1 });
        assert_eq!(client.fetched_jobs(), vec![1]);
    }

    #[tokio::test]
    async fn failed_runs_and_missing_logs_are_skipped() {
        let client = MemoryRepository::new().with_job_log(5, "2024-01-01T00:00:00Z TASKID is 3");
        let runs = vec![
            run("failed", CheckConclusion::Failure, 5),
            run("no-logs", CheckConclusion::Success, 6),
            CheckRun::new("no-url", CheckConclusion::Success, ""),
        ];
        let sink = RecordingSink::new();
        let mut cache = LogCache::new();

        let scan = scan_job_logs(&client, &repo(), &runs, &mut cache, &sink, taskid).await;
        assert_eq!(scan, LogScan::Exhausted);
        assert_eq!(client.fetched_jobs(), vec![6]);
        assert_eq!(
            sink.events()
                .iter()
                .filter(|e| matches!(e, GradeEvent::JobLogMissing { .. }))
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn cache_avoids_refetching() {
        let client = MemoryRepository::new().with_job_log(7, "2024-01-01T00:00:00Z TASKID is 3");
        let runs = vec![run("a", CheckConclusion::Success, 7)];
        let sink = RecordingSink::new();
        let mut cache = LogCache::new();

        scan_job_logs(&client, &repo(), &runs, &mut cache, &sink, taskid).await;
        scan_job_logs(&client, &repo(), &runs, &mut cache, &sink, taskid).await;
        assert_eq!(client.fetched_jobs(), vec![7]);
        assert_eq!(cache.len(), 1);
    }
}
