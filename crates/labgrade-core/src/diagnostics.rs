//! Diagnostic events emitted while grading.
//!
//! The grader reports progress to an injected [`DiagnosticSink`] instead of
//! logging through process globals. [`TracingSink`] forwards events to
//! `tracing` with an `event = "grade.*"` field; [`NullSink`] drops them.

use std::fmt;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::result::{ErrorCode, GradeStatus};

/// Pipeline stage of one grading attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    CheckingRepo,
    CheckingForbidden,
    EvaluatingCi,
    ValidatingTaskId,
    ExtractingScore,
    CalculatingPenalty,
    CheckingProtection,
    Done,
}

impl Step {
    pub fn as_str(self) -> &'static str {
        match self {
            Step::CheckingRepo => "checking_repo",
            Step::CheckingForbidden => "checking_forbidden",
            Step::EvaluatingCi => "evaluating_ci",
            Step::ValidatingTaskId => "validating_taskid",
            Step::ExtractingScore => "extracting_score",
            Step::CalculatingPenalty => "calculating_penalty",
            Step::CheckingProtection => "checking_protection",
            Step::Done => "done",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something worth recording during a grading attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GradeEvent {
    Started { attempt_id: Uuid, repo: String },
    StepEntered(Step),
    ForbiddenViolations { paths: Vec<String> },
    CiEvaluated { passed: usize, total: usize, pending: bool },
    JobLogMissing { job_id: Option<u64>, reason: String },
    RepositoryFailure { step: Step, reason: String },
    TaskIdResolved { found: u32, expected: u32 },
    ScoreResolved { score: String },
    PenaltyApplied { penalty: i64, strategy: String },
    Finished { status: GradeStatus, error_code: Option<ErrorCode> },
}

/// Receiver for [`GradeEvent`]s.
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, event: &GradeEvent);
}

/// Forwards events to the `tracing` subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&self, event: &GradeEvent) {
        match event {
            GradeEvent::Started { attempt_id, repo } => {
                info!(event = "grade.started", attempt_id = %attempt_id, repo = %repo);
            }
            GradeEvent::StepEntered(step) => {
                debug!(event = "grade.step", step = %step);
            }
            GradeEvent::ForbiddenViolations { paths } => {
                warn!(event = "grade.forbidden", paths = ?paths);
            }
            GradeEvent::CiEvaluated { passed, total, pending } => {
                info!(
                    event = "grade.ci_evaluated",
                    passed = passed,
                    total = total,
                    pending = pending,
                );
            }
            GradeEvent::JobLogMissing { job_id, reason } => {
                debug!(event = "grade.job_log_missing", job_id = ?job_id, reason = %reason);
            }
            GradeEvent::RepositoryFailure { step, reason } => {
                warn!(event = "grade.repository_failure", step = %step, reason = %reason);
            }
            GradeEvent::TaskIdResolved { found, expected } => {
                info!(event = "grade.taskid", found = found, expected = expected);
            }
            GradeEvent::ScoreResolved { score } => {
                info!(event = "grade.score", score = %score);
            }
            GradeEvent::PenaltyApplied { penalty, strategy } => {
                info!(event = "grade.penalty", penalty = penalty, strategy = %strategy);
            }
            GradeEvent::Finished { status, error_code } => {
                info!(event = "grade.finished", status = ?status, error_code = ?error_code);
            }
        }
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn record(&self, _event: &GradeEvent) {}
}

/// Span wrapping one grading attempt.
pub fn grade_span(attempt_id: Uuid, repo: &str) -> tracing::Span {
    tracing::info_span!("labgrade.grade", attempt_id = %attempt_id, repo = %repo)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sinks_accept_every_event_kind() {
        let events = [
            GradeEvent::Started { attempt_id: Uuid::new_v4(), repo: "o/r".into() },
            GradeEvent::StepEntered(Step::EvaluatingCi),
            GradeEvent::ForbiddenViolations { paths: vec!["tests/".into()] },
            GradeEvent::CiEvaluated { passed: 1, total: 2, pending: false },
            GradeEvent::JobLogMissing { job_id: None, reason: "no job id".into() },
            GradeEvent::Finished { status: GradeStatus::Updated, error_code: None },
        ];
        for event in &events {
            TracingSink.record(event);
            NullSink.record(event);
        }
    }

    #[test]
    fn step_names_are_snake_case() {
        assert_eq!(Step::ValidatingTaskId.to_string(), "validating_taskid");
        assert_eq!(Step::Done.as_str(), "done");
    }

    #[test]
    fn grade_span_can_be_entered() {
        let _guard = grade_span(Uuid::new_v4(), "org/lab-user").entered();
    }
}
