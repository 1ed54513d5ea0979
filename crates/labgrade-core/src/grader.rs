//! Grading orchestrator.
//!
//! [`Grader::grade`] walks one submission through a fixed sequence of checks
//! and always returns a [`GradeResult`]:
//!
//! 1. required files, CI configuration, latest commit
//! 2. forbidden-file edits (reported as warnings, grading continues)
//! 3. CI check runs: pending and failed verdicts
//! 4. TASKID validation against the student's variant
//! 5. score extraction, when the lab awards points
//! 6. late penalty
//! 7. cell protection
//!
//! The first step that reaches a verdict ends the attempt; later steps
//! perform no I/O.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::Instrument;
use uuid::Uuid;

use crate::ci::{
    evaluate_ci_results, filter_relevant_jobs, format_ci_summary, parse_check_runs, CheckRun,
    CiResult,
};
use crate::config::{ConfigResult, LabConfig};
use crate::diagnostics::{grade_span, DiagnosticSink, GradeEvent, Step, TracingSink};
use crate::error::RepoError;
use crate::forbidden::{check_forbidden_modifications, check_forbidden_paths, ForbiddenScope};
use crate::logscan::{scan_job_logs, Extraction, LogCache, LogScan};
use crate::messages::{Catalog, Locale, Notice};
use crate::penalty::{calculate_penalty, format_grade_with_penalty};
use crate::protection::{can_overwrite_cell, FAILED_MARK};
use crate::repo::{CommitInfo, RepoRef, RepositoryClient};
use crate::result::{ErrorCode, GradeResult};
use crate::score::{extract_score, format_grade_with_score, ScoreExtraction};
use crate::taskid::{
    expected_taskid, extract_taskid, validate_taskid, TaskIdExtraction, WRONG_TASKID_MARK,
};

/// Base token for a passing submission.
pub const PASSED_MARK: &str = "v";

/// Inputs of one grading attempt.
#[derive(Debug, Clone)]
pub struct GradeRequest {
    pub org: String,
    pub github_username: String,
    pub lab: LabConfig,
    /// Value currently stored in the student's grade cell.
    pub current_grade: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    /// Assigned variant; takes precedence over `student_order`.
    pub expected_taskid: Option<u32>,
    /// 1-based position in the group list, used to derive the variant.
    pub student_order: Option<i64>,
}

impl GradeRequest {
    pub fn new(org: impl Into<String>, github_username: impl Into<String>, lab: LabConfig) -> Self {
        Self {
            org: org.into(),
            github_username: github_username.into(),
            lab,
            current_grade: None,
            deadline: None,
            expected_taskid: None,
            student_order: None,
        }
    }

    pub fn with_current_grade(mut self, current: impl Into<String>) -> Self {
        self.current_grade = Some(current.into());
        self
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_expected_taskid(mut self, expected: u32) -> Self {
        self.expected_taskid = Some(expected);
        self
    }

    pub fn with_student_order(mut self, order: i64) -> Self {
        self.student_order = Some(order);
        self
    }

    /// Repository of this student for this lab.
    pub fn repo(&self) -> ConfigResult<RepoRef> {
        Ok(RepoRef::for_student(
            &self.org,
            self.lab.github_prefix()?,
            &self.github_username,
        ))
    }
}

/// State carried through one attempt.
struct Attempt<'a> {
    request: &'a GradeRequest,
    repo: RepoRef,
    warnings: Vec<String>,
    logs: LogCache,
}

/// CI verdict together with the runs it was computed from.
struct Evaluated {
    result: CiResult,
    runs: Vec<CheckRun>,
    passed_line: String,
}

type StepResult<T> = std::result::Result<T, GradeResult>;

/// Turns repository signals into grades.
#[derive(Clone)]
pub struct Grader {
    repo: Arc<dyn RepositoryClient>,
    sink: Arc<dyn DiagnosticSink>,
    catalog: Catalog,
}

impl Grader {
    pub fn new(repo: Arc<dyn RepositoryClient>) -> Self {
        Self {
            repo,
            sink: Arc::new(TracingSink),
            catalog: Catalog::default(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.catalog = Catalog::new(locale);
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Grade one submission.
    pub async fn grade(&self, request: &GradeRequest) -> GradeResult {
        let repo = match request.repo() {
            Ok(repo) => repo,
            Err(err) => {
                return self.error(ErrorCode::InvalidConfig, Notice::InvalidConfig {
                    detail: err.to_string(),
                });
            }
        };

        let attempt_id = Uuid::new_v4();
        let span = grade_span(attempt_id, &repo.to_string());
        async move {
            self.sink.record(&GradeEvent::Started {
                attempt_id,
                repo: repo.to_string(),
            });

            let mut attempt = Attempt {
                request,
                repo,
                warnings: Vec::new(),
                logs: LogCache::new(),
            };
            let result = match self.pipeline(&mut attempt).await {
                Ok(result) | Err(result) => result.with_warnings(attempt.warnings),
            };

            self.sink.record(&GradeEvent::StepEntered(Step::Done));
            self.sink.record(&GradeEvent::Finished {
                status: result.status,
                error_code: result.error_code,
            });
            result
        }
        .instrument(span)
        .await
    }

    async fn pipeline(&self, a: &mut Attempt<'_>) -> StepResult<GradeResult> {
        let commit = self.check_repository(a).await?;
        self.check_forbidden(a, &commit).await;
        let ci = self.evaluate_ci(a, &commit.sha).await?;

        if !ci.result.passed {
            let result = self.protect(a, FAILED_MARK, Notice::CiFailed);
            return Ok(result.with_ci(ci.passed_line, ci.result.summary));
        }

        self.validate_taskid(a, &ci).await?;
        let score = self.extract_score(a, &ci).await?;
        let penalty = self.penalty(a, &ci.result);

        let token = match (&score, a.request.lab.score_patterns()) {
            (Some(score), Some(cfg)) => {
                format_grade_with_score(PASSED_MARK, score, penalty, cfg.separator)
            }
            _ => format_grade_with_penalty(PASSED_MARK, penalty),
        };
        let notice = Notice::CiPassed {
            penalty,
            score: score.clone(),
        };

        let mut result = self
            .protect(a, &token, notice)
            .with_ci(ci.passed_line, ci.result.summary);
        result.score = score;
        Ok(result)
    }

    async fn check_repository(&self, a: &mut Attempt<'_>) -> StepResult<CommitInfo> {
        self.sink.record(&GradeEvent::StepEntered(Step::CheckingRepo));
        let required = &a.request.lab.required_files;

        if !required.is_empty() {
            let missing = self
                .repo
                .missing_files(&a.repo, required)
                .await
                .map_err(|e| self.repo_error(Step::CheckingRepo, e))?;
            if let Some(file) = missing.into_iter().next() {
                return Err(self.error(ErrorCode::MissingFiles, Notice::MissingFile { file }));
            }
        }

        let has_ci = self
            .repo
            .has_ci_config(&a.repo)
            .await
            .map_err(|e| self.repo_error(Step::CheckingRepo, e))?;
        if !has_ci {
            return Err(self.error(ErrorCode::NoWorkflows, Notice::NoWorkflows));
        }

        self.repo
            .latest_commit(&a.repo)
            .await
            .map_err(|e| self.repo_error(Step::CheckingRepo, e))?
            .ok_or_else(|| self.error(ErrorCode::NoCommits, Notice::NoCommits))
    }

    async fn check_forbidden(&self, a: &mut Attempt<'_>, commit: &CommitInfo) {
        let forbidden = &a.request.lab.forbidden;
        if forbidden.patterns.is_empty() {
            return;
        }
        self.sink.record(&GradeEvent::StepEntered(Step::CheckingForbidden));

        let violations = match forbidden.scope {
            ForbiddenScope::LatestCommit => {
                check_forbidden_modifications(&commit.files, &forbidden.patterns)
            }
            ForbiddenScope::History => match self.repo.all_modified_files(&a.repo).await {
                Ok(paths) => check_forbidden_paths(&paths, &forbidden.patterns),
                Err(err) => {
                    self.sink.record(&GradeEvent::RepositoryFailure {
                        step: Step::CheckingForbidden,
                        reason: err.to_string(),
                    });
                    a.warnings.push(self.catalog.render(&Notice::ForbiddenCheckFailed {
                        detail: err.to_string(),
                    }));
                    return;
                }
            },
        };

        if !violations.is_empty() {
            self.sink.record(&GradeEvent::ForbiddenViolations {
                paths: violations.clone(),
            });
            a.warnings.push(
                self.catalog
                    .render(&Notice::ForbiddenModified { paths: violations }),
            );
        }
    }

    async fn evaluate_ci(&self, a: &mut Attempt<'_>, sha: &str) -> StepResult<Evaluated> {
        self.sink.record(&GradeEvent::StepEntered(Step::EvaluatingCi));

        let raw = self.repo.check_runs(&a.repo, sha).await.map_err(|err| {
            self.sink.record(&GradeEvent::RepositoryFailure {
                step: Step::EvaluatingCi,
                reason: err.to_string(),
            });
            self.error(ErrorCode::CiFetchError, Notice::CiFetchFailed)
        })?;

        let runs = filter_relevant_jobs(&parse_check_runs(&raw), a.request.lab.ci_jobs());
        if runs.is_empty() {
            return Err(GradeResult::pending(self.catalog.render(&Notice::NoChecks)));
        }

        let result = evaluate_ci_results(&runs);
        self.sink.record(&GradeEvent::CiEvaluated {
            passed: result.passed_count,
            total: result.total_count,
            pending: result.has_pending,
        });

        let passed_line = format_ci_summary(
            result.passed_count,
            result.total_count,
            self.catalog.checks_passed(),
        );

        if result.has_pending {
            return Err(GradeResult::pending(self.catalog.render(&Notice::ChecksRunning))
                .with_ci(passed_line, result.summary));
        }

        Ok(Evaluated {
            result,
            runs,
            passed_line,
        })
    }

    fn resolve_expected_taskid(&self, request: &GradeRequest) -> StepResult<Option<u32>> {
        if let Some(expected) = request.expected_taskid {
            return Ok(Some(expected));
        }
        let (Some(order), Some(cfg)) = (request.student_order, request.lab.taskid) else {
            return Ok(None);
        };
        expected_taskid(order, cfg.shift, cfg.max)
            .map(Some)
            .map_err(|err| {
                self.error(ErrorCode::InvalidConfig, Notice::InvalidConfig {
                    detail: err.to_string(),
                })
            })
    }

    async fn validate_taskid(&self, a: &mut Attempt<'_>, ci: &Evaluated) -> StepResult<()> {
        if !a.request.lab.requires_taskid() {
            return Ok(());
        }
        let Some(expected) = self.resolve_expected_taskid(a.request)? else {
            return Ok(());
        };
        self.sink.record(&GradeEvent::StepEntered(Step::ValidatingTaskId));

        let scan = scan_job_logs(
            self.repo.as_ref(),
            &a.repo,
            &ci.runs,
            &mut a.logs,
            self.sink.as_ref(),
            |logs| match extract_taskid(logs) {
                TaskIdExtraction::Found(v) => Extraction::Found(v),
                TaskIdExtraction::Conflict(values) => Extraction::Conflict(values),
                TaskIdExtraction::NotFound | TaskIdExtraction::EmptyLog => Extraction::Missing,
            },
        )
        .await;

        let (code, notice) = match scan {
            LogScan::Found { value, .. } => match validate_taskid(value, expected) {
                Ok(()) => {
                    self.sink.record(&GradeEvent::TaskIdResolved {
                        found: value,
                        expected,
                    });
                    return Ok(());
                }
                Err(mismatch) => (
                    ErrorCode::WrongTaskid,
                    Notice::WrongTaskId {
                        found: mismatch.found,
                        expected: mismatch.expected,
                    },
                ),
            },
            LogScan::Conflict { values, .. } => {
                (ErrorCode::MultipleTaskids, Notice::MultipleTaskIds { values })
            }
            LogScan::Exhausted => (ErrorCode::TaskidNotFound, Notice::TaskIdNotFound),
        };

        Err(self
            .error(code, notice)
            .with_token(WRONG_TASKID_MARK)
            .with_ci(ci.passed_line.clone(), ci.result.summary.clone()))
    }

    async fn extract_score(&self, a: &mut Attempt<'_>, ci: &Evaluated) -> StepResult<Option<String>> {
        let Some(cfg) = a.request.lab.score_patterns() else {
            return Ok(None);
        };
        self.sink.record(&GradeEvent::StepEntered(Step::ExtractingScore));

        let patterns = cfg.patterns.clone();
        let scan = scan_job_logs(
            self.repo.as_ref(),
            &a.repo,
            &ci.runs,
            &mut a.logs,
            self.sink.as_ref(),
            |logs| match extract_score(logs, &patterns) {
                ScoreExtraction::Found(score) => Extraction::Found(score),
                ScoreExtraction::Conflict(values) => Extraction::Conflict(values),
                ScoreExtraction::NotFound
                | ScoreExtraction::EmptyLog
                | ScoreExtraction::NoPatterns => Extraction::Missing,
            },
        )
        .await;

        let (code, notice) = match scan {
            LogScan::Found { value, .. } => {
                self.sink.record(&GradeEvent::ScoreResolved {
                    score: value.clone(),
                });
                return Ok(Some(value));
            }
            LogScan::Conflict { values, .. } => {
                (ErrorCode::MultipleScores, Notice::MultipleScores { values })
            }
            LogScan::Exhausted => (ErrorCode::ScoreNotFound, Notice::ScoreNotFound),
        };

        Err(self
            .error(code, notice)
            .with_ci(ci.passed_line.clone(), ci.result.summary.clone()))
    }

    fn penalty(&self, a: &Attempt<'_>, ci: &CiResult) -> i64 {
        let (Some(deadline), Some(completed)) = (a.request.deadline, ci.latest_success_time) else {
            return 0;
        };
        self.sink.record(&GradeEvent::StepEntered(Step::CalculatingPenalty));

        let cfg = a.request.lab.penalty;
        let penalty = calculate_penalty(completed, deadline, cfg.max, cfg.strategy);
        self.sink.record(&GradeEvent::PenaltyApplied {
            penalty,
            strategy: cfg.strategy.to_string(),
        });
        penalty
    }

    fn protect(&self, a: &Attempt<'_>, token: &str, notice: Notice) -> GradeResult {
        if let Some(current) = a.request.current_grade.as_deref() {
            self.sink.record(&GradeEvent::StepEntered(Step::CheckingProtection));
            if !can_overwrite_cell(current) {
                return GradeResult::rejected(
                    current,
                    self.catalog.render(&Notice::CellProtected {
                        current: current.to_string(),
                    }),
                );
            }
        }
        GradeResult::updated(token, self.catalog.render(&notice))
    }

    fn error(&self, code: ErrorCode, notice: Notice) -> GradeResult {
        GradeResult::error(code, self.catalog.render(&notice))
    }

    fn repo_error(&self, step: Step, err: RepoError) -> GradeResult {
        self.sink.record(&GradeEvent::RepositoryFailure {
            step,
            reason: err.to_string(),
        });
        self.error(ErrorCode::RepositoryError, Notice::RepositoryUnavailable {
            detail: err.to_string(),
        })
    }
}
