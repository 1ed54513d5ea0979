//! labgrade core library
//!
//! The grading-decision engine: turns repository and CI signals for one
//! student submission into a single [`GradeResult`]. Network access happens
//! only through the [`RepositoryClient`] and [`GradeSheet`] collaborators.

pub mod ci;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod fakes;
pub mod forbidden;
pub mod grader;
pub mod logscan;
pub mod messages;
pub mod penalty;
pub mod protection;
pub mod repo;
pub mod result;
pub mod score;
pub mod sheets;
pub mod taskid;
pub mod telemetry;

pub use ci::{
    evaluate_ci_results, filter_relevant_jobs, format_ci_summary, job_id_from_url,
    parse_check_runs, CheckConclusion, CheckRun, CiResult, DEFAULT_JOB_NAMES,
};
pub use config::{
    parse_lab_number, CourseConfig, CourseFile, LabConfig, PenaltyConfig, ScoreConfig,
    TaskIdConfig,
};
pub use diagnostics::{DiagnosticSink, GradeEvent, NullSink, Step, TracingSink};
pub use error::{ConfigError, GradeError, RepoError, Result, SheetError};
pub use forbidden::{
    check_forbidden_modifications, check_forbidden_paths, default_forbidden_patterns,
    ForbiddenScope,
};
pub use grader::{GradeRequest, Grader, PASSED_MARK};
pub use messages::{Catalog, Locale, Notice};
pub use penalty::{calculate_penalty, format_grade_with_penalty, PenaltyStrategy};
pub use protection::{
    can_overwrite_cell, format_cell_protection_message, prepare_grade_update, GradeUpdate,
    FAILED_MARK,
};
pub use repo::{ChangedFile, CommitInfo, FileStatus, RawCheckRun, RepoRef, RepositoryClient};
pub use result::{ErrorCode, GradeResult, GradeStatus};
pub use score::{extract_score, format_grade_with_score, DecimalSeparator, ScoreExtraction};
pub use sheets::{
    calculate_lab_column, find_lab_column, find_student_row, parse_deadline, parse_task_order,
    record_grade, CellRef, GradeSheet,
};
pub use taskid::{
    expected_taskid, extract_taskid, validate_taskid, TaskIdExtraction, TaskIdMismatch,
    WRONG_TASKID_MARK,
};
pub use telemetry::init_tracing;

/// labgrade version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
