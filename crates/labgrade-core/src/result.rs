//! Terminal outcome of one grading attempt.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Final state of a grading attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradeStatus {
    /// A grade token was computed and may be written.
    Updated,
    /// The target cell already holds a finalized grade.
    Rejected,
    /// CI has not produced a verdict yet.
    Pending,
    Error,
}

impl GradeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            GradeStatus::Updated => "updated",
            GradeStatus::Rejected => "rejected",
            GradeStatus::Pending => "pending",
            GradeStatus::Error => "error",
        }
    }
}

impl fmt::Display for GradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-readable reason attached to [`GradeStatus::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    MissingFiles,
    NoWorkflows,
    NoCommits,
    CiFetchError,
    MultipleTaskids,
    TaskidNotFound,
    WrongTaskid,
    RepositoryError,
    InvalidConfig,
    ScoreNotFound,
    MultipleScores,
    SheetError,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::MissingFiles => "MISSING_FILES",
            ErrorCode::NoWorkflows => "NO_WORKFLOWS",
            ErrorCode::NoCommits => "NO_COMMITS",
            ErrorCode::CiFetchError => "CI_FETCH_ERROR",
            ErrorCode::MultipleTaskids => "MULTIPLE_TASKIDS",
            ErrorCode::TaskidNotFound => "TASKID_NOT_FOUND",
            ErrorCode::WrongTaskid => "WRONG_TASKID",
            ErrorCode::RepositoryError => "REPOSITORY_ERROR",
            ErrorCode::InvalidConfig => "INVALID_CONFIG",
            ErrorCode::ScoreNotFound => "SCORE_NOT_FOUND",
            ErrorCode::MultipleScores => "MULTIPLE_SCORES",
            ErrorCode::SheetError => "SHEET_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a caller needs to report a grading attempt and update the sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeResult {
    pub status: GradeStatus,

    /// Grade token to write: `v`, `v-N`, `v@S[-N]`, `x` or the wrong-variant mark.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,

    pub message: String,

    /// Formatted pass count, e.g. `"3/4 тестов пройдено"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passed: Option<String>,

    /// One summary line per relevant check run.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub checks: Vec<String>,

    /// Set only when the write was rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_grade: Option<String>,

    /// Set only when `status` is `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<String>,

    /// Non-blocking problems, such as edits to protected files.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl GradeResult {
    fn base(status: GradeStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            result: None,
            message: message.into(),
            passed: None,
            checks: Vec::new(),
            current_grade: None,
            error_code: None,
            score: None,
            warnings: Vec::new(),
        }
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error_code: Some(code),
            ..Self::base(GradeStatus::Error, message)
        }
    }

    pub fn pending(message: impl Into<String>) -> Self {
        Self::base(GradeStatus::Pending, message)
    }

    pub fn updated(token: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            result: Some(token.into()),
            ..Self::base(GradeStatus::Updated, message)
        }
    }

    pub fn rejected(current: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            current_grade: Some(current.into()),
            ..Self::base(GradeStatus::Rejected, message)
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.result = Some(token.into());
        self
    }

    pub fn with_ci(mut self, passed: impl Into<String>, checks: Vec<String>) -> Self {
        self.passed = Some(passed.into());
        self.checks = checks;
        self
    }

    pub fn with_score(mut self, score: impl Into<String>) -> Self {
        self.score = Some(score.into());
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn is_error(&self) -> bool {
        self.status == GradeStatus::Error
    }
}
