//! Grade spreadsheet helpers and the spreadsheet collaborator.
//!
//! Layout of a group sheet: two header rows, then one row per student. The
//! GitHub username column and the lab columns are configured per course; the
//! deadline and task-order cells are located by the [`GradeSheet`]
//! implementation.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{GradeError, Result, SheetError};
use crate::grader::{GradeRequest, Grader};
use crate::messages::Notice;
use crate::protection::can_overwrite_cell;
use crate::result::{ErrorCode, GradeResult, GradeStatus};

/// First row holding student data (1-based, after two header rows).
pub const FIRST_STUDENT_ROW: usize = 3;

pub type SheetResult<T> = std::result::Result<T, SheetError>;

/// 1-based cell coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRef {
    pub row: usize,
    pub col: usize,
}

impl CellRef {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// Row of `username` in a GitHub-username column, compared case-insensitively.
///
/// `values[0]` sits at `start_row`.
pub fn find_student_row<S: AsRef<str>>(values: &[S], username: &str, start_row: usize) -> Option<usize> {
    let wanted = username.trim().to_lowercase();
    values
        .iter()
        .position(|v| {
            let v = v.as_ref().trim();
            !v.is_empty() && v.to_lowercase() == wanted
        })
        .map(|idx| start_row + idx)
}

/// 1-based column whose header equals `short_name`.
pub fn find_lab_column<S: AsRef<str>>(header: &[S], short_name: &str) -> Option<usize> {
    let wanted = short_name.trim();
    header
        .iter()
        .position(|h| h.as_ref().trim() == wanted)
        .map(|idx| idx + 1)
}

/// Column of lab `lab_number` when the header does not name it.
pub fn calculate_lab_column(lab_number: usize, lab_column_offset: usize) -> usize {
    lab_column_offset + lab_number
}

/// Header lookup by short name, falling back to the offset formula.
pub fn resolve_lab_column<S: AsRef<str>>(
    header: &[S],
    short_name: Option<&str>,
    lab_number: usize,
    lab_column_offset: usize,
) -> usize {
    short_name
        .and_then(|name| find_lab_column(header, name))
        .unwrap_or_else(|| calculate_lab_column(lab_number, lab_column_offset))
}

fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
    Utc.from_utc_datetime(&date.and_time(time))
}

/// Parse a deadline cell.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM[:SS]`, `YYYY-MM-DD` and `DD.MM.YYYY`.
/// Times without an offset are UTC; a bare date means the end of that day.
/// A blank cell is no deadline.
pub fn parse_deadline(cell: &str) -> Result<Option<DateTime<Utc>>> {
    let value = cell.trim();
    if value.is_empty() {
        return Ok(None);
    }

    if let Ok(t) = DateTime::parse_from_rfc3339(value) {
        return Ok(Some(t.with_timezone(&Utc)));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(Some(Utc.from_utc_datetime(&t)));
        }
    }
    for format in ["%Y-%m-%d", "%d.%m.%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Ok(Some(end_of_day(date)));
        }
    }

    Err(GradeError::InvalidDeadline(value.to_string()))
}

/// Parse a task-order cell; blank means "not assigned".
pub fn parse_task_order(cell: &str) -> Result<Option<i64>> {
    let value = cell.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse::<i64>()
        .map(Some)
        .map_err(|_| GradeError::InvalidTaskOrder(value.to_string()))
}

/// Spreadsheet collaborator holding one group's grades.
#[async_trait]
pub trait GradeSheet: Send + Sync {
    /// Current value of a grade cell; blank cells read as `""`.
    async fn current_grade(&self, cell: CellRef) -> SheetResult<String>;

    /// Raw deadline cell of a lab column.
    async fn deadline(&self, lab_col: usize) -> SheetResult<Option<String>>;

    /// Raw task-order cell of a student row.
    async fn task_order(&self, row: usize) -> SheetResult<Option<String>>;

    async fn write_grade(&self, cell: CellRef, value: &str) -> SheetResult<()>;
}

/// Token to store for `result`, if any.
///
/// Updated results are written as is. Errors that carry a token (the
/// wrong-variant mark) are written only over an overwritable cell.
pub fn token_to_write<'r>(result: &'r GradeResult, current: &str) -> Option<&'r str> {
    let token = result.result.as_deref()?;
    match result.status {
        GradeStatus::Updated => Some(token),
        GradeStatus::Error if can_overwrite_cell(current) => Some(token),
        _ => None,
    }
}

fn sheet_failure(grader: &Grader, err: &SheetError) -> GradeResult {
    GradeResult::error(
        ErrorCode::SheetError,
        grader.catalog().render(&Notice::SheetUnavailable {
            detail: err.to_string(),
        }),
    )
}

/// Read the inputs of `request` from the sheet, grade, and write the outcome back.
///
/// Values already present on `request` are not re-read.
pub async fn record_grade(
    sheet: &dyn GradeSheet,
    cell: CellRef,
    grader: &Grader,
    mut request: GradeRequest,
) -> GradeResult {
    let current = match sheet.current_grade(cell).await {
        Ok(current) => current,
        Err(err) => return sheet_failure(grader, &err),
    };
    request.current_grade = Some(current.clone());

    if request.deadline.is_none() {
        match sheet.deadline(cell.col).await {
            Ok(raw) => {
                request.deadline = match parse_deadline(raw.as_deref().unwrap_or_default()) {
                    Ok(deadline) => deadline,
                    Err(err) => {
                        tracing::warn!(error = %err, col = cell.col, "ignoring unreadable deadline");
                        None
                    }
                };
            }
            Err(err) => return sheet_failure(grader, &err),
        }
    }

    if request.lab.requires_taskid()
        && request.expected_taskid.is_none()
        && request.student_order.is_none()
    {
        let raw = match sheet.task_order(cell.row).await {
            Ok(raw) => raw,
            Err(err) => return sheet_failure(grader, &err),
        };
        let order = parse_task_order(raw.as_deref().unwrap_or_default())
            .ok()
            .flatten()
            .unwrap_or_else(|| cell.row as i64 - FIRST_STUDENT_ROW as i64 + 1);
        request.student_order = Some(order);
    }

    let result = grader.grade(&request).await;

    if let Some(token) = token_to_write(&result, &current) {
        if let Err(err) = sheet.write_grade(cell, token).await {
            return sheet_failure(grader, &err).with_warnings(result.warnings);
        }
    }
    result
}
