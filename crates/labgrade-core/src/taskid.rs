//! Task variant (TASKID) extraction and validation.
//!
//! Lab programs print `TASKID is N` as the first thing on a log line. CI
//! runners prefix every line with an RFC 3339 timestamp, so a marker counts
//! only when it directly follows that prefix.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::error::{GradeError, Result};

/// Grade token written when the variant is wrong or cannot be determined.
pub const WRONG_TASKID_MARK: &str = "?! Wrong TASKID";

fn taskid_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?mi)^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?Z\s+TASKID\s+is\s+(\d+)")
            .expect("static TASKID pattern compiles")
    })
}

/// Outcome of scanning one log for a TASKID marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskIdExtraction {
    /// One value, possibly printed several times.
    Found(u32),
    /// No marker at the start of any timestamped line.
    NotFound,
    /// Several distinct values, ascending.
    Conflict(Vec<u32>),
    /// The log text was empty.
    EmptyLog,
}

/// Find the TASKID printed in a CI job log.
pub fn extract_taskid(logs: &str) -> TaskIdExtraction {
    if logs.is_empty() {
        return TaskIdExtraction::EmptyLog;
    }

    let values: BTreeSet<u32> = taskid_pattern()
        .captures_iter(logs)
        .filter_map(|caps| caps.get(1)?.as_str().parse().ok())
        .collect();

    match values.len() {
        0 => TaskIdExtraction::NotFound,
        1 => values
            .into_iter()
            .next()
            .map_or(TaskIdExtraction::NotFound, TaskIdExtraction::Found),
        _ => TaskIdExtraction::Conflict(values.into_iter().collect()),
    }
}

/// Variant assigned to the student at `order` (1-based) in the group list.
///
/// The result is always in `1..=max`: a zero remainder maps to `max`.
pub fn expected_taskid(order: i64, shift: i64, max: i64) -> Result<u32> {
    if max <= 0 {
        return Err(GradeError::InvalidTaskIdMax(max));
    }
    let rem = (order + shift).rem_euclid(max);
    let value = if rem == 0 { max } else { rem };
    u32::try_from(value).map_err(|_| GradeError::InvalidTaskIdMax(max))
}

/// A TASKID that does not match the student's assigned variant.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("wrong variant: found {found}, expected {expected}")]
pub struct TaskIdMismatch {
    pub found: u32,
    pub expected: u32,
}

pub fn validate_taskid(found: u32, expected: u32) -> std::result::Result<(), TaskIdMismatch> {
    if found == expected {
        Ok(())
    } else {
        Err(TaskIdMismatch { found, expected })
    }
}
