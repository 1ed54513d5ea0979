//! Detection of edits to files students must not touch.

use serde::{Deserialize, Serialize};

use crate::repo::{ChangedFile, FileStatus};

/// Test harness file whose presence in a lab's required files turns on default protection.
pub const PROTECTED_TEST_FILE: &str = "test_main.py";

/// Test directory protected together with [`PROTECTED_TEST_FILE`].
pub const PROTECTED_TEST_DIR: &str = "tests/";

/// Which changes the forbidden-file check looks at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ForbiddenScope {
    /// Files modified or removed by the latest commit.
    #[default]
    LatestCommit,
    /// Every file touched anywhere in the repository history.
    History,
}

/// Default forbidden patterns derived from a lab's required files.
pub fn default_forbidden_patterns(required_files: &[String]) -> Vec<String> {
    if required_files.iter().any(|f| f == PROTECTED_TEST_FILE) {
        vec![PROTECTED_TEST_FILE.to_string(), PROTECTED_TEST_DIR.to_string()]
    } else {
        Vec::new()
    }
}

fn is_forbidden(path: &str, patterns: &[String]) -> bool {
    patterns
        .iter()
        .filter(|p| !p.is_empty())
        .any(|p| path == p || path.starts_with(p.as_str()))
}

/// Forbidden files modified or removed by one commit.
///
/// Added files are never violations.
pub fn check_forbidden_modifications(files: &[ChangedFile], patterns: &[String]) -> Vec<String> {
    files
        .iter()
        .filter(|f| matches!(f.status, FileStatus::Modified | FileStatus::Removed))
        .filter(|f| is_forbidden(&f.filename, patterns))
        .map(|f| f.filename.clone())
        .collect()
}

/// Forbidden paths in a flat list, with no status filtering.
///
/// Used for whole-history scans where per-commit status is not available.
pub fn check_forbidden_paths<S: AsRef<str>>(paths: &[S], patterns: &[String]) -> Vec<String> {
    paths
        .iter()
        .map(AsRef::as_ref)
        .filter(|p| is_forbidden(p, patterns))
        .map(str::to_string)
        .collect()
}
