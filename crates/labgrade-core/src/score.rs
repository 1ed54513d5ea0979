//! Score extraction from CI job logs.
//!
//! Labs that award points print them in the test output. Each lab configures
//! a list of regular expressions whose first capture group is the score.

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Outcome of scanning one log for a score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScoreExtraction {
    /// The score as printed (trimmed), from its first occurrence.
    Found(String),
    NotFound,
    /// Distinct values in order of first appearance.
    Conflict(Vec<String>),
    EmptyLog,
    /// The lab configured no patterns.
    NoPatterns,
}

/// Decimal separator used when a score is written into a grade token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecimalSeparator {
    #[default]
    #[serde(rename = ".")]
    Dot,
    #[serde(rename = ",")]
    Comma,
}

impl DecimalSeparator {
    pub fn as_char(self) -> char {
        match self {
            DecimalSeparator::Dot => '.',
            DecimalSeparator::Comma => ',',
        }
    }
}

/// Compare two printed scores numerically, accepting `,` or `.` as separator.
///
/// Values that do not parse as numbers fall back to exact string comparison.
pub fn scores_equal(a: &str, b: &str) -> bool {
    let parse = |s: &str| s.trim().replace(',', ".").parse::<f64>().ok();
    match (parse(a), parse(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a.trim() == b.trim(),
    }
}

/// Try `patterns` in order; the first one with any match decides.
pub fn extract_score(logs: &str, patterns: &[String]) -> ScoreExtraction {
    if logs.is_empty() {
        return ScoreExtraction::EmptyLog;
    }
    if patterns.is_empty() {
        return ScoreExtraction::NoPatterns;
    }

    for (idx, pattern) in patterns.iter().enumerate() {
        let re = match RegexBuilder::new(pattern)
            .multi_line(true)
            .case_insensitive(true)
            .build()
        {
            Ok(re) => re,
            Err(err) => {
                warn!(pattern = %pattern, error = %err, "skipping invalid score pattern");
                continue;
            }
        };

        let matches: Vec<String> = re
            .captures_iter(logs)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str().trim().to_string()))
            .collect();

        if matches.is_empty() {
            debug!(pattern_index = idx + 1, "score pattern had no matches");
            continue;
        }

        let mut unique: Vec<String> = Vec::new();
        for value in &matches {
            if !unique.iter().any(|seen| scores_equal(seen, value)) {
                unique.push(value.clone());
            }
        }

        if unique.len() > 1 {
            return ScoreExtraction::Conflict(unique);
        }
        debug!(pattern_index = idx + 1, occurrences = matches.len(), "score found");
        return ScoreExtraction::Found(matches[0].clone());
    }

    ScoreExtraction::NotFound
}

/// Rewrite a score with the requested decimal separator.
pub fn format_score(score: &str, separator: DecimalSeparator) -> String {
    let normalized = score.replace(',', ".");
    match separator {
        DecimalSeparator::Dot => normalized,
        DecimalSeparator::Comma => normalized.replace('.', ","),
    }
}

/// `"{base}@{score}"`, with `"-{penalty}"` appended when the penalty is positive.
pub fn format_grade_with_score(
    base: &str,
    score: &str,
    penalty: i64,
    separator: DecimalSeparator,
) -> String {
    let score = format_score(score, separator);
    if penalty > 0 {
        format!("{base}@{score}-{penalty}")
    } else {
        format!("{base}@{score}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pats(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn separators_compare_equal() {
        assert!(scores_equal("10.5", "10,5"));
        assert!(scores_equal("10", "10.0"));
        assert!(!scores_equal("10.5", "10.6"));
        assert!(scores_equal("n/a", "n/a"));
    }

    #[test]
    fn first_matching_pattern_wins() {
        let logs = "2024-01-15T10:30:00.000Z Points 10.5\n2024-01-15T10:30:01.000Z Total: 7\n";
        let found = extract_score(logs, &pats(&[r"Score:\s*(\d+)", r"Points\s+([\d.,]+)", r"Total:\s*(\d+)"]));
        assert_eq!(found, ScoreExtraction::Found("10.5".into()));
    }

    #[test]
    fn same_value_with_other_separator_is_not_a_conflict() {
        let logs = "Points 10.5\nPoints 10,5\n";
        assert_eq!(
            extract_score(logs, &pats(&[r"Points\s+([\d.,]+)"])),
            ScoreExtraction::Found("10.5".into())
        );
    }

    #[test]
    fn different_values_conflict() {
        let logs = "Points 10\nPoints 8\nPoints 10\n";
        assert_eq!(
            extract_score(logs, &pats(&[r"Points\s+([\d.,]+)"])),
            ScoreExtraction::Conflict(vec!["10".into(), "8".into()])
        );
    }

    #[test]
    fn invalid_patterns_are_skipped() {
        let logs = "points 4\n";
        assert_eq!(
            extract_score(logs, &pats(&[r"(unclosed", r"POINTS\s+(\d+)"])),
            ScoreExtraction::Found("4".into())
        );
    }

    #[test]
    fn edge_cases_have_own_outcomes() {
        assert_eq!(extract_score("", &pats(&["(x)"])), ScoreExtraction::EmptyLog);
        assert_eq!(extract_score("x", &[]), ScoreExtraction::NoPatterns);
        assert_eq!(extract_score("nothing here", &pats(&[r"Points (\d+)"])), ScoreExtraction::NotFound);
    }

    #[test]
    fn grade_token_with_score() {
        assert_eq!(format_score("10,5", DecimalSeparator::Dot), "10.5");
        assert_eq!(format_score("10", DecimalSeparator::Comma), "10");
        assert_eq!(format_grade_with_score("v", "10.5", 0, DecimalSeparator::Dot), "v@10.5");
        assert_eq!(format_grade_with_score("v", "10.5", 3, DecimalSeparator::Comma), "v@10,5-3");
    }

    #[test]
    fn separator_deserializes_from_symbol() {
        let sep: DecimalSeparator = serde_json::from_str(r#"",""#).unwrap();
        assert_eq!(sep, DecimalSeparator::Comma);
        assert_eq!(sep.as_char(), ',');
    }
}
