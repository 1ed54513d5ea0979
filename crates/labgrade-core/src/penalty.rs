//! Late-submission penalties.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

/// How lateness turns into penalty points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PenaltyStrategy {
    /// One point per started week.
    #[default]
    Weekly,
    /// One point per started day.
    Daily,
    /// The full cap as soon as the deadline passes.
    ImmediateMax,
    /// Lateness is never penalized.
    None,
}

impl PenaltyStrategy {
    /// Resolve a configured strategy name, falling back to [`PenaltyStrategy::Weekly`].
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "weekly" => PenaltyStrategy::Weekly,
            "daily" => PenaltyStrategy::Daily,
            "immediate" | "immediate-max" | "immediate_max" => PenaltyStrategy::ImmediateMax,
            "none" => PenaltyStrategy::None,
            other => {
                warn!(strategy = %other, "unknown penalty strategy, using weekly");
                PenaltyStrategy::Weekly
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PenaltyStrategy::Weekly => "weekly",
            PenaltyStrategy::Daily => "daily",
            PenaltyStrategy::ImmediateMax => "immediate-max",
            PenaltyStrategy::None => "none",
        }
    }
}

impl fmt::Display for PenaltyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PenaltyStrategy {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_name(s))
    }
}

impl<'de> Deserialize<'de> for PenaltyStrategy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from_name(&name))
    }
}

/// Number of started `unit`s in `late`; any remainder counts as a full unit.
fn started_units(late: Duration, unit_days: i64) -> i64 {
    let whole_days = late.num_days();
    let has_sub_day = late > Duration::days(whole_days);
    let units = whole_days / unit_days;
    if whole_days % unit_days > 0 || has_sub_day {
        units + 1
    } else {
        units
    }
}

/// Penalty points for finishing at `completed_at` against `deadline`.
///
/// Zero when on time or when `cap <= 0`; never more than `cap`.
pub fn calculate_penalty(
    completed_at: DateTime<Utc>,
    deadline: DateTime<Utc>,
    cap: i64,
    strategy: PenaltyStrategy,
) -> i64 {
    if completed_at <= deadline || cap <= 0 {
        return 0;
    }

    let late = completed_at - deadline;
    let points = match strategy {
        PenaltyStrategy::None => 0,
        PenaltyStrategy::ImmediateMax => cap,
        PenaltyStrategy::Daily => started_units(late, 1),
        PenaltyStrategy::Weekly => started_units(late, 7),
    };
    points.min(cap)
}

/// `base` unchanged for a non-positive penalty, otherwise `"{base}-{penalty}"`.
pub fn format_grade_with_penalty(base: &str, penalty: i64) -> String {
    if penalty <= 0 {
        base.to_string()
    } else {
        format!("{base}-{penalty}")
    }
}
