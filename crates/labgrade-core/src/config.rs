//! Course and lab configuration.
//!
//! A course is described by one YAML file:
//!
//! ```yaml
//! course:
//!   name: Operating Systems
//!   github:
//!     organization: suai-os
//!   google:
//!     spreadsheet: 1AbC...
//!     lab-column-offset: 1
//!   labs:
//!     "ЛР1":
//!       github-prefix: os-task1
//!       short-name: ЛР1
//!       files: [main.cpp, test_main.py]
//!       ci:
//!         jobs: [test]
//!       taskid-max: 20
//!       taskid-shift: 4
//!       penalty-max: 9
//!       penalty-strategy: weekly
//! ```
//!
//! Keys are kebab-case. Every optional lab setting is resolved into a typed
//! [`LabConfig`] once, at load time.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::forbidden::{default_forbidden_patterns, ForbiddenScope};
use crate::penalty::PenaltyStrategy;
use crate::score::DecimalSeparator;

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Top-level document: everything lives under `course:`.
#[derive(Debug, Clone, Deserialize)]
pub struct CourseFile {
    pub course: CourseConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CourseConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub semester: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub github: GithubSection,
    #[serde(default)]
    pub google: GoogleSection,
    #[serde(default)]
    pub labs: BTreeMap<String, LabConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GithubSection {
    pub organization: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GoogleSection {
    pub spreadsheet: Option<String>,
    pub info_sheet: Option<String>,
    /// 1-based column holding students' GitHub usernames.
    #[serde(default = "default_student_column")]
    pub student_name_column: usize,
    #[serde(default = "default_lab_offset")]
    pub lab_column_offset: usize,
}

fn default_student_column() -> usize {
    2
}

fn default_lab_offset() -> usize {
    1
}

impl Default for GoogleSection {
    fn default() -> Self {
        Self {
            spreadsheet: None,
            info_sheet: None,
            student_name_column: default_student_column(),
            lab_column_offset: default_lab_offset(),
        }
    }
}

impl CourseConfig {
    /// Read and parse a course file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> ConfigResult<Self> {
        let file: CourseFile = serde_yaml::from_str(text)?;
        Ok(file.course)
    }

    pub fn organization(&self) -> ConfigResult<&str> {
        self.github
            .organization
            .as_deref()
            .filter(|o| !o.is_empty())
            .ok_or(ConfigError::MissingField("github.organization"))
    }

    /// Find a lab by key, by number (`ЛР1`, `LR1`, `lab1`, `1`) or by short name.
    pub fn lab(&self, id: &str) -> ConfigResult<&LabConfig> {
        let id = id.trim();
        if let Some(lab) = self.labs.get(id) {
            return Ok(lab);
        }

        if let Ok(number) = parse_lab_number(id) {
            for key in [
                format!("ЛР{number}"),
                number.to_string(),
                format!("LR{number}"),
                format!("lab{number}"),
            ] {
                if let Some(lab) = self.labs.get(&key) {
                    return Ok(lab);
                }
            }
        }

        self.labs
            .values()
            .find(|lab| {
                lab.short_name
                    .as_deref()
                    .is_some_and(|s| s.eq_ignore_ascii_case(id))
            })
            .ok_or_else(|| ConfigError::LabNotFound(id.to_string()))
    }
}

fn digits() -> &'static Regex {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    DIGITS.get_or_init(|| Regex::new(r"\d+").expect("static digit pattern compiles"))
}

/// Lab number embedded in an identifier such as `ЛР3` or `lab3`.
pub fn parse_lab_number(id: &str) -> ConfigResult<u32> {
    digits()
        .find(id)
        .and_then(|m| m.as_str().parse().ok())
        .ok_or_else(|| ConfigError::InvalidLabId(id.to_string()))
}

/// Variant checking parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskIdConfig {
    pub max: i64,
    pub shift: i64,
    /// Variant checking is configured but switched off.
    pub ignore: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PenaltyConfig {
    pub max: i64,
    pub strategy: PenaltyStrategy,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ScoreConfig {
    pub patterns: Vec<String>,
    pub separator: DecimalSeparator,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForbiddenConfig {
    pub patterns: Vec<String>,
    pub scope: ForbiddenScope,
}

/// Fully resolved settings of one lab.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "RawLabConfig")]
pub struct LabConfig {
    pub github_prefix: Option<String>,
    pub short_name: Option<String>,
    pub required_files: Vec<String>,
    pub forbidden: ForbiddenConfig,
    /// `None` means "use the default job names".
    pub ci_job_filter: Option<Vec<String>>,
    pub taskid: Option<TaskIdConfig>,
    pub penalty: PenaltyConfig,
    pub score: Option<ScoreConfig>,
}

impl LabConfig {
    pub fn new(github_prefix: impl Into<String>) -> Self {
        Self {
            github_prefix: Some(github_prefix.into()),
            ..Self::default()
        }
    }

    pub fn github_prefix(&self) -> ConfigResult<&str> {
        self.github_prefix
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or(ConfigError::MissingField("github-prefix"))
    }

    /// Job names that decide the grade, or `None` for the defaults.
    pub fn ci_jobs(&self) -> Option<&[String]> {
        self.ci_job_filter.as_deref()
    }

    /// Variant checking is configured and not ignored.
    pub fn requires_taskid(&self) -> bool {
        self.taskid.is_some_and(|t| !t.ignore)
    }

    /// Score patterns, when the lab awards points.
    pub fn score_patterns(&self) -> Option<&ScoreConfig> {
        self.score.as_ref().filter(|s| !s.patterns.is_empty())
    }

    pub fn with_short_name(mut self, short_name: impl Into<String>) -> Self {
        self.short_name = Some(short_name.into());
        self
    }

    /// Sets required files and re-derives the default forbidden patterns.
    pub fn with_required_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_files = files.into_iter().map(Into::into).collect();
        self.forbidden.patterns = default_forbidden_patterns(&self.required_files);
        self
    }

    pub fn with_forbidden<I, S>(mut self, patterns: I, scope: ForbiddenScope) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.forbidden = ForbiddenConfig {
            patterns: patterns.into_iter().map(Into::into).collect(),
            scope,
        };
        self
    }

    pub fn with_ci_jobs<I, S>(mut self, jobs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ci_job_filter = Some(jobs.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_taskid(mut self, max: i64, shift: i64) -> Self {
        self.taskid = Some(TaskIdConfig {
            max,
            shift,
            ignore: false,
        });
        self
    }

    pub fn ignoring_taskid(mut self) -> Self {
        if let Some(taskid) = self.taskid.as_mut() {
            taskid.ignore = true;
        }
        self
    }

    pub fn with_penalty(mut self, max: i64, strategy: PenaltyStrategy) -> Self {
        self.penalty = PenaltyConfig { max, strategy };
        self
    }

    pub fn with_score<I, S>(mut self, patterns: I, separator: DecimalSeparator) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.score = Some(ScoreConfig {
            patterns: patterns.into_iter().map(Into::into).collect(),
            separator,
        });
        self
    }
}

/// The `ci:` key as written in YAML.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawCiConfig {
    Named {
        #[serde(default)]
        jobs: Option<Vec<String>>,
        #[serde(default)]
        workflows: Option<Vec<String>>,
    },
    /// Older files wrote `ci: [workflows]`, which names no jobs.
    Legacy(Vec<serde_yaml::Value>),
}

impl RawCiConfig {
    fn job_names(self) -> Option<Vec<String>> {
        match self {
            RawCiConfig::Named { jobs, workflows } => {
                let non_empty = |v: Option<Vec<String>>| v.filter(|list| !list.is_empty());
                non_empty(jobs).or_else(|| non_empty(workflows))
            }
            RawCiConfig::Legacy(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
struct RawLabConfig {
    github_prefix: Option<String>,
    short_name: Option<String>,
    files: Vec<String>,
    forbidden_files: Option<Vec<String>>,
    forbidden_scope: ForbiddenScope,
    ci: Option<RawCiConfig>,
    taskid_max: Option<i64>,
    taskid_shift: i64,
    ignore_task_id: bool,
    penalty_max: i64,
    penalty_strategy: PenaltyStrategy,
    score: Option<ScoreConfig>,
}

impl From<RawLabConfig> for LabConfig {
    fn from(raw: RawLabConfig) -> Self {
        let patterns = raw
            .forbidden_files
            .unwrap_or_else(|| default_forbidden_patterns(&raw.files));

        LabConfig {
            github_prefix: raw.github_prefix,
            short_name: raw.short_name,
            forbidden: ForbiddenConfig {
                patterns,
                scope: raw.forbidden_scope,
            },
            required_files: raw.files,
            ci_job_filter: raw.ci.and_then(RawCiConfig::job_names),
            taskid: raw.taskid_max.map(|max| TaskIdConfig {
                max,
                shift: raw.taskid_shift,
                ignore: raw.ignore_task_id,
            }),
            penalty: PenaltyConfig {
                max: raw.penalty_max,
                strategy: raw.penalty_strategy,
            },
            score: raw.score,
        }
    }
}
