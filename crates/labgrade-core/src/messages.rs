//! Human-facing text.
//!
//! The grader decides *what* happened and reports it as a [`Notice`]. A
//! [`Catalog`] decides how that reads in a given [`Locale`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Ru,
    En,
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ru" => Ok(Locale::Ru),
            "en" => Ok(Locale::En),
            other => Err(format!("unsupported locale: {other}")),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Locale::Ru => "ru",
            Locale::En => "en",
        })
    }
}

/// Every user-visible situation the grader can report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    MissingFile { file: String },
    NoWorkflows,
    NoCommits,
    CiFetchFailed,
    RepositoryUnavailable { detail: String },
    NoChecks,
    ChecksRunning,
    CiPassed { penalty: i64, score: Option<String> },
    CiFailed,
    ForbiddenModified { paths: Vec<String> },
    ForbiddenCheckFailed { detail: String },
    MultipleTaskIds { values: Vec<u32> },
    TaskIdNotFound,
    WrongTaskId { found: u32, expected: u32 },
    ScoreNotFound,
    MultipleScores { values: Vec<String> },
    InvalidConfig { detail: String },
    CellProtected { current: String },
    SheetUnavailable { detail: String },
}

/// Renders [`Notice`]s for one locale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Catalog {
    locale: Locale,
}

impl Catalog {
    pub fn new(locale: Locale) -> Self {
        Self { locale }
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    /// Phrase following the `passed/total` counts.
    pub fn checks_passed(&self) -> &'static str {
        match self.locale {
            Locale::Ru => "тестов пройдено",
            Locale::En => "checks passed",
        }
    }

    pub fn render(&self, notice: &Notice) -> String {
        match self.locale {
            Locale::Ru => render_ru(notice),
            Locale::En => render_en(notice),
        }
    }
}

fn join_u32(values: &[u32]) -> String {
    values
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn ci_passed_suffix_ru(penalty: i64, score: Option<&str>) -> String {
    let mut out = String::new();
    if let Some(score) = score {
        out.push_str(&format!(" (баллы: {score})"));
    }
    if penalty > 0 {
        out.push_str(&format!(" (штраф за просрочку: -{penalty})"));
    }
    out
}

fn ci_passed_suffix_en(penalty: i64, score: Option<&str>) -> String {
    let mut out = String::new();
    if let Some(score) = score {
        out.push_str(&format!(" (score: {score})"));
    }
    if penalty > 0 {
        out.push_str(&format!(" (late penalty: -{penalty})"));
    }
    out
}

fn render_ru(notice: &Notice) -> String {
    match notice {
        Notice::MissingFile { file } => format!("⚠️ Файл {file} не найден в репозитории"),
        Notice::NoWorkflows => "⚠️ Папка .github/workflows не найдена. CI не настроен".to_string(),
        Notice::NoCommits => "⚠️ Нет коммитов в репозитории".to_string(),
        Notice::CiFetchFailed => "Не удалось получить результаты CI".to_string(),
        Notice::RepositoryUnavailable { detail } => {
            format!("Ошибка при обращении к репозиторию: {detail}")
        }
        Notice::NoChecks => "Нет активных CI-проверок ⏳".to_string(),
        Notice::ChecksRunning => "CI проверки ещё выполняются ⏳".to_string(),
        Notice::CiPassed { penalty, score } => format!(
            "Результат CI: ✅ Все проверки пройдены{}",
            ci_passed_suffix_ru(*penalty, score.as_deref())
        ),
        Notice::CiFailed => "Результат CI: ❌ Обнаружены ошибки".to_string(),
        Notice::ForbiddenModified { paths } => {
            format!("🚨 Запрещено изменять: {}", paths.join(", "))
        }
        Notice::ForbiddenCheckFailed { detail } => {
            format!("Не удалось проверить запрещённые файлы: {detail}")
        }
        Notice::MultipleTaskIds { values } => format!(
            "Найдено несколько разных TASKID в логах: [{}]. Обратитесь к преподавателю.",
            join_u32(values)
        ),
        Notice::TaskIdNotFound => "TASKID не найден в логах".to_string(),
        Notice::WrongTaskId { found, expected } => {
            format!("Неверный вариант: найден {found}, ожидается {expected}")
        }
        Notice::ScoreNotFound => {
            "Баллы не найдены в логах. Убедитесь, что программа выводит набранный балл.".to_string()
        }
        Notice::MultipleScores { values } => format!(
            "Найдено несколько разных значений баллов в логах: {}. Обратитесь к преподавателю.",
            values.join(", ")
        ),
        Notice::InvalidConfig { detail } => format!("Ошибка конфигурации лабораторной: {detail}"),
        Notice::CellProtected { current } => format!(
            "Ячейка уже содержит оценку '{current}'. Для изменения обратитесь к преподавателю."
        ),
        Notice::SheetUnavailable { detail } => format!("Ошибка доступа к таблице: {detail}"),
    }
}

fn render_en(notice: &Notice) -> String {
    match notice {
        Notice::MissingFile { file } => format!("⚠️ File {file} not found in the repository"),
        Notice::NoWorkflows => "⚠️ No .github/workflows directory. CI is not configured".to_string(),
        Notice::NoCommits => "⚠️ The repository has no commits".to_string(),
        Notice::CiFetchFailed => "Could not fetch CI results".to_string(),
        Notice::RepositoryUnavailable { detail } => format!("Repository request failed: {detail}"),
        Notice::NoChecks => "No active CI checks ⏳".to_string(),
        Notice::ChecksRunning => "CI checks are still running ⏳".to_string(),
        Notice::CiPassed { penalty, score } => format!(
            "CI result: ✅ All checks passed{}",
            ci_passed_suffix_en(*penalty, score.as_deref())
        ),
        Notice::CiFailed => "CI result: ❌ Some checks failed".to_string(),
        Notice::ForbiddenModified { paths } => {
            format!("🚨 Modifying these files is not allowed: {}", paths.join(", "))
        }
        Notice::ForbiddenCheckFailed { detail } => {
            format!("Could not check forbidden files: {detail}")
        }
        Notice::MultipleTaskIds { values } => format!(
            "Several different TASKIDs found in logs: [{}]. Contact your instructor.",
            join_u32(values)
        ),
        Notice::TaskIdNotFound => "TASKID not found in logs".to_string(),
        Notice::WrongTaskId { found, expected } => {
            format!("Wrong variant: found {found}, expected {expected}")
        }
        Notice::ScoreNotFound => {
            "Score not found in logs. Make sure the program prints the points earned.".to_string()
        }
        Notice::MultipleScores { values } => format!(
            "Several different scores found in logs: {}. Contact your instructor.",
            values.join(", ")
        ),
        Notice::InvalidConfig { detail } => format!("Invalid lab configuration: {detail}"),
        Notice::CellProtected { current } => format!(
            "The cell already holds grade '{current}'. Contact your instructor to change it."
        ),
        Notice::SheetUnavailable { detail } => format!("Spreadsheet request failed: {detail}"),
    }
}
