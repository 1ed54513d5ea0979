//! labgrade - grading CLI for GitHub-hosted programming labs
//!
//! ## Commands
//!
//! - `grade`: Grade one student's submission for a lab
//! - `penalty`: Compute the late penalty for a finish time
//! - `taskid expected`: Compute a student's variant from their order
//! - `taskid extract`: Find the TASKID marker in a saved job log
//! - `can-overwrite`: Check whether a grade cell is open for writing
//!
//! `GITHUB_TOKEN` and `GITHUB_API_URL` are read from the environment or a
//! `.env` file.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use labgrade_core::telemetry::level_for;
use labgrade_core::{
    calculate_penalty, expected_taskid, extract_taskid, format_grade_with_penalty,
    parse_deadline, prepare_grade_update, CourseConfig, GradeRequest, GradeResult, Grader, Locale,
    PenaltyStrategy, TaskIdExtraction, PASSED_MARK,
};
use labgrade_github::GitHubClient;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "labgrade")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Grade GitHub-hosted programming labs from CI results", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Language of grading messages
    #[arg(long, global = true, default_value = "ru")]
    locale: Locale,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Grade one student's submission for a lab
    Grade {
        /// Course configuration file (YAML)
        #[arg(long)]
        course: PathBuf,

        /// Lab id: ЛР1, LR1, lab1, 1 or the lab's short name
        #[arg(long)]
        lab: String,

        /// Student's GitHub username
        #[arg(long)]
        github: String,

        /// Value currently in the student's grade cell
        #[arg(long)]
        current: Option<String>,

        /// Lab deadline (RFC 3339, YYYY-MM-DD or DD.MM.YYYY)
        #[arg(long)]
        deadline: Option<String>,

        /// Student's position in the group list, used for the variant
        #[arg(long, conflicts_with = "expected_taskid")]
        order: Option<i64>,

        /// Expected variant, overriding the order-based formula
        #[arg(long)]
        expected_taskid: Option<u32>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compute the late penalty for a finish time
    Penalty {
        /// When CI finished
        #[arg(long)]
        completed: String,

        /// Lab deadline
        #[arg(long)]
        deadline: String,

        /// Penalty cap in points
        #[arg(long)]
        max: i64,

        /// weekly, daily, immediate-max or none
        #[arg(long, default_value = "weekly")]
        strategy: PenaltyStrategy,
    },

    /// TASKID helpers
    Taskid {
        #[command(subcommand)]
        action: TaskidAction,
    },

    /// Check whether a grade cell holding VALUE may be overwritten
    CanOverwrite {
        /// Current cell value (pass "" for a blank cell)
        value: String,
    },
}

#[derive(Subcommand, Debug)]
enum TaskidAction {
    /// Variant expected for a student
    Expected {
        /// Student's position in the group list
        #[arg(long)]
        order: i64,

        /// Course-specific shift
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        shift: i64,

        /// Number of variants
        #[arg(long)]
        max: i64,
    },

    /// Find the TASKID marker in a job log file
    Extract {
        /// Path to the log file
        logfile: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    labgrade_core::init_tracing(cli.json_logs, level_for(cli.verbose));

    match cli.command {
        Commands::Grade {
            course,
            lab,
            github,
            current,
            deadline,
            order,
            expected_taskid,
            json,
        } => {
            let args = GradeArgs {
                course,
                lab,
                github,
                current,
                deadline,
                order,
                expected_taskid,
            };
            cmd_grade(&args, cli.locale, json).await
        }
        Commands::Penalty {
            completed,
            deadline,
            max,
            strategy,
        } => cmd_penalty(&completed, &deadline, max, strategy),
        Commands::Taskid { action } => match action {
            TaskidAction::Expected { order, shift, max } => cmd_taskid_expected(order, shift, max),
            TaskidAction::Extract { logfile } => cmd_taskid_extract(&logfile),
        },
        Commands::CanOverwrite { value } => cmd_can_overwrite(&value),
    }
}

struct GradeArgs {
    course: PathBuf,
    lab: String,
    github: String,
    current: Option<String>,
    deadline: Option<String>,
    order: Option<i64>,
    expected_taskid: Option<u32>,
}

/// Build the grading request for `args` from the course file.
fn build_request(args: &GradeArgs) -> Result<GradeRequest> {
    let course = CourseConfig::load(&args.course)
        .with_context(|| format!("Failed to load course config {:?}", args.course))?;
    let org = course.organization().context("Course has no GitHub organization")?;
    let lab = course
        .lab(&args.lab)
        .with_context(|| format!("Unknown lab {:?}", args.lab))?
        .clone();

    let mut request = GradeRequest::new(org, args.github.trim(), lab);
    if let Some(current) = &args.current {
        request = request.with_current_grade(current.as_str());
    }
    if let Some(deadline) = parse_time_arg(args.deadline.as_deref(), "deadline")? {
        request = request.with_deadline(deadline);
    }
    if let Some(expected) = args.expected_taskid {
        request = request.with_expected_taskid(expected);
    }
    if let Some(order) = args.order {
        request = request.with_student_order(order);
    }
    Ok(request)
}

fn parse_time_arg(value: Option<&str>, name: &str) -> Result<Option<DateTime<Utc>>> {
    match value {
        None => Ok(None),
        Some(raw) => parse_deadline(raw).with_context(|| format!("Invalid {name} {raw:?}")),
    }
}

/// Grade one submission against GitHub
async fn cmd_grade(args: &GradeArgs, locale: Locale, json: bool) -> Result<()> {
    let request = build_request(args)?;
    let client = GitHubClient::from_env().context("Failed to create GitHub client")?;
    let grader = Grader::new(Arc::new(client)).with_locale(locale);

    info!(github = %request.github_username, "grading submission");
    let result = grader.grade(&request).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }
    Ok(())
}

fn print_result(result: &GradeResult) {
    println!("Status: {}", result.status);
    if let Some(token) = &result.result {
        println!("Result: {}", token);
    }
    if let Some(code) = result.error_code {
        println!("Error: {}", code);
    }
    println!("{}", result.message);
    if let Some(passed) = &result.passed {
        println!("CI: {}", passed);
    }
    for check in &result.checks {
        println!("  {}", check);
    }
    for warning in &result.warnings {
        println!("Warning: {}", warning);
    }
}

/// Compute and display a late penalty
fn cmd_penalty(completed: &str, deadline: &str, max: i64, strategy: PenaltyStrategy) -> Result<()> {
    let (Some(completed), Some(deadline)) = (
        parse_time_arg(Some(completed), "completion time")?,
        parse_time_arg(Some(deadline), "deadline")?,
    ) else {
        bail!("Both --completed and --deadline must be non-empty");
    };

    let penalty = calculate_penalty(completed, deadline, max, strategy);
    println!("Penalty: {} ({})", penalty, strategy);
    println!("Grade: {}", format_grade_with_penalty(PASSED_MARK, penalty));
    Ok(())
}

fn cmd_taskid_expected(order: i64, shift: i64, max: i64) -> Result<()> {
    let expected = expected_taskid(order, shift, max).context("Cannot compute variant")?;
    println!("{}", expected);
    Ok(())
}

/// Scan a saved job log for the TASKID marker
fn cmd_taskid_extract(logfile: &Path) -> Result<()> {
    let logs = std::fs::read_to_string(logfile)
        .with_context(|| format!("Failed to read log file {:?}", logfile))?;

    match extract_taskid(&logs) {
        TaskIdExtraction::Found(value) => println!("TASKID: {}", value),
        TaskIdExtraction::NotFound => bail!("No TASKID marker in {:?}", logfile),
        TaskIdExtraction::EmptyLog => bail!("Log file {:?} is empty", logfile),
        TaskIdExtraction::Conflict(values) => bail!("Several TASKID values: {:?}", values),
    }
    Ok(())
}

fn cmd_can_overwrite(value: &str) -> Result<()> {
    let update = prepare_grade_update(value, PASSED_MARK);
    println!("{}", serde_json::to_string_pretty(&update)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const COURSE: &str = r#"
course:
  name: Operating Systems
  github:
    organization: suai-os
  labs:
    "ЛР2":
      github-prefix: os-task2
      short-name: ЛР2
      files: [main.py]
      taskid-max: 20
"#;

    fn course_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(COURSE.as_bytes()).unwrap();
        file
    }

    fn grade_args(course: PathBuf) -> GradeArgs {
        GradeArgs {
            course,
            lab: "2".to_string(),
            github: " octocat ".to_string(),
            current: None,
            deadline: None,
            order: None,
            expected_taskid: None,
        }
    }

    #[test]
    fn parses_grade_command() {
        let cli = Cli::try_parse_from([
            "labgrade", "grade", "--course", "course.yaml", "--lab", "ЛР2", "--github",
            "octocat", "--deadline", "2024-03-01", "--order", "4", "--json",
        ])
        .unwrap();
        assert_eq!(cli.locale, Locale::Ru);
        match cli.command {
            Commands::Grade { lab, order, json, .. } => {
                assert_eq!(lab, "ЛР2");
                assert_eq!(order, Some(4));
                assert!(json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn order_and_expected_taskid_conflict() {
        let err = Cli::try_parse_from([
            "labgrade", "grade", "--course", "c.yaml", "--lab", "1", "--github", "u", "--order",
            "1", "--expected-taskid", "3",
        ]);
        assert!(err.is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["labgrade", "can-overwrite", "x", "--locale", "en", "-v"])
            .unwrap();
        assert_eq!(cli.locale, Locale::En);
        assert!(cli.verbose);
    }

    #[test]
    fn penalty_strategy_parses_aliases() {
        let cli = Cli::try_parse_from([
            "labgrade", "penalty", "--completed", "2024-03-10", "--deadline", "2024-03-01",
            "--max", "5", "--strategy", "immediate",
        ])
        .unwrap();
        match cli.command {
            Commands::Penalty { strategy, .. } => assert_eq!(strategy, PenaltyStrategy::ImmediateMax),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn taskid_expected_accepts_negative_shift() {
        let cli = Cli::try_parse_from([
            "labgrade", "taskid", "expected", "--order", "3", "--shift", "-1", "--max", "20",
        ])
        .unwrap();
        match cli.command {
            Commands::Taskid {
                action: TaskidAction::Expected { order, shift, max },
            } => assert_eq!((order, shift, max), (3, -1, 20)),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn build_request_resolves_lab_and_inputs() {
        let file = course_file();
        let mut args = grade_args(file.path().to_path_buf());
        args.deadline = Some("01.03.2024".to_string());
        args.order = Some(5);
        args.current = Some("x".to_string());

        let request = build_request(&args).unwrap();

        assert_eq!(request.org, "suai-os");
        assert_eq!(request.github_username, "octocat");
        assert_eq!(request.repo().unwrap().name, "os-task2-octocat");
        assert_eq!(request.current_grade.as_deref(), Some("x"));
        assert_eq!(request.student_order, Some(5));
        assert!(request.deadline.is_some());
    }

    #[test]
    fn build_request_rejects_unknown_lab() {
        let file = course_file();
        let mut args = grade_args(file.path().to_path_buf());
        args.lab = "ЛР9".to_string();
        assert!(build_request(&args).is_err());
    }

    #[test]
    fn build_request_rejects_bad_deadline() {
        let file = course_file();
        let mut args = grade_args(file.path().to_path_buf());
        args.deadline = Some("someday".to_string());
        let err = build_request(&args).unwrap_err();
        assert!(err.to_string().contains("deadline"));
    }

    #[test]
    fn penalty_command_rejects_blank_times() {
        assert!(cmd_penalty(" ", "2024-03-01", 5, PenaltyStrategy::Weekly).is_err());
        assert!(cmd_penalty("2024-03-10", "2024-03-01", 5, PenaltyStrategy::Weekly).is_ok());
    }

    #[test]
    fn taskid_extract_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "2024-03-01T10:00:00.123Z TASKID is 7").unwrap();
        assert!(cmd_taskid_extract(file.path()).is_ok());

        let empty = tempfile::NamedTempFile::new().unwrap();
        assert!(cmd_taskid_extract(empty.path()).is_err());
    }

    #[test]
    fn taskid_expected_rejects_zero_max() {
        assert!(cmd_taskid_expected(1, 0, 0).is_err());
        assert!(cmd_taskid_expected(1, 0, 20).is_ok());
    }
}
