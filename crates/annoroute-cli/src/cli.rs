//! Command-line interface definition using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use annoroute_models::AvailabilityStatus;

/// Build version string with git hash and build date.
fn version_string() -> &'static str {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    const GIT_HASH: &str = env!("GIT_HASH");
    const BUILD_DATE: &str = env!("BUILD_DATE");

    // Format: "0.3.0 (abc1234, 2026-01-29)"
    static VERSION_STRING: std::sync::OnceLock<String> = std::sync::OnceLock::new();
    VERSION_STRING.get_or_init(|| format!("{} ({}, {})", VERSION, GIT_HASH, BUILD_DATE))
}

/// Annoroute - quality-aware annotation task routing
#[derive(Parser, Debug)]
#[command(name = "annoroute")]
#[command(author, version = version_string(), about, long_about = None)]
pub struct Cli {
    /// Enable verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to state directory
    #[arg(long, env = "ANNOROUTE_STATE_DIR", global = true)]
    pub state_dir: Option<PathBuf>,

    /// Path to a JSON service config (default: <state-dir>/config.json if present)
    #[arg(long, env = "ANNOROUTE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage annotators
    Annotator {
        #[command(subcommand)]
        action: AnnotatorCommand,
    },

    /// Manage tasks
    Task {
        #[command(subcommand)]
        action: TaskCommand,
    },

    /// Run an assignment pass, or assign one task to a named annotator
    Assign {
        /// Task to assign manually (requires --annotator)
        #[arg(short, long, requires = "annotator")]
        task: Option<String>,

        /// Annotator to receive the task (requires --task)
        #[arg(short, long, requires = "task")]
        annotator: Option<String>,
    },

    /// Record the realized quality of a task
    Complete {
        /// Task ID
        #[arg(required = true)]
        task: String,

        /// Quality score in [0, 1]
        #[arg(required = true)]
        quality: f64,
    },

    /// Show pending tasks, or the tasks an annotator holds
    Queue {
        /// Show this annotator's active work instead of the pending pool
        #[arg(short, long)]
        annotator: Option<String>,

        /// Only tasks of this type
        #[arg(short = 't', long = "type")]
        task_type: Option<String>,

        /// Maximum number of tasks
        #[arg(short, long, default_value_t = 10)]
        limit: usize,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Predict the quality of a task/annotator pairing
    Predict {
        /// Task ID
        #[arg(required = true)]
        task: String,

        /// Annotator ID
        #[arg(required = true)]
        annotator: String,
    },

    /// Expire overdue tasks and release their annotators
    Sweep,

    /// Retrain the quality model on labelled completions
    Recalibrate {
        /// Only retrain when enough new completions arrived
        #[arg(long)]
        if_due: bool,
    },

    /// Show service counters
    Status {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Subcommand, Debug)]
pub enum AnnotatorCommand {
    /// Register a new annotator
    Register {
        /// Annotator ID
        #[arg(required = true)]
        id: String,

        /// Maximum concurrent tasks
        #[arg(short, long, default_value_t = 1)]
        capacity: u32,

        /// Skill score as CATEGORY=SCORE (repeatable)
        #[arg(short, long = "skill", value_parser = parse_skill)]
        skills: Vec<(String, f64)>,

        /// Spoken language (repeatable)
        #[arg(short, long = "language")]
        languages: Vec<String>,

        /// Cultural background tag (repeatable)
        #[arg(long = "culture")]
        cultures: Vec<String>,
    },

    /// Change an annotator's availability
    Availability {
        /// Annotator ID
        #[arg(required = true)]
        id: String,

        /// New status
        #[arg(required = true)]
        status: AvailabilityArg,
    },

    /// Set or replace skill scores
    Skills {
        /// Annotator ID
        #[arg(required = true)]
        id: String,

        /// Skill score as CATEGORY=SCORE (repeatable)
        #[arg(short, long = "skill", value_parser = parse_skill, required = true)]
        skills: Vec<(String, f64)>,
    },

    /// Show one annotator's profile, or list all annotators
    Show {
        /// Annotator ID (lists all if omitted)
        id: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// Submit a new task
    Submit {
        /// Content to annotate
        #[arg(required = true)]
        content: String,

        /// Task type, matched against annotator skills
        #[arg(short = 't', long = "type", required = true)]
        task_type: String,

        /// Priority (higher is more urgent)
        #[arg(short, long, default_value_t = 1, allow_negative_numbers = true)]
        priority: i32,

        /// Explicit task ID
        #[arg(long)]
        id: Option<String>,

        /// Complexity in [0, 1] (estimated when omitted)
        #[arg(long)]
        complexity: Option<f64>,

        /// Estimated handling time in seconds (estimated when omitted)
        #[arg(long)]
        estimated_time: Option<u64>,

        /// Required language (repeatable)
        #[arg(short, long = "language")]
        languages: Vec<String>,

        /// Cultural context the annotator should match
        #[arg(long)]
        culture: Option<String>,

        /// Minimum skill for the task type
        #[arg(long, default_value_t = 0.0)]
        min_skill: f64,
    },

    /// Mark an assigned task as started
    Start {
        /// Task ID
        #[arg(required = true)]
        id: String,
    },

    /// Withdraw a pending task
    Cancel {
        /// Task ID
        #[arg(required = true)]
        id: String,
    },

    /// Fail an active task and release its annotator
    Fail {
        /// Task ID
        #[arg(required = true)]
        id: String,

        /// Failure reason
        #[arg(short, long, default_value = "failed by operator")]
        reason: String,
    },
}

/// Output format for listing commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Availability values accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum AvailabilityArg {
    Available,
    Busy,
    Offline,
}

impl From<AvailabilityArg> for AvailabilityStatus {
    fn from(arg: AvailabilityArg) -> Self {
        match arg {
            AvailabilityArg::Available => AvailabilityStatus::Available,
            AvailabilityArg::Busy => AvailabilityStatus::Busy,
            AvailabilityArg::Offline => AvailabilityStatus::Offline,
        }
    }
}

/// Parses `CATEGORY=SCORE`.
pub fn parse_skill(s: &str) -> Result<(String, f64), String> {
    let (category, score) = s
        .split_once('=')
        .ok_or_else(|| format!("expected CATEGORY=SCORE, got '{}'", s))?;
    let category = category.trim();
    if category.is_empty() {
        return Err("skill category must not be empty".to_string());
    }
    let score: f64 = score
        .trim()
        .parse()
        .map_err(|_| format!("invalid skill score '{}'", score))?;
    Ok((category.to_string(), score))
}

impl Commands {
    /// True for commands that never change stored state.
    pub fn is_read_only(&self) -> bool {
        match self {
            Commands::Queue { .. } | Commands::Predict { .. } | Commands::Status { .. } => true,
            Commands::Annotator {
                action: AnnotatorCommand::Show { .. },
            } => true,
            _ => false,
        }
    }
}

impl Cli {
    /// Returns the state directory path, using default if not specified.
    pub fn state_dir(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .map(|h| h.join(".annoroute"))
                .unwrap_or_else(|| PathBuf::from(".annoroute"))
        })
    }

    /// Returns the log level based on verbosity.
    pub fn log_level(&self) -> tracing::Level {
        match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse_register() {
        let cli = Cli::parse_from([
            "annoroute",
            "annotator",
            "register",
            "a1",
            "--capacity",
            "3",
            "--skill",
            "translation=0.9",
            "-s",
            "qa=0.5",
            "--language",
            "en",
        ]);
        match cli.command {
            Commands::Annotator {
                action:
                    AnnotatorCommand::Register {
                        id,
                        capacity,
                        skills,
                        languages,
                        cultures,
                    },
            } => {
                assert_eq!(id, "a1");
                assert_eq!(capacity, 3);
                assert_eq!(
                    skills,
                    vec![("translation".to_string(), 0.9), ("qa".to_string(), 0.5)]
                );
                assert_eq!(languages, vec!["en".to_string()]);
                assert!(cultures.is_empty());
            }
            _ => panic!("Expected annotator register"),
        }
    }

    #[test]
    fn test_cli_parse_submit() {
        let cli = Cli::parse_from([
            "annoroute", "task", "submit", "Some text", "--type", "sentiment", "-p", "3",
        ]);
        match cli.command {
            Commands::Task {
                action:
                    TaskCommand::Submit {
                        content,
                        task_type,
                        priority,
                        complexity,
                        ..
                    },
            } => {
                assert_eq!(content, "Some text");
                assert_eq!(task_type, "sentiment");
                assert_eq!(priority, 3);
                assert!(complexity.is_none());
            }
            _ => panic!("Expected task submit"),
        }
    }

    #[test]
    fn test_cli_assign_requires_pair() {
        assert!(Cli::try_parse_from(["annoroute", "assign"]).is_ok());
        assert!(Cli::try_parse_from(["annoroute", "assign", "--task", "t1"]).is_err());
        assert!(
            Cli::try_parse_from(["annoroute", "assign", "--task", "t1", "--annotator", "a1"])
                .is_ok()
        );
    }

    #[test]
    fn test_cli_availability_values() {
        let cli = Cli::parse_from(["annoroute", "annotator", "availability", "a1", "offline"]);
        match cli.command {
            Commands::Annotator {
                action: AnnotatorCommand::Availability { status, .. },
            } => assert_eq!(AvailabilityStatus::from(status), AvailabilityStatus::Offline),
            _ => panic!("Expected annotator availability"),
        }
        assert!(Cli::try_parse_from(["annoroute", "annotator", "availability", "a1", "away"]).is_err());
    }

    #[test]
    fn test_parse_skill() {
        assert_eq!(parse_skill("qa=0.7"), Ok(("qa".to_string(), 0.7)));
        assert_eq!(parse_skill(" qa = 1 "), Ok(("qa".to_string(), 1.0)));
        assert!(parse_skill("qa").is_err());
        assert!(parse_skill("=0.5").is_err());
        assert!(parse_skill("qa=high").is_err());
    }

    #[test]
    fn test_read_only_commands() {
        let cli = Cli::parse_from(["annoroute", "status"]);
        assert!(cli.command.is_read_only());
        let cli = Cli::parse_from(["annoroute", "sweep"]);
        assert!(!cli.command.is_read_only());
    }

    #[test]
    fn test_cli_verbose() {
        let cli = Cli::parse_from(["annoroute", "-vvv", "status"]);
        assert_eq!(cli.verbose, 3);
        assert_eq!(cli.log_level(), tracing::Level::TRACE);
    }

    #[test]
    fn test_cli_help() {
        Cli::command().debug_assert();
    }
}
