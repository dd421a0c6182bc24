//! Command handlers for CLI subcommands.
//!
//! Every invocation loads the state snapshot, runs one command against an
//! in-process service, and writes the snapshot back unless the command is
//! read-only.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use annoroute_lifecycle::QueueQuery;
use annoroute_models::{Annotator, AnnotatorId, Task, TaskId, TaskStatus};
use annoroute_persistence::SnapshotStore;
use annoroute_runtime::{AnnotationService, ServiceConfig, TaskSubmission};
use chrono::Utc;
use tracing::{debug, info};

use crate::cli::{AnnotatorCommand, Commands, OutputFormat, TaskCommand};

/// Result type for command operations.
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Name of the optional config file inside the state directory.
pub const CONFIG_FILE: &str = "config.json";

/// Resolves the service config: an explicit path wins, then
/// `<state_dir>/config.json`, then defaults.
pub fn load_config(path: Option<&Path>, state_dir: &Path) -> Result<ServiceConfig> {
    if let Some(path) = path {
        return Ok(ServiceConfig::load(path)?);
    }
    let default_path = state_dir.join(CONFIG_FILE);
    if default_path.exists() {
        debug!(path = %default_path.display(), "Using state directory config");
        return Ok(ServiceConfig::load(&default_path)?);
    }
    Ok(ServiceConfig::default())
}

/// Execute a CLI command.
pub async fn execute(command: Commands, state_dir: &Path, config: ServiceConfig) -> Result<()> {
    let snapshots = SnapshotStore::new(state_dir);
    let store = Arc::new(snapshots.load()?);
    let service = AnnotationService::in_memory(store.clone(), config);
    service.restore()?;

    let read_only = command.is_read_only();
    run(&service, command).await?;

    if !read_only {
        snapshots.save(&store)?;
    }
    Ok(())
}

async fn run(service: &AnnotationService, command: Commands) -> Result<()> {
    match command {
        Commands::Annotator { action } => cmd_annotator(service, action),
        Commands::Task { action } => cmd_task(service, action).await,
        Commands::Assign { task, annotator } => match (task, annotator) {
            (Some(task), Some(annotator)) => cmd_assign_specific(service, &task, &annotator),
            _ => cmd_assign_pass(service),
        },
        Commands::Complete { task, quality } => cmd_complete(service, &task, quality),
        Commands::Queue {
            annotator,
            task_type,
            limit,
            format,
        } => cmd_queue(service, annotator, task_type, limit, format),
        Commands::Predict { task, annotator } => cmd_predict(service, &task, &annotator),
        Commands::Sweep => cmd_sweep(service),
        Commands::Recalibrate { if_due } => cmd_recalibrate(service, if_due),
        Commands::Status { format } => cmd_status(service, format),
    }
}

fn cmd_annotator(service: &AnnotationService, action: AnnotatorCommand) -> Result<()> {
    match action {
        AnnotatorCommand::Register {
            id,
            capacity,
            skills,
            languages,
            cultures,
        } => {
            let mut builder = Annotator::builder(id.as_str())
                .capacity(capacity)
                .cultural_background(cultures.join(" "));
            for (category, score) in skills {
                builder = builder.skill(category, score);
            }
            for language in languages {
                builder = builder.language(language);
            }

            let annotator = service.register_annotator(builder.build())?;
            info!(annotator_id = %annotator.id, capacity, "Registered annotator");
            println!(
                "Registered annotator '{}' (capacity {})",
                annotator.id, annotator.capacity
            );
            Ok(())
        }
        AnnotatorCommand::Availability { id, status } => {
            let annotator = service.update_availability(&AnnotatorId::from(id), status.into())?;
            println!(
                "Annotator '{}' is now {}",
                annotator.id, annotator.availability_status
            );
            Ok(())
        }
        AnnotatorCommand::Skills { id, skills } => {
            let updates: BTreeMap<String, f64> = skills.into_iter().collect();
            let annotator = service.update_skills(&AnnotatorId::from(id), &updates)?;
            println!("Updated skills for '{}':", annotator.id);
            for (category, score) in &annotator.skill_scores {
                println!("  {:<20} {:.2}", category, score);
            }
            Ok(())
        }
        AnnotatorCommand::Show { id, format } => match id {
            Some(id) => cmd_show_annotator(service, &AnnotatorId::from(id), format),
            None => cmd_list_annotators(service, format),
        },
    }
}

fn cmd_show_annotator(service: &AnnotationService, id: &AnnotatorId, format: OutputFormat) -> Result<()> {
    let annotator = service.get_annotator(id)?;
    let analytics = service.annotator_analytics(id)?;
    let profile = &analytics.profile;

    match format {
        OutputFormat::Table => {
            println!("Annotator: {}", annotator.id);
            println!("  Status: {}", annotator.availability_status);
            println!(
                "  Workload: {}/{}",
                annotator.current_workload, annotator.capacity
            );
            if !annotator.languages.is_empty() {
                let languages: Vec<&str> = annotator.languages.iter().map(String::as_str).collect();
                println!("  Languages: {}", languages.join(", "));
            }
            if !annotator.cultural_background.is_empty() {
                println!("  Background: {}", annotator.cultural_background);
            }
            println!("  Completed: {}", profile.total_tasks);
            println!("  Average quality: {:.3}", profile.average_quality);
            println!("  Trend: {:?}", profile.quality_trend);
            if !annotator.skill_scores.is_empty() {
                println!("  Skills:");
                for (category, score) in &annotator.skill_scores {
                    match analytics.skill_utilization.get(category) {
                        Some(used) => println!(
                            "    {:<20} {:.2}  {} done ({:.0}%)",
                            category,
                            score,
                            used.tasks_completed,
                            used.utilization_rate * 100.0
                        ),
                        None => println!("    {:<20} {:.2}", category, score),
                    }
                }
            }
            if !analytics.task_type_distribution.is_empty() {
                let types: Vec<String> = analytics
                    .task_type_distribution
                    .iter()
                    .map(|(task_type, count)| format!("{}={}", task_type, count))
                    .collect();
                println!("  Completed by type: {}", types.join(", "));
            }
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "annotator": annotator,
                "analytics": analytics,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }
    Ok(())
}

fn cmd_list_annotators(service: &AnnotationService, format: OutputFormat) -> Result<()> {
    let annotators = service.list_annotators()?;

    match format {
        OutputFormat::Table => {
            if annotators.is_empty() {
                println!("No annotators registered.");
                return Ok(());
            }

            println!(
                "{:<24}  {:<10}  {:<8}  {:<8}  SKILLS",
                "ID", "STATUS", "LOAD", "AVG"
            );
            println!("{}", "-".repeat(80));
            for annotator in &annotators {
                let skills: Vec<String> = annotator
                    .skill_scores
                    .iter()
                    .map(|(category, score)| format!("{}={:.2}", category, score))
                    .collect();
                println!(
                    "{:<24}  {:<10}  {:<8}  {:<8}  {}",
                    truncate(annotator.id.as_str(), 24),
                    annotator.availability_status.to_string(),
                    format!("{}/{}", annotator.current_workload, annotator.capacity),
                    annotator
                        .average_quality()
                        .map(|q| format!("{:.3}", q))
                        .unwrap_or_else(|| "-".to_string()),
                    truncate(&skills.join(" "), 30)
                );
            }
            println!("\n{} annotator(s)", annotators.len());
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&annotators)?);
        }
    }
    Ok(())
}

async fn cmd_task(service: &AnnotationService, action: TaskCommand) -> Result<()> {
    match action {
        TaskCommand::Submit {
            content,
            task_type,
            priority,
            id,
            complexity,
            estimated_time,
            languages,
            culture,
            min_skill,
        } => {
            let mut submission = TaskSubmission::new(content, task_type)
                .with_priority(priority)
                .with_min_skill(min_skill);
            if let Some(id) = id {
                submission = submission.with_id(id);
            }
            if let Some(score) = complexity {
                submission = submission.with_complexity(score);
            }
            if let Some(secs) = estimated_time {
                submission = submission.with_estimated_time(secs);
            }
            for language in languages {
                submission = submission.with_language(language);
            }
            if let Some(culture) = culture {
                submission = submission.with_cultural_context(culture);
            }

            let task = service.submit(submission).await?;
            println!("Submitted task {}", task.id);
            println!("  Type: {}", task.task_type);
            println!("  Priority: {}", task.priority_level);
            println!("  Complexity: {:.3}", task.complexity_score);
            println!("  Estimated time: {}s", task.estimated_time);
            Ok(())
        }
        TaskCommand::Start { id } => {
            let task = service.start_task(&TaskId::from(id))?;
            println!("Task {} is now {}", task.id, task.status);
            Ok(())
        }
        TaskCommand::Cancel { id } => {
            let task = service.cancel_task(&TaskId::from(id))?;
            println!("Task {} is now {}", task.id, task.status);
            Ok(())
        }
        TaskCommand::Fail { id, reason } => {
            let task = service.fail_task(&TaskId::from(id), &reason)?;
            println!("Task {} is now {}", task.id, task.status);
            if task.status == TaskStatus::Pending {
                println!("  Requeued (attempt {})", task.attempts);
            }
            Ok(())
        }
    }
}

fn cmd_assign_pass(service: &AnnotationService) -> Result<()> {
    let report = service.run_assignment_pass()?;

    if report.assignments.is_empty() && report.unmatched.is_empty() {
        println!("No pending tasks.");
        return Ok(());
    }

    println!("Assignment pass ({})", report.strategy);
    for assignment in &report.assignments {
        println!(
            "  {} -> {}  (predicted {:.3}, cost {:.3})",
            assignment.task_id, assignment.annotator_id, assignment.predicted_quality, assignment.cost
        );
    }
    for unmatched in &report.unmatched {
        println!("  {} unassigned: {:?}", unmatched.task_id, unmatched.reason);
    }
    println!(
        "\n{} assigned, {} unassigned",
        report.assignments.len(),
        report.unmatched.len()
    );
    Ok(())
}

fn cmd_assign_specific(service: &AnnotationService, task: &str, annotator: &str) -> Result<()> {
    let assignment = service.assign_specific(&TaskId::from(task), &AnnotatorId::from(annotator))?;
    println!(
        "Assigned {} to {} (predicted {:.3})",
        assignment.task_id, assignment.annotator_id, assignment.predicted_quality
    );
    Ok(())
}

fn cmd_complete(service: &AnnotationService, task: &str, quality: f64) -> Result<()> {
    let outcome = service.complete_task(&TaskId::from(task), quality)?;
    println!(
        "Completed {} by {} with quality {:.3}",
        outcome.task.id, outcome.annotator.id, outcome.quality_score
    );
    if outcome.recalibration_due {
        println!("  Recalibration due: run `annoroute recalibrate --if-due`");
    }
    Ok(())
}

fn cmd_queue(
    service: &AnnotationService,
    annotator: Option<String>,
    task_type: Option<String>,
    limit: usize,
    format: OutputFormat,
) -> Result<()> {
    let mut query = QueueQuery::new().with_limit(limit);
    if let Some(annotator) = annotator {
        query = query.with_annotator(AnnotatorId::from(annotator));
    }
    if let Some(task_type) = task_type {
        query = query.with_task_type(task_type);
    }

    let tasks = service.get_queue(&query)?;
    print_tasks(&tasks, format)
}

fn print_tasks(tasks: &[Task], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            if tasks.is_empty() {
                println!("No tasks found.");
                return Ok(());
            }

            println!(
                "{:<24}  {:<12}  {:<4}  {:<11}  {:<16}  CONTENT",
                "ID", "TYPE", "PRI", "STATUS", "ANNOTATOR"
            );
            println!("{}", "-".repeat(96));
            for task in tasks {
                println!(
                    "{:<24}  {:<12}  {:<4}  {:<11}  {:<16}  {}",
                    truncate(task.id.as_str(), 24),
                    truncate(&task.task_type, 12),
                    task.priority_level,
                    task.status.to_string(),
                    task.assigned_annotator
                        .as_ref()
                        .map(|a| truncate(a.as_str(), 16))
                        .unwrap_or_else(|| "-".to_string()),
                    truncate(&task.content, 24)
                );
            }
            println!("\n{} task(s)", tasks.len());
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(tasks)?);
        }
    }
    Ok(())
}

fn cmd_predict(service: &AnnotationService, task: &str, annotator: &str) -> Result<()> {
    let prediction = service.predict_quality(&TaskId::from(task), &AnnotatorId::from(annotator))?;

    println!("Predicted quality: {:.3}", prediction.predicted_quality);
    println!("  Confidence: {:.2}", prediction.confidence);
    println!("  Anomaly score: {:.3}", prediction.anomaly_score);
    if prediction.cold_start {
        println!("  Cold start: no history for this pairing");
    }
    if !prediction.risk_factors.is_empty() {
        let risks: Vec<String> = prediction
            .risk_factors
            .iter()
            .map(|r| format!("{:?}", r))
            .collect();
        println!("  Risks: {}", risks.join(", "));
    }
    if !prediction.recommendations.is_empty() {
        println!("  Recommendations:");
        for recommendation in &prediction.recommendations {
            println!("    - {}", recommendation);
        }
    }
    println!("  Model generation: {}", prediction.model_generation);
    Ok(())
}

fn cmd_sweep(service: &AnnotationService) -> Result<()> {
    let report = service.sweep_expired(Utc::now())?;

    for task_id in &report.expired {
        println!("  {} expired", task_id);
    }
    for (task_id, annotator_id) in &report.failed {
        println!("  {} failed (held by {})", task_id, annotator_id);
    }
    for (task_id, annotator_id) in &report.requeued {
        println!("  {} requeued (was {})", task_id, annotator_id);
    }
    println!(
        "{} expired, {} failed, {} requeued",
        report.expired.len(),
        report.failed.len(),
        report.requeued.len()
    );
    Ok(())
}

fn cmd_recalibrate(service: &AnnotationService, if_due: bool) -> Result<()> {
    let summary = if if_due {
        service.recalibrate_if_due()?
    } else {
        service.recalibrate()?
    };

    match summary {
        Some(summary) => println!(
            "Trained generation {} on {} samples (training error {:.4})",
            summary.generation, summary.samples, summary.training_error
        ),
        None if if_due => println!("Recalibration not due."),
        None => println!("Not enough labelled completions to train."),
    }
    Ok(())
}

fn cmd_status(service: &AnnotationService, format: OutputFormat) -> Result<()> {
    let status = service.status()?;

    match format {
        OutputFormat::Table => {
            println!("Tasks:");
            if status.tasks.is_empty() {
                println!("  (none)");
            }
            for (name, count) in &status.tasks {
                println!("  {:<12} {}", name, count);
            }
            println!(
                "Annotators: {} ({} available)",
                status.annotators, status.available_annotators
            );
            println!("Workload: {}/{}", status.workload, status.capacity);
            if status.model_trained {
                println!(
                    "Model: generation {} ({} samples)",
                    status.model_generation, status.model_samples
                );
            } else {
                println!("Model: untrained");
            }
            println!(
                "Completions since recalibration: {}",
                status.records_since_recalibration
            );
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }
    Ok(())
}

/// Truncates a string to the given number of characters, adding "..." if truncated.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use annoroute_persistence::{
        AnnotatorRepository, InMemoryStore, PredictionRepository, TaskRepository,
    };
    use clap::Parser;
    use tempfile::tempdir;

    fn parse(args: &[&str]) -> Commands {
        let mut argv = vec!["annoroute"];
        argv.extend_from_slice(args);
        Cli::parse_from(argv).command
    }

    async fn exec(dir: &Path, args: &[&str]) -> Result<()> {
        execute(parse(args), dir, ServiceConfig::default()).await
    }

    async fn exec_with(dir: &Path, config: &ServiceConfig, args: &[&str]) -> Result<()> {
        execute(parse(args), dir, config.clone()).await
    }

    fn stored(dir: &Path) -> InMemoryStore {
        SnapshotStore::new(dir).load().unwrap()
    }

    #[tokio::test]
    async fn test_register_submit_assign_complete() {
        let dir = tempdir().unwrap();
        let path = dir.path();

        exec(path, &["annotator", "register", "a1", "-c", "2", "-s", "sentiment=0.9"])
            .await
            .unwrap();
        exec(
            path,
            &["task", "submit", "Great product", "--type", "sentiment", "--id", "t1"],
        )
        .await
        .unwrap();
        exec(path, &["assign"]).await.unwrap();

        let store = stored(path);
        let task = store.get_task(&TaskId::from("t1")).unwrap();
        assert_eq!(task.status, TaskStatus::Assigned);
        assert_eq!(task.assigned_annotator, Some(AnnotatorId::from("a1")));
        let annotator = store.get_annotator(&AnnotatorId::from("a1")).unwrap();
        assert_eq!(annotator.current_workload, 1);

        exec(path, &["complete", "t1", "0.8"]).await.unwrap();

        let store = stored(path);
        let task = store.get_task(&TaskId::from("t1")).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        let annotator = store.get_annotator(&AnnotatorId::from("a1")).unwrap();
        assert_eq!(annotator.current_workload, 0);
        assert_eq!(annotator.performance_history, vec![0.8]);
    }

    #[tokio::test]
    async fn test_manual_assign_and_fail() {
        let dir = tempdir().unwrap();
        let path = dir.path();

        exec(path, &["annotator", "register", "a1", "-s", "qa=0.7"])
            .await
            .unwrap();
        exec(path, &["task", "submit", "Why?", "-t", "qa", "--id", "t1"])
            .await
            .unwrap();
        exec(path, &["assign", "--task", "t1", "--annotator", "a1"])
            .await
            .unwrap();
        exec(path, &["task", "fail", "t1"]).await.unwrap();

        let store = stored(path);
        let annotator = store.get_annotator(&AnnotatorId::from("a1")).unwrap();
        assert_eq!(annotator.current_workload, 0);
        let task = store.get_task(&TaskId::from("t1")).unwrap();
        assert_ne!(task.status, TaskStatus::Assigned);
    }

    #[tokio::test]
    async fn test_read_only_commands_do_not_write() {
        let dir = tempdir().unwrap();
        let path = dir.path();

        exec(path, &["status"]).await.unwrap();
        exec(path, &["queue"]).await.unwrap();
        assert!(!SnapshotStore::new(path).path().exists());
    }

    #[tokio::test]
    async fn test_errors_are_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path();

        assert!(exec(path, &["complete", "missing", "0.5"]).await.is_err());
        assert!(exec(path, &["annotator", "show", "nobody"]).await.is_err());
        exec(path, &["annotator", "register", "a1"]).await.unwrap();
        assert!(exec(path, &["annotator", "register", "a1"]).await.is_err());
    }

    #[tokio::test]
    async fn test_recalibrate_if_due_counts_across_runs() {
        let dir = tempdir().unwrap();
        let path = dir.path();
        let config: ServiceConfig =
            serde_json::from_str(r#"{"feedback": {"recalibration_batch": 2}}"#).unwrap();

        exec_with(path, &config, &["annotator", "register", "a1", "-c", "2", "-s", "qa=0.9"])
            .await
            .unwrap();
        exec_with(path, &config, &["task", "submit", "Why?", "-t", "qa", "--id", "t1"])
            .await
            .unwrap();
        exec_with(path, &config, &["task", "submit", "How?", "-t", "qa", "--id", "t2"])
            .await
            .unwrap();
        exec_with(path, &config, &["assign", "--task", "t1", "--annotator", "a1"]).await.unwrap();
        exec_with(path, &config, &["assign", "--task", "t2", "--annotator", "a1"]).await.unwrap();

        exec_with(path, &config, &["complete", "t1", "0.8"]).await.unwrap();
        exec_with(path, &config, &["recalibrate", "--if-due"]).await.unwrap();
        assert!(stored(path).recalibration_mark().unwrap().is_none());

        exec_with(path, &config, &["complete", "t2", "0.9"]).await.unwrap();
        exec_with(path, &config, &["recalibrate", "--if-due"]).await.unwrap();
        let mark = stored(path).recalibration_mark().unwrap().unwrap();
        assert_eq!(mark.labelled_records, 2);
    }

    #[test]
    fn test_load_config_precedence() {
        let dir = tempdir().unwrap();
        assert_eq!(
            load_config(None, dir.path()).unwrap(),
            ServiceConfig::default()
        );

        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{"scheduler": {"assignment_interval_secs": 7}}"#,
        )
        .unwrap();
        let config = load_config(None, dir.path()).unwrap();
        assert_eq!(config.scheduler.assignment_interval_secs, 7);

        let explicit = dir.path().join("other.json");
        std::fs::write(&explicit, "{}").unwrap();
        let config = load_config(Some(&explicit), dir.path()).unwrap();
        assert_eq!(config, ServiceConfig::default());

        assert!(load_config(Some(&dir.path().join("absent.json")), dir.path()).is_err());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 8), "hello...");
        assert_eq!(truncate("hi", 2), "hi");
        assert_eq!(truncate("héllo wörld", 8), "héllo...");
    }
}
