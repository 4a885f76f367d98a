#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::unnecessary_literal_bound,
    clippy::module_name_repetitions,
    clippy::struct_field_names
)]

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use xing::planner::{DanglingPolicy, DecompositionParser, PlanValidator};
use xing::{ExecutionPlan, Reasoner, Task, TaskPlanner, XingConfig};

mod cli;

use cli::commands::{Cli, Commands};

/// Stands in for a model on commands that never query one.
struct OfflineReasoner;

#[async_trait]
impl Reasoner for OfflineReasoner {
    async fn query(&self, _prompt: &str) -> Result<String> {
        anyhow::bail!("no reasoner is available in offline commands")
    }
}

fn load_config(path: Option<&Path>) -> Result<XingConfig> {
    let mut config = match path {
        Some(path) => XingConfig::load_from(path)?,
        None => XingConfig::load_or_init()?,
    };
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

fn validate_plan(path: &Path, config: &XingConfig, reject_dangling: bool) -> xing::Result<()> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read plan {}", path.display()))?;
    let mut plan: ExecutionPlan =
        serde_json::from_str(&contents).context("Failed to parse plan JSON")?;

    let policy = if reject_dangling {
        DanglingPolicy::Reject
    } else {
        config.planner.dangling_policy
    };
    let report = PlanValidator::new(policy).validate(&mut plan)?;
    let order = plan.dependency_graph().topological_order()?;
    let progress = plan.get_progress();

    println!("Plan {} is valid", plan.id);
    println!(
        "  steps: {} ({} completed, {} failed, {} skipped)",
        progress.total_steps, progress.completed_steps, progress.failed_steps, progress.skipped_steps
    );
    println!("  progress: {:.1}%", progress.progress_percentage);
    for removed in &report.removed_dependencies {
        println!(
            "  dropped dependency {} -> {}",
            removed.step_id, removed.dependency
        );
    }
    if !report.required_tools.is_empty() {
        println!("  tools: {}", report.required_tools.join(", "));
    }
    println!("  order: {}", order.join(" -> "));
    Ok(())
}

fn decompose(path: &Path, config: &XingConfig, task: Option<String>) -> xing::Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let task = Task::new(task.unwrap_or_else(|| "Decomposed plan".to_string()));

    let draft = DecompositionParser::new(config.planner.default_step_duration_secs).parse(&text);
    let planner = TaskPlanner::new(Arc::new(OfflineReasoner), &config.planner);
    let (plan, _) = planner.build_plan(&task, draft)?;

    let json = serde_json::to_string_pretty(&plan).context("Failed to encode plan")?;
    println!("{json}");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Validate {
            plan,
            reject_dangling,
        } => validate_plan(&plan, &config, reject_dangling)?,
        Commands::Decompose { input, task } => decompose(&input, &config, task)?,
        Commands::Config => {
            let toml = toml::to_string_pretty(&config).context("Failed to serialize config")?;
            println!("# {}", config.config_path.display());
            println!("{toml}");
        }
    }
    Ok(())
}
