/*
[INPUT]:  CLI arguments, YAML configuration file, OS shutdown signals
[OUTPUT]: Task catalog inspection, task creation/editing, target binding and dispatch
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags, subcommands or startup flow
*/

mod cli;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use dbtask_engine::{EngineConfig, InMemoryDataSources, InMemoryObjectIndex, Project, TaskManager, TaskRegistry, TaskStore};

#[derive(Parser, Debug)]
#[command(name = "dbtask", version, about = "Database task configuration and dispatch")]
struct Cli {
    #[arg(long = "config", value_name = "PATH")]
    config_path: Option<PathBuf>,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    log_level: String,
    /// Write logs to this file instead of stderr
    #[arg(long = "log-file", value_name = "PATH")]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the task type tree offered for the project
    Tree {
        /// Show every category, ignoring data source drivers
        #[arg(long)]
        all: bool,
    },
    /// List saved tasks
    List,
    /// Print one task as YAML
    Show { name: String },
    /// Create a task
    Create {
        #[arg(long)]
        name: String,
        #[arg(long = "type", value_name = "TASK_TYPE")]
        task_type: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        folder: Option<String>,
        /// Execution time limit in seconds; 0 uses the configured default
        #[arg(long = "max-exec-secs")]
        max_exec_secs: Option<u64>,
    },
    /// Edit a saved task
    Edit {
        name: String,
        #[arg(long = "type", value_name = "TASK_TYPE")]
        task_type: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Destination folder; an empty value removes the task from its folder
        #[arg(long)]
        folder: Option<String>,
        #[arg(long = "max-exec-secs")]
        max_exec_secs: Option<u64>,
        #[arg(long = "no-time-limit", conflicts_with = "max_exec_secs")]
        no_time_limit: bool,
    },
    /// Resolve and persist the database a script task runs against
    Bind {
        name: String,
        /// Full object id to bind; the stored or first database is used otherwise
        #[arg(long)]
        target: Option<String>,
    },
    /// Stage a task for execution once the project's data sources are loaded
    Run { name: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let _guard = init_tracing(&args.log_level, args.log_file.as_deref())?;

    let config = EngineConfig::load(args.config_path.as_deref()).context("load config")?;
    info!(project = %config.project.name, "starting dbtask");

    let registry = TaskRegistry::new();
    registry
        .load(&config.catalog_definition()?)
        .context("load task catalog")?;

    let data_sources = Arc::new(InMemoryDataSources::pending());
    let project = open_project(&config, data_sources.clone()).await?;
    connect_data_sources(&config, data_sources);

    let ctx = cli::CommandContext {
        config,
        project,
        catalog: registry.catalog(),
    };
    match args.command {
        Command::Tree { all } => cli::print_tree(&ctx, all).await,
        Command::List => {
            cli::print_tasks(&ctx);
            Ok(())
        }
        Command::Show { name } => cli::show_task(&ctx, &name),
        Command::Create {
            name,
            task_type,
            description,
            folder,
            max_exec_secs,
        } => cli::create_task(&ctx, name, &task_type, description, folder, max_exec_secs).await,
        Command::Edit {
            name,
            task_type,
            description,
            folder,
            max_exec_secs,
            no_time_limit,
        } => {
            let limit = if no_time_limit {
                Some(None)
            } else {
                max_exec_secs.map(|secs| Some(Duration::from_secs(secs)))
            };
            cli::edit_task(&ctx, &name, task_type.as_deref(), description, folder, limit).await
        }
        Command::Bind { name, target } => cli::bind_target(&ctx, &name, target.as_deref()).await,
        Command::Run { name } => cli::run_task(&ctx, &name).await,
    }
}

fn init_tracing(log_level: &str, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    let Some(path) = log_file else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|err| anyhow!(err))
            .context("initialize tracing subscriber")?;
        return Ok(None);
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .context("log file path must name a file")?;
    std::fs::create_dir_all(dir).with_context(|| format!("create log dir {}", dir.display()))?;

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(Some(guard))
}

async fn open_project(config: &EngineConfig, data_sources: Arc<InMemoryDataSources>) -> Result<Project> {
    let project_name = config.project.name.clone();
    let manager = match config.storage.data_dir() {
        Some(dir) => {
            let store = TaskStore::in_dir(dir.join(&project_name))
                .await
                .context("open task store")?;
            info!(path = %store.path().display(), "task store opened");
            TaskManager::open(project_name.clone(), store)
                .await
                .context("load tasks")?
        }
        None => {
            warn!("no data directory available, tasks are kept in memory only");
            TaskManager::new(project_name.clone())
        }
    };

    Ok(Project::new(
        project_name,
        Arc::new(manager),
        data_sources,
        Arc::new(InMemoryObjectIndex::new(config.project.objects.clone())),
    ))
}

/// Data sources become visible after the configured connect delay
fn connect_data_sources(config: &EngineConfig, data_sources: Arc<InMemoryDataSources>) {
    let sources = config.project.data_sources.clone();
    let delay = Duration::from_millis(config.project.connect_delay_ms);
    tokio::spawn(async move {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        info!(count = sources.len(), "data source registry loaded");
        data_sources.populate(sources);
    });
}
