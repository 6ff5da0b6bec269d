/*
[INPUT]:  Parsed subcommand arguments, opened project and task catalog
[OUTPUT]: Console output and task manager changes
[POS]:    CLI command layer - drives the wizard, resolver and dispatcher
[UPDATE]: When subcommands or their output change
*/

use anyhow::{Context, Result, bail};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use dbtask_engine::filter::{FilterContext, filtered_tree, is_type_applicable};
use dbtask_engine::{
    CatalogNode,
    EngineConfig,
    LoadOutcome,
    PollOutcome,
    Project,
    ReadinessPoller,
    TargetBinding,
    TargetResolver,
    TaskDispatcher,
    TaskWizard,
};
use dbtask_model::{TaskCatalog, TaskRecord};

pub struct CommandContext {
    pub config: EngineConfig,
    pub project: Project,
    pub catalog: Arc<TaskCatalog>,
}

impl CommandContext {
    fn find_task(&self, name: &str) -> Result<TaskRecord> {
        self.project
            .task_manager()
            .task_by_name(name)
            .with_context(|| format!("no task named '{name}' in project '{}'", self.project.name()))
    }

    /// Wait until the data source registry reports loaded, bounded by the poller deadline
    async fn wait_for_data_sources(&self) -> bool {
        let project = self.project.clone();
        let outcome = ReadinessPoller::new(self.config.poller.interval())
            .with_deadline(self.config.poller.deadline())
            .schedule(move || project.is_registry_loaded(), || {})
            .outcome()
            .await;
        match outcome {
            PollOutcome::Ran { .. } => true,
            other => {
                warn!(outcome = ?other, "data sources not loaded, showing unfiltered catalog");
                false
            }
        }
    }

    async fn ensure_folder(&self, folder: Option<&str>) -> Result<()> {
        let Some(name) = folder.filter(|f| !f.is_empty()) else {
            return Ok(());
        };
        let manager = self.project.task_manager();
        if manager.folder(name).is_none() {
            manager.create_folder(name).await?;
            info!(folder = name, "task folder created");
        }
        Ok(())
    }

    fn wizard_for(&self, wizard: TaskWizard) -> TaskWizard {
        wizard
            .with_filter_task_types(self.config.wizard.filter_task_types)
            .with_default_max_execution_time(self.config.wizard.default_max_execution_time())
    }
}

pub async fn print_tree(ctx: &CommandContext, all: bool) -> Result<()> {
    let filtering = !all && ctx.config.wizard.filter_task_types;
    if filtering {
        ctx.wait_for_data_sources().await;
    }
    let filter = FilterContext::for_project(&ctx.project, filtering);
    let tree = filtered_tree(&ctx.catalog, &filter);
    if tree.is_empty() {
        println!("(no task types available)");
    }
    for node in &tree {
        print_node(node, 0);
    }
    Ok(())
}

fn print_node(node: &CatalogNode<'_>, depth: usize) {
    let indent = "  ".repeat(depth);
    println!("{indent}{} [{}]", node.category.name(), node.category.id());
    for child in &node.children {
        print_node(child, depth + 1);
    }
    for ty in &node.task_types {
        println!("{indent}  - {} ({})", ty.name(), ty.id());
    }
}

pub fn print_tasks(ctx: &CommandContext) {
    let tasks = ctx.project.task_manager().tasks();
    if tasks.is_empty() {
        println!("(no tasks)");
        return;
    }
    for task in tasks {
        let limit = match task.max_execution_time() {
            d if d.is_zero() => "no limit".to_string(),
            d => format!("{}s", d.as_secs()),
        };
        println!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            task.id(),
            task.name(),
            task.task_type(),
            task.folder().unwrap_or("-"),
            limit,
            task.updated_at().format("%Y-%m-%d %H:%M")
        );
    }
}

pub fn show_task(ctx: &CommandContext, name: &str) -> Result<()> {
    let task = ctx.find_task(name)?;
    let yaml = serde_yaml::to_string(&task).context("serialize task")?;
    print!("{yaml}");
    Ok(())
}

pub async fn create_task(
    ctx: &CommandContext,
    name: String,
    task_type: &str,
    description: String,
    folder: Option<String>,
    max_exec_secs: Option<u64>,
) -> Result<()> {
    ctx.ensure_folder(folder.as_deref()).await?;

    let mut wizard = ctx.wizard_for(TaskWizard::create(ctx.project.clone(), ctx.catalog.clone()));
    if ctx.config.wizard.filter_task_types && ctx.wait_for_data_sources().await {
        let applicable = ctx
            .catalog
            .task_type(task_type)
            .is_some_and(|ty| is_type_applicable(ty, &wizard.filter_context()));
        if !applicable {
            warn!(task_type, "task type is not applicable to any data source in the project");
        }
    }

    wizard.set_folder(folder);
    wizard.set_task_name(name);
    wizard.set_task_description(description);
    if let Some(secs) = max_exec_secs {
        wizard.set_max_execution_time(Some(Duration::from_secs(secs)));
    }
    wizard.select_task_type(task_type)?;
    if !wizard.can_proceed() {
        bail!(wizard.error_message().unwrap_or_else(|| "task wizard is not complete".to_string()));
    }

    let session = wizard.commit().await?;
    println!("created task {} ({})", session.task_id(), session.task_type().name());
    Ok(())
}

pub async fn edit_task(
    ctx: &CommandContext,
    name: &str,
    task_type: Option<&str>,
    description: Option<String>,
    folder: Option<String>,
    limit: Option<Option<Duration>>,
) -> Result<()> {
    let record = ctx.find_task(name)?;
    ctx.ensure_folder(folder.as_deref()).await?;

    let mut wizard = ctx.wizard_for(TaskWizard::edit(ctx.project.clone(), ctx.catalog.clone(), record)?);
    if let Some(task_type) = task_type {
        wizard.select_task_type(task_type)?;
    }
    if let Some(description) = description {
        wizard.set_task_description(description);
    }
    if let Some(folder) = folder {
        wizard.set_folder(Some(folder));
    }
    if let Some(limit) = limit {
        wizard.set_max_execution_time(limit);
    }

    let session = wizard.commit().await?;
    println!("updated task {} ({})", session.task_id(), session.task_type().name());
    Ok(())
}

pub async fn bind_target(ctx: &CommandContext, name: &str, target: Option<&str>) -> Result<()> {
    let record = ctx.find_task(name)?;
    let mut properties = record.properties().clone();
    let mut binding = TargetBinding::new(TargetResolver::pg_script_database());

    match target {
        Some(id) => {
            let object = ctx
                .project
                .find_object_by_id(id)
                .await?
                .with_context(|| format!("object '{id}' not found"))?;
            binding.set_target(Some(object));
        }
        None => {
            let cancel = CancellationToken::new();
            setup_signal_handler(cancel.clone());
            let outcome = binding
                .resolver()
                .load(&ctx.project, &properties, &cancel)
                .await
                .context("load bound target")?;
            match outcome {
                LoadOutcome::Resolved(object) => binding.set_target(Some(object)),
                LoadOutcome::Cancelled => {
                    println!("target lookup cancelled, task unchanged");
                    return Ok(());
                }
            }
        }
    }

    binding.save_settings(&ctx.project, &mut properties);
    ctx.project
        .task_manager()
        .update_task(record.id(), move |task| task.set_properties(properties))
        .await?;

    match binding.target() {
        Some(object) => println!("task '{}' bound to {} ({})", record.name(), object.name, object.id),
        None => println!("task '{}' has no target", record.name()),
    }
    Ok(())
}

pub async fn run_task(ctx: &CommandContext, name: &str) -> Result<()> {
    let record = ctx.find_task(name)?;
    let (dispatcher, mut queue) = TaskDispatcher::new(ctx.config.poller.interval(), ctx.config.poller.deadline());
    setup_signal_handler(dispatcher.shutdown_token());

    let project = ctx.project.clone();
    let handle = dispatcher.run_when_ready(&record, move || project.is_registry_loaded());

    match handle.outcome().await {
        PollOutcome::Ran { reschedules } => {
            let request = queue
                .recv()
                .await
                .context("dispatch queue closed before the task was staged")?;
            println!(
                "dispatched {} '{}' ({}) after {} checks, limit {}s",
                request.task_id,
                request.task_name,
                request.task_type,
                reschedules + 1,
                request.max_execution_time.as_secs()
            );
            Ok(())
        }
        PollOutcome::Cancelled => {
            println!("run cancelled");
            Ok(())
        }
        PollOutcome::Expired { reschedules } => {
            bail!("execution context not ready after {} checks", reschedules + 1)
        }
    }
}

fn setup_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install SIGINT handler");
            return;
        }
        info!("received SIGINT");
        shutdown.cancel();
    });
}
