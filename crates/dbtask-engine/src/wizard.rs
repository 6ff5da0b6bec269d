/*
[INPUT]:  TaskCatalog, Project (task manager + data sources), user selections
[OUTPUT]: Validated task definition committed to the task manager
[POS]:    Task domain logic - selection/validation state machine of the task wizard
[UPDATE]: When wizard fields, validation rules or commit semantics change
*/

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dbtask_model::{TaskCatalog, TaskCategory, TaskProperties, TaskRecord, TaskType};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::events::WizardEvent;
use crate::filter::{CatalogNode, FilterContext, filtered_tree};
use crate::manager::{ManagerError, NewTask};
use crate::project::Project;

/// Execution time bound offered when the limit is switched on
pub const DEFAULT_MAX_EXECUTION_TIME: Duration = Duration::from_secs(3600);

const WIZARD_EVENT_CAPACITY: usize = 16;

/// Wizard states.
///
/// A fresh wizard starts in `Empty` (create) or `TypeSelected` (edit).
/// Every selection transition and field change is followed by validation,
/// which settles the wizard in `Valid` or `Invalid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardState {
    Empty,
    CategorySelected,
    TypeSelected,
    Valid,
    Invalid,
}

/// User-correctable problems shown next to the wizard fields
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("enter a task name")]
    EmptyName,

    #[error("task '{name}' already exists in project '{project}'")]
    DuplicateName { name: String, project: String },

    #[error("select a task type")]
    MissingTaskType,
}

#[derive(Error, Debug)]
pub enum WizardError {
    #[error("Task wizard is not complete: {0}")]
    Incomplete(ValidationError),

    #[error("Unknown task category: {0}")]
    UnknownCategory(String),

    #[error("Unknown task type: {0}")]
    UnknownTaskType(String),

    #[error(transparent)]
    Manager(#[from] ManagerError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardMode {
    Create,
    Edit,
}

/// Type-specific configuration session derived from a committed wizard
#[derive(Debug, Clone)]
pub struct TaskConfigSession {
    task_id: String,
    task_type: TaskType,
    properties: TaskProperties,
}

impl TaskConfigSession {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn task_type(&self) -> &TaskType {
        &self.task_type
    }

    pub fn properties(&self) -> &TaskProperties {
        &self.properties
    }
}

/// Selection and validation state of the create/edit task wizard
pub struct TaskWizard {
    project: Project,
    catalog: Arc<TaskCatalog>,
    mode: WizardMode,
    filter_task_types: bool,
    /// Edited record, or the record produced by the first create-mode commit
    record: Option<TaskRecord>,
    selected_category: Option<String>,
    selected_task_type: Option<String>,
    task_name: String,
    task_description: String,
    folder: Option<String>,
    max_execution_time: Option<Duration>,
    default_max_execution_time: Duration,
    initial_properties: TaskProperties,
    state: WizardState,
    error: Option<ValidationError>,
    sessions: HashMap<String, Arc<TaskConfigSession>>,
    events: broadcast::Sender<WizardEvent>,
}

impl TaskWizard {
    /// Wizard creating a new task
    pub fn create(project: Project, catalog: Arc<TaskCatalog>) -> Self {
        let (events, _) = broadcast::channel(WIZARD_EVENT_CAPACITY);
        Self {
            project,
            catalog,
            mode: WizardMode::Create,
            filter_task_types: true,
            record: None,
            selected_category: None,
            selected_task_type: None,
            task_name: String::new(),
            task_description: String::new(),
            folder: None,
            max_execution_time: None,
            default_max_execution_time: DEFAULT_MAX_EXECUTION_TIME,
            initial_properties: TaskProperties::new(),
            state: WizardState::Empty,
            error: None,
            sessions: HashMap::new(),
            events,
        }
    }

    /// Wizard editing an existing task, pre-seeded from its current values
    pub fn edit(project: Project, catalog: Arc<TaskCatalog>, record: TaskRecord) -> Result<Self, WizardError> {
        let task_type = catalog
            .task_type(record.task_type())
            .ok_or_else(|| WizardError::UnknownTaskType(record.task_type().to_string()))?;
        let selected_task_type = Some(task_type.id().to_string());
        let selected_category = Some(task_type.category_id().to_string());

        let mut wizard = Self::create(project, catalog);
        wizard.mode = WizardMode::Edit;
        wizard.selected_task_type = selected_task_type;
        wizard.selected_category = selected_category;
        wizard.task_name = record.name().to_string();
        wizard.task_description = record.description().to_string();
        wizard.folder = record.folder().map(str::to_string);
        wizard.max_execution_time =
            (!record.max_execution_time().is_zero()).then(|| record.max_execution_time());
        wizard.initial_properties = record.properties().clone();
        wizard.record = Some(record);
        wizard.state = WizardState::TypeSelected;
        Ok(wizard)
    }

    /// Pre-select the folder the new task goes to
    pub fn with_folder(mut self, folder: Option<String>) -> Self {
        self.folder = folder;
        self
    }

    pub fn with_filter_task_types(mut self, enabled: bool) -> Self {
        self.filter_task_types = enabled;
        self
    }

    /// Bound offered when the execution time limit is switched on
    pub fn with_default_max_execution_time(mut self, limit: Duration) -> Self {
        self.default_max_execution_time = limit;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WizardEvent> {
        self.events.subscribe()
    }

    pub fn mode(&self) -> WizardMode {
        self.mode
    }

    pub fn state(&self) -> WizardState {
        self.state
    }

    pub fn error(&self) -> Option<&ValidationError> {
        self.error.as_ref()
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    pub fn catalog(&self) -> &Arc<TaskCatalog> {
        &self.catalog
    }

    pub fn selected_category(&self) -> Option<&TaskCategory> {
        self.selected_category
            .as_deref()
            .and_then(|id| self.catalog.category(id))
    }

    pub fn selected_task_type(&self) -> Option<&TaskType> {
        self.selected_task_type
            .as_deref()
            .and_then(|id| self.catalog.task_type(id))
    }

    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    pub fn task_description(&self) -> &str {
        &self.task_description
    }

    pub fn folder(&self) -> Option<&str> {
        self.folder.as_deref()
    }

    pub fn max_execution_time(&self) -> Option<Duration> {
        self.max_execution_time
    }

    pub fn initial_properties(&self) -> &TaskProperties {
        &self.initial_properties
    }

    pub fn initial_properties_mut(&mut self) -> &mut TaskProperties {
        &mut self.initial_properties
    }

    /// Id of the underlying record once it exists
    pub fn task_id(&self) -> Option<&str> {
        self.record.as_ref().map(TaskRecord::id).filter(|id| !id.is_empty())
    }

    /// True after the first create-mode commit produced a record
    pub fn is_created(&self) -> bool {
        self.mode == WizardMode::Create && self.record.is_some()
    }

    /// Saved tasks keep their name
    pub fn is_name_editable(&self) -> bool {
        !(self.mode == WizardMode::Edit && self.record.as_ref().is_some_and(TaskRecord::is_saved))
    }

    pub fn filter_context(&self) -> FilterContext {
        FilterContext::for_project(&self.project, self.filter_task_types)
    }

    /// The category tree offered for selection, re-filtered on every call
    pub fn tree(&self) -> Vec<CatalogNode<'_>> {
        filtered_tree(&self.catalog, &self.filter_context())
    }

    pub fn can_proceed(&self) -> bool {
        match self.state {
            WizardState::Valid => true,
            WizardState::TypeSelected => self.mode == WizardMode::Edit,
            _ => false,
        }
    }

    /// Returns false when the name is read-only
    pub fn set_task_name(&mut self, name: impl Into<String>) -> bool {
        if !self.is_name_editable() {
            return false;
        }
        self.task_name = name.into();
        self.determine_completion();
        true
    }

    pub fn set_task_description(&mut self, description: impl Into<String>) {
        self.task_description = description.into();
        self.determine_completion();
    }

    /// `None` is the "no folder" choice
    pub fn set_folder(&mut self, folder: Option<String>) {
        self.folder = folder.filter(|f| !f.is_empty());
        self.determine_completion();
    }

    /// `None` disables the limit; enabling without a value uses the default
    pub fn set_max_execution_time(&mut self, limit: Option<Duration>) {
        let default = self.default_max_execution_time;
        self.max_execution_time = limit.map(|d| if d.is_zero() { default } else { d });
        self.determine_completion();
    }

    /// Pick a category, clearing the task type. Returns false for a no-op.
    pub fn select_category(&mut self, category_id: &str) -> Result<bool, WizardError> {
        if self.catalog.category(category_id).is_none() {
            return Err(WizardError::UnknownCategory(category_id.to_string()));
        }
        if self.selected_category.as_deref() == Some(category_id) && self.selected_task_type.is_none() {
            return Ok(false);
        }

        self.selected_category = Some(category_id.to_string());
        self.selected_task_type = None;
        self.state = WizardState::CategorySelected;
        debug!(category = category_id, "task category selected");
        let _ = self
            .events
            .send(WizardEvent::CategorySelected(category_id.to_string()));

        self.determine_completion();
        Ok(true)
    }

    /// Pick a task type (and its category). Returns false for a no-op.
    pub fn select_task_type(&mut self, task_type_id: &str) -> Result<bool, WizardError> {
        let category_id = self
            .catalog
            .task_type(task_type_id)
            .map(|ty| ty.category_id().to_string())
            .ok_or_else(|| WizardError::UnknownTaskType(task_type_id.to_string()))?;
        if self.selected_task_type.as_deref() == Some(task_type_id) {
            return Ok(false);
        }

        let previous = self.selected_task_type.replace(task_type_id.to_string());
        self.selected_category = Some(category_id.clone());
        self.state = WizardState::TypeSelected;
        debug!(task_type = task_type_id, category = %category_id, "task type selected");
        let _ = self.events.send(WizardEvent::TaskTypeSelected(
            category_id,
            task_type_id.to_string(),
        ));

        let type_changed = match &self.record {
            Some(record) => record.task_type() != task_type_id,
            None => previous.is_some(),
        };
        if type_changed && !self.initial_properties.is_empty() {
            self.initial_properties.clear();
            let _ = self
                .events
                .send(WizardEvent::PropertiesReset(task_type_id.to_string()));
        }

        self.determine_completion();
        Ok(true)
    }

    /// Validate the current fields, settling the state in `Valid` or `Invalid`
    pub fn determine_completion(&mut self) -> bool {
        let result = self.validate();
        self.state = if result.is_ok() {
            WizardState::Valid
        } else {
            WizardState::Invalid
        };
        self.error = result.err();
        self.error.is_none()
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.task_name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        let saved = self.record.as_ref().is_some_and(TaskRecord::is_saved);
        if !saved && self.project.task_manager().task_by_name(&self.task_name).is_some() {
            return Err(ValidationError::DuplicateName {
                name: self.task_name.clone(),
                project: self.project.name().to_string(),
            });
        }
        if self.selected_task_type.is_none() {
            return Err(ValidationError::MissingTaskType);
        }
        Ok(())
    }

    /// Write the wizard's values to the task manager.
    ///
    /// The first commit of a wizard without a saved record creates it;
    /// later commits update that same record. Sessions are memoized per
    /// task type.
    pub async fn commit(&mut self) -> Result<Arc<TaskConfigSession>, WizardError> {
        if !self.determine_completion() {
            let error = self.error.clone().unwrap_or(ValidationError::MissingTaskType);
            return Err(WizardError::Incomplete(error));
        }
        let task_type = self
            .selected_task_type()
            .cloned()
            .ok_or(WizardError::Incomplete(ValidationError::MissingTaskType))?;

        let record = match self.record.take() {
            Some(record) if record.is_saved() => match self.update_record(&record, &task_type).await {
                Ok(updated) => updated,
                Err(err) => {
                    self.record = Some(record);
                    return Err(err);
                }
            },
            pending => match self.create_record(&task_type).await {
                Ok(created) => created,
                Err(err) => {
                    self.record = pending;
                    return Err(err);
                }
            },
        };

        let session = self
            .sessions
            .entry(task_type.id().to_string())
            .or_insert_with(|| {
                Arc::new(TaskConfigSession {
                    task_id: record.id().to_string(),
                    task_type: task_type.clone(),
                    properties: record.properties().clone(),
                })
            })
            .clone();
        self.record = Some(record);
        Ok(session)
    }

    async fn create_record(&self, task_type: &TaskType) -> Result<TaskRecord, WizardError> {
        let record = self
            .project
            .task_manager()
            .create_task(NewTask {
                task_type: task_type.id().to_string(),
                name: self.task_name.clone(),
                description: self.task_description.clone(),
                folder: self.folder.clone(),
                max_execution_time: self.max_execution_time.unwrap_or(Duration::ZERO),
                properties: self.initial_properties.clone(),
            })
            .await?;
        info!(task_id = record.id(), task_name = record.name(), "task wizard created task");
        Ok(record)
    }

    async fn update_record(&self, record: &TaskRecord, task_type: &TaskType) -> Result<TaskRecord, WizardError> {
        let manager = self.project.task_manager();
        let name = self.task_name.clone();
        let description = self.task_description.clone();
        let max_execution_time = self.max_execution_time.unwrap_or(Duration::ZERO);
        let type_id = task_type.id().to_string();

        let mut updated = manager
            .update_task(record.id(), move |task| {
                task.set_name(name);
                task.set_description(description);
                if task.set_task_type(type_id) {
                    debug!(task_id = task.id(), "task type changed, properties cleared");
                }
                task.set_max_execution_time(max_execution_time);
            })
            .await?;

        if updated.folder() != self.folder.as_deref()
            && manager.move_to_folder(updated.id(), self.folder.as_deref()).await?
        {
            updated = manager
                .task(updated.id())
                .ok_or_else(|| ManagerError::TaskNotFound(updated.id().to_string()))?;
        }
        info!(task_id = updated.id(), task_name = updated.name(), "task wizard updated task");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::TaskManager;
    use crate::project::{InMemoryDataSources, InMemoryObjectIndex};
    use dbtask_model::{Applicability, DataSourceDescriptor};

    fn catalog() -> Arc<TaskCatalog> {
        let mut builder = TaskCatalog::builder();
        builder
            .add_category(TaskCategory::new("tools", "Tools"))
            .unwrap();
        builder
            .add_task_type(
                TaskType::new("pgBackup", "Backup", "tools")
                    .with_applicability(Applicability::drivers(["postgresql"])),
            )
            .unwrap()
            .add_task_type(
                TaskType::new("pgRestore", "Restore", "tools")
                    .with_applicability(Applicability::drivers(["postgresql"])),
            )
            .unwrap();
        Arc::new(builder.build())
    }

    fn project() -> Project {
        Project::new(
            "General",
            Arc::new(TaskManager::new("General")),
            Arc::new(InMemoryDataSources::loaded(vec![DataSourceDescriptor::new(
                "ds1",
                "Local",
                "postgresql",
            )])),
            Arc::new(InMemoryObjectIndex::default()),
        )
    }

    #[test]
    fn test_initial_states() {
        let wizard = TaskWizard::create(project(), catalog());
        assert_eq!(wizard.state(), WizardState::Empty);
        assert!(!wizard.can_proceed());

        let record = TaskRecord::new("Backup", "pgBackup");
        let wizard = TaskWizard::edit(project(), catalog(), record).unwrap();
        assert_eq!(wizard.state(), WizardState::TypeSelected);
        assert_eq!(wizard.selected_category().unwrap().id(), "tools");
        assert!(wizard.can_proceed());
    }

    #[test]
    fn test_validation_order() {
        let mut wizard = TaskWizard::create(project(), catalog());
        wizard.select_category("tools").unwrap();
        assert_eq!(wizard.error(), Some(&ValidationError::EmptyName));
        assert_eq!(wizard.error_message().as_deref(), Some("enter a task name"));

        wizard.set_task_name("Backup");
        assert_eq!(wizard.error(), Some(&ValidationError::MissingTaskType));

        wizard.select_task_type("pgBackup").unwrap();
        assert_eq!(wizard.state(), WizardState::Valid);
        assert!(wizard.error().is_none());
        assert!(wizard.can_proceed());
    }

    #[test]
    fn test_category_pick_clears_type() {
        let mut wizard = TaskWizard::create(project(), catalog());
        wizard.set_task_name("Backup");
        wizard.select_task_type("pgBackup").unwrap();
        assert!(wizard.select_category("tools").unwrap());
        assert!(wizard.selected_task_type().is_none());
        assert_eq!(wizard.selected_category().unwrap().id(), "tools");
        assert_eq!(wizard.state(), WizardState::Invalid);
        assert!(!wizard.select_category("tools").unwrap());
    }

    #[test]
    fn test_unknown_selection() {
        let mut wizard = TaskWizard::create(project(), catalog());
        assert!(matches!(
            wizard.select_task_type("nope"),
            Err(WizardError::UnknownTaskType(_))
        ));
        assert!(matches!(
            wizard.select_category("nope"),
            Err(WizardError::UnknownCategory(_))
        ));
        assert_eq!(wizard.state(), WizardState::Empty);
    }

    #[test]
    fn test_max_execution_time_toggle() {
        let mut wizard = TaskWizard::create(project(), catalog());
        wizard.set_max_execution_time(Some(Duration::ZERO));
        assert_eq!(wizard.max_execution_time(), Some(DEFAULT_MAX_EXECUTION_TIME));
        wizard.set_max_execution_time(None);
        assert_eq!(wizard.max_execution_time(), None);
    }

    #[tokio::test]
    async fn test_commit_requires_valid_state() {
        let mut wizard = TaskWizard::create(project(), catalog());
        let err = wizard.commit().await.unwrap_err();
        assert!(matches!(err, WizardError::Incomplete(ValidationError::EmptyName)));
    }

    #[test]
    fn test_saved_record_name_is_read_only() {
        let mut record = TaskRecord::new("Backup", "pgBackup");
        record.assign_id("t1");
        let mut wizard = TaskWizard::edit(project(), catalog(), record).unwrap();
        assert!(!wizard.is_name_editable());
        assert!(!wizard.set_task_name("Other"));
        assert_eq!(wizard.task_name(), "Backup");
    }
}
