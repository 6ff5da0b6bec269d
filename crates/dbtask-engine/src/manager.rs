/*
[INPUT]:  Task create/update/move requests from wizards and the CLI
[OUTPUT]: Project task records, folder membership, folder events
[POS]:    Service layer - single source of truth for a project's tasks
[UPDATE]: When task bookkeeping rules or persistence triggers change
*/

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use dbtask_model::{TaskFolder, TaskProperties, TaskRecord};
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, broadcast};
use tracing::{info, warn};
use uuid::Uuid;

use crate::events::FolderEvent;
use crate::storage::{StorageError, TaskSnapshot, TaskStore};

const FOLDER_EVENT_CAPACITY: usize = 64;

#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("Task name cannot be empty")]
    EmptyName,

    #[error("Task '{name}' already exists in project '{project}'")]
    DuplicateName { name: String, project: String },

    #[error("Task '{0}' not found")]
    TaskNotFound(String),

    #[error("Task folder '{0}' already exists")]
    DuplicateFolder(String),

    #[error("Failed to persist tasks: {0}")]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, ManagerError>;

/// Parameters of a task to create
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub task_type: String,
    pub name: String,
    pub description: String,
    pub folder: Option<String>,
    pub max_execution_time: Duration,
    pub properties: TaskProperties,
}

#[derive(Debug, Clone, Default)]
struct ManagerState {
    tasks: HashMap<String, TaskRecord>,
    folders: BTreeMap<String, TaskFolder>,
}

impl ManagerState {
    fn name_taken(&self, name: &str, except_id: Option<&str>) -> bool {
        self.tasks
            .values()
            .any(|t| t.name() == name && Some(t.id()) != except_id)
    }

    fn snapshot(&self) -> TaskSnapshot {
        let mut tasks: Vec<_> = self.tasks.values().cloned().collect();
        tasks.sort_by(|a, b| a.id().cmp(b.id()));
        TaskSnapshot {
            tasks,
            folders: self.folders.values().cloned().collect(),
        }
    }

    /// Resolve a destination folder name; unknown folders mean "no folder"
    fn existing_folder(&self, name: Option<&str>) -> Option<String> {
        let name = name.filter(|n| !n.is_empty())?;
        if self.folders.contains_key(name) {
            Some(name.to_string())
        } else {
            warn!(folder = name, "unknown task folder, task left without folder");
            None
        }
    }
}

/// Task manager of one project.
///
/// Mutations are serialized by `write_lock`, so two concurrent creations
/// with the same name cannot both succeed. Readers only take `state`.
#[derive(Debug)]
pub struct TaskManager {
    project_name: String,
    state: Mutex<ManagerState>,
    write_lock: AsyncMutex<()>,
    store: Option<TaskStore>,
    folder_events: broadcast::Sender<FolderEvent>,
}

impl TaskManager {
    /// In-memory task manager
    pub fn new(project_name: impl Into<String>) -> Self {
        let (folder_events, _) = broadcast::channel(FOLDER_EVENT_CAPACITY);
        Self {
            project_name: project_name.into(),
            state: Mutex::new(ManagerState::default()),
            write_lock: AsyncMutex::new(()),
            store: None,
            folder_events,
        }
    }

    /// Task manager backed by a task file; existing tasks are loaded
    pub async fn open(project_name: impl Into<String>, store: TaskStore) -> Result<Self> {
        let snapshot = store.load().await?;
        let mut manager = Self::new(project_name);
        {
            let state = manager.state.get_mut().unwrap_or_else(PoisonError::into_inner);
            state.tasks = snapshot
                .tasks
                .into_iter()
                .map(|t| (t.id().to_string(), t))
                .collect();
            state.folders = snapshot
                .folders
                .into_iter()
                .map(|f| (f.name().to_string(), f))
                .collect();
        }
        manager.store = Some(store);
        Ok(manager)
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn subscribe_folders(&self) -> broadcast::Receiver<FolderEvent> {
        self.folder_events.subscribe()
    }

    pub fn task_by_name(&self, name: &str) -> Option<TaskRecord> {
        self.lock().tasks.values().find(|t| t.name() == name).cloned()
    }

    pub fn task(&self, id: &str) -> Option<TaskRecord> {
        self.lock().tasks.get(id).cloned()
    }

    /// All tasks sorted by name
    pub fn tasks(&self) -> Vec<TaskRecord> {
        let mut list: Vec<_> = self.lock().tasks.values().cloned().collect();
        list.sort_by(|a, b| a.name().cmp(b.name()));
        list
    }

    /// All folders sorted by name
    pub fn folders(&self) -> Vec<TaskFolder> {
        self.lock().folders.values().cloned().collect()
    }

    pub fn folder(&self, name: &str) -> Option<TaskFolder> {
        self.lock().folders.get(name).cloned()
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        self.lock().snapshot()
    }

    pub async fn create_folder(&self, name: &str) -> Result<()> {
        self.mutate(|state| {
            if state.folders.contains_key(name) {
                return Err(ManagerError::DuplicateFolder(name.to_string()));
            }
            state.folders.insert(name.to_string(), TaskFolder::new(name));
            Ok(())
        })
        .await?;
        let _ = self
            .folder_events
            .send(FolderEvent::FolderCreated(name.to_string()));
        Ok(())
    }

    pub async fn create_task(&self, new_task: NewTask) -> Result<TaskRecord> {
        let record = self
            .mutate(|state| {
                if new_task.name.is_empty() {
                    return Err(ManagerError::EmptyName);
                }
                if state.name_taken(&new_task.name, None) {
                    return Err(ManagerError::DuplicateName {
                        name: new_task.name,
                        project: self.project_name.clone(),
                    });
                }

                let mut record = TaskRecord::new(new_task.name, new_task.task_type);
                record.assign_id(Uuid::new_v4().to_string());
                record.set_description(new_task.description);
                record.set_max_execution_time(new_task.max_execution_time);
                record.set_properties(new_task.properties);

                let folder = state.existing_folder(new_task.folder.as_deref());
                if let Some(f) = folder.as_deref().and_then(|name| state.folders.get_mut(name)) {
                    f.add_task(record.id());
                }
                record.set_folder(folder);

                state.tasks.insert(record.id().to_string(), record.clone());
                Ok(record)
            })
            .await?;

        info!(
            task_id = record.id(),
            task_name = record.name(),
            task_type = record.task_type(),
            "task created"
        );
        if record.folder().is_some() {
            let _ = self.folder_events.send(FolderEvent::TaskMoved {
                task_id: record.id().to_string(),
                from: None,
                to: record.folder().map(str::to_string),
            });
        }
        Ok(record)
    }

    /// Apply `f` to a task. Renames are checked for uniqueness; folder
    /// membership is not changed here, use [`TaskManager::move_to_folder`].
    pub async fn update_task(&self, id: &str, f: impl FnOnce(&mut TaskRecord)) -> Result<TaskRecord> {
        self.mutate(|state| {
            let current = state
                .tasks
                .get(id)
                .ok_or_else(|| ManagerError::TaskNotFound(id.to_string()))?;

            let mut updated = current.clone();
            f(&mut updated);
            if updated.folder() != current.folder() {
                updated.set_folder(current.folder().map(str::to_string));
            }
            if updated.name().is_empty() {
                return Err(ManagerError::EmptyName);
            }
            if updated.name() != current.name() && state.name_taken(updated.name(), Some(id)) {
                return Err(ManagerError::DuplicateName {
                    name: updated.name().to_string(),
                    project: self.project_name.clone(),
                });
            }

            state.tasks.insert(id.to_string(), updated.clone());
            Ok(updated)
        })
        .await
    }

    /// Move a task to `destination` (`None` removes it from any folder).
    /// Returns true and emits one [`FolderEvent::TaskMoved`] when membership changed.
    pub async fn move_to_folder(&self, id: &str, destination: Option<&str>) -> Result<bool> {
        let event = self
            .mutate(|state| {
                let current = state
                    .tasks
                    .get(id)
                    .ok_or_else(|| ManagerError::TaskNotFound(id.to_string()))?
                    .folder()
                    .map(str::to_string);
                let target = state.existing_folder(destination);
                if target == current {
                    return Ok(None);
                }

                if let Some(old) = current.as_deref().and_then(|name| state.folders.get_mut(name)) {
                    old.remove_task(id);
                }
                if let Some(new) = target.as_deref().and_then(|name| state.folders.get_mut(name)) {
                    new.add_task(id);
                }
                if let Some(record) = state.tasks.get_mut(id) {
                    record.set_folder(target.clone());
                }

                Ok(Some(FolderEvent::TaskMoved {
                    task_id: id.to_string(),
                    from: current,
                    to: target,
                }))
            })
            .await?;

        let Some(event) = event else {
            return Ok(false);
        };
        info!(task_id = id, event = ?event, "task folder changed");
        let _ = self.folder_events.send(event);
        Ok(true)
    }

    /// Apply `f` to a copy of the state, save it, then publish it.
    ///
    /// Writers run one at a time from copy to publish, so the task file
    /// always holds the latest state and a failed save changes nothing.
    async fn mutate<T>(&self, f: impl FnOnce(&mut ManagerState) -> Result<T>) -> Result<T> {
        let _write = self.write_lock.lock().await;
        let mut next = self.lock().clone();
        let value = f(&mut next)?;
        if let Some(store) = &self.store {
            store.save(&next.snapshot()).await?;
        }
        *self.lock() = next;
        Ok(value)
    }

    fn lock(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
