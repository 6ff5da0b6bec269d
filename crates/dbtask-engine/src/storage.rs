/*
[INPUT]:  Task manager snapshots; task property bags
[OUTPUT]: JSON task file with atomic writes; key/value settings access
[POS]:    Persistence layer - task definitions and task settings
[UPDATE]: When the task file layout or settings access changes
*/

use std::path::{Path, PathBuf};

use dbtask_model::{TaskFolder, TaskProperties, TaskRecord};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

const TASKS_FILE: &str = "tasks.json";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Could not determine data directory")]
    NoDataDir,
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Opaque string settings, as used for task-specific options
pub trait SettingsStore {
    fn get_string(&self, key: &str) -> Option<String>;

    fn set_value(&mut self, key: &str, value: &str);
}

impl SettingsStore for TaskProperties {
    fn get_string(&self, key: &str) -> Option<String> {
        self.get_str(key).map(str::to_string)
    }

    fn set_value(&mut self, key: &str, value: &str) {
        self.insert(key, value);
    }
}

/// Everything a task manager persists
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    #[serde(default)]
    pub tasks: Vec<TaskRecord>,
    #[serde(default)]
    pub folders: Vec<TaskFolder>,
}

/// JSON file holding the tasks of one project
#[derive(Debug)]
pub struct TaskStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl TaskStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Store rooted at `dir`, creating the directory if needed
    pub async fn in_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).await?;
        Ok(Self::new(dir.join(TASKS_FILE)))
    }

    /// Store in the platform data directory (`<data_dir>/dbtask`)
    pub async fn open_default() -> Result<Self> {
        let dir = default_data_dir().ok_or(StorageError::NoDataDir)?;
        Self::in_dir(dir).await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file loads as an empty snapshot
    pub async fn load(&self) -> Result<TaskSnapshot> {
        if !fs::try_exists(&self.path).await? {
            return Ok(TaskSnapshot::default());
        }
        let content = fs::read_to_string(&self.path).await?;
        let snapshot: TaskSnapshot = serde_json::from_str(&content)?;
        debug!(
            path = %self.path.display(),
            tasks = snapshot.tasks.len(),
            folders = snapshot.folders.len(),
            "task file loaded"
        );
        Ok(snapshot)
    }

    pub async fn save(&self, snapshot: &TaskSnapshot) -> Result<()> {
        let content = serde_json::to_string_pretty(snapshot)?;
        let _guard = self.write_lock.lock().await;

        // Atomic write: write to temp file then rename
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, content).await?;
        fs::rename(&temp_path, &self.path).await?;
        debug!(path = %self.path.display(), tasks = snapshot.tasks.len(), "task file saved");
        Ok(())
    }
}

pub fn default_data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("dbtask"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let tmp_dir = TempDir::new().unwrap();
        let store = TaskStore::in_dir(tmp_dir.path()).await.unwrap();
        let snapshot = store.load().await.unwrap();
        assert!(snapshot.tasks.is_empty());
        assert!(snapshot.folders.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let tmp_dir = TempDir::new().unwrap();
        let store = TaskStore::in_dir(tmp_dir.path().join("nested")).await.unwrap();

        let mut record = TaskRecord::new("Backup", "pgBackup");
        record.assign_id("t1");
        record.set_folder(Some("Nightly".to_string()));
        let mut folder = TaskFolder::new("Nightly");
        folder.add_task("t1");
        let snapshot = TaskSnapshot {
            tasks: vec![record],
            folders: vec![folder],
        };

        store.save(&snapshot).await.unwrap();
        assert!(!store.path().with_extension("tmp").exists());
        assert_eq!(store.load().await.unwrap(), snapshot);
    }

    #[tokio::test]
    async fn test_corrupted_file() {
        let tmp_dir = TempDir::new().unwrap();
        let store = TaskStore::in_dir(tmp_dir.path()).await.unwrap();
        std::fs::write(store.path(), "invalid json").unwrap();
        assert!(matches!(store.load().await, Err(StorageError::Json(_))));
    }

    #[test]
    fn test_properties_as_settings() {
        let mut properties = TaskProperties::new();
        assert_eq!(properties.get_string("pg.script.database"), None);
        properties.set_value("pg.script.database", "ds1/postgres");
        assert_eq!(
            properties.get_string("pg.script.database").as_deref(),
            Some("ds1/postgres")
        );
    }
}
