/*
[INPUT]:  CatalogDefinition (file or in-memory) on load / reload
[OUTPUT]: Shared Arc<TaskCatalog> snapshots and reload notifications
[POS]:    Registry layer - process-wide task catalog lifecycle
[UPDATE]: When catalog sources or reload semantics change
*/

use std::path::Path;
use std::sync::Arc;

use dbtask_model::{CatalogDefinition, Result, TaskCatalog};
use tokio::sync::watch;
use tracing::info;

/// Owns the current task catalog snapshot.
///
/// Readers take an `Arc` snapshot that never changes underneath them; a
/// reload swaps the snapshot and wakes every subscriber.
#[derive(Debug)]
pub struct TaskRegistry {
    catalog: watch::Sender<Arc<TaskCatalog>>,
    loaded: watch::Sender<bool>,
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskRegistry {
    /// Create an unloaded registry holding an empty catalog
    pub fn new() -> Self {
        let (catalog, _) = watch::channel(Arc::new(TaskCatalog::empty()));
        let (loaded, _) = watch::channel(false);
        Self { catalog, loaded }
    }

    /// Create a registry already loaded with the given catalog
    pub fn with_catalog(catalog: TaskCatalog) -> Self {
        let registry = Self::new();
        registry.install(catalog);
        registry
    }

    pub fn load(&self, definition: &CatalogDefinition) -> Result<Arc<TaskCatalog>> {
        let catalog = definition.build()?;
        Ok(self.install(catalog))
    }

    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Arc<TaskCatalog>> {
        let definition = CatalogDefinition::from_file(path)?;
        self.load(&definition)
    }

    /// Rebuild the catalog. On failure the previous snapshot stays active.
    pub fn reload(&self, definition: &CatalogDefinition) -> Result<Arc<TaskCatalog>> {
        self.load(definition)
    }

    pub fn install(&self, catalog: TaskCatalog) -> Arc<TaskCatalog> {
        let catalog = Arc::new(catalog);
        info!(
            categories = catalog.category_count(),
            task_types = catalog.task_type_count(),
            "task registry loaded"
        );
        self.catalog.send_replace(catalog.clone());
        self.loaded.send_replace(true);
        catalog
    }

    pub fn catalog(&self) -> Arc<TaskCatalog> {
        self.catalog.borrow().clone()
    }

    pub fn is_loaded(&self) -> bool {
        *self.loaded.borrow()
    }

    /// Observe catalog replacements
    pub fn subscribe(&self) -> watch::Receiver<Arc<TaskCatalog>> {
        self.catalog.subscribe()
    }
}
