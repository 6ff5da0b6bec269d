/*
[INPUT]:  Data source registry and object index implementations
[OUTPUT]: Project service consumed by the wizard, filter and resolver
[POS]:    Service layer - project collaborators behind trait seams
[UPDATE]: When project services or object lookup contracts change
*/

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dbtask_model::{BoundObject, DataSourceDescriptor};
use thiserror::Error;
use tokio::sync::watch;

use crate::manager::TaskManager;

/// Failure reported by an object index while looking up an object
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("Object index unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed object id: {0}")]
    MalformedId(String),
}

/// Data sources configured in a project.
///
/// The registry may be populated asynchronously, so callers must expect
/// `data_sources` to grow between calls until `is_loaded` reports true.
pub trait DataSourceRegistry: Send + Sync {
    fn is_loaded(&self) -> bool;

    fn data_sources(&self) -> Vec<DataSourceDescriptor>;
}

/// Lookup of navigator objects (databases, schemas...) by full id
#[async_trait]
pub trait ObjectIndex: Send + Sync {
    async fn find_object_by_id(&self, id: &str) -> Result<Option<BoundObject>, LookupError>;

    /// Top level objects in the project's native enumeration order
    fn top_level_objects(&self) -> Vec<BoundObject>;
}

/// A project: its name, task manager, data sources and objects
#[derive(Clone)]
pub struct Project {
    name: String,
    task_manager: Arc<TaskManager>,
    data_sources: Arc<dyn DataSourceRegistry>,
    objects: Arc<dyn ObjectIndex>,
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("name", &self.name)
            .field("registry_loaded", &self.is_registry_loaded())
            .finish_non_exhaustive()
    }
}

impl Project {
    pub fn new(
        name: impl Into<String>,
        task_manager: Arc<TaskManager>,
        data_sources: Arc<dyn DataSourceRegistry>,
        objects: Arc<dyn ObjectIndex>,
    ) -> Self {
        Self {
            name: name.into(),
            task_manager,
            data_sources,
            objects,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn task_manager(&self) -> &Arc<TaskManager> {
        &self.task_manager
    }

    pub fn data_source_registry(&self) -> &Arc<dyn DataSourceRegistry> {
        &self.data_sources
    }

    pub fn is_registry_loaded(&self) -> bool {
        self.data_sources.is_loaded()
    }

    /// Driver ids of the currently known data sources
    pub fn active_drivers(&self) -> Vec<String> {
        self.data_sources
            .data_sources()
            .into_iter()
            .map(|ds| ds.driver)
            .collect()
    }

    pub async fn find_object_by_id(&self, id: &str) -> Result<Option<BoundObject>, LookupError> {
        self.objects.find_object_by_id(id).await
    }

    pub fn top_level_objects(&self) -> Vec<BoundObject> {
        self.objects.top_level_objects()
    }
}

/// In-memory data source registry that can be filled after creation
#[derive(Debug)]
pub struct InMemoryDataSources {
    sources: watch::Sender<Vec<DataSourceDescriptor>>,
    loaded: watch::Sender<bool>,
}

impl InMemoryDataSources {
    /// Empty, not yet loaded registry
    pub fn pending() -> Self {
        let (sources, _) = watch::channel(Vec::new());
        let (loaded, _) = watch::channel(false);
        Self { sources, loaded }
    }

    pub fn loaded(sources: Vec<DataSourceDescriptor>) -> Self {
        let registry = Self::pending();
        registry.populate(sources);
        registry
    }

    pub fn add(&self, source: DataSourceDescriptor) {
        self.sources.send_modify(|sources| sources.push(source));
    }

    /// Replace the data source list and mark the registry loaded
    pub fn populate(&self, sources: Vec<DataSourceDescriptor>) {
        self.sources.send_replace(sources);
        self.loaded.send_replace(true);
    }

    pub fn subscribe_loaded(&self) -> watch::Receiver<bool> {
        self.loaded.subscribe()
    }
}

impl DataSourceRegistry for InMemoryDataSources {
    fn is_loaded(&self) -> bool {
        *self.loaded.borrow()
    }

    fn data_sources(&self) -> Vec<DataSourceDescriptor> {
        self.sources.borrow().clone()
    }
}

/// In-memory object index with optional artificial lookup latency
#[derive(Debug, Clone, Default)]
pub struct InMemoryObjectIndex {
    objects: Vec<BoundObject>,
    lookup_delay: Option<Duration>,
}

impl InMemoryObjectIndex {
    pub fn new(objects: Vec<BoundObject>) -> Self {
        Self {
            objects,
            lookup_delay: None,
        }
    }

    pub fn with_lookup_delay(mut self, delay: Duration) -> Self {
        self.lookup_delay = Some(delay);
        self
    }
}

#[async_trait]
impl ObjectIndex for InMemoryObjectIndex {
    async fn find_object_by_id(&self, id: &str) -> Result<Option<BoundObject>, LookupError> {
        if id.trim().is_empty() {
            return Err(LookupError::MalformedId(id.to_string()));
        }
        if let Some(delay) = self.lookup_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.objects.iter().find(|o| o.id == id).cloned())
    }

    fn top_level_objects(&self) -> Vec<BoundObject> {
        self.objects.clone()
    }
}
