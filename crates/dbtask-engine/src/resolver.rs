/*
[INPUT]:  Project object index, task settings store, CancellationToken
[OUTPUT]: Bound target object of a task configuration (load / scan / save)
[POS]:    Settings layer - resolves and persists the object a task operates on
[UPDATE]: When target lookup, fallback or persistence rules change
*/

use dbtask_model::BoundObject;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::project::{LookupError, Project};
use crate::storage::SettingsStore;

/// Settings key of the database bound to a PostgreSQL script task
pub const PG_SCRIPT_DATABASE_KEY: &str = "pg.script.database";

/// Object kind matched by the database fallback scan
pub const DATABASE_KIND: &str = "database";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The persisted id points at an object that no longer exists
    #[error("Target {id} not found")]
    TargetNotFound { id: String },

    /// Neither the persisted id nor the fallback scan produced a target
    #[error("no target found for this configuration")]
    NoTargetFound,

    #[error("Error loading objects configuration: {0}")]
    Lookup(#[from] LookupError),
}

impl ResolveError {
    /// Fatal errors abort the enclosing configuration load
    pub fn is_fatal(&self) -> bool {
        matches!(self, ResolveError::NoTargetFound | ResolveError::TargetNotFound { .. })
    }
}

/// Result of a completed load
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Resolved(BoundObject),
    /// The lookup was cancelled; nothing was resolved and nothing changed
    Cancelled,
}

/// Resolves the object stored under one settings key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetResolver {
    settings_key: String,
    kind: String,
}

impl TargetResolver {
    pub fn new(settings_key: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            settings_key: settings_key.into(),
            kind: kind.into(),
        }
    }

    /// Resolver for the database of a PostgreSQL script task
    pub fn pg_script_database() -> Self {
        Self::new(PG_SCRIPT_DATABASE_KEY, DATABASE_KIND)
    }

    pub fn settings_key(&self) -> &str {
        &self.settings_key
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Resolve the target from the persisted id, or scan when none is stored.
    ///
    /// The id lookup runs on a spawned task so the caller never blocks on
    /// the object index; cancelling `cancel` abandons it.
    pub async fn load(
        &self,
        project: &Project,
        store: &impl SettingsStore,
        cancel: &CancellationToken,
    ) -> Result<LoadOutcome, ResolveError> {
        let persisted = store
            .get_string(&self.settings_key)
            .filter(|id| !id.is_empty());

        let Some(id) = persisted else {
            debug!(key = %self.settings_key, "no persisted target, scanning project");
            return self
                .scan(project)
                .map(LoadOutcome::Resolved)
                .ok_or_else(|| {
                    error!(project = project.name(), "no target found for this configuration");
                    ResolveError::NoTargetFound
                });
        };

        if cancel.is_cancelled() {
            warn!(target_id = %id, "target lookup cancelled before start");
            return Ok(LoadOutcome::Cancelled);
        }

        let lookup_project = project.clone();
        let lookup_id = id.clone();
        let mut lookup =
            tokio::spawn(async move { lookup_project.find_object_by_id(&lookup_id).await });

        let found = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                lookup.abort();
                warn!(target_id = %id, "target lookup cancelled");
                return Ok(LoadOutcome::Cancelled);
            }
            joined = &mut lookup => joined.map_err(|err| {
                LookupError::Unavailable(format!("lookup task failed: {err}"))
            })?,
        };

        match found {
            Ok(Some(object)) => {
                info!(target_id = %object.id, target_name = %object.name, "target resolved");
                Ok(LoadOutcome::Resolved(object))
            }
            Ok(None) => {
                error!(target_id = %id, "error loading objects configuration: target not found");
                Err(ResolveError::TargetNotFound { id })
            }
            Err(err) => {
                error!(target_id = %id, error = %err, "error loading objects configuration");
                Err(err.into())
            }
        }
    }

    /// First top-level object of the resolver's kind, in project order
    pub fn scan(&self, project: &Project) -> Option<BoundObject> {
        project
            .top_level_objects()
            .into_iter()
            .find(|object| object.is_kind(&self.kind))
    }

    /// Persist `target`'s id, scanning once if no target is set.
    /// Returns the object that was persisted; an empty id is stored when none.
    pub fn save(
        &self,
        project: &Project,
        target: Option<&BoundObject>,
        store: &mut impl SettingsStore,
    ) -> Option<BoundObject> {
        let target = match target {
            Some(target) => Some(target.clone()),
            None => self.scan(project),
        };
        let id = target.as_ref().map(|t| t.id.as_str()).unwrap_or_default();
        if id.is_empty() {
            warn!(key = %self.settings_key, "no target to persist, storing empty id");
        }
        store.set_value(&self.settings_key, id);
        target
    }
}

/// A task setting bound to one target object
#[derive(Debug, Clone)]
pub struct TargetBinding {
    resolver: TargetResolver,
    target: Option<BoundObject>,
}

impl TargetBinding {
    pub fn new(resolver: TargetResolver) -> Self {
        Self {
            resolver,
            target: None,
        }
    }

    pub fn resolver(&self) -> &TargetResolver {
        &self.resolver
    }

    pub fn target(&self) -> Option<&BoundObject> {
        self.target.as_ref()
    }

    pub fn set_target(&mut self, target: Option<BoundObject>) {
        self.target = target;
    }

    /// Load the bound target. A cancelled lookup leaves the binding untouched.
    pub async fn load_settings(
        &mut self,
        project: &Project,
        store: &impl SettingsStore,
        cancel: &CancellationToken,
    ) -> Result<Option<&BoundObject>, ResolveError> {
        if let LoadOutcome::Resolved(object) = self.resolver.load(project, store, cancel).await? {
            self.target = Some(object);
        }
        Ok(self.target.as_ref())
    }

    pub fn save_settings(&mut self, project: &Project, store: &mut impl SettingsStore) {
        self.target = self.resolver.save(project, self.target.as_ref(), store);
    }
}
