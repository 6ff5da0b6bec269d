/*
[INPUT]:  Public API exports for the dbtask-engine crate
[OUTPUT]: Module declarations and public re-exports
[POS]:    Crate root - library entry point
[UPDATE]: When adding new modules or public exports
*/

pub mod config;
pub mod dispatch;
pub mod events;
pub mod filter;
pub mod manager;
pub mod poller;
pub mod project;
pub mod registry;
pub mod resolver;
pub mod storage;
pub mod wizard;

// Re-export main types for convenience
pub use config::EngineConfig;
pub use dispatch::{DispatchRequest, TaskDispatcher};
pub use events::{FolderEvent, WizardEvent};
pub use filter::{CatalogNode, FilterContext, filtered_tree, is_category_applicable, is_type_applicable};
pub use manager::{ManagerError, NewTask, TaskManager};
pub use poller::{PollHandle, PollOutcome, ReadinessPoller};
pub use project::{DataSourceRegistry, InMemoryDataSources, InMemoryObjectIndex, LookupError, ObjectIndex, Project};
pub use registry::TaskRegistry;
pub use resolver::{LoadOutcome, ResolveError, TargetBinding, TargetResolver};
pub use storage::{SettingsStore, StorageError, TaskSnapshot, TaskStore};
pub use wizard::{TaskConfigSession, TaskWizard, ValidationError, WizardError, WizardMode, WizardState};
