/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public task model crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod catalog;
pub mod definition;
pub mod error;
pub mod objects;
pub mod record;

pub use catalog::{
    Applicability,
    CatalogBuilder,
    DriverMatcher,
    TaskCatalog,
    TaskCategory,
    TaskType,
};

pub use definition::{CatalogDefinition, CategoryDefinition, TaskTypeDefinition};

pub use error::{CatalogError, Result};

pub use objects::{BoundObject, DataSourceDescriptor};

pub use record::{TaskFolder, TaskProperties, TaskRecord};
