/*
[INPUT]:  Project data source and navigator object metadata
[OUTPUT]: DataSourceDescriptor and BoundObject value types
[POS]:    Domain layer - objects a task can be filtered by or bound to
[UPDATE]: When bound object identity or data source metadata changes
*/

use serde::{Deserialize, Serialize};

/// A data source configured in a project, identified by its driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceDescriptor {
    pub id: String,
    pub name: String,
    pub driver: String,
}

impl DataSourceDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, driver: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            driver: driver.into(),
        }
    }
}

/// An object a task can operate against, e.g. a database.
/// `id` is the full object id persisted in task settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundObject {
    pub id: String,
    pub name: String,
    pub kind: String,
}

impl BoundObject {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: kind.into(),
        }
    }

    pub fn is_kind(&self, kind: &str) -> bool {
        self.kind == kind
    }
}
