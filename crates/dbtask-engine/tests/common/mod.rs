/*
[INPUT]:  Test catalogs, data sources and navigator objects
[OUTPUT]: Shared project and catalog fixtures
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for dbtask-engine tests

#![allow(dead_code)]

use std::sync::Arc;

use dbtask_engine::{InMemoryDataSources, InMemoryObjectIndex, Project, TaskManager};
use dbtask_model::{Applicability, BoundObject, DataSourceDescriptor, TaskCatalog, TaskCategory, TaskType};

pub const PROJECT: &str = "General";

/// Tools (PostgreSQL backup/restore), Transfer (standalone shell) and an
/// empty MySQL category nested under Tools
pub fn tools_catalog() -> Arc<TaskCatalog> {
    let mut builder = TaskCatalog::builder();
    builder
        .add_category(TaskCategory::new("tools", "Tools"))
        .unwrap()
        .add_category(TaskCategory::new("mysql", "MySQL").with_parent("tools"))
        .unwrap()
        .add_category(TaskCategory::new("common", "Common"))
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
        .unwrap()
        .add_task_type(
            TaskType::new("mysqlDump", "Dump", "mysql")
                .with_applicability(Applicability::drivers(["mysql"])),
        )
        .unwrap()
        .add_task_type(TaskType::new("shell", "Shell command", "common").standalone(true))
        .unwrap();
    Arc::new(builder.build())
}

/// Export and Import, each with one driver-bound type
pub fn transfer_catalog() -> Arc<TaskCatalog> {
    let mut builder = TaskCatalog::builder();
    builder
        .add_category(TaskCategory::new("export", "Export"))
        .unwrap()
        .add_category(TaskCategory::new("import", "Import"))
        .unwrap();
    builder
        .add_task_type(
            TaskType::new("dataExport", "Data export", "export")
                .with_applicability(Applicability::drivers(["postgresql"])),
        )
        .unwrap()
        .add_task_type(
            TaskType::new("dataImport", "Data import", "import")
                .with_applicability(Applicability::drivers(["postgresql"])),
        )
        .unwrap();
    Arc::new(builder.build())
}

pub fn postgres() -> DataSourceDescriptor {
    DataSourceDescriptor::new("ds1", "Local PostgreSQL", "postgresql")
}

pub fn database(name: &str) -> BoundObject {
    BoundObject::new(format!("ds1/{name}"), name, "database")
}

pub fn schema(name: &str) -> BoundObject {
    BoundObject::new(format!("ds1/postgres/{name}"), name, "schema")
}

pub fn project_with(
    data_sources: InMemoryDataSources,
    objects: InMemoryObjectIndex,
) -> Project {
    Project::new(
        PROJECT,
        Arc::new(TaskManager::new(PROJECT)),
        Arc::new(data_sources),
        Arc::new(objects),
    )
}

/// Loaded project with one PostgreSQL data source and no objects
pub fn postgres_project() -> Project {
    project_with(
        InMemoryDataSources::loaded(vec![postgres()]),
        InMemoryObjectIndex::default(),
    )
}

pub fn objects_project(objects: Vec<BoundObject>) -> Project {
    project_with(
        InMemoryDataSources::loaded(vec![postgres()]),
        InMemoryObjectIndex::new(objects),
    )
}
