/*
[INPUT]:  YAML catalog definition (nested categories with task types)
[OUTPUT]: TaskCatalog built through CatalogBuilder
[POS]:    Definition layer - file format for the task taxonomy
[UPDATE]: When adding new catalog definition fields
*/

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::catalog::{Applicability, CatalogBuilder, TaskCatalog, TaskCategory, TaskType};
use crate::error::Result;

/// Root of a catalog definition file
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CatalogDefinition {
    #[serde(default)]
    pub categories: Vec<CategoryDefinition>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CategoryDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub children: Vec<CategoryDefinition>,
    #[serde(default)]
    pub types: Vec<TaskTypeDefinition>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TaskTypeDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub standalone: bool,
    /// Driver ids the type applies to; absent means any driver
    #[serde(default)]
    pub drivers: Option<Vec<String>>,
}

impl CatalogDefinition {
    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Load a catalog definition from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn build(&self) -> Result<TaskCatalog> {
        let mut builder = TaskCatalog::builder();
        for category in &self.categories {
            register(&mut builder, category, None)?;
        }
        let catalog = builder.build();
        tracing::debug!(
            categories = catalog.category_count(),
            task_types = catalog.task_type_count(),
            "task catalog built"
        );
        Ok(catalog)
    }
}

fn register(
    builder: &mut CatalogBuilder,
    definition: &CategoryDefinition,
    parent: Option<&str>,
) -> Result<()> {
    let mut category =
        TaskCategory::new(&definition.id, &definition.name).with_description(&definition.description);
    if let Some(icon) = &definition.icon {
        category = category.with_icon(icon);
    }
    if let Some(parent) = parent {
        category = category.with_parent(parent);
    }
    builder.add_category(category)?;

    for child in &definition.children {
        register(builder, child, Some(&definition.id))?;
    }

    for ty in &definition.types {
        let applicability = match &ty.drivers {
            Some(drivers) => Applicability::drivers(drivers.iter().cloned()),
            None => Applicability::AnyDriver,
        };
        let mut task_type = TaskType::new(&ty.id, &ty.name, &definition.id)
            .with_description(&ty.description)
            .standalone(ty.standalone)
            .with_applicability(applicability);
        if let Some(icon) = &ty.icon {
            task_type = task_type.with_icon(icon);
        }
        builder.add_task_type(task_type)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogError;

    const SAMPLE: &str = r#"
categories:
  - id: tools
    name: Database tools
    children:
      - id: pgTools
        name: PostgreSQL
        types:
          - id: pgScript
            name: Execute script
            drivers: [postgresql]
  - id: common
    name: Common
    types:
      - id: shell
        name: Shell command
        standalone: true
"#;

    #[test]
    fn test_build_from_yaml() {
        let catalog = CatalogDefinition::from_yaml(SAMPLE).unwrap().build().unwrap();
        assert_eq!(catalog.category_count(), 3);
        assert_eq!(catalog.task_type_count(), 2);

        let script = catalog.task_type("pgScript").unwrap();
        assert_eq!(script.category_id(), "pgTools");
        assert!(script.is_driver_applicable("postgresql"));
        assert!(!script.is_driver_applicable("mysql"));

        let shell = catalog.task_type("shell").unwrap();
        assert!(shell.is_standalone());
        assert!(shell.is_driver_applicable("mysql"));

        let pg_tools = catalog.category("pgTools").unwrap();
        assert_eq!(pg_tools.parent_id(), Some("tools"));
    }

    #[test]
    fn test_invalid_yaml() {
        let err = CatalogDefinition::from_yaml("categories: 12").unwrap_err();
        assert!(matches!(err, CatalogError::Definition(_)));
    }

    #[test]
    fn test_duplicate_ids_in_definition() {
        let yaml = r#"
categories:
  - id: a
    name: A
  - id: a
    name: B
"#;
        let err = CatalogDefinition::from_yaml(yaml).unwrap().build().unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateCategory(id) if id == "a"));
    }
}
