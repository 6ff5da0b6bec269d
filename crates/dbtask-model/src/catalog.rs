/*
[INPUT]:  Task category and task type registrations
[OUTPUT]: Immutable, name-ordered task catalog with lookups
[POS]:    Domain layer - task taxonomy shared by every wizard session
[UPDATE]: When task type metadata or catalog traversal rules change
*/

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::error::{CatalogError, Result};

/// Driver predicate used by task types with custom applicability rules
pub type DriverMatcher = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Which database drivers a task type can be used with
#[derive(Clone, Default)]
pub enum Applicability {
    /// Every driver qualifies
    #[default]
    AnyDriver,
    /// Only the listed driver ids qualify
    Drivers(BTreeSet<String>),
    /// Arbitrary predicate over the driver id
    Custom(DriverMatcher),
}

impl Applicability {
    pub fn drivers<I, S>(drivers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Applicability::Drivers(drivers.into_iter().map(Into::into).collect())
    }

    pub fn custom(matcher: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Applicability::Custom(Arc::new(matcher))
    }

    pub fn matches(&self, driver_id: &str) -> bool {
        match self {
            Applicability::AnyDriver => true,
            Applicability::Drivers(drivers) => drivers.contains(driver_id),
            Applicability::Custom(matcher) => matcher(driver_id),
        }
    }
}

impl fmt::Debug for Applicability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Applicability::AnyDriver => f.write_str("AnyDriver"),
            Applicability::Drivers(drivers) => f.debug_tuple("Drivers").field(drivers).finish(),
            Applicability::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// A node of the task category tree
#[derive(Debug, Clone)]
pub struct TaskCategory {
    id: String,
    name: String,
    description: String,
    icon: Option<String>,
    parent: Option<String>,
    children: Vec<String>,
    task_types: Vec<String>,
}

impl TaskCategory {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            icon: None,
            parent: None,
            children: Vec::new(),
            task_types: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// A kind of task that can be created, owned by exactly one category
#[derive(Debug, Clone)]
pub struct TaskType {
    id: String,
    name: String,
    description: String,
    icon: Option<String>,
    category: String,
    standalone: bool,
    applicability: Applicability,
}

impl TaskType {
    pub fn new(id: impl Into<String>, name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            icon: None,
            category: category.into(),
            standalone: false,
            applicability: Applicability::AnyDriver,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Mark the type as usable without any connected data source
    pub fn standalone(mut self, standalone: bool) -> Self {
        self.standalone = standalone;
        self
    }

    pub fn with_applicability(mut self, applicability: Applicability) -> Self {
        self.applicability = applicability;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }

    pub fn category_id(&self) -> &str {
        &self.category
    }

    pub fn is_standalone(&self) -> bool {
        self.standalone
    }

    pub fn applicability(&self) -> &Applicability {
        &self.applicability
    }

    pub fn is_driver_applicable(&self, driver_id: &str) -> bool {
        self.applicability.matches(driver_id)
    }
}

/// Read-only task taxonomy.
///
/// Children, task types and root categories are kept sorted by name
/// (case-sensitive, ties keep registration order), so every traversal of
/// the same catalog yields the same order.
#[derive(Debug, Clone, Default)]
pub struct TaskCatalog {
    categories: HashMap<String, TaskCategory>,
    task_types: HashMap<String, TaskType>,
    roots: Vec<String>,
}

impl TaskCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn category_count(&self) -> usize {
        self.categories.len()
    }

    pub fn task_type_count(&self) -> usize {
        self.task_types.len()
    }

    pub fn root_categories(&self) -> Vec<&TaskCategory> {
        self.resolve_categories(&self.roots)
    }

    pub fn children(&self, category: &TaskCategory) -> Vec<&TaskCategory> {
        self.resolve_categories(&category.children)
    }

    pub fn task_types(&self, category: &TaskCategory) -> Vec<&TaskType> {
        category
            .task_types
            .iter()
            .filter_map(|id| self.task_types.get(id))
            .collect()
    }

    pub fn category(&self, id: &str) -> Option<&TaskCategory> {
        self.categories.get(id)
    }

    pub fn task_type(&self, id: &str) -> Option<&TaskType> {
        self.task_types.get(id)
    }

    pub fn parent_of(&self, category: &TaskCategory) -> Option<&TaskCategory> {
        category.parent.as_deref().and_then(|id| self.categories.get(id))
    }

    pub fn category_of(&self, task_type: &TaskType) -> Option<&TaskCategory> {
        self.categories.get(&task_type.category)
    }

    fn resolve_categories(&self, ids: &[String]) -> Vec<&TaskCategory> {
        ids.iter().filter_map(|id| self.categories.get(id)).collect()
    }
}

/// Incremental catalog construction.
///
/// A category can only name an already registered parent, so the
/// resulting graph is always a tree.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    categories: HashMap<String, TaskCategory>,
    task_types: HashMap<String, TaskType>,
    roots: Vec<String>,
}

impl CatalogBuilder {
    pub fn add_category(&mut self, mut category: TaskCategory) -> Result<&mut Self> {
        if self.categories.contains_key(&category.id) {
            return Err(CatalogError::DuplicateCategory(category.id));
        }
        category.children.clear();
        category.task_types.clear();

        match category.parent.as_deref() {
            Some(parent_id) => {
                let parent = self.categories.get_mut(parent_id).ok_or_else(|| {
                    CatalogError::UnknownParent {
                        category: category.id.clone(),
                        parent: parent_id.to_string(),
                    }
                })?;
                parent.children.push(category.id.clone());
            }
            None => self.roots.push(category.id.clone()),
        }

        self.categories.insert(category.id.clone(), category);
        Ok(self)
    }

    pub fn add_task_type(&mut self, task_type: TaskType) -> Result<&mut Self> {
        if self.task_types.contains_key(&task_type.id) {
            return Err(CatalogError::DuplicateTaskType(task_type.id));
        }
        let category = self.categories.get_mut(&task_type.category).ok_or_else(|| {
            CatalogError::UnknownCategory {
                task_type: task_type.id.clone(),
                category: task_type.category.clone(),
            }
        })?;
        category.task_types.push(task_type.id.clone());
        self.task_types.insert(task_type.id.clone(), task_type);
        Ok(self)
    }

    pub fn build(self) -> TaskCatalog {
        let CatalogBuilder {
            mut categories,
            task_types,
            mut roots,
        } = self;

        let category_names: HashMap<String, String> = categories
            .values()
            .map(|c| (c.id.clone(), c.name.clone()))
            .collect();
        let by_category_name = |a: &String, b: &String| {
            category_names
                .get(a)
                .map(String::as_str)
                .cmp(&category_names.get(b).map(String::as_str))
        };

        roots.sort_by(by_category_name);
        for category in categories.values_mut() {
            category.children.sort_by(by_category_name);
            category.task_types.sort_by(|a, b| {
                let a = task_types.get(a).map(TaskType::name);
                let b = task_types.get(b).map(TaskType::name);
                a.cmp(&b)
            });
        }

        TaskCatalog {
            categories,
            task_types,
            roots,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_catalog() -> TaskCatalog {
        let mut builder = TaskCatalog::builder();
        builder
            .add_category(TaskCategory::new("tools", "Tools"))
            .unwrap()
            .add_category(TaskCategory::new("common", "Common"))
            .unwrap()
            .add_category(TaskCategory::new("pg", "PostgreSQL").with_parent("tools"))
            .unwrap()
            .add_category(TaskCategory::new("mysql", "MySQL").with_parent("tools"))
            .unwrap();
        builder
            .add_task_type(TaskType::new("pgRestore", "Restore", "pg"))
            .unwrap()
            .add_task_type(TaskType::new("pgBackup", "Backup", "pg"))
            .unwrap()
            .add_task_type(TaskType::new("script", "Execute script", "common").standalone(true))
            .unwrap();
        builder.build()
    }

    #[test]
    fn test_roots_sorted_by_name() {
        let catalog = sample_catalog();
        let names: Vec<_> = catalog.root_categories().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["Common", "Tools"]);
    }

    #[test]
    fn test_children_and_types_sorted() {
        let catalog = sample_catalog();
        let tools = catalog.category("tools").unwrap();
        let children: Vec<_> = catalog.children(tools).iter().map(|c| c.name()).collect();
        assert_eq!(children, vec!["MySQL", "PostgreSQL"]);

        let pg = catalog.category("pg").unwrap();
        let types: Vec<_> = catalog.task_types(pg).iter().map(|t| t.name()).collect();
        assert_eq!(types, vec!["Backup", "Restore"]);
    }

    #[test]
    fn test_sort_is_case_sensitive() {
        let mut builder = TaskCatalog::builder();
        builder
            .add_category(TaskCategory::new("a", "alpha"))
            .unwrap()
            .add_category(TaskCategory::new("b", "Beta"))
            .unwrap();
        let catalog = builder.build();
        let names: Vec<_> = catalog.root_categories().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["Beta", "alpha"]);
    }

    #[test]
    fn test_back_references() {
        let catalog = sample_catalog();
        let backup = catalog.task_type("pgBackup").unwrap();
        let pg = catalog.category_of(backup).unwrap();
        assert_eq!(pg.id(), "pg");
        assert_eq!(catalog.parent_of(pg).unwrap().id(), "tools");
        assert!(catalog.category("tools").unwrap().is_root());
    }

    #[test]
    fn test_unknown_parent_rejected() {
        let mut builder = TaskCatalog::builder();
        let err = builder
            .add_category(TaskCategory::new("csv", "CSV").with_parent("export"))
            .unwrap_err();
        assert!(matches!(err, CatalogError::UnknownParent { .. }));
    }

    #[test]
    fn test_duplicates_rejected() {
        let mut builder = TaskCatalog::builder();
        builder.add_category(TaskCategory::new("a", "A")).unwrap();
        assert!(matches!(
            builder.add_category(TaskCategory::new("a", "Again")),
            Err(CatalogError::DuplicateCategory(_))
        ));
        builder.add_task_type(TaskType::new("t", "T", "a")).unwrap();
        assert!(matches!(
            builder.add_task_type(TaskType::new("t", "T2", "a")),
            Err(CatalogError::DuplicateTaskType(_))
        ));
        assert!(matches!(
            builder.add_task_type(TaskType::new("u", "U", "missing")),
            Err(CatalogError::UnknownCategory { .. })
        ));
    }

    #[test]
    fn test_applicability() {
        assert!(Applicability::AnyDriver.matches("anything"));
        let pg_only = Applicability::drivers(["postgresql"]);
        assert!(pg_only.matches("postgresql"));
        assert!(!pg_only.matches("mysql"));
        let custom = Applicability::custom(|driver| driver.starts_with("pg"));
        assert!(custom.matches("pg15"));
        assert!(!custom.matches("oracle"));
    }

    #[test]
    fn test_empty_catalog() {
        let catalog = TaskCatalog::empty();
        assert!(catalog.is_empty());
        assert!(catalog.root_categories().is_empty());
    }
}
