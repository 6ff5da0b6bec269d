/*
[INPUT]:  TaskCatalog, project data source drivers, filtering flag
[OUTPUT]: Applicability decisions and the filtered category tree
[POS]:    Domain logic - which task types a project can use
[UPDATE]: When applicability rules or tree population changes
*/

use dbtask_model::{TaskCatalog, TaskCategory, TaskType};

use crate::project::Project;

/// Snapshot of everything the applicability rules look at.
///
/// The driver list may be partial while the data source registry is still
/// loading; callers re-filter once loading completes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterContext {
    pub filtering_enabled: bool,
    pub registry_loaded: bool,
    pub active_drivers: Vec<String>,
}

impl FilterContext {
    pub fn new(filtering_enabled: bool, registry_loaded: bool, active_drivers: Vec<String>) -> Self {
        Self {
            filtering_enabled,
            registry_loaded,
            active_drivers,
        }
    }

    /// Context that lets every category and type through
    pub fn disabled() -> Self {
        Self::new(false, false, Vec::new())
    }

    pub fn for_project(project: &Project, filtering_enabled: bool) -> Self {
        Self::new(
            filtering_enabled,
            project.is_registry_loaded(),
            project.active_drivers(),
        )
    }
}

pub fn is_type_applicable(task_type: &TaskType, ctx: &FilterContext) -> bool {
    if !ctx.filtering_enabled || !ctx.registry_loaded {
        return true;
    }
    if task_type.is_standalone() {
        return true;
    }
    ctx.active_drivers
        .iter()
        .any(|driver| task_type.is_driver_applicable(driver))
}

/// A category is applicable when any descendant category or any of its own
/// task types is applicable.
pub fn is_category_applicable(catalog: &TaskCatalog, category: &TaskCategory, ctx: &FilterContext) -> bool {
    if !ctx.filtering_enabled {
        return true;
    }
    catalog
        .children(category)
        .into_iter()
        .any(|child| is_category_applicable(catalog, child, ctx))
        || catalog
            .task_types(category)
            .into_iter()
            .any(|ty| is_type_applicable(ty, ctx))
}

/// One visible category with its visible children and task types
#[derive(Debug, Clone)]
pub struct CatalogNode<'a> {
    pub category: &'a TaskCategory,
    pub children: Vec<CatalogNode<'a>>,
    pub task_types: Vec<&'a TaskType>,
}

impl CatalogNode<'_> {
    /// Visit every task type in tree order
    pub fn for_each_type<'s>(&'s self, f: &mut impl FnMut(&'s TaskType)) {
        for child in &self.children {
            child.for_each_type(f);
        }
        for ty in &self.task_types {
            f(*ty);
        }
    }
}

/// Build the tree the task wizard shows: applicable categories only, each
/// sorted by name, child categories before task types.
pub fn filtered_tree<'a>(catalog: &'a TaskCatalog, ctx: &FilterContext) -> Vec<CatalogNode<'a>> {
    build_nodes(catalog, catalog.root_categories(), ctx)
}

fn build_nodes<'a>(
    catalog: &'a TaskCatalog,
    categories: Vec<&'a TaskCategory>,
    ctx: &FilterContext,
) -> Vec<CatalogNode<'a>> {
    categories
        .into_iter()
        .filter(|category| is_category_applicable(catalog, category, ctx))
        .map(|category| CatalogNode {
            category,
            children: build_nodes(catalog, catalog.children(category), ctx),
            task_types: catalog
                .task_types(category)
                .into_iter()
                .filter(|ty| is_type_applicable(ty, ctx))
                .collect(),
        })
        .collect()
}
