/*
[INPUT]:  Catalog construction and catalog definition parsing failures
[OUTPUT]: Structured error type for the model crate
[POS]:    Error handling layer - unified error type for catalog building
[UPDATE]: When adding new catalog sources or structural checks
*/

use thiserror::Error;

/// Errors raised while building a task catalog
#[derive(Error, Debug)]
pub enum CatalogError {
    /// A category id was registered twice
    #[error("Duplicate task category id: {0}")]
    DuplicateCategory(String),

    /// A task type id was registered twice
    #[error("Duplicate task type id: {0}")]
    DuplicateTaskType(String),

    /// A category referenced a parent that is not registered yet
    #[error("Unknown parent category '{parent}' for category '{category}'")]
    UnknownParent { category: String, parent: String },

    /// A task type referenced a category that is not registered
    #[error("Unknown category '{category}' for task type '{task_type}'")]
    UnknownCategory { task_type: String, category: String },

    /// Catalog definition could not be parsed
    #[error("Invalid catalog definition: {0}")]
    Definition(#[from] serde_yaml::Error),

    /// Catalog definition file could not be read
    #[error("Failed to read catalog definition: {0}")]
    Io(#[from] std::io::Error),
}

impl CatalogError {
    /// Check if the error comes from the definition source rather than its structure
    pub fn is_source_error(&self) -> bool {
        matches!(self, CatalogError::Definition(_) | CatalogError::Io(_))
    }
}

/// Result type alias for catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CatalogError::UnknownParent {
            category: "csv".to_string(),
            parent: "export".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unknown parent category 'export' for category 'csv'"
        );
        assert!(!err.is_source_error());
    }

    #[test]
    fn test_source_errors() {
        let yaml_err = serde_yaml::from_str::<u32>("not a number").unwrap_err();
        assert!(CatalogError::from(yaml_err).is_source_error());
        assert!(!CatalogError::DuplicateCategory("x".to_string()).is_source_error());
    }
}
