/*
[INPUT]:  Task manager folder changes and wizard selection transitions
[OUTPUT]: Event payloads broadcast to subscribers
[POS]:    Notification layer - fire-and-forget event types
[UPDATE]: When new notifications are published
*/

/// Emitted by the task manager when folder membership changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderEvent {
    /// A task left `from` (if any) and joined `to` (if any)
    TaskMoved {
        task_id: String,
        from: Option<String>,
        to: Option<String>,
    },

    /// A new, empty folder was created
    FolderCreated(String),
}

/// Emitted by the task wizard on selection transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardEvent {
    /// A category was picked and the task type cleared
    CategorySelected(String),

    /// A task type was picked (category id, task type id)
    TaskTypeSelected(String, String),

    /// The task type of the edited record changed and its properties were reset
    PropertiesReset(String),
}
