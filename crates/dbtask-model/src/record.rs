/*
[INPUT]:  Task definition fields chosen in the task wizard
[OUTPUT]: TaskRecord, TaskFolder and TaskProperties persistence models
[POS]:    Domain layer - mutable task definitions owned by a project
[UPDATE]: When task definition fields or property semantics change
*/

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Ordered property bag of a task, keyed by setting name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskProperties(Map<String, Value>);

impl TaskProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, Value)> for TaskProperties {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A configured task definition.
///
/// Changing the task type discards the property bag because properties
/// are interpreted by the type; every other setter leaves it alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    #[serde(default)]
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    task_type: String,
    #[serde(default)]
    folder: Option<String>,
    #[serde(default, with = "duration_secs")]
    max_execution_time: Duration,
    #[serde(default)]
    properties: TaskProperties,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TaskRecord {
    pub fn new(name: impl Into<String>, task_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            name: name.into(),
            description: String::new(),
            task_type: task_type.into(),
            folder: None,
            max_execution_time: Duration::ZERO,
            properties: TaskProperties::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// True once the record has been assigned an id by its task manager
    pub fn is_saved(&self) -> bool {
        !self.id.is_empty()
    }

    pub fn assign_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.touch();
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
        self.touch();
    }

    pub fn task_type(&self) -> &str {
        &self.task_type
    }

    /// Switch the task type. Returns true when the type actually changed,
    /// in which case the properties were cleared.
    pub fn set_task_type(&mut self, task_type: impl Into<String>) -> bool {
        let task_type = task_type.into();
        if task_type == self.task_type {
            return false;
        }
        self.task_type = task_type;
        self.properties.clear();
        self.touch();
        true
    }

    pub fn folder(&self) -> Option<&str> {
        self.folder.as_deref()
    }

    /// Only updates the record side; folder membership is kept by the task manager
    pub fn set_folder(&mut self, folder: Option<String>) {
        self.folder = folder;
        self.touch();
    }

    /// Zero means unbounded
    pub fn max_execution_time(&self) -> Duration {
        self.max_execution_time
    }

    pub fn set_max_execution_time(&mut self, max_execution_time: Duration) {
        self.max_execution_time = max_execution_time;
        self.touch();
    }

    pub fn properties(&self) -> &TaskProperties {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut TaskProperties {
        &mut self.properties
    }

    pub fn set_properties(&mut self, properties: TaskProperties) {
        self.properties = properties;
        self.touch();
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Named grouping of tasks. Membership only, the folder does not own its tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFolder {
    name: String,
    #[serde(default)]
    tasks: BTreeSet<String>,
}

impl TaskFolder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tasks: BTreeSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_task(&mut self, task_id: impl Into<String>) -> bool {
        self.tasks.insert(task_id.into())
    }

    pub fn remove_task(&mut self, task_id: &str) -> bool {
        self.tasks.remove(task_id)
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.tasks.contains(task_id)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}
