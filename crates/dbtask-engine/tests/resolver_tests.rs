/*
[INPUT]:  Task settings with and without persisted target ids
[OUTPUT]: Target resolution, fallback scan and cancellation verification
[POS]:    Integration test layer - target binding of task settings
[UPDATE]: When resolution order or error propagation changes
*/

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dbtask_engine::resolver::PG_SCRIPT_DATABASE_KEY;
use dbtask_engine::{
    InMemoryDataSources,
    InMemoryObjectIndex,
    LoadOutcome,
    LookupError,
    ObjectIndex,
    ResolveError,
    SettingsStore,
    TargetBinding,
    TargetResolver,
};
use dbtask_model::{BoundObject, TaskProperties};
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;

use common::{database, objects_project, postgres, project_with, schema};

/// Object index that counts id lookups
#[derive(Default)]
struct CountingIndex {
    objects: Vec<BoundObject>,
    lookups: Arc<AtomicUsize>,
}

#[async_trait]
impl ObjectIndex for CountingIndex {
    async fn find_object_by_id(&self, id: &str) -> Result<Option<BoundObject>, LookupError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.objects.iter().find(|o| o.id == id).cloned())
    }

    fn top_level_objects(&self) -> Vec<BoundObject> {
        self.objects.clone()
    }
}

fn stored(id: &str) -> TaskProperties {
    let mut properties = TaskProperties::new();
    properties.set_value(PG_SCRIPT_DATABASE_KEY, id);
    properties
}

#[tokio::test]
async fn test_scan_without_persisted_id_skips_lookup() {
    let lookups = Arc::new(AtomicUsize::new(0));
    let index = CountingIndex {
        objects: vec![schema("public"), database("postgres")],
        lookups: lookups.clone(),
    };
    let project = dbtask_engine::Project::new(
        common::PROJECT,
        Arc::new(dbtask_engine::TaskManager::new(common::PROJECT)),
        Arc::new(InMemoryDataSources::loaded(vec![postgres()])),
        Arc::new(index),
    );

    let outcome = TargetResolver::pg_script_database()
        .load(&project, &TaskProperties::new(), &CancellationToken::new())
        .await;
    assert_eq!(assert_ok!(outcome), LoadOutcome::Resolved(database("postgres")));
    assert_eq!(lookups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_no_eligible_object_is_fatal() {
    let project = objects_project(vec![schema("public")]);
    let err = TargetResolver::pg_script_database()
        .load(&project, &TaskProperties::new(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err, ResolveError::NoTargetFound);
    assert!(err.is_fatal());
    assert_eq!(err.to_string(), "no target found for this configuration");
}

#[tokio::test]
async fn test_persisted_id_resolves() {
    let project = objects_project(vec![database("postgres"), database("reports")]);
    let mut binding = TargetBinding::new(TargetResolver::pg_script_database());
    let target = binding
        .load_settings(&project, &stored("ds1/reports"), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(target, Some(&database("reports")));
}

#[tokio::test]
async fn test_persisted_missing_id_is_target_not_found() {
    let project = objects_project(vec![database("postgres")]);
    let mut binding = TargetBinding::new(TargetResolver::pg_script_database());
    let err = binding
        .load_settings(&project, &stored("ds1/dropped"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ResolveError::TargetNotFound {
            id: "ds1/dropped".to_string()
        }
    );
    assert!(err.is_fatal());
    assert!(binding.target().is_none());
}

#[tokio::test]
async fn test_lookup_failure_propagates() {
    let project = objects_project(vec![database("postgres")]);
    let err = TargetResolver::pg_script_database()
        .load(&project, &stored("   "), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::Lookup(LookupError::MalformedId(_))));
    assert!(!err.is_fatal());
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_lookup_leaves_binding_unchanged() {
    let project = project_with(
        InMemoryDataSources::loaded(vec![postgres()]),
        InMemoryObjectIndex::new(vec![database("postgres"), database("reports")])
            .with_lookup_delay(Duration::from_secs(5)),
    );
    let properties = stored("ds1/reports");
    let mut binding = TargetBinding::new(TargetResolver::pg_script_database());
    binding.set_target(Some(database("postgres")));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let target = assert_ok!(binding.load_settings(&project, &properties, &cancel).await);
    assert_eq!(target, Some(&database("postgres")));
    assert_eq!(properties.get_str(PG_SCRIPT_DATABASE_KEY), Some("ds1/reports"));
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let project = objects_project(vec![database("postgres")]);
    let cancel = CancellationToken::new();
    cancel.cancel();
    let outcome = TargetResolver::pg_script_database()
        .load(&project, &stored("ds1/postgres"), &cancel)
        .await;
    assert_eq!(assert_ok!(outcome), LoadOutcome::Cancelled);
}

#[tokio::test]
async fn test_save_settings_round_trip_through_record() {
    let project = objects_project(vec![schema("public"), database("postgres")]);
    let manager = project.task_manager().clone();
    let record = assert_ok!(
        manager
            .create_task(dbtask_engine::NewTask {
                task_type: "pgScriptExecute".to_string(),
                name: "Refresh views".to_string(),
                ..Default::default()
            })
            .await
    );

    let mut properties = record.properties().clone();
    let mut binding = TargetBinding::new(TargetResolver::pg_script_database());
    binding.save_settings(&project, &mut properties);
    assert_eq!(binding.target(), Some(&database("postgres")));

    let updated = assert_ok!(
        manager
            .update_task(record.id(), move |task| task.set_properties(properties))
            .await
    );
    assert_eq!(updated.properties().get_str(PG_SCRIPT_DATABASE_KEY), Some("ds1/postgres"));

    let mut reloaded = TargetBinding::new(TargetResolver::pg_script_database());
    let target = assert_ok!(
        reloaded
            .load_settings(&project, updated.properties(), &CancellationToken::new())
            .await
    );
    assert_eq!(target, Some(&database("postgres")));
}
