//! End-to-end tests of the replication control plane with stub adapters and
//! the in-memory stores.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use ferry_adapter::{
    Adapter, AdapterError, ArtifactRegistry, Descriptor, FactoryRegistry, HealthStatus,
    RegistryInfo,
};
use ferry_core::filter::Filter;
use ferry_core::model::{Artifact, Registry, RegistryType, Resource, ResourceType};
use ferry_core::{apply_filters, Error, ErrorKind, Policy, Trigger};
use ferry_replication::{
    CronScheduler, Event, EventHandler, EventType, ExecutionManager, ExecutionStatus,
    InMemoryExecutionManager, InMemoryPolicyStore, InMemoryRegistryStore, Operation, PolicyStore,
    ReplicationConfig, ReplicationController, TriggerSource, NO_RESOURCES_MESSAGE,
};

const REMOTE_ID: i64 = 1;

/// Shared behaviour of every stub adapter built by the test factories.
#[derive(Default)]
struct Fixture {
    source_resources: Mutex<Vec<Resource>>,
    prepared: Mutex<Vec<Resource>>,
    fetch_delay: Mutex<Option<Duration>>,
    fail_prepare: AtomicBool,
}

struct StubAdapter {
    registry_type: RegistryType,
    fixture: Arc<Fixture>,
}

#[async_trait]
impl Adapter for StubAdapter {
    async fn describe(&self) -> ferry_core::Result<RegistryInfo> {
        Ok(RegistryInfo::new(
            self.registry_type.clone(),
            vec![ResourceType::Image],
        ))
    }

    async fn prepare_for_push(&self, resources: &[Resource]) -> ferry_core::Result<()> {
        if self.fixture.fail_prepare.load(Ordering::SeqCst) {
            return Err(Error::upstream("destination refused the namespace"));
        }
        self.fixture.prepared.lock().extend_from_slice(resources);
        Ok(())
    }

    async fn health_check(&self) -> ferry_core::Result<HealthStatus> {
        Ok(HealthStatus::Healthy)
    }

    fn as_artifact_registry(&self) -> Option<&dyn ArtifactRegistry> {
        Some(self)
    }
}

#[async_trait]
impl ArtifactRegistry for StubAdapter {
    async fn fetch_artifacts(&self, filters: &[Filter]) -> ferry_core::Result<Vec<Resource>> {
        let delay = *self.fixture.fetch_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let resources = self.fixture.source_resources.lock().clone();
        apply_filters(resources, filters)
    }

    async fn manifest_exists(
        &self,
        _repository: &str,
        _reference: &str,
    ) -> ferry_core::Result<(bool, Option<Descriptor>)> {
        Ok((false, None))
    }

    async fn delete_manifest(&self, _repository: &str, _reference: &str) -> ferry_core::Result<()> {
        Ok(())
    }
}

struct Harness {
    controller: Arc<ReplicationController>,
    executions: Arc<InMemoryExecutionManager>,
    policies: Arc<InMemoryPolicyStore>,
    fixture: Arc<Fixture>,
}

impl Harness {
    fn new() -> Self {
        let fixture = Arc::new(Fixture::default());

        let mut builder = FactoryRegistry::builder();
        for registry_type in [RegistryType::HARBOR, "stub"] {
            let fixture = Arc::clone(&fixture);
            builder
                .register(
                    registry_type,
                    move |registry: &Registry| -> Result<Box<dyn Adapter>, AdapterError> {
                        Ok(Box::new(StubAdapter {
                            registry_type: registry.registry_type.clone(),
                            fixture: Arc::clone(&fixture),
                        }))
                    },
                )
                .unwrap();
        }

        let registries = InMemoryRegistryStore::new();
        registries.insert(Registry::new(REMOTE_ID, "remote", "stub", "https://remote.local"));

        let executions = Arc::new(InMemoryExecutionManager::new());
        let policies = Arc::new(InMemoryPolicyStore::new());
        let controller = ReplicationController::new(
            ReplicationConfig::default(),
            builder.build(),
            Arc::clone(&executions) as Arc<dyn ExecutionManager>,
            Arc::clone(&policies) as Arc<dyn PolicyStore>,
            Arc::new(registries),
            Arc::new(CronScheduler::default()),
        );

        Self {
            controller,
            executions,
            policies,
            fixture,
        }
    }

    fn event_handler(&self) -> EventHandler {
        EventHandler::new(
            Arc::clone(&self.policies) as Arc<dyn PolicyStore>,
            Arc::clone(&self.controller),
        )
    }

    fn set_source(&self, resources: Vec<Resource>) {
        *self.fixture.source_resources.lock() = resources;
    }

    fn status(&self, execution_id: i64) -> (ExecutionStatus, String) {
        let execution = self
            .executions
            .executions()
            .into_iter()
            .find(|e| e.id == execution_id)
            .unwrap();
        (execution.status, execution.status_message)
    }
}

fn image(repository: &str, tags: &[&str]) -> Resource {
    Resource::new(ResourceType::Image, repository).with_artifact(
        Artifact::new(format!("sha256:{}", repository.replace('/', "-")))
            .with_tags(tags.iter().copied()),
    )
}

/// Local source, remote destination, manual trigger.
fn push_policy(name: &str) -> Policy {
    Policy::new(name)
        .with_destination(Registry::reference(REMOTE_ID))
        .with_trigger(Trigger::manual())
}

fn event_policy(name: &str) -> Policy {
    push_policy(name).with_trigger(Trigger::event_based())
}

async fn store_event_policies(harness: &Harness) {
    let policies = [
        event_policy("filter-mismatch").with_filter(Filter::name("library/busybox")),
        Policy {
            trigger: None,
            ..event_policy("no-trigger")
        },
        event_policy("deletion-disabled").with_filter(Filter::name("library/**")),
        event_policy("deletion-enabled")
            .with_filter(Filter::name("library/**"))
            .with_deletion(true)
            .with_namespace("mirror", -1),
        event_policy("disabled").with_enabled(false),
        Policy::new("source-not-local")
            .with_source(Registry::reference(REMOTE_ID))
            .with_trigger(Trigger::event_based()),
    ];
    for policy in &policies {
        harness.policies.create(policy).await.unwrap();
    }
}

async fn selected_names(handler: &EventHandler, event: &Event) -> Vec<String> {
    let mut names: Vec<String> = handler
        .select_policies(event)
        .await
        .unwrap()
        .into_iter()
        .map(|(policy, _)| policy.name)
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_event_selects_matching_policies() {
    let harness = Harness::new();
    store_event_policies(&harness).await;
    let handler = harness.event_handler();

    let push = Event::new(
        EventType::ArtifactPush,
        image("library/hello-world", &["latest"]),
    );
    assert_eq!(
        selected_names(&handler, &push).await,
        vec!["deletion-disabled", "deletion-enabled"]
    );

    let delete = Event::new(
        EventType::ArtifactDelete,
        image("library/hello-world", &["latest"]),
    );
    assert_eq!(selected_names(&handler, &delete).await, vec!["deletion-enabled"]);
}

#[tokio::test]
async fn test_event_starts_one_execution_per_policy() {
    let harness = Harness::new();
    store_event_policies(&harness).await;
    let handler = harness.event_handler();

    let push = Event::new(
        EventType::ArtifactPush,
        image("library/hello-world", &["latest"]),
    );
    let executions = handler.handle(&push).await.unwrap();
    assert_eq!(executions.len(), 2);

    let mut destinations: Vec<String> = executions
        .iter()
        .flat_map(|id| harness.executions.tasks(*id))
        .map(|task| {
            assert_eq!(task.metadata.operation, Operation::Copy);
            task.metadata.destination_resource
        })
        .collect();
    destinations.sort();
    assert_eq!(
        destinations,
        vec![
            "library/hello-world [1 item(s) in total]",
            "mirror/hello-world [1 item(s) in total]",
        ]
    );

    for id in executions {
        let execution = harness.executions.get_execution(id).await.unwrap().unwrap();
        assert_eq!(execution.trigger, TriggerSource::EventBased);
    }
}

#[tokio::test]
async fn test_empty_event_is_rejected() {
    let harness = Harness::new();
    store_event_policies(&harness).await;
    let handler = harness.event_handler();

    let event = Event::new(
        EventType::ArtifactPush,
        Resource::new(ResourceType::Image, "library/hello-world"),
    );
    let err = handler.handle(&event).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(harness.executions.executions().is_empty());
}

#[tokio::test]
async fn test_copy_flow_skips_flagged_resources() {
    let harness = Harness::new();
    let mut skipped = image("library/proxy", &["v1"]);
    skipped.skip = true;
    harness.set_source(vec![image("library/hello", &["v1", "v2"]), skipped]);

    let policy = push_policy("copy").with_namespace("mirror", 0).with_speed(512);
    let id = harness
        .controller
        .start(&policy, None, TriggerSource::Manual)
        .await
        .unwrap();

    let tasks = harness.executions.tasks(id);
    assert_eq!(tasks.len(), 1);
    let task = &tasks[0];
    assert_eq!(task.metadata.operation, Operation::Copy);
    assert_eq!(task.metadata.source_resource, "library/hello [2 item(s) in total]");
    assert_eq!(
        task.metadata.destination_resource,
        "mirror/library/hello [2 item(s) in total]"
    );
    assert_eq!(task.job.parameters.speed, 512);

    let destination: Resource = serde_json::from_str(&task.job.parameters.dst_resource).unwrap();
    assert_eq!(destination.registry.unwrap().id, REMOTE_ID);
    let source: Resource = serde_json::from_str(&task.job.parameters.src_resource).unwrap();
    assert!(source.registry.unwrap().is_local());

    // Both resources were prepared; only the unflagged one became a task.
    assert_eq!(harness.fixture.prepared.lock().len(), 2);
    assert_eq!(harness.status(id).0, ExecutionStatus::Running);
}

#[tokio::test]
async fn test_copy_flow_without_candidates_marks_done() {
    let harness = Harness::new();
    harness.set_source(Vec::new());

    let id = harness
        .controller
        .start(&push_policy("empty"), None, TriggerSource::Manual)
        .await
        .unwrap();

    assert!(harness.executions.tasks(id).is_empty());
    assert_eq!(
        harness.status(id),
        (ExecutionStatus::Succeeded, NO_RESOURCES_MESSAGE.to_string())
    );
}

#[tokio::test]
async fn test_copy_flow_applies_policy_filters() {
    let harness = Harness::new();
    harness.set_source(vec![
        image("library/hello", &["v1", "dev"]),
        image("team/api", &["v1"]),
    ]);

    let policy = push_policy("filtered")
        .with_filter(Filter::name("library/*"))
        .with_filter(Filter::tag("v*"));
    let id = harness
        .controller
        .start(&policy, None, TriggerSource::Manual)
        .await
        .unwrap();

    let tasks = harness.executions.tasks(id);
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].metadata.references, "v1");
}

#[tokio::test]
async fn test_deletion_flow_for_tag_delete() {
    let harness = Harness::new();
    let mut resource = image("library/hello", &["old"]).deleted();
    resource.is_delete_tag = true;

    let policy = push_policy("mirror-deletes").with_deletion(true);
    let id = harness
        .controller
        .start(&policy, Some(resource), TriggerSource::EventBased)
        .await
        .unwrap();

    let tasks = harness.executions.tasks(id);
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].metadata.operation, Operation::TagDeletion);
    assert!(harness.fixture.prepared.lock().is_empty());
}

#[tokio::test]
async fn test_start_preconditions() {
    let harness = Harness::new();

    let err = harness
        .controller
        .start(&push_policy("off").with_enabled(false), None, TriggerSource::Manual)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Precondition);

    let dangling = Policy::new("dangling")
        .with_destination(Registry::reference(42))
        .with_trigger(Trigger::manual());
    let err = harness
        .controller
        .start(&dangling, None, TriggerSource::Manual)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    assert!(harness.executions.executions().is_empty());
}

#[tokio::test]
async fn test_flow_error_is_returned_and_execution_left_running() {
    let harness = Harness::new();
    harness.set_source(vec![image("library/hello", &["v1"])]);
    harness.fixture.fail_prepare.store(true, Ordering::SeqCst);

    let err = harness
        .controller
        .start(&push_policy("refused"), None, TriggerSource::Manual)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Upstream);

    let executions = harness.executions.executions();
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].status, ExecutionStatus::Running);
}

#[tokio::test]
async fn test_background_flow_error_marks_execution_failed() {
    let harness = Harness::new();
    harness.set_source(vec![image("library/hello", &["v1"])]);
    harness.fixture.fail_prepare.store(true, Ordering::SeqCst);

    let id = harness
        .controller
        .start_in_background(&push_policy("refused"), None, TriggerSource::Manual)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let (status, message) = harness.status(id);
    assert_eq!(status, ExecutionStatus::Failed);
    assert!(message.contains("destination refused the namespace"));
}

#[tokio::test]
async fn test_stopped_execution_emits_no_tasks() {
    let harness = Harness::new();
    harness.set_source(vec![image("library/hello", &["v1"])]);
    *harness.fixture.fetch_delay.lock() = Some(Duration::from_millis(50));

    let id = harness
        .controller
        .start_in_background(&push_policy("stoppable"), None, TriggerSource::Manual)
        .await
        .unwrap();
    harness.controller.stop(id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(harness.executions.tasks(id).is_empty());
    assert_eq!(harness.status(id).0, ExecutionStatus::Stopped);

    let err = harness.controller.stop(999).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_dropping_the_start_future_cancels_the_flow() {
    let harness = Harness::new();
    harness.set_source(vec![image("library/hello", &["v1"])]);
    *harness.fixture.fetch_delay.lock() = Some(Duration::from_secs(30));

    let policy_id = harness
        .controller
        .create_policy(push_policy("slow"))
        .await
        .unwrap();
    let started = tokio::time::timeout(
        Duration::from_millis(50),
        harness
            .controller
            .start_by_id(policy_id, TriggerSource::Manual),
    )
    .await;
    assert!(started.is_err());

    let executions = harness.executions.executions();
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].status, ExecutionStatus::Running);
    assert!(harness.executions.tasks(executions[0].id).is_empty());

    // An unfinished execution blocks deletion.
    let err = harness.controller.delete_policy(policy_id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Precondition);
}

#[tokio::test]
async fn test_policy_lifecycle_arms_schedules() {
    let harness = Harness::new();

    let invalid = Policy::new("nightly").with_trigger(Trigger::scheduled("0 0 2 * * *"));
    let err = harness.controller.create_policy(invalid).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);

    let policy = push_policy("nightly").with_trigger(Trigger::scheduled("0 0 2 * * *"));
    let id = harness.controller.create_policy(policy).await.unwrap();
    assert_eq!(harness.controller.triggers().scheduled_policies(), vec![id]);

    let mut stored = harness.controller.get_policy(id).await.unwrap();
    stored.trigger = Some(Trigger::manual());
    harness.controller.update_policy(stored).await.unwrap();
    assert!(harness.controller.triggers().scheduled_policies().is_empty());

    harness.controller.delete_policy(id).await.unwrap();
    assert_eq!(
        harness.controller.get_policy(id).await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert!(harness.controller.list_policies().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unadvertised_resource_type_is_unsupported() {
    let harness = Harness::new();
    harness.set_source(vec![image("library/hello", &["v1"])]);

    let policy = push_policy("charts").with_filter(Filter::resource(ResourceType::Chart));
    let err = harness
        .controller
        .start(&policy, None, TriggerSource::Manual)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);
}
