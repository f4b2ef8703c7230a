//! Steps shared by the copy and deletion flows.

use serde_json::Value;
use tracing::{debug, info};

use ferry_adapter::{fetch_resources as fetch_of_type, Adapter};
use ferry_core::filter::{resource_types_in, Filter, FilterType};
use ferry_core::model::{Registry, Resource};
use ferry_core::rewrite::replace_namespace;
use ferry_core::{Error, Policy, Result};

use super::FlowContext;
use crate::execution::{ExecutionStatus, JobSpec, Operation, TaskMetadata};

/// Status message of an execution that found nothing to do.
pub const NO_RESOURCES_MESSAGE: &str = "no resources need to be replicated";

pub(super) fn init_adapter(
    ctx: &FlowContext<'_>,
    registry: Option<&Registry>,
    role: &str,
) -> Result<Box<dyn Adapter>> {
    let registry = registry.ok_or_else(|| {
        Error::internal(format!(
            "the {role} registry of policy {} is not resolved",
            ctx.policy.id
        ))
    })?;
    let adapter = ctx.factories.create(registry)?;
    debug!(execution_id = ctx.execution_id, role, url = %registry.url, "adapter created");
    Ok(adapter)
}

/// Fetches candidates from the source.
///
/// Resource filters pick the fetch capability; without one, every type the
/// source advertises is fetched. A filtered type the source does not
/// advertise is [`Error::Unsupported`]. Image and artifact share one capability and
/// are fetched once.
pub(super) async fn fetch_resources(
    adapter: &dyn Adapter,
    filters: &[Filter],
) -> Result<Vec<Resource>> {
    let info = adapter.describe().await?;
    let mut types = resource_types_in(filters);
    if types.is_empty() {
        types.clone_from(&info.supported_resource_types);
    }
    if let Some(unsupported) = types.iter().find(|t| !info.supports_resource_type(**t)) {
        return Err(Error::unsupported(format!(
            "the source registry does not support {unsupported} resources"
        )));
    }

    let passthrough: Vec<Filter> = filters
        .iter()
        .filter(|f| !matches!(f.filter_type, FilterType::Resource))
        .cloned()
        .collect();

    let mut resources = Vec::new();
    let (mut artifacts_done, mut charts_done) = (false, false);
    for resource_type in types {
        let done = if resource_type.is_artifact_like() {
            &mut artifacts_done
        } else {
            &mut charts_done
        };
        if *done {
            continue;
        }
        *done = true;

        let batch = fetch_of_type(adapter, resource_type, &passthrough).await?;
        debug!(%resource_type, count = batch.len(), "fetched resources");
        resources.extend(batch);
    }
    Ok(resources)
}

pub(super) async fn is_execution_stopped(ctx: &FlowContext<'_>) -> Result<bool> {
    let execution = ctx
        .executions
        .get_execution(ctx.execution_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("execution {}", ctx.execution_id)))?;
    Ok(execution.status == ExecutionStatus::Stopped)
}

pub(super) async fn mark_nothing_to_do(ctx: &FlowContext<'_>) -> Result<()> {
    info!(execution_id = ctx.execution_id, "{NO_RESOURCES_MESSAGE}");
    ctx.executions
        .mark_done(ctx.execution_id, NO_RESOURCES_MESSAGE)
        .await
}

pub(super) fn assemble_source_resources(
    mut resources: Vec<Resource>,
    policy: &Policy,
) -> Vec<Resource> {
    for resource in &mut resources {
        resource.registry.clone_from(&policy.src_registry);
    }
    resources
}

/// Maps each source resource to its destination counterpart, index for
/// index, under the destination's path constraint.
pub(super) async fn assemble_destination_resources(
    sources: &[Resource],
    policy: &Policy,
    destination: &dyn Adapter,
) -> Result<Vec<Resource>> {
    let path_type = destination
        .describe()
        .await?
        .supported_repository_path_component_type;

    sources
        .iter()
        .map(|source| {
            let name = source.repository_name().ok_or_else(|| {
                Error::bad_request("cannot replicate a resource without a repository")
            })?;
            let rewritten = replace_namespace(
                name,
                &policy.dest_namespace,
                policy.dest_namespace_replace_count,
                path_type,
            )?;
            let public = source.repository().is_some_and(|r| r.is_public());

            let mut resource = source.clone();
            resource.registry.clone_from(&policy.dest_registry);
            resource.override_existing = policy.override_existing;
            if let Some(repository) = resource
                .metadata
                .as_mut()
                .and_then(|m| m.repository.as_mut())
            {
                repository.name = rewritten;
                repository
                    .metadata
                    .insert("public".to_string(), Value::String(public.to_string()));
            }
            Ok(resource)
        })
        .collect()
}

pub(super) async fn prepare_for_push(adapter: &dyn Adapter, resources: &[Resource]) -> Result<()> {
    adapter.prepare_for_push(resources).await?;
    debug!(count = resources.len(), "destination prepared");
    Ok(())
}

/// Emits one task per resource pair in order and returns how many were
/// created. With `honor_skip`, pairs whose destination is flagged `skip`
/// are passed over.
pub(super) async fn create_tasks(
    ctx: &FlowContext<'_>,
    sources: &[Resource],
    destinations: &[Resource],
    operation: impl Fn(&Resource) -> Operation,
    honor_skip: bool,
) -> Result<usize> {
    let mut created = 0;
    for (source, destination) in sources.iter().zip(destinations) {
        if honor_skip && destination.skip {
            info!(
                execution_id = ctx.execution_id,
                repository = destination.repository_name().unwrap_or_default(),
                "skipping resource the destination cannot receive"
            );
            continue;
        }

        let operation = operation(destination);
        let job = JobSpec::replication(
            source,
            destination,
            ctx.policy.speed_hint(),
            ctx.policy.copy_by_chunk,
        )?;
        let metadata = TaskMetadata::new(operation, source, destination);
        let task_id = ctx
            .executions
            .create_task(ctx.execution_id, job, metadata)
            .await?;
        created += 1;
        debug!(execution_id = ctx.execution_id, task_id, %operation, "task created");
    }
    Ok(created)
}
