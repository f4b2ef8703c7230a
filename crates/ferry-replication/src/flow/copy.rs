use tracing::info;

use ferry_core::model::Resource;
use ferry_core::Result;

use super::stage;
use super::FlowContext;
use crate::execution::Operation;

/// Copies `resources`, or everything the policy selects at the source when
/// none are given. Returns the number of tasks created.
pub(super) async fn run(ctx: &FlowContext<'_>, resources: Option<Vec<Resource>>) -> Result<usize> {
    let source = stage::init_adapter(ctx, ctx.policy.src_registry.as_ref(), "source")?;
    let destination = stage::init_adapter(ctx, ctx.policy.dest_registry.as_ref(), "destination")?;

    let resources = match resources {
        Some(resources) => resources,
        None => stage::fetch_resources(source.as_ref(), &ctx.policy.filters).await?,
    };

    if stage::is_execution_stopped(ctx).await? {
        info!(execution_id = ctx.execution_id, "execution stopped, no tasks created");
        return Ok(0);
    }

    if resources.is_empty() {
        stage::mark_nothing_to_do(ctx).await?;
        return Ok(0);
    }

    let sources = stage::assemble_source_resources(resources, ctx.policy);
    let destinations =
        stage::assemble_destination_resources(&sources, ctx.policy, destination.as_ref()).await?;
    stage::prepare_for_push(destination.as_ref(), &destinations).await?;

    let created =
        stage::create_tasks(ctx, &sources, &destinations, |_| Operation::Copy, true).await?;
    if created == 0 {
        stage::mark_nothing_to_do(ctx).await?;
    }
    Ok(created)
}
