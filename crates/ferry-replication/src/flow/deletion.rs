use ferry_core::model::Resource;
use ferry_core::Result;

use super::stage;
use super::FlowContext;
use crate::execution::Operation;

/// Mirrors source deletions to the destination. Returns the number of tasks
/// created.
pub(super) async fn run(ctx: &FlowContext<'_>, resources: Vec<Resource>) -> Result<usize> {
    let destination = stage::init_adapter(ctx, ctx.policy.dest_registry.as_ref(), "destination")?;

    let sources = stage::assemble_source_resources(resources, ctx.policy);
    let destinations =
        stage::assemble_destination_resources(&sources, ctx.policy, destination.as_ref()).await?;

    stage::create_tasks(ctx, &sources, &destinations, Operation::deletion_for, false).await
}
