//! Per-execution replication flows.
//!
//! A started execution runs exactly one flow. A resource marked as deleted
//! at the source selects the deletion flow; anything else, including a run
//! without a resource, selects the copy flow. Both emit one task per
//! `(source, destination)` pair in source order.

mod copy;
mod deletion;
mod stage;

use std::sync::Arc;

use tracing::info;

use ferry_adapter::FactoryRegistry;
use ferry_core::model::Resource;
use ferry_core::{Policy, Result};

use crate::execution::ExecutionId;
use crate::store::ExecutionManager;

pub use stage::NO_RESOURCES_MESSAGE;

/// Everything one flow run needs.
struct FlowContext<'a> {
    factories: &'a FactoryRegistry,
    executions: &'a dyn ExecutionManager,
    execution_id: ExecutionId,
    policy: &'a Policy,
}

/// Chooses and runs the flow of an execution.
pub struct FlowController {
    factories: FactoryRegistry,
    executions: Arc<dyn ExecutionManager>,
}

impl FlowController {
    /// Creates a controller building adapters from `factories`.
    pub fn new(factories: FactoryRegistry, executions: Arc<dyn ExecutionManager>) -> Self {
        Self {
            factories,
            executions,
        }
    }

    /// Runs the flow for an open execution.
    ///
    /// `policy` must carry resolved endpoint records. Errors are returned
    /// as they are and leave the execution running; tasks created before
    /// the failure stay in place.
    pub async fn start(
        &self,
        execution_id: ExecutionId,
        policy: &Policy,
        resource: Option<Resource>,
    ) -> Result<()> {
        let ctx = FlowContext {
            factories: &self.factories,
            executions: self.executions.as_ref(),
            execution_id,
            policy,
        };

        let tasks = match resource {
            Some(resource) if resource.deleted => deletion::run(&ctx, vec![resource]).await?,
            resource => copy::run(&ctx, resource.map(|r| vec![r])).await?,
        };

        info!(execution_id, policy_id = policy.id, tasks, "replication flow finished");
        Ok(())
    }
}
