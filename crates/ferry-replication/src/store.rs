//! Boundaries to the stores the control plane does not own.
//!
//! Executions and tasks belong to the task manager, policies and registry
//! records to their own persistence layers. The control plane reaches them
//! only through these traits and never caches what they return across
//! operations.

use async_trait::async_trait;

use ferry_core::model::Registry;
use ferry_core::{Policy, Result};

use crate::execution::{Execution, ExecutionId, JobSpec, TaskId, TaskMetadata, TriggerSource};

/// Execution and task bookkeeping.
#[async_trait]
pub trait ExecutionManager: Send + Sync {
    /// Opens a running execution for a policy.
    async fn create_execution(&self, policy_id: i64, trigger: TriggerSource)
        -> Result<ExecutionId>;

    /// Returns an execution, or `None` if it does not exist.
    async fn get_execution(&self, id: ExecutionId) -> Result<Option<Execution>>;

    /// Lists the executions of a policy.
    async fn list_executions(&self, policy_id: i64) -> Result<Vec<Execution>>;

    /// Finishes an execution that produced no work, recording why.
    async fn mark_done(&self, id: ExecutionId, message: &str) -> Result<()>;

    /// Fails an execution, recording the error.
    async fn mark_error(&self, id: ExecutionId, message: &str) -> Result<()>;

    /// Stops an execution.
    async fn stop(&self, id: ExecutionId) -> Result<()>;

    /// Records a task under an execution.
    async fn create_task(
        &self,
        execution_id: ExecutionId,
        job: JobSpec,
        metadata: TaskMetadata,
    ) -> Result<TaskId>;
}

/// Policy persistence.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Persists a new policy and returns its id.
    async fn create(&self, policy: &Policy) -> Result<i64>;

    /// Returns a policy, or `None` if it does not exist.
    async fn get(&self, id: i64) -> Result<Option<Policy>>;

    /// Lists every policy.
    async fn list(&self) -> Result<Vec<Policy>>;

    /// Replaces a stored policy.
    async fn update(&self, policy: &Policy) -> Result<()>;

    /// Deletes a policy.
    async fn delete(&self, id: i64) -> Result<()>;
}

/// Registry record lookup.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Returns a registry record, or `None` if it does not exist.
    async fn get(&self, id: i64) -> Result<Option<Registry>>;
}
