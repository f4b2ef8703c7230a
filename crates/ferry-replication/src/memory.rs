//! In-memory store implementations.
//!
//! Used by tests and by embedders that keep state elsewhere and only need
//! the control plane's bookkeeping for the lifetime of the process.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use tracing::debug;

use ferry_core::model::Registry;
use ferry_core::{Error, Policy, Result};

use crate::execution::{
    Execution, ExecutionId, ExecutionStatus, JobSpec, Task, TaskId, TaskMetadata, TriggerSource,
};
use crate::store::{ExecutionManager, PolicyStore, RegistryStore};

#[derive(Default)]
struct ExecutionTables {
    executions: BTreeMap<ExecutionId, Execution>,
    tasks: Vec<Task>,
    next_execution_id: ExecutionId,
    next_task_id: TaskId,
}

/// Execution manager keeping everything in process memory.
#[derive(Default)]
pub struct InMemoryExecutionManager {
    tables: RwLock<ExecutionTables>,
}

impl InMemoryExecutionManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the tasks of an execution in creation order.
    #[must_use]
    pub fn tasks(&self, execution_id: ExecutionId) -> Vec<Task> {
        self.tables
            .read()
            .tasks
            .iter()
            .filter(|t| t.execution_id == execution_id)
            .cloned()
            .collect()
    }

    /// Returns every execution.
    #[must_use]
    pub fn executions(&self) -> Vec<Execution> {
        self.tables.read().executions.values().cloned().collect()
    }

    fn finish(&self, id: ExecutionId, status: ExecutionStatus, message: &str) -> Result<()> {
        let mut tables = self.tables.write();
        let execution = tables
            .executions
            .get_mut(&id)
            .ok_or_else(|| Error::not_found(format!("execution {id}")))?;
        if execution.status.is_terminal() {
            debug!(execution_id = id, status = %execution.status, "execution already finished");
            return Ok(());
        }
        execution.status = status;
        execution.status_message = message.to_string();
        execution.end_time = Some(Utc::now());
        Ok(())
    }
}

#[async_trait]
impl ExecutionManager for InMemoryExecutionManager {
    async fn create_execution(
        &self,
        policy_id: i64,
        trigger: TriggerSource,
    ) -> Result<ExecutionId> {
        let mut tables = self.tables.write();
        tables.next_execution_id += 1;
        let id = tables.next_execution_id;
        tables.executions.insert(
            id,
            Execution {
                id,
                policy_id,
                status: ExecutionStatus::Running,
                status_message: String::new(),
                trigger,
                start_time: Utc::now(),
                end_time: None,
            },
        );
        Ok(id)
    }

    async fn get_execution(&self, id: ExecutionId) -> Result<Option<Execution>> {
        Ok(self.tables.read().executions.get(&id).cloned())
    }

    async fn list_executions(&self, policy_id: i64) -> Result<Vec<Execution>> {
        Ok(self
            .tables
            .read()
            .executions
            .values()
            .filter(|e| e.policy_id == policy_id)
            .cloned()
            .collect())
    }

    async fn mark_done(&self, id: ExecutionId, message: &str) -> Result<()> {
        self.finish(id, ExecutionStatus::Succeeded, message)
    }

    async fn mark_error(&self, id: ExecutionId, message: &str) -> Result<()> {
        self.finish(id, ExecutionStatus::Failed, message)
    }

    async fn stop(&self, id: ExecutionId) -> Result<()> {
        self.finish(id, ExecutionStatus::Stopped, "")
    }

    async fn create_task(
        &self,
        execution_id: ExecutionId,
        job: JobSpec,
        metadata: TaskMetadata,
    ) -> Result<TaskId> {
        let mut tables = self.tables.write();
        if !tables.executions.contains_key(&execution_id) {
            return Err(Error::not_found(format!("execution {execution_id}")));
        }
        tables.next_task_id += 1;
        let id = tables.next_task_id;
        tables.tasks.push(Task {
            id,
            execution_id,
            job,
            metadata,
            creation_time: Utc::now(),
        });
        Ok(id)
    }
}

#[derive(Default)]
struct PolicyTable {
    policies: BTreeMap<i64, Policy>,
    next_id: i64,
}

/// Policy store keeping everything in process memory.
#[derive(Default)]
pub struct InMemoryPolicyStore {
    table: RwLock<PolicyTable>,
}

impl InMemoryPolicyStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
    async fn create(&self, policy: &Policy) -> Result<i64> {
        let mut table = self.table.write();
        table.next_id += 1;
        let id = table.next_id;
        let now = Utc::now();
        let mut stored = policy.clone();
        stored.id = id;
        stored.creation_time = Some(now);
        stored.update_time = Some(now);
        table.policies.insert(id, stored);
        Ok(id)
    }

    async fn get(&self, id: i64) -> Result<Option<Policy>> {
        Ok(self.table.read().policies.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Policy>> {
        Ok(self.table.read().policies.values().cloned().collect())
    }

    async fn update(&self, policy: &Policy) -> Result<()> {
        let mut table = self.table.write();
        let stored = table
            .policies
            .get_mut(&policy.id)
            .ok_or_else(|| Error::not_found(format!("policy {}", policy.id)))?;
        let creation_time = stored.creation_time;
        *stored = policy.clone();
        stored.creation_time = creation_time;
        stored.update_time = Some(Utc::now());
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.table
            .write()
            .policies
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("policy {id}")))
    }
}

/// Registry store backed by a map.
#[derive(Default)]
pub struct InMemoryRegistryStore {
    registries: RwLock<HashMap<i64, Registry>>,
}

impl InMemoryRegistryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a registry record.
    pub fn insert(&self, registry: Registry) {
        self.registries.write().insert(registry.id, registry);
    }
}

#[async_trait]
impl RegistryStore for InMemoryRegistryStore {
    async fn get(&self, id: i64) -> Result<Option<Registry>> {
        Ok(self.registries.read().get(&id).cloned())
    }
}
