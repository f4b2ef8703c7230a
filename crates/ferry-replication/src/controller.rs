//! Replication controller.
//!
//! Entry point for starting and stopping executions and for managing
//! policies. Starting a policy resolves its endpoints, opens an execution and
//! runs the flow while holding a permit of a bounded worker pool.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{error, info};

use ferry_adapter::FactoryRegistry;
use ferry_core::model::{is_local_endpoint, Registry, Resource, LOCAL_REGISTRY_ID};
use ferry_core::{Error, Policy, Result};

use crate::config::ReplicationConfig;
use crate::execution::{ExecutionId, TriggerSource};
use crate::flow::FlowController;
use crate::store::{ExecutionManager, PolicyStore, RegistryStore};
use crate::trigger::{ScheduleCallback, Scheduler, TriggerManager};

/// Starts executions and manages policies.
pub struct ReplicationController {
    config: ReplicationConfig,
    flow: FlowController,
    executions: Arc<dyn ExecutionManager>,
    policies: Arc<dyn PolicyStore>,
    registries: Arc<dyn RegistryStore>,
    triggers: TriggerManager,
    permits: Semaphore,
}

impl ReplicationController {
    /// Creates a controller.
    ///
    /// Schedules registered through the controller call back into it; the
    /// scheduler only holds a weak reference.
    pub fn new(
        config: ReplicationConfig,
        factories: FactoryRegistry,
        executions: Arc<dyn ExecutionManager>,
        policies: Arc<dyn PolicyStore>,
        registries: Arc<dyn RegistryStore>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<Self>| {
            let callback: Weak<dyn ScheduleCallback> = this.clone();
            Self {
                permits: Semaphore::new(config.max_concurrent_executions.max(1)),
                flow: FlowController::new(factories, Arc::clone(&executions)),
                triggers: TriggerManager::new(scheduler, callback),
                config,
                executions,
                policies,
                registries,
            }
        })
    }

    /// Returns the trigger manager.
    pub const fn triggers(&self) -> &TriggerManager {
        &self.triggers
    }

    /// Starts a policy and runs its flow to completion.
    ///
    /// # Errors
    ///
    /// - [`Error::Precondition`] if the policy is disabled.
    /// - [`Error::NotFound`] if an endpoint registry does not exist; no
    ///   execution is opened.
    /// - Any flow error, returned as is with the execution left running.
    pub async fn start(
        &self,
        policy: &Policy,
        resource: Option<Resource>,
        trigger: TriggerSource,
    ) -> Result<ExecutionId> {
        let (resolved, execution_id) = self.open_execution(policy, trigger).await?;
        let _permit = self.acquire().await?;
        self.flow.start(execution_id, &resolved, resource).await?;
        Ok(execution_id)
    }

    /// Starts a policy and runs its flow on a background task.
    ///
    /// Only opening the execution can fail here; a flow failure marks the
    /// execution as failed.
    ///
    /// # Errors
    ///
    /// Same as opening in [`ReplicationController::start`].
    pub async fn start_in_background(
        self: &Arc<Self>,
        policy: &Policy,
        resource: Option<Resource>,
        trigger: TriggerSource,
    ) -> Result<ExecutionId> {
        let (resolved, execution_id) = self.open_execution(policy, trigger).await?;

        let this = Arc::clone(self);
        tokio::spawn(async move {
            let result = match this.acquire().await {
                Ok(_permit) => this.flow.start(execution_id, &resolved, resource).await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                error!(execution_id, error = %e, "replication flow failed");
                if let Err(mark) = this.executions.mark_error(execution_id, &e.to_string()).await {
                    error!(execution_id, error = %mark, "failed to mark the execution as failed");
                }
            }
        });

        Ok(execution_id)
    }

    /// Starts the stored policy with the given id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown policy, or the error of
    /// [`ReplicationController::start`].
    pub async fn start_by_id(&self, policy_id: i64, trigger: TriggerSource) -> Result<ExecutionId> {
        let policy = self.get_policy(policy_id).await?;
        self.start(&policy, None, trigger).await
    }

    /// Stops an execution.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown execution.
    pub async fn stop(&self, execution_id: ExecutionId) -> Result<()> {
        if self.executions.get_execution(execution_id).await?.is_none() {
            return Err(Error::not_found(format!("execution {execution_id}")));
        }
        self.executions.stop(execution_id).await?;
        info!(execution_id, "execution stopped");
        Ok(())
    }

    /// Validates, stores and arms a new policy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadRequest`] for an invalid policy,
    /// [`Error::NotFound`] for an unknown endpoint registry, or the store's
    /// or scheduler's error.
    pub async fn create_policy(&self, mut policy: Policy) -> Result<i64> {
        policy.check()?;
        self.ensure_endpoints_exist(&policy).await?;

        let id = self.policies.create(&policy).await?;
        policy.id = id;
        self.triggers.setup(&policy).await?;
        info!(policy_id = id, name = %policy.name, "policy created");
        Ok(id)
    }

    /// Validates and stores an updated policy, re-arming its trigger if it
    /// changed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown policy, plus the errors of
    /// [`ReplicationController::create_policy`].
    pub async fn update_policy(&self, policy: Policy) -> Result<()> {
        policy.check()?;
        let old = self.get_policy(policy.id).await?;
        self.ensure_endpoints_exist(&policy).await?;

        self.policies.update(&policy).await?;
        self.triggers.replace_on_change(&old, &policy).await?;
        info!(policy_id = policy.id, "policy updated");
        Ok(())
    }

    /// Disarms and deletes a policy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown policy and
    /// [`Error::Precondition`] while it has unfinished executions.
    pub async fn delete_policy(&self, policy_id: i64) -> Result<()> {
        let policy = self.get_policy(policy_id).await?;

        let running = self
            .executions
            .list_executions(policy_id)
            .await?
            .iter()
            .any(|e| !e.status.is_terminal());
        if running {
            return Err(Error::precondition(format!(
                "the policy {policy_id} has running executions"
            )));
        }

        self.triggers.unset(&policy).await?;
        self.policies.delete(policy_id).await?;
        info!(policy_id, "policy deleted");
        Ok(())
    }

    /// Returns a stored policy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown policy.
    pub async fn get_policy(&self, policy_id: i64) -> Result<Policy> {
        self.policies
            .get(policy_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("policy {policy_id}")))
    }

    /// Lists stored policies.
    ///
    /// # Errors
    ///
    /// Returns the store's error.
    pub async fn list_policies(&self) -> Result<Vec<Policy>> {
        self.policies.list().await
    }

    async fn open_execution(
        &self,
        policy: &Policy,
        trigger: TriggerSource,
    ) -> Result<(Policy, ExecutionId)> {
        if !policy.enabled {
            return Err(Error::precondition(format!(
                "the policy {} is disabled",
                policy.id
            )));
        }

        let mut resolved = policy.clone();
        resolved.src_registry = Some(self.resolve_registry(policy.src_registry.as_ref()).await?);
        resolved.dest_registry = Some(self.resolve_registry(policy.dest_registry.as_ref()).await?);

        let execution_id = self.executions.create_execution(policy.id, trigger).await?;
        info!(execution_id, policy_id = policy.id, %trigger, "execution opened");
        Ok((resolved, execution_id))
    }

    async fn resolve_registry(&self, endpoint: Option<&Registry>) -> Result<Registry> {
        if is_local_endpoint(endpoint) {
            return Ok(self.config.local_registry.to_registry());
        }
        let id = endpoint.map_or(LOCAL_REGISTRY_ID, |r| r.id);
        self.registries
            .get(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("registry {id}")))
    }

    async fn ensure_endpoints_exist(&self, policy: &Policy) -> Result<()> {
        self.resolve_registry(policy.src_registry.as_ref()).await?;
        self.resolve_registry(policy.dest_registry.as_ref()).await?;
        Ok(())
    }

    async fn acquire(&self) -> Result<SemaphorePermit<'_>> {
        self.permits
            .acquire()
            .await
            .map_err(|_| Error::internal("the replication worker pool is closed"))
    }
}

#[async_trait]
impl ScheduleCallback for ReplicationController {
    async fn on_schedule(&self, policy_id: i64) -> Result<()> {
        self.start_by_id(policy_id, TriggerSource::Scheduled)
            .await
            .map(|execution_id| info!(policy_id, execution_id, "scheduled execution finished"))
    }
}
