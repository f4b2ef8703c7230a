//! Trigger lifecycle.
//!
//! Only scheduled triggers need bookkeeping: the manager registers the
//! policy's cron expression with a [`Scheduler`] and remembers the handle so
//! that updates and deletes can take it down again. Manual and event-based
//! triggers are no-ops here.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use ferry_core::{CronExpr, Policy, Result};

/// Receives schedule ticks.
#[async_trait]
pub trait ScheduleCallback: Send + Sync {
    /// Called each time the schedule of `policy_id` fires.
    async fn on_schedule(&self, policy_id: i64) -> Result<()>;
}

/// Runs callbacks on cron schedules.
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Registers a schedule and returns its handle.
    ///
    /// The scheduler stops firing once `callback` can no longer be upgraded.
    async fn schedule(
        &self,
        policy_id: i64,
        cron: &CronExpr,
        callback: Weak<dyn ScheduleCallback>,
    ) -> Result<String>;

    /// Removes a schedule. Unknown handles are ignored.
    async fn unschedule(&self, handle: &str) -> Result<()>;
}

/// Tracks the scheduler registrations of scheduled policies.
pub struct TriggerManager {
    scheduler: Arc<dyn Scheduler>,
    callback: Weak<dyn ScheduleCallback>,
    handles: Mutex<HashMap<i64, String>>,
}

impl TriggerManager {
    /// Creates a manager that registers `callback` for every schedule.
    pub fn new(scheduler: Arc<dyn Scheduler>, callback: Weak<dyn ScheduleCallback>) -> Self {
        Self {
            scheduler,
            callback,
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Registers the schedule of an enabled, scheduled policy.
    ///
    /// A policy has at most one registration: a handle displaced by this one
    /// is unscheduled.
    ///
    /// # Errors
    ///
    /// Returns [`ferry_core::Error::BadRequest`] for an invalid cron
    /// expression, or the scheduler's error.
    pub async fn setup(&self, policy: &Policy) -> Result<()> {
        if !policy.enabled {
            debug!(policy_id = policy.id, "policy disabled, no trigger to set up");
            return Ok(());
        }
        let Some(cron) = policy.schedule()? else {
            return Ok(());
        };

        let handle = self
            .scheduler
            .schedule(policy.id, &cron, self.callback.clone())
            .await?;
        info!(policy_id = policy.id, cron = %cron, %handle, "schedule registered");

        let displaced = self.handles.lock().insert(policy.id, handle);
        if let Some(displaced) = displaced {
            if let Err(e) = self.scheduler.unschedule(&displaced).await {
                warn!(
                    policy_id = policy.id,
                    handle = %displaced,
                    error = %e,
                    "failed to remove replaced schedule"
                );
                return Err(e);
            }
            info!(policy_id = policy.id, handle = %displaced, "replaced schedule removed");
        }
        Ok(())
    }

    /// Removes the schedule of a policy, if it has one.
    ///
    /// The handle stays tracked until the scheduler has released it.
    ///
    /// # Errors
    ///
    /// Returns the scheduler's error.
    pub async fn unset(&self, policy: &Policy) -> Result<()> {
        let Some(handle) = self.handles.lock().get(&policy.id).cloned() else {
            return Ok(());
        };
        self.scheduler.unschedule(&handle).await?;

        let mut handles = self.handles.lock();
        if handles.get(&policy.id) == Some(&handle) {
            handles.remove(&policy.id);
        }
        drop(handles);
        info!(policy_id = policy.id, %handle, "schedule removed");
        Ok(())
    }

    /// Re-registers the schedule when the trigger or the enablement changed.
    ///
    /// # Errors
    ///
    /// Returns the error of [`TriggerManager::unset`] or
    /// [`TriggerManager::setup`].
    pub async fn replace_on_change(&self, old: &Policy, new: &Policy) -> Result<()> {
        if old.trigger == new.trigger && old.enabled == new.enabled {
            return Ok(());
        }
        self.unset(old).await?;
        self.setup(new).await
    }

    /// Returns the ids of policies with a registered schedule, sorted.
    #[must_use]
    pub fn scheduled_policies(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.handles.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}
