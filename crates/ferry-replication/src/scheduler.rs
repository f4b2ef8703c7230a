//! Tokio-based cron scheduler.
//!
//! Each registration runs as its own task that sleeps until the next fire
//! time and then invokes the callback. Sleeps are capped so that wall-clock
//! jumps are noticed within one cap.

use std::collections::HashMap;
use std::sync::Weak;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use ferry_core::{CronExpr, Result};

use crate::trigger::{ScheduleCallback, Scheduler};

/// Configuration for [`CronScheduler`].
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Longest single sleep before the next fire time is recomputed.
    pub max_sleep: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_sleep: Duration::from_secs(60),
        }
    }
}

impl SchedulerConfig {
    /// Sets the sleep cap. Zero is raised to one second.
    #[must_use]
    pub fn with_max_sleep(mut self, max_sleep: Duration) -> Self {
        self.max_sleep = max_sleep.max(Duration::from_secs(1));
        self
    }
}

/// [`Scheduler`] running one tokio task per registration.
pub struct CronScheduler {
    config: SchedulerConfig,
    jobs: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl CronScheduler {
    /// Creates a scheduler.
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the number of live registrations.
    #[must_use]
    pub fn job_count(&self) -> usize {
        self.jobs.lock().len()
    }
}

impl Default for CronScheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl Drop for CronScheduler {
    fn drop(&mut self) {
        for (_, job) in self.jobs.lock().drain() {
            job.abort();
        }
    }
}

/// How long to sleep before re-checking a schedule whose next fire time is
/// `next`, capped at `max_sleep`.
fn sleep_for(next: DateTime<Utc>, now: DateTime<Utc>, max_sleep: Duration) -> Duration {
    (next - now).to_std().unwrap_or_default().min(max_sleep)
}

async fn run_schedule(
    policy_id: i64,
    cron: CronExpr,
    callback: Weak<dyn ScheduleCallback>,
    max_sleep: Duration,
) {
    loop {
        let Some(next) = cron.next_after(&Utc::now()) else {
            warn!(policy_id, cron = %cron, "schedule has no future fire time");
            return;
        };

        loop {
            let now = Utc::now();
            if now >= next {
                break;
            }
            tokio::time::sleep(sleep_for(next, now, max_sleep)).await;
        }

        let Some(callback) = callback.upgrade() else {
            debug!(policy_id, "schedule callback gone, stopping");
            return;
        };
        debug!(policy_id, fire_time = %next, "schedule fired");
        if let Err(e) = callback.on_schedule(policy_id).await {
            warn!(policy_id, error = %e, "scheduled replication failed");
        }
    }
}

#[async_trait]
impl Scheduler for CronScheduler {
    async fn schedule(
        &self,
        policy_id: i64,
        cron: &CronExpr,
        callback: Weak<dyn ScheduleCallback>,
    ) -> Result<String> {
        let handle = Uuid::now_v7().to_string();
        let job = tokio::spawn(run_schedule(
            policy_id,
            cron.clone(),
            callback,
            self.config.max_sleep,
        ));
        self.jobs.lock().insert(handle.clone(), job);
        debug!(policy_id, %handle, "schedule task spawned");
        Ok(handle)
    }

    async fn unschedule(&self, handle: &str) -> Result<()> {
        let job = self.jobs.lock().remove(handle);
        if let Some(job) = job {
            job.abort();
        }
        Ok(())
    }
}
