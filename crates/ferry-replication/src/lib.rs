//! # Ferry Replication
//!
//! The replication control plane: turns manual requests, cron ticks and
//! local registry events into executions, and executions into transfer
//! tasks.
//!
//! # Overview
//!
//! - **Controller**: starts and stops executions, manages policies
//! - **Flows**: copy and deletion flows, one task per resource pair
//! - **Event ingress**: selects event-based policies for registry events
//! - **Triggers**: scheduled-trigger bookkeeping on top of a [`Scheduler`]
//! - **Stores**: execution, policy and registry boundaries with in-memory
//!   implementations
//!
//! # Architecture
//!
//! ```text
//!   manual ──┐
//!   cron ────┼──▶ ReplicationController ──▶ FlowController ──▶ ExecutionManager
//!   event ───┘          │                        │                (tasks)
//!                       ▼                        ▼
//!                 TriggerManager          source / destination adapters
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod controller;
pub mod event;
pub mod execution;
pub mod flow;
pub mod memory;
pub mod scheduler;
pub mod store;
pub mod trigger;

// Re-export main types at crate root
pub use config::{LocalRegistryConfig, ReplicationConfig};
pub use controller::ReplicationController;
pub use event::{Event, EventHandler, EventType};
pub use execution::{
    Execution, ExecutionId, ExecutionStatus, JobSpec, Operation, Task, TaskId, TaskMetadata,
    TriggerSource,
};
pub use flow::{FlowController, NO_RESOURCES_MESSAGE};
pub use memory::{InMemoryExecutionManager, InMemoryPolicyStore, InMemoryRegistryStore};
pub use scheduler::{CronScheduler, SchedulerConfig};
pub use store::{ExecutionManager, PolicyStore, RegistryStore};
pub use trigger::{ScheduleCallback, Scheduler, TriggerManager};
