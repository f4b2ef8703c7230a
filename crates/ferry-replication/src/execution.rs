//! Execution and task records.
//!
//! An execution is one run of a policy; it owns the tasks the flow emits,
//! one per `(source, destination)` resource pair.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ferry_core::model::Resource;
use ferry_core::Result;

/// Execution id assigned by the execution manager.
pub type ExecutionId = i64;

/// Task id assigned by the execution manager.
pub type TaskId = i64;

/// Job name understood by the transfer workers.
pub const REPLICATION_JOB_NAME: &str = "REPLICATION";

/// Job kind understood by the transfer workers.
pub const GENERIC_JOB_KIND: &str = "Generic";

/// Status of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Created, not started.
    Pending,
    /// Running.
    Running,
    /// Finished successfully.
    Succeeded,
    /// Finished with an error.
    Failed,
    /// Stopped by a user.
    Stopped,
}

impl ExecutionStatus {
    /// Returns true if no further transitions are expected.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Stopped)
    }

    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What started an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    /// A user request.
    Manual,
    /// A cron tick.
    Scheduled,
    /// A local registry event.
    EventBased,
}

impl TriggerSource {
    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Scheduled => "scheduled",
            Self::EventBased => "event_based",
        }
    }
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One run of a policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    /// Execution id.
    pub id: ExecutionId,
    /// Policy the execution runs.
    pub policy_id: i64,
    /// Current status.
    pub status: ExecutionStatus,
    /// Status detail, e.g. the reason for finishing early.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status_message: String,
    /// What started the execution.
    pub trigger: TriggerSource,
    /// When the execution started.
    pub start_time: DateTime<Utc>,
    /// When the execution reached a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

/// Operation a task performs at the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Copy the resource.
    Copy,
    /// Delete the resource.
    Deletion,
    /// Delete a tag only.
    TagDeletion,
}

impl Operation {
    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Copy => "copy",
            Self::Deletion => "deletion",
            Self::TagDeletion => "tag_deletion",
        }
    }

    /// Picks the deletion operation for a deleted resource.
    #[must_use]
    pub const fn deletion_for(resource: &Resource) -> Self {
        if resource.is_delete_tag {
            Self::TagDeletion
        } else {
            Self::Deletion
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters handed to the transfer worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobParameters {
    /// Source resource as JSON.
    pub src_resource: String,
    /// Destination resource as JSON.
    pub dst_resource: String,
    /// Speed hint in KB/s, `0` for unlimited.
    pub speed: i32,
    /// Copy blobs in chunks.
    #[serde(default)]
    pub copy_by_chunk: bool,
}

/// A job submitted to the worker runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Job name.
    pub name: String,
    /// Job kind.
    pub kind: String,
    /// Job parameters.
    pub parameters: JobParameters,
}

impl JobSpec {
    /// Builds a replication job for a resource pair.
    ///
    /// # Errors
    ///
    /// Returns [`ferry_core::Error::Serialization`] if a resource cannot be
    /// encoded.
    pub fn replication(
        source: &Resource,
        destination: &Resource,
        speed: i32,
        copy_by_chunk: bool,
    ) -> Result<Self> {
        Ok(Self {
            name: REPLICATION_JOB_NAME.to_string(),
            kind: GENERIC_JOB_KIND.to_string(),
            parameters: JobParameters {
                src_resource: serde_json::to_string(source)?,
                dst_resource: serde_json::to_string(destination)?,
                speed,
                copy_by_chunk,
            },
        })
    }
}

/// Human-facing task metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMetadata {
    /// What the task does.
    pub operation: Operation,
    /// Resource kind.
    pub resource_type: String,
    /// `"<repo> [<N> item(s) in total]"` of the source.
    pub source_resource: String,
    /// `"<repo> [<N> item(s) in total]"` of the destination.
    pub destination_resource: String,
    /// Comma-joined destination references.
    pub references: String,
}

impl TaskMetadata {
    /// Describes a resource pair.
    #[must_use]
    pub fn new(operation: Operation, source: &Resource, destination: &Resource) -> Self {
        Self {
            operation,
            resource_type: source.resource_type.to_string(),
            source_resource: source.summary(),
            destination_resource: destination.summary(),
            references: destination.references(),
        }
    }
}

/// A worker job recorded under an execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Task id.
    pub id: TaskId,
    /// Owning execution.
    pub execution_id: ExecutionId,
    /// Job submitted to the workers.
    pub job: JobSpec,
    /// Human-facing metadata.
    pub metadata: TaskMetadata,
    /// When the task was created.
    pub creation_time: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_core::model::{Artifact, ResourceType};

    fn tagged(repository: &str, tags: &[&str]) -> Resource {
        Resource::new(ResourceType::Image, repository)
            .with_artifact(Artifact::new("sha256:1").with_tags(tags.iter().copied()))
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!ExecutionStatus::Pending.is_terminal());
        assert!(!ExecutionStatus::Running.is_terminal());
        assert!(ExecutionStatus::Succeeded.is_terminal());
        assert!(ExecutionStatus::Failed.is_terminal());
        assert!(ExecutionStatus::Stopped.is_terminal());
        assert_eq!(ExecutionStatus::Stopped.to_string(), "stopped");
    }

    #[test]
    fn test_deletion_operation_follows_tag_flag() {
        let mut resource = tagged("library/hello", &["latest"]).deleted();
        assert_eq!(Operation::deletion_for(&resource), Operation::Deletion);
        resource.is_delete_tag = true;
        assert_eq!(Operation::deletion_for(&resource), Operation::TagDeletion);
        assert_eq!(
            serde_json::to_string(&Operation::TagDeletion).unwrap(),
            "\"tag_deletion\""
        );
    }

    #[test]
    fn test_replication_job_wire_form() {
        let src = tagged("library/hello", &["v1", "v2"]);
        let dst = tagged("mirror/hello", &["v1", "v2"]);
        let job = JobSpec::replication(&src, &dst, 1024, true).unwrap();

        let wire = serde_json::to_value(&job).unwrap();
        assert_eq!(wire["name"], "REPLICATION");
        assert_eq!(wire["kind"], "Generic");
        assert_eq!(wire["parameters"]["speed"], 1024);
        assert_eq!(wire["parameters"]["copy_by_chunk"], true);

        let decoded: Resource = serde_json::from_str(&job.parameters.dst_resource).unwrap();
        assert_eq!(decoded, dst);
    }

    #[test]
    fn test_task_metadata() {
        let src = tagged("library/hello", &["v1", "v2"]);
        let dst = tagged("mirror/hello", &["v1", "v2"]);
        let metadata = TaskMetadata::new(Operation::Copy, &src, &dst);

        assert_eq!(metadata.resource_type, "image");
        assert_eq!(metadata.source_resource, "library/hello [2 item(s) in total]");
        assert_eq!(metadata.destination_resource, "mirror/hello [2 item(s) in total]");
        assert_eq!(metadata.references, "v1,v2");
    }
}
