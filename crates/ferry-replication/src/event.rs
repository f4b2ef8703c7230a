//! Event ingress.
//!
//! Events raised by the local registry start executions of the
//! event-based policies whose filters select the event's resource.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use ferry_core::filter::apply_filters;
use ferry_core::model::Resource;
use ferry_core::{Error, Policy, Result};

use crate::controller::ReplicationController;
use crate::execution::{ExecutionId, TriggerSource};
use crate::store::PolicyStore;

/// Kind of a local registry event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// An artifact was pushed.
    ArtifactPush,
    /// An artifact was deleted.
    ArtifactDelete,
    /// A tag was deleted.
    TagDelete,
    /// A chart was uploaded.
    ChartUpload,
    /// A chart was deleted.
    ChartDelete,
}

impl EventType {
    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ArtifactPush => "artifact_push",
            Self::ArtifactDelete => "artifact_delete",
            Self::TagDelete => "tag_delete",
            Self::ChartUpload => "chart_upload",
            Self::ChartDelete => "chart_delete",
        }
    }

    /// Returns true for events that remove content.
    #[must_use]
    pub const fn is_deletion(self) -> bool {
        matches!(
            self,
            Self::ArtifactDelete | Self::TagDelete | Self::ChartDelete
        )
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "artifact_push" => Ok(Self::ArtifactPush),
            "artifact_delete" => Ok(Self::ArtifactDelete),
            "tag_delete" => Ok(Self::TagDelete),
            "chart_upload" => Ok(Self::ChartUpload),
            "chart_delete" => Ok(Self::ChartDelete),
            other => Err(Error::unsupported(format!("unsupported event type: {other}"))),
        }
    }
}

/// A local registry event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event kind.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// The resource the event is about.
    pub resource: Option<Resource>,
}

impl Event {
    /// Creates an event.
    #[must_use]
    pub const fn new(event_type: EventType, resource: Resource) -> Self {
        Self {
            event_type,
            resource: Some(resource),
        }
    }

    /// Returns the resource with the deletion flags implied by the event
    /// kind applied.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] when the event carries no resource
    /// or the resource names nothing to replicate.
    fn normalized_resource(&self) -> Result<Resource> {
        let mut resource = self
            .resource
            .clone()
            .ok_or_else(|| Error::invalid_argument("the event has no resource"))?;

        let metadata = resource
            .metadata
            .as_ref()
            .ok_or_else(|| Error::invalid_argument("the event resource has no metadata"))?;
        let empty = match self.event_type {
            EventType::ChartUpload | EventType::ChartDelete => {
                metadata.artifacts.is_empty() && metadata.vtags.is_empty()
            }
            _ => metadata.artifacts.is_empty(),
        };
        if empty {
            return Err(Error::invalid_argument(
                "the event resource has no artifacts",
            ));
        }

        if self.event_type.is_deletion() {
            resource.deleted = true;
        }
        if self.event_type == EventType::TagDelete {
            resource.is_delete_tag = true;
        }
        Ok(resource)
    }
}

/// Turns events into executions.
pub struct EventHandler {
    policies: Arc<dyn PolicyStore>,
    controller: Arc<ReplicationController>,
}

impl EventHandler {
    /// Creates a handler.
    pub fn new(policies: Arc<dyn PolicyStore>, controller: Arc<ReplicationController>) -> Self {
        Self {
            policies,
            controller,
        }
    }

    /// Returns the policies the event starts, each paired with the resource
    /// that survived the policy's filters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty event, a filter error,
    /// or the store's error.
    pub async fn select_policies(&self, event: &Event) -> Result<Vec<(Policy, Resource)>> {
        let resource = event.normalized_resource()?;

        let mut selected = Vec::new();
        for policy in self.policies.list().await? {
            if !policy.enabled || !policy.is_event_based() || !policy.is_source_local() {
                continue;
            }
            if resource.deleted && !policy.replicate_deletion {
                debug!(policy_id = policy.id, "deletion not replicated by policy");
                continue;
            }

            let Some(matched) = apply_filters(vec![resource.clone()], &policy.filters)?
                .into_iter()
                .next()
            else {
                debug!(policy_id = policy.id, "resource filtered out");
                continue;
            };
            selected.push((policy, matched));
        }
        Ok(selected)
    }

    /// Starts an execution for every policy the event selects.
    ///
    /// The first failing policy aborts the remaining ones.
    ///
    /// # Errors
    ///
    /// Returns the error of [`EventHandler::select_policies`] or of starting
    /// a selected policy.
    pub async fn handle(&self, event: &Event) -> Result<Vec<ExecutionId>> {
        let selected = self.select_policies(event).await?;
        if selected.is_empty() {
            debug!(event = %event.event_type, "no policy matches the event");
            return Ok(Vec::new());
        }

        let mut executions = Vec::with_capacity(selected.len());
        for (policy, resource) in selected {
            let execution_id = self
                .controller
                .start(&policy, Some(resource), TriggerSource::EventBased)
                .await?;
            info!(
                event = %event.event_type,
                policy_id = policy.id,
                execution_id,
                "event replicated"
            );
            executions.push(execution_id);
        }
        Ok(executions)
    }
}
