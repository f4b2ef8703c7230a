//! Replication policy model and validation.
//!
//! A [`Policy`] names the two endpoints of a replication (exactly one of them
//! the local registry), the filters selecting what is replicated, the
//! destination namespace, and the trigger that starts executions.
//!
//! Persisted policies are read through a compatibility shim (see
//! [`legacy`]) that upgrades rows written by older releases; in memory and on
//! write the policy always has the current shape.

pub mod legacy;

use std::fmt;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};

use crate::cron::CronExpr;
use crate::error::{Error, Result};
use crate::filter::Filter;
use crate::model::{is_local_endpoint, Registry};
use crate::validation::{Validate, ValidationError, ValidationErrorKind, ValidationErrors};

/// Lower bound of `dest_namespace_replace_count`; keeps only the leaf.
pub const MIN_REPLACE_COUNT: i32 = -1;
/// Upper bound of `dest_namespace_replace_count`.
pub const MAX_REPLACE_COUNT: i32 = 127;

static REPOSITORY_NAME: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]+(?:[._-][a-z0-9]+)*(?:/[a-z0-9]+(?:[._-][a-z0-9]+)*)*$").ok()
});

/// Returns true if `name` is a valid repository path.
#[must_use]
pub fn is_valid_repository_name(name: &str) -> bool {
    REPOSITORY_NAME
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(name))
}

/// Kind of trigger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TriggerType {
    /// Started by a user.
    Manual,
    /// Started by a cron schedule.
    Scheduled,
    /// Started by events on the local registry.
    EventBased,
    /// Anything else; rejected by validation.
    Unknown(String),
}

impl TriggerType {
    /// Returns the wire name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Manual => "manual",
            Self::Scheduled => "scheduled",
            Self::EventBased => "event_based",
            Self::Unknown(other) => other,
        }
    }
}

impl From<String> for TriggerType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "manual" => Self::Manual,
            "scheduled" => Self::Scheduled,
            "event_based" => Self::EventBased,
            _ => Self::Unknown(s),
        }
    }
}

impl From<TriggerType> for String {
    fn from(t: TriggerType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of a scheduled trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerSettings {
    /// Cron expression.
    #[serde(default)]
    pub cron: String,
}

/// How executions of a policy are started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    /// Trigger kind.
    #[serde(rename = "type")]
    pub trigger_type: TriggerType,
    /// Settings for scheduled triggers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_settings: Option<TriggerSettings>,
}

impl Trigger {
    /// A manual trigger.
    #[must_use]
    pub const fn manual() -> Self {
        Self {
            trigger_type: TriggerType::Manual,
            trigger_settings: None,
        }
    }

    /// An event-based trigger.
    #[must_use]
    pub const fn event_based() -> Self {
        Self {
            trigger_type: TriggerType::EventBased,
            trigger_settings: None,
        }
    }

    /// A scheduled trigger with the given cron expression.
    pub fn scheduled(cron: impl Into<String>) -> Self {
        Self {
            trigger_type: TriggerType::Scheduled,
            trigger_settings: Some(TriggerSettings { cron: cron.into() }),
        }
    }

    /// Returns the cron expression, empty when unset.
    #[must_use]
    pub fn cron(&self) -> &str {
        self.trigger_settings
            .as_ref()
            .map_or("", |settings| settings.cron.as_str())
    }
}

/// A replication policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "legacy::PolicyRecord")]
pub struct Policy {
    /// Policy id.
    pub id: i64,
    /// Human name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// User that created the policy.
    pub creator: String,
    /// Source endpoint; `None` or id 0 is the local registry.
    #[serde(serialize_with = "serialize_registry_ref")]
    pub src_registry: Option<Registry>,
    /// Destination endpoint; `None` or id 0 is the local registry.
    #[serde(serialize_with = "serialize_registry_ref")]
    pub dest_registry: Option<Registry>,
    /// Namespace prefixed to destination repositories.
    pub dest_namespace: String,
    /// Leading source components dropped before prefixing `dest_namespace`.
    pub dest_namespace_replace_count: i32,
    /// Ordered filter list.
    pub filters: Vec<Filter>,
    /// Trigger; `None` means the policy is never started automatically.
    pub trigger: Option<Trigger>,
    /// Mirror deletions to the destination.
    #[serde(rename = "deletion")]
    pub replicate_deletion: bool,
    /// Overwrite existing content at the destination.
    #[serde(rename = "override")]
    pub override_existing: bool,
    /// Whether the policy may be started.
    pub enabled: bool,
    /// Transfer speed hint in KB/s.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<i32>,
    /// Copy blobs in chunks.
    pub copy_by_chunk: bool,
    /// Creation timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<DateTime<Utc>>,
    /// Last update timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,
}

fn serialize_registry_ref<S: Serializer>(
    registry: &Option<Registry>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    #[derive(Serialize)]
    struct RegistryRef {
        id: i64,
    }

    registry
        .as_ref()
        .map(|r| RegistryRef { id: r.id })
        .serialize(serializer)
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            id: 0,
            name: String::new(),
            description: String::new(),
            creator: String::new(),
            src_registry: None,
            dest_registry: None,
            dest_namespace: String::new(),
            dest_namespace_replace_count: MIN_REPLACE_COUNT,
            filters: Vec::new(),
            trigger: None,
            replicate_deletion: false,
            override_existing: false,
            enabled: true,
            speed: None,
            copy_by_chunk: false,
            creation_time: None,
            update_time: None,
        }
    }
}

impl Policy {
    /// Creates an enabled policy with the given name and no endpoints.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the id.
    #[must_use]
    pub const fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    /// Sets the source registry.
    #[must_use]
    pub fn with_source(mut self, registry: Registry) -> Self {
        self.src_registry = Some(registry);
        self
    }

    /// Sets the destination registry.
    #[must_use]
    pub fn with_destination(mut self, registry: Registry) -> Self {
        self.dest_registry = Some(registry);
        self
    }

    /// Sets the destination namespace and replace count.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>, replace_count: i32) -> Self {
        self.dest_namespace = namespace.into();
        self.dest_namespace_replace_count = replace_count;
        self
    }

    /// Appends a filter.
    #[must_use]
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Sets the trigger.
    #[must_use]
    pub fn with_trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    /// Sets deletion mirroring.
    #[must_use]
    pub const fn with_deletion(mut self, replicate_deletion: bool) -> Self {
        self.replicate_deletion = replicate_deletion;
        self
    }

    /// Sets the override flag.
    #[must_use]
    pub const fn with_override(mut self, override_existing: bool) -> Self {
        self.override_existing = override_existing;
        self
    }

    /// Enables or disables the policy.
    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the speed hint.
    #[must_use]
    pub const fn with_speed(mut self, speed: i32) -> Self {
        self.speed = Some(speed);
        self
    }

    /// Returns true if the source is the local registry.
    #[must_use]
    pub fn is_source_local(&self) -> bool {
        is_local_endpoint(self.src_registry.as_ref())
    }

    /// Returns true if the destination is the local registry.
    #[must_use]
    pub fn is_destination_local(&self) -> bool {
        is_local_endpoint(self.dest_registry.as_ref())
    }

    /// Returns the trigger kind, if a trigger is set.
    #[must_use]
    pub fn trigger_type(&self) -> Option<&TriggerType> {
        self.trigger.as_ref().map(|t| &t.trigger_type)
    }

    /// Returns true if the policy is started by local registry events.
    #[must_use]
    pub fn is_event_based(&self) -> bool {
        self.trigger_type() == Some(&TriggerType::EventBased)
    }

    /// Returns true if the policy is started by a cron schedule.
    #[must_use]
    pub fn is_scheduled(&self) -> bool {
        self.trigger_type() == Some(&TriggerType::Scheduled)
    }

    /// Returns the parsed schedule of a scheduled policy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadRequest`] if the cron expression is invalid.
    pub fn schedule(&self) -> Result<Option<CronExpr>> {
        match &self.trigger {
            Some(trigger) if trigger.trigger_type == TriggerType::Scheduled => {
                CronExpr::parse(trigger.cron()).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Returns the speed hint, `0` meaning unlimited.
    #[must_use]
    pub fn speed_hint(&self) -> i32 {
        self.speed.unwrap_or_default()
    }

    /// Validates the policy, converting the first failure into
    /// [`Error::BadRequest`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadRequest`] if the policy is invalid.
    pub fn check(&self) -> Result<()> {
        self.validate().map_err(Error::from)
    }

    fn validate_trigger(&self, errors: &mut ValidationErrors) {
        let Some(trigger) = &self.trigger else {
            return;
        };
        match &trigger.trigger_type {
            TriggerType::Manual => {}
            TriggerType::EventBased => {
                if !self.is_source_local() {
                    errors.add(ValidationError::constraint(
                        "trigger.type",
                        "the event based trigger requires the source registry to be the local registry",
                    ));
                }
            }
            TriggerType::Scheduled => {
                let cron = trigger.cron();
                if cron.trim().is_empty() {
                    errors.add(ValidationError::new(
                        "trigger.trigger_settings.cron",
                        "the cron string cannot be empty",
                        ValidationErrorKind::Required,
                    ));
                } else if let Err(e) = CronExpr::parse(cron) {
                    let message = match e {
                        Error::BadRequest { reason } => reason,
                        other => other.to_string(),
                    };
                    errors.add(ValidationError::format("trigger.trigger_settings.cron", message));
                }
            }
            TriggerType::Unknown(other) => {
                errors.add(ValidationError::format(
                    "trigger.type",
                    format!("invalid trigger type: {other}"),
                ));
            }
        }
    }
}

impl Validate for Policy {
    fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.name.trim().is_empty() {
            errors.add(ValidationError::new(
                "name",
                "the policy name is required",
                ValidationErrorKind::Required,
            ));
        }

        match (self.is_source_local(), self.is_destination_local()) {
            (true, true) => errors.add(ValidationError::constraint(
                "dest_registry",
                "the source and destination registries cannot both be the local registry",
            )),
            (false, false) => errors.add(ValidationError::constraint(
                "src_registry",
                "either the source or the destination registry must be the local registry",
            )),
            _ => {}
        }

        for (i, filter) in self.filters.iter().enumerate() {
            if let Err(filter_errors) = filter.validate() {
                errors.merge_nested(&format!("filters[{i}]"), filter_errors);
            }
        }

        if !self.dest_namespace.is_empty() && !is_valid_repository_name(&self.dest_namespace) {
            errors.add(ValidationError::format(
                "dest_namespace",
                format!("invalid destination namespace: {}", self.dest_namespace),
            ));
        }

        if !(MIN_REPLACE_COUNT..=MAX_REPLACE_COUNT).contains(&self.dest_namespace_replace_count) {
            errors.add(ValidationError::range(
                "dest_namespace_replace_count",
                format!(
                    "the destination namespace replace count must be between {MIN_REPLACE_COUNT} and {MAX_REPLACE_COUNT}, got {}",
                    self.dest_namespace_replace_count
                ),
            ));
        }

        self.validate_trigger(&mut errors);

        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::filter::Decoration;
    use serde_json::json;

    fn remote() -> Registry {
        Registry::reference(1)
    }

    fn push_policy() -> Policy {
        Policy::new("push").with_destination(remote())
    }

    fn first_message(policy: &Policy) -> String {
        policy.validate().unwrap_err().first().unwrap().message.clone()
    }

    #[test]
    fn test_valid_push_and_pull_policies() {
        assert!(push_policy().is_valid());
        assert!(Policy::new("pull")
            .with_source(remote())
            .with_destination(Registry::reference(0))
            .is_valid());
    }

    #[test]
    fn test_name_required() {
        let policy = Policy::new("").with_destination(remote());
        assert_eq!(first_message(&policy), "the policy name is required");
        assert_eq!(policy.check().unwrap_err().kind(), ErrorKind::BadRequest);
    }

    #[test]
    fn test_exactly_one_local_endpoint() {
        let both_local = Policy::new("p");
        assert!(!both_local.is_valid());

        let both_remote = Policy::new("p")
            .with_source(remote())
            .with_destination(Registry::reference(2));
        assert!(!both_remote.is_valid());
    }

    #[test]
    fn test_invalid_filter_reported_with_index() {
        let bad: Filter = serde_json::from_value(json!({
            "type": "name",
            "value": "a/**",
            "decoration": "excludes"
        }))
        .unwrap();
        let policy = push_policy().with_filter(Filter::tag("v*")).with_filter(bad);
        let errors = policy.validate().unwrap_err();
        assert_eq!(errors.first().unwrap().field, "filters[1].decoration");
    }

    #[test]
    fn test_destination_namespace_format() {
        assert!(push_policy().with_namespace("library/team-a", 0).is_valid());
        assert!(!push_policy().with_namespace("Library", 0).is_valid());
        assert!(!push_policy().with_namespace("a//b", 0).is_valid());
    }

    #[test]
    fn test_replace_count_range() {
        assert!(push_policy().with_namespace("n", 127).is_valid());
        assert!(!push_policy().with_namespace("n", 128).is_valid());
        assert!(!push_policy().with_namespace("n", -2).is_valid());
    }

    #[test]
    fn test_cron_rules() {
        for cron in ["* * *", "* * * * * *", "0 * * * * *", ""] {
            let policy = push_policy().with_trigger(Trigger::scheduled(cron));
            assert_eq!(
                policy.check().unwrap_err().kind(),
                ErrorKind::BadRequest,
                "{cron}"
            );
        }
        assert!(push_policy().with_trigger(Trigger::scheduled("0 0 * * * *")).is_valid());
    }

    #[test]
    fn test_unknown_trigger_type() {
        let trigger = Trigger {
            trigger_type: TriggerType::Unknown("webhook".into()),
            trigger_settings: None,
        };
        assert_eq!(
            first_message(&push_policy().with_trigger(trigger)),
            "invalid trigger type: webhook"
        );
    }

    #[test]
    fn test_event_based_requires_local_source() {
        assert!(push_policy().with_trigger(Trigger::event_based()).is_valid());
        let pull = Policy::new("pull")
            .with_source(remote())
            .with_trigger(Trigger::event_based());
        assert!(!pull.is_valid());
    }

    #[test]
    fn test_schedule_parsing() {
        let policy = push_policy().with_trigger(Trigger::scheduled("0 30 2 * * *"));
        assert!(policy.is_scheduled());
        assert_eq!(policy.schedule().unwrap().unwrap().as_str(), "0 30 2 * * *");
        assert!(push_policy().schedule().unwrap().is_none());
    }

    #[test]
    fn test_policy_json_shape() {
        let policy = push_policy()
            .with_id(7)
            .with_filter(Filter::tag("v*").with_decoration(Decoration::Excludes))
            .with_trigger(Trigger::scheduled("0 0 * * * *"))
            .with_deletion(true)
            .with_override(true)
            .with_speed(1024);
        let json = serde_json::to_value(&policy).unwrap();

        assert_eq!(json["dest_registry"], json!({"id": 1}));
        assert_eq!(json["src_registry"], serde_json::Value::Null);
        assert_eq!(json["deletion"], true);
        assert_eq!(json["override"], true);
        assert_eq!(json["speed"], 1024);
        assert_eq!(json["trigger"]["type"], "scheduled");
        assert_eq!(json["trigger"]["trigger_settings"]["cron"], "0 0 * * * *");

        let parsed: Policy = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, policy);
    }
}
