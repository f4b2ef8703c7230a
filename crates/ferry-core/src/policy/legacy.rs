//! Reader-side upgrade of persisted policies.
//!
//! Older releases stored filters as `{kind, pattern}` and triggers as
//! `{kind, schedule_param}`. [`PolicyRecord`] accepts both shapes and converts
//! into the current [`Policy`]. Missing fields take the defaults older rows
//! implied: a replace count of `-1` and an enabled policy.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{Policy, Trigger, TriggerSettings, TriggerType, MIN_REPLACE_COUNT};
use crate::filter::{Decoration, Filter, FilterType};
use crate::model::Registry;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Any persisted policy row, current or legacy.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PolicyRecord {
    id: i64,
    name: String,
    description: String,
    creator: String,
    src_registry: Option<Registry>,
    dest_registry: Option<Registry>,
    dest_namespace: String,
    dest_namespace_replace_count: Option<i32>,
    filters: Vec<FilterRecord>,
    trigger: Option<TriggerRecord>,
    deletion: bool,
    #[serde(rename = "override")]
    override_existing: bool,
    enabled: Option<bool>,
    speed: Option<i32>,
    copy_by_chunk: bool,
    creation_time: Option<DateTime<Utc>>,
    update_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct FilterRecord {
    #[serde(rename = "type")]
    filter_type: String,
    kind: String,
    value: Value,
    pattern: Option<Value>,
    decoration: Option<Decoration>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct TriggerRecord {
    #[serde(rename = "type")]
    trigger_type: String,
    kind: String,
    trigger_settings: Option<TriggerSettings>,
    schedule_param: Option<ScheduleParam>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ScheduleParam {
    #[serde(rename = "type")]
    schedule_type: String,
    weekday: i64,
    #[serde(alias = "offtime")]
    offtime_seconds: i64,
}

impl ScheduleParam {
    /// `s m h * * (dow|*)` for a daily or weekly offset.
    fn to_cron(&self) -> String {
        let offset = self.offtime_seconds.rem_euclid(SECONDS_PER_DAY);
        let (hour, minute, second) = (offset / 3600, (offset % 3600) / 60, offset % 60);
        let weekday = if self.schedule_type.eq_ignore_ascii_case("weekly") {
            self.weekday.rem_euclid(7).to_string()
        } else {
            "*".to_string()
        };
        format!("{second} {minute} {hour} * * {weekday}")
    }
}

impl FilterRecord {
    fn legacy_value(&self) -> Value {
        match &self.pattern {
            Some(pattern) if self.value.is_null() => pattern.clone(),
            _ => self.value.clone(),
        }
    }
}

fn upgrade_filters(records: Vec<FilterRecord>) -> Vec<Filter> {
    let mut filters = Vec::with_capacity(records.len());
    let mut repository_patterns = Vec::new();

    for record in records {
        if !record.filter_type.is_empty() {
            filters.push(Filter {
                filter_type: FilterType::from(record.filter_type),
                value: record.value,
                decoration: record.decoration,
            });
            continue;
        }
        match record.kind.to_ascii_lowercase().as_str() {
            "repository" => {
                if let Some(pattern) = record.legacy_value().as_str() {
                    repository_patterns.push(pattern.to_string());
                }
            }
            "tag" => filters.push(Filter {
                filter_type: FilterType::Tag,
                value: record.legacy_value(),
                decoration: record.decoration,
            }),
            kind => debug!(kind, "dropping legacy filter"),
        }
    }

    for pattern in repository_patterns {
        let mut merged = false;
        for filter in filters.iter_mut().filter(|f| f.filter_type == FilterType::Name) {
            if let Some(value) = filter.value.as_str() {
                if value.contains("**") {
                    filter.value = Value::String(value.replacen("**", &pattern, 1));
                    merged = true;
                }
            }
        }
        if !merged && !filters.iter().any(|f| f.filter_type == FilterType::Name) {
            filters.push(Filter::name(pattern));
        }
    }

    filters
}

fn upgrade_trigger(record: TriggerRecord) -> Trigger {
    if !record.trigger_type.is_empty() {
        return Trigger {
            trigger_type: TriggerType::from(record.trigger_type),
            trigger_settings: record.trigger_settings,
        };
    }
    match record.kind.as_str() {
        "Manual" => Trigger::manual(),
        "Immediate" => Trigger::event_based(),
        "Scheduled" => {
            let cron = record
                .schedule_param
                .as_ref()
                .map(ScheduleParam::to_cron)
                .or_else(|| record.trigger_settings.map(|s| s.cron))
                .unwrap_or_default();
            Trigger::scheduled(cron)
        }
        other => Trigger {
            trigger_type: TriggerType::Unknown(other.to_string()),
            trigger_settings: record.trigger_settings,
        },
    }
}

impl From<PolicyRecord> for Policy {
    fn from(record: PolicyRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            description: record.description,
            creator: record.creator,
            src_registry: record.src_registry,
            dest_registry: record.dest_registry,
            dest_namespace: record.dest_namespace,
            dest_namespace_replace_count: record
                .dest_namespace_replace_count
                .unwrap_or(MIN_REPLACE_COUNT),
            filters: upgrade_filters(record.filters),
            trigger: record.trigger.map(upgrade_trigger),
            replicate_deletion: record.deletion,
            override_existing: record.override_existing,
            enabled: record.enabled.unwrap_or(true),
            speed: record.speed,
            copy_by_chunk: record.copy_by_chunk,
            creation_time: record.creation_time,
            update_time: record.update_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn read(value: Value) -> Policy {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_defaults_for_missing_fields() {
        let policy = read(json!({"name": "p", "dest_registry": {"id": 1}}));
        assert_eq!(policy.dest_namespace_replace_count, -1);
        assert!(policy.enabled);
        assert!(policy.trigger.is_none());
        assert!(policy.is_source_local());
    }

    #[test]
    fn test_current_shape_passes_through() {
        let policy = read(json!({
            "name": "p",
            "dest_registry": {"id": 1},
            "dest_namespace_replace_count": 2,
            "enabled": false,
            "filters": [{"type": "name", "value": "library/**"}],
            "trigger": {"type": "event_based"}
        }));
        assert_eq!(policy.dest_namespace_replace_count, 2);
        assert!(!policy.enabled);
        assert_eq!(policy.filters, vec![Filter::name("library/**")]);
        assert!(policy.is_event_based());
    }

    #[test]
    fn test_repository_filter_merged_into_name() {
        let policy = read(json!({
            "name": "p",
            "filters": [
                {"type": "name", "value": "library/**"},
                {"kind": "repository", "pattern": "hello-*"}
            ]
        }));
        assert_eq!(policy.filters, vec![Filter::name("library/hello-*")]);
    }

    #[test]
    fn test_repository_filter_without_name_filter() {
        let policy = read(json!({
            "name": "p",
            "filters": [{"kind": "repository", "value": "library/*"}]
        }));
        assert_eq!(policy.filters, vec![Filter::name("library/*")]);
    }

    #[test]
    fn test_tag_kind_rewritten_and_label_dropped() {
        let policy = read(json!({
            "name": "p",
            "filters": [
                {"kind": "tag", "pattern": "v*"},
                {"kind": "label", "value": [1, 2]}
            ]
        }));
        assert_eq!(policy.filters.len(), 1);
        assert_eq!(policy.filters[0].filter_type, FilterType::Tag);
        assert_eq!(policy.filters[0].string_value(), Some("v*"));
    }

    #[test]
    fn test_legacy_trigger_kinds() {
        let manual = read(json!({"name": "p", "trigger": {"kind": "Manual"}}));
        assert_eq!(manual.trigger, Some(Trigger::manual()));

        let immediate = read(json!({"name": "p", "trigger": {"kind": "Immediate"}}));
        assert!(immediate.is_event_based());
    }

    #[test]
    fn test_legacy_daily_schedule() {
        let policy = read(json!({
            "name": "p",
            "trigger": {
                "kind": "Scheduled",
                "schedule_param": {"type": "Daily", "offtime": 3600 * 26 + 60 * 5}
            }
        }));
        assert_eq!(policy.trigger.unwrap().cron(), "0 5 2 * * *");
    }

    #[test]
    fn test_legacy_weekly_schedule() {
        let policy = read(json!({
            "name": "p",
            "trigger": {
                "kind": "Scheduled",
                "schedule_param": {"type": "Weekly", "weekday": 7, "offtime_seconds": 3600 * 3}
            }
        }));
        assert_eq!(policy.trigger.unwrap().cron(), "0 0 3 * * 0");
    }

    #[test]
    fn test_negative_offtime_wraps() {
        let param = ScheduleParam {
            schedule_type: "Daily".into(),
            weekday: 0,
            offtime_seconds: -60,
        };
        assert_eq!(param.to_cron(), "0 59 23 * * *");
    }
}
