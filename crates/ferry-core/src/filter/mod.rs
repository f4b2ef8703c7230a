//! Replication filters.
//!
//! A [`Filter`] is the persisted `{type, value, decoration}` triple attached to
//! a policy. [`engine`] turns an ordered list of them into a pipeline over
//! `Vec<Resource>`.

pub mod engine;
pub mod pattern;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::ResourceType;
use crate::validation::{Validate, ValidationError, ValidationErrors};

pub use engine::{apply_filters, compile_filters, resource_types_in, ResourceFilter};
pub use pattern::Pattern;

/// Kind of filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FilterType {
    /// Resource type equality.
    Resource,
    /// Repository name glob.
    Name,
    /// Tag glob.
    Tag,
    /// Label set.
    Label,
    /// Anything else; rejected by validation.
    Unknown(String),
}

impl FilterType {
    /// Returns the wire name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Resource => "resource",
            Self::Name => "name",
            Self::Tag => "tag",
            Self::Label => "label",
            Self::Unknown(other) => other,
        }
    }
}

impl From<String> for FilterType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "resource" => Self::Resource,
            "name" => Self::Name,
            "tag" => Self::Tag,
            "label" => Self::Label,
            _ => Self::Unknown(s),
        }
    }
}

impl From<FilterType> for String {
    fn from(t: FilterType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a filter keeps or drops what it matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Decoration {
    /// Keep matching items.
    #[default]
    Matches,
    /// Drop matching items.
    Excludes,
    /// Anything else; rejected by validation.
    Unknown(String),
}

impl Decoration {
    /// Returns the wire name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Matches => "matches",
            Self::Excludes => "excludes",
            Self::Unknown(other) => other,
        }
    }
}

impl From<String> for Decoration {
    fn from(s: String) -> Self {
        match s.as_str() {
            "matches" => Self::Matches,
            "excludes" => Self::Excludes,
            _ => Self::Unknown(s),
        }
    }
}

impl From<Decoration> for String {
    fn from(d: Decoration) -> Self {
        d.as_str().to_string()
    }
}

impl fmt::Display for Decoration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single replication filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// Filter kind.
    #[serde(rename = "type")]
    pub filter_type: FilterType,
    /// String for `name`/`tag`/`resource`, list of strings for `label`.
    #[serde(default)]
    pub value: Value,
    /// Only meaningful for `tag` and `label`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decoration: Option<Decoration>,
}

impl Filter {
    /// Creates a repository-name filter.
    pub fn name(pattern: impl Into<String>) -> Self {
        Self {
            filter_type: FilterType::Name,
            value: Value::String(pattern.into()),
            decoration: None,
        }
    }

    /// Creates a tag filter with `matches` decoration.
    pub fn tag(pattern: impl Into<String>) -> Self {
        Self {
            filter_type: FilterType::Tag,
            value: Value::String(pattern.into()),
            decoration: Some(Decoration::Matches),
        }
    }

    /// Creates a label filter with `matches` decoration.
    pub fn label<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            filter_type: FilterType::Label,
            value: Value::Array(labels.into_iter().map(|l| Value::String(l.into())).collect()),
            decoration: Some(Decoration::Matches),
        }
    }

    /// Creates a resource-type filter.
    #[must_use]
    pub fn resource(resource_type: ResourceType) -> Self {
        Self {
            filter_type: FilterType::Resource,
            value: Value::String(resource_type.as_str().to_string()),
            decoration: None,
        }
    }

    /// Sets the decoration.
    #[must_use]
    pub fn with_decoration(mut self, decoration: Decoration) -> Self {
        self.decoration = Some(decoration);
        self
    }

    /// Returns the decoration, `matches` when unset.
    #[must_use]
    pub fn effective_decoration(&self) -> Decoration {
        self.decoration.clone().unwrap_or_default()
    }

    /// Returns the string value, if the value is a string.
    #[must_use]
    pub fn string_value(&self) -> Option<&str> {
        self.value.as_str()
    }

    /// Returns the label list of a label filter.
    ///
    /// Non-string entries are skipped.
    #[must_use]
    pub fn label_values(&self) -> Vec<String> {
        self.value
            .as_array()
            .map(|values| {
                values
                    .iter()
                    .filter_map(Value::as_str)
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Validate for Filter {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        match &self.filter_type {
            FilterType::Unknown(kind) => {
                errors.add(ValidationError::format(
                    "type",
                    format!("invalid filter type: {kind}"),
                ));
            }
            FilterType::Label => {
                let valid = self
                    .value
                    .as_array()
                    .is_some_and(|values| values.iter().all(Value::is_string));
                if !valid {
                    errors.add(ValidationError::format(
                        "value",
                        "the value of a label filter must be a list of strings",
                    ));
                }
            }
            kind @ (FilterType::Name | FilterType::Tag | FilterType::Resource) => {
                match self.value.as_str() {
                    None => errors.add(ValidationError::format(
                        "value",
                        format!("the value of a {kind} filter must be a string"),
                    )),
                    Some("") => {}
                    Some(value) if *kind == FilterType::Resource => {
                        if value.parse::<ResourceType>().is_err() {
                            errors.add(ValidationError::format(
                                "value",
                                format!("invalid resource filter value: {value}"),
                            ));
                        }
                    }
                    Some(value) => {
                        if let Err(e) = Pattern::new(value) {
                            errors.add(ValidationError::format("value", e.to_string()));
                        }
                    }
                }
            }
        }

        if let Some(decoration) = &self.decoration {
            match self.filter_type {
                FilterType::Name | FilterType::Resource => {
                    errors.add(ValidationError::constraint(
                        "decoration",
                        format!("decoration is not supported by the {} filter", self.filter_type),
                    ));
                }
                _ => {
                    if let Decoration::Unknown(other) = decoration {
                        errors.add(ValidationError::format(
                            "decoration",
                            format!("invalid filter decoration: {other}"),
                        ));
                    }
                }
            }
        }

        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> Filter {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_filter_json_shape() {
        let filter = Filter::tag("v*").with_decoration(Decoration::Excludes);
        let json = serde_json::to_value(&filter).unwrap();
        assert_eq!(json, json!({"type": "tag", "value": "v*", "decoration": "excludes"}));

        let name = serde_json::to_value(Filter::name("library/**")).unwrap();
        assert!(name.get("decoration").is_none());
    }

    #[test]
    fn test_valid_filters() {
        assert!(Filter::name("library/**").is_valid());
        assert!(Filter::tag("v1.*").is_valid());
        assert!(Filter::label(["prod", "signed"]).is_valid());
        assert!(Filter::resource(ResourceType::Chart).is_valid());
        assert!(Filter::label(["x"]).with_decoration(Decoration::Excludes).is_valid());
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let filter = parse(json!({"type": "vendor", "value": "x"}));
        assert_eq!(filter.filter_type, FilterType::Unknown("vendor".into()));
        let errors = filter.validate().unwrap_err();
        assert_eq!(errors.first().unwrap().field, "type");
    }

    #[test]
    fn test_non_string_value_rejected() {
        assert!(!parse(json!({"type": "name", "value": 1})).is_valid());
        assert!(!parse(json!({"type": "tag", "value": ["a"]})).is_valid());
        assert!(!parse(json!({"type": "label", "value": "a"})).is_valid());
        assert!(!parse(json!({"type": "label", "value": ["a", 2]})).is_valid());
    }

    #[test]
    fn test_unknown_resource_value_rejected() {
        assert!(!parse(json!({"type": "resource", "value": "repository"})).is_valid());
        assert!(parse(json!({"type": "resource", "value": "image"})).is_valid());
    }

    #[test]
    fn test_decoration_rules() {
        let on_name = parse(json!({"type": "name", "value": "a/**", "decoration": "matches"}));
        assert!(!on_name.is_valid());

        let on_resource = parse(json!({
            "type": "resource",
            "value": "image",
            "decoration": "excludes"
        }));
        assert!(!on_resource.is_valid());

        let bogus = parse(json!({"type": "tag", "value": "*", "decoration": "sometimes"}));
        let errors = bogus.validate().unwrap_err();
        assert_eq!(errors.first().unwrap().field, "decoration");
    }

    #[test]
    fn test_effective_decoration_defaults_to_matches() {
        let filter = parse(json!({"type": "tag", "value": "*"}));
        assert_eq!(filter.effective_decoration(), Decoration::Matches);
    }

    #[test]
    fn test_label_values_skip_non_strings() {
        let filter = parse(json!({"type": "label", "value": ["a", 1, "b"]}));
        assert_eq!(filter.label_values(), vec!["a".to_string(), "b".to_string()]);
    }
}
