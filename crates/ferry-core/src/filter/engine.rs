//! The filter pipeline.
//!
//! Filters run in policy order, each as a pure function over the candidate
//! list. Tag and label filters work at artifact granularity and rebuild the
//! artifact list of every resource they touch; resources left without
//! artifacts are dropped.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{Error, Result};
use crate::filter::{Decoration, Filter, FilterType, Pattern};
use crate::model::{Artifact, Resource, ResourceType};

/// A filter compiled for execution.
#[derive(Debug, Clone)]
pub enum ResourceFilter {
    /// Keep resources of the given type.
    Resource(ResourceType),
    /// Keep resources whose repository name matches.
    Name(Pattern),
    /// Keep or drop tags by glob.
    Tag {
        /// Tag glob.
        pattern: Pattern,
        /// Whether matching tags are kept or dropped.
        excludes: bool,
    },
    /// Keep or drop artifacts by label intersection.
    Label {
        /// Labels to intersect with.
        labels: Vec<String>,
        /// Whether intersecting artifacts are kept or dropped.
        excludes: bool,
    },
}

impl ResourceFilter {
    /// Compiles a persisted filter.
    ///
    /// Returns `Ok(None)` for filters that select everything: an empty string
    /// value or an empty label list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadRequest`] for unknown kinds or decorations,
    /// mistyped values, or malformed globs.
    pub fn compile(filter: &Filter) -> Result<Option<Self>> {
        let excludes = match filter.effective_decoration() {
            Decoration::Matches => false,
            Decoration::Excludes => true,
            Decoration::Unknown(other) => {
                return Err(Error::bad_request(format!(
                    "invalid filter decoration: {other}"
                )))
            }
        };

        let compiled = match &filter.filter_type {
            FilterType::Label => {
                if !filter.value.is_array() {
                    return Err(Error::bad_request(
                        "the value of a label filter must be a list of strings",
                    ));
                }
                let labels = filter.label_values();
                if labels.is_empty() {
                    return Ok(None);
                }
                Self::Label { labels, excludes }
            }
            FilterType::Resource => {
                let Some(value) = non_empty_value(filter)? else {
                    return Ok(None);
                };
                Self::Resource(value.parse()?)
            }
            FilterType::Name => {
                let Some(value) = non_empty_value(filter)? else {
                    return Ok(None);
                };
                Self::Name(Pattern::new(value)?)
            }
            FilterType::Tag => {
                let Some(value) = non_empty_value(filter)? else {
                    return Ok(None);
                };
                Self::Tag {
                    pattern: Pattern::new(value)?,
                    excludes,
                }
            }
            FilterType::Unknown(kind) => {
                return Err(Error::bad_request(format!("invalid filter type: {kind}")))
            }
        };
        Ok(Some(compiled))
    }

    /// Applies the filter to a candidate list, preserving order.
    #[must_use]
    pub fn apply(&self, resources: Vec<Resource>) -> Vec<Resource> {
        match self {
            Self::Resource(resource_type) => resources
                .into_iter()
                .filter(|r| r.resource_type == *resource_type)
                .collect(),
            Self::Name(pattern) => resources
                .into_iter()
                .filter(|r| r.repository_name().is_some_and(|name| pattern.is_match(name)))
                .collect(),
            Self::Tag { pattern, excludes } => resources
                .into_iter()
                .filter_map(|r| filter_tags(r, pattern, *excludes))
                .collect(),
            Self::Label { labels, excludes } => resources
                .into_iter()
                .filter_map(|r| filter_labels(r, labels, *excludes))
                .collect(),
        }
    }
}

fn non_empty_value(filter: &Filter) -> Result<Option<&str>> {
    let value = filter.string_value().ok_or_else(|| {
        Error::bad_request(format!(
            "the value of a {} filter must be a string",
            filter.filter_type
        ))
    })?;
    Ok((!value.is_empty()).then_some(value))
}

fn keep_tag(pattern: &Pattern, excludes: bool, tag: &str) -> bool {
    pattern.is_match(tag) != excludes
}

fn filter_tags(mut resource: Resource, pattern: &Pattern, excludes: bool) -> Option<Resource> {
    let meta = resource.metadata.as_mut()?;

    if meta.artifacts.is_empty() {
        meta.vtags.retain(|tag| keep_tag(pattern, excludes, tag));
        return (!meta.vtags.is_empty()).then_some(resource);
    }

    let keep_untagged = excludes || pattern.is_match_all();
    meta.artifacts = std::mem::take(&mut meta.artifacts)
        .into_iter()
        .filter_map(|mut artifact| {
            if artifact.tags.is_empty() {
                return keep_untagged.then_some(artifact);
            }
            artifact.tags.retain(|tag| keep_tag(pattern, excludes, tag));
            (!artifact.tags.is_empty()).then_some(artifact)
        })
        .collect();

    (!meta.artifacts.is_empty()).then_some(resource)
}

fn filter_labels(mut resource: Resource, labels: &[String], excludes: bool) -> Option<Resource> {
    let meta = resource.metadata.as_mut()?;

    if meta.artifacts.is_empty() {
        // Nothing carries labels, so only an exclusion can let it through.
        return (excludes && !meta.vtags.is_empty()).then_some(resource);
    }

    meta.artifacts.retain(|artifact| {
        let intersects = artifact.labels.iter().any(|l| labels.contains(l));
        intersects != excludes
    });

    (!meta.artifacts.is_empty()).then_some(resource)
}

/// Merges artifacts sharing a digest, keeping the first position and the
/// union of their tags and labels.
fn dedup_artifacts(artifacts: Vec<Artifact>) -> Vec<Artifact> {
    let mut merged: Vec<Artifact> = Vec::with_capacity(artifacts.len());
    let mut by_digest: HashMap<String, usize> = HashMap::new();

    for artifact in artifacts {
        if artifact.digest.is_empty() {
            merged.push(artifact);
            continue;
        }
        if let Some(&idx) = by_digest.get(&artifact.digest) {
            let existing = &mut merged[idx];
            for tag in artifact.tags {
                if !existing.tags.contains(&tag) {
                    existing.tags.push(tag);
                }
            }
            for label in artifact.labels {
                if !existing.labels.contains(&label) {
                    existing.labels.push(label);
                }
            }
        } else {
            by_digest.insert(artifact.digest.clone(), merged.len());
            merged.push(artifact);
        }
    }
    merged
}

/// Compiles a filter list, skipping filters that select everything.
///
/// # Errors
///
/// Returns the first compilation error.
pub fn compile_filters(filters: &[Filter]) -> Result<Vec<ResourceFilter>> {
    filters
        .iter()
        .filter_map(|f| ResourceFilter::compile(f).transpose())
        .collect()
}

/// Applies an ordered filter list to a candidate list.
///
/// An empty filter list returns the input unchanged. Otherwise artifacts
/// sharing a digest within a resource are merged, so the output never holds
/// duplicates. The function is idempotent: applying the same list to its own
/// output yields that output.
///
/// # Errors
///
/// Returns [`Error::BadRequest`] if any filter fails to compile.
pub fn apply_filters(resources: Vec<Resource>, filters: &[Filter]) -> Result<Vec<Resource>> {
    if filters.is_empty() {
        return Ok(resources);
    }
    let compiled = compile_filters(filters)?;

    let mut resources: Vec<Resource> = resources
        .into_iter()
        .map(|mut r| {
            if let Some(meta) = r.metadata.as_mut() {
                meta.artifacts = dedup_artifacts(std::mem::take(&mut meta.artifacts));
            }
            r
        })
        .collect();

    let before = resources.len();
    for filter in &compiled {
        resources = filter.apply(resources);
    }
    debug!(
        filters = compiled.len(),
        before,
        after = resources.len(),
        "filters applied"
    );
    Ok(resources)
}

/// Returns the resource types named by resource filters in the list.
#[must_use]
pub fn resource_types_in(filters: &[Filter]) -> Vec<ResourceType> {
    filters
        .iter()
        .filter(|f| f.filter_type == FilterType::Resource)
        .filter_map(|f| f.string_value()?.parse().ok())
        .collect()
}
