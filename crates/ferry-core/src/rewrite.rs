//! Source to destination repository path mapping.

use crate::error::{Error, Result};
use crate::model::PathComponentType;

/// Rewrites a source repository path under a destination namespace.
///
/// `replace_count` is the number of leading source components dropped before
/// the namespace is prefixed; a negative count keeps only the last component.
/// The result is then checked against the destination's path-component
/// constraint.
///
/// # Errors
///
/// Returns [`Error::BadRequest`] when `replace_count` exceeds the number of
/// components in front of the leaf, or when the result violates
/// `path_component_type`.
///
/// # Examples
///
/// ```
/// use ferry_core::model::PathComponentType;
/// use ferry_core::rewrite::replace_namespace;
///
/// let unconstrained = PathComponentType::Unconstrained;
/// assert_eq!(replace_namespace("a/b/c/image", "n", -1, unconstrained).unwrap(), "n/image");
/// assert_eq!(replace_namespace("a/b/c/image", "n", 1, unconstrained).unwrap(), "n/b/c/image");
/// assert!(replace_namespace("a/b/c/image", "n", 4, unconstrained).is_err());
/// ```
pub fn replace_namespace(
    repository: &str,
    namespace: &str,
    replace_count: i32,
    path_component_type: PathComponentType,
) -> Result<String> {
    if namespace.is_empty() {
        return Ok(repository.to_string());
    }

    let components: Vec<&str> = repository.split('/').filter(|c| !c.is_empty()).collect();
    let Some((leaf, parents)) = components.split_last() else {
        return Err(Error::bad_request(format!(
            "invalid repository name '{repository}'"
        )));
    };

    let rewritten = match usize::try_from(replace_count) {
        Err(_) => format!("{namespace}/{leaf}"),
        Ok(count) if count > parents.len() => {
            return Err(Error::bad_request(format!(
                "the replace count {count} exceeds the {} namespace level(s) of repository '{repository}'",
                parents.len()
            )));
        }
        Ok(count) => {
            let mut parts = vec![namespace];
            parts.extend_from_slice(&parents[count..]);
            parts.push(*leaf);
            parts.join("/")
        }
    };

    let collapsed: Vec<&str> = rewritten.split('/').filter(|c| !c.is_empty()).collect();
    check_path_components(&collapsed, path_component_type)?;
    Ok(collapsed.join("/"))
}

fn check_path_components(components: &[&str], constraint: PathComponentType) -> Result<()> {
    let violation = match constraint {
        PathComponentType::OnlyTwo if components.len() != 2 => "exactly 2",
        PathComponentType::AtLeastTwo if components.len() < 2 => "at least 2",
        _ => return Ok(()),
    };
    Err(Error::bad_request(format!(
        "the destination repository must have {violation} path components, got {}: [{}]",
        components.len(),
        components.join(", ")
    )))
}
