//! Glob patterns for repository names and tags.

use globset::{GlobBuilder, GlobMatcher};

use crate::error::{Error, Result};

/// A compiled glob.
///
/// `*` and `?` stay within one path segment, `**` crosses `/`, and `{a,b}`
/// alternation is supported.
#[derive(Debug, Clone)]
pub struct Pattern {
    raw: String,
    matcher: GlobMatcher,
}

impl Pattern {
    /// Compiles a glob.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadRequest`] when the glob is malformed.
    pub fn new(raw: &str) -> Result<Self> {
        let glob = GlobBuilder::new(raw)
            .literal_separator(true)
            .backslash_escape(true)
            .build()
            .map_err(|e| Error::bad_request(format!("invalid pattern '{raw}': {e}")))?;
        Ok(Self {
            raw: raw.to_string(),
            matcher: glob.compile_matcher(),
        })
    }

    /// Returns the source text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns true if the candidate matches.
    #[must_use]
    pub fn is_match(&self, candidate: &str) -> bool {
        self.matcher.is_match(candidate)
    }

    /// Returns true for the catch-all `**`.
    #[must_use]
    pub fn is_match_all(&self) -> bool {
        self.raw == "**"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_star_stays_in_segment() {
        let pattern = Pattern::new("library/*").unwrap();
        assert!(pattern.is_match("library/hello-world"));
        assert!(!pattern.is_match("library/a/hello-world"));
    }

    #[test]
    fn test_double_star_crosses_segments() {
        let pattern = Pattern::new("library/**").unwrap();
        assert!(pattern.is_match("library/hello-world"));
        assert!(pattern.is_match("library/a/b/hello-world"));
        assert!(!pattern.is_match("other/hello-world"));
        assert!(Pattern::new("**").unwrap().is_match("a/b/c"));
    }

    #[test]
    fn test_question_mark_and_alternation() {
        assert!(Pattern::new("v?").unwrap().is_match("v1"));
        assert!(!Pattern::new("v?").unwrap().is_match("v10"));
        let alt = Pattern::new("{latest,v1.*}").unwrap();
        assert!(alt.is_match("latest"));
        assert!(alt.is_match("v1.2"));
        assert!(!alt.is_match("v2.0"));
    }

    #[test]
    fn test_malformed_pattern() {
        let err = Pattern::new("[abc").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::BadRequest);
    }

    #[test]
    fn test_match_all() {
        assert!(Pattern::new("**").unwrap().is_match_all());
        assert!(!Pattern::new("*").unwrap().is_match_all());
    }
}
