//! Exec-relative paths.
//!
//! Every path handled by this crate (tree roots, runfile locations, artifact
//! exec paths) is relative to the execution root. [`RelPath`] enforces that
//! at construction and normalises the textual form so that two spellings of
//! the same location compare equal.

use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// A normalised, forward-slash separated path relative to the execution root.
///
/// Normalisation drops empty and `.` segments. Absolute paths and `..`
/// segments are rejected. The empty path denotes the execution root itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct RelPath(String);

impl RelPath {
    /// Parse and normalise a relative path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the path is absolute or contains
    /// a `..` segment.
    pub fn new(path: impl AsRef<str>) -> Result<Self> {
        let raw = path.as_ref();
        if is_absolute(raw) {
            return Err(Error::invalid_argument(format!(
                "path must be relative, got absolute path '{raw}'"
            )));
        }

        let mut normalised = String::with_capacity(raw.len());
        for segment in raw.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    return Err(Error::invalid_argument(format!(
                        "path must not escape with '..': '{raw}'"
                    )));
                }
                segment => {
                    if !normalised.is_empty() {
                        normalised.push('/');
                    }
                    normalised.push_str(segment);
                }
            }
        }
        Ok(Self(normalised))
    }

    /// Wrap a string already known to be normalised (e.g. a prefix of a `RelPath`).
    pub(crate) fn from_normalised(path: &str) -> Self {
        Self(path.to_string())
    }

    /// The empty path (the execution root).
    #[must_use]
    pub const fn empty() -> Self {
        Self(String::new())
    }

    /// Returns true if this is the empty path.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The normalised textual form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the path segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Append another relative path.
    #[must_use]
    pub fn join(&self, other: &Self) -> Self {
        match (self.is_empty(), other.is_empty()) {
            (_, true) => self.clone(),
            (true, false) => other.clone(),
            (false, false) => Self(format!("{}/{}", self.0, other.0)),
        }
    }

    /// Segment-wise prefix check. The empty path is a prefix of every path.
    #[must_use]
    pub fn starts_with(&self, prefix: &Self) -> bool {
        if prefix.is_empty() {
            return true;
        }
        self.0
            .strip_prefix(prefix.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }

    /// The parent directory, or `None` for the empty path.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_empty() {
            return None;
        }
        Some(match self.0.rfind('/') {
            Some(idx) => Self(self.0[..idx].to_string()),
            None => Self::empty(),
        })
    }

    /// All proper ancestors, nearest first, excluding the empty path.
    pub fn ancestors(&self) -> impl Iterator<Item = &str> {
        self.0
            .match_indices('/')
            .map(|(idx, _)| &self.0[..idx])
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
    }
}

fn is_absolute(raw: &str) -> bool {
    if raw.starts_with('/') || raw.starts_with('\\') {
        return true;
    }
    let bytes = raw.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

impl fmt::Display for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RelPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for RelPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<&str> for RelPath {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> RelPath {
        RelPath::new(s).unwrap()
    }

    #[test]
    fn test_normalisation() {
        assert_eq!(p("./a//b/").as_str(), "a/b");
        assert_eq!(p("a/./b"), p("a/b"));
        assert!(p("").is_empty());
        assert!(p(".").is_empty());
    }

    #[test]
    fn test_absolute_rejected() {
        for raw in ["/abs", "/", "\\share\\x", "C:/Windows", "c:relative"] {
            let err = RelPath::new(raw).unwrap_err();
            assert!(err.is_invalid_argument(), "{raw} should be rejected");
        }
    }

    #[test]
    fn test_parent_escape_rejected() {
        assert!(RelPath::new("a/../b").is_err());
        assert!(RelPath::new("..").is_err());
        // A segment merely containing dots is fine.
        assert_eq!(p("a/..b").as_str(), "a/..b");
    }

    #[test]
    fn test_join() {
        assert_eq!(p("a").join(&p("b/c")), p("a/b/c"));
        assert_eq!(RelPath::empty().join(&p("b")), p("b"));
        assert_eq!(p("a").join(&RelPath::empty()), p("a"));
    }

    #[test]
    fn test_starts_with_is_segment_wise() {
        assert!(p("a/b/c").starts_with(&p("a/b")));
        assert!(p("a/b").starts_with(&p("a/b")));
        assert!(!p("a/bc").starts_with(&p("a/b")));
        assert!(p("a").starts_with(&RelPath::empty()));
    }

    #[test]
    fn test_parent_and_ancestors() {
        assert_eq!(p("a/b/c").parent(), Some(p("a/b")));
        assert_eq!(p("a").parent(), Some(RelPath::empty()));
        assert_eq!(RelPath::empty().parent(), None);
        let path = p("a/b/c");
        let ancestors: Vec<&str> = path.ancestors().collect();
        assert_eq!(ancestors, vec!["a/b", "a"]);
    }

    #[test]
    fn test_segments() {
        let path = p("x/y/z");
        let segments: Vec<&str> = path.segments().collect();
        assert_eq!(segments, vec!["x", "y", "z"]);
        assert_eq!(RelPath::empty().segments().count(), 0);
    }
}
