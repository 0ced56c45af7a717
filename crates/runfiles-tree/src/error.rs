//! Error types for runfiles tree operations.

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Result type for runfiles tree operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or resolving runfiles trees.
///
/// Construction problems surface as [`Error::InvalidArgument`] immediately;
/// mapping problems surface when the mapping is first requested.
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum Error {
    /// A constructor or builder received an unusable argument.
    #[error("Invalid argument: {message}")]
    #[diagnostic(code(runfiles::invalid_argument))]
    InvalidArgument {
        /// Description of the rejected argument.
        message: String,
    },

    /// A real runfile claims the path reserved for the repo-mapping manifest.
    #[error("Runfile '{path}' ({artifact}) collides with the repo mapping manifest ({manifest})")]
    #[diagnostic(
        code(runfiles::unresolvable_conflict),
        help("Rename the runfile; this path is reserved when a repo mapping manifest is present")
    )]
    UnresolvableConflict {
        /// The reserved path.
        path: String,
        /// Exec path of the artifact already mapped at the reserved path.
        artifact: String,
        /// Exec path of the repo-mapping manifest.
        manifest: String,
    },

    /// Two different artifacts claim one path under the strict conflict policy.
    #[error("Runfiles path '{path}' is claimed by both '{previous}' and '{replacement}'")]
    #[diagnostic(
        code(runfiles::path_conflict),
        help("Use a different symlink path or relax the conflict policy")
    )]
    PathConflict {
        /// Path inside the runfiles tree.
        path: String,
        /// Exec path of the artifact inserted first.
        previous: String,
        /// Exec path of the artifact inserted second.
        replacement: String,
    },

    /// Runfiles configuration could not be parsed.
    #[error("Runfiles configuration error: {message}")]
    #[diagnostic(code(runfiles::config))]
    Configuration {
        /// Error message describing the configuration issue.
        message: String,
    },
}

impl Error {
    /// Create an invalid-argument error.
    #[must_use]
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: msg.into(),
        }
    }

    /// Create a configuration error.
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    /// Returns true for errors raised while constructing trees or suppliers.
    #[must_use]
    pub const fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }
}
