//! Symlink creation policy for runfiles trees.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How the materialization layer treats on-disk runfiles symlinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunfileSymlinksMode {
    /// Never create symlinks; consumers read the mapping directly.
    Skip,
    /// Create symlinks that are missing.
    #[default]
    Create,
    /// Recreate every symlink unconditionally.
    Force,
}

impl RunfileSymlinksMode {
    /// Returns true unless the mode is [`RunfileSymlinksMode::Skip`].
    #[must_use]
    pub const fn creates_symlinks(self) -> bool {
        !matches!(self, Self::Skip)
    }
}

impl fmt::Display for RunfileSymlinksMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skip => write!(f, "skip"),
            Self::Create => write!(f, "create"),
            Self::Force => write!(f, "force"),
        }
    }
}

/// Resolve the mode actually applied when a tree is materialized.
///
/// Links are skipped entirely when `build_runfile_links` is false; otherwise
/// the configured mode applies unchanged.
#[must_use]
pub const fn resolve_symlinks_mode(
    mode: RunfileSymlinksMode,
    build_runfile_links: bool,
) -> RunfileSymlinksMode {
    if build_runfile_links {
        mode
    } else {
        RunfileSymlinksMode::Skip
    }
}
