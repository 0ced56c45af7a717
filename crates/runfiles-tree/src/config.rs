//! Runfiles configuration.
//!
//! Loaded from TOML, e.g.
//!
//! ```toml
//! buildRunfileLinks = true
//! symlinksMode = "create"
//! conflictPolicy = "warn"
//! legacyExternalRunfiles = false
//! ```

use crate::{
    Artifact, ConflictPolicy, Error, Result, RunfileSymlinksMode, Runfiles, RunfilesTree,
    TreeView, resolve_symlinks_mode,
};
use serde::{Deserialize, Serialize};

/// Build-wide runfiles settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct RunfilesConfig {
    /// Global switch for creating runfiles symlinks during the build.
    pub build_runfile_links: bool,

    /// Symlink mode for trees created through [`RunfilesConfig::tree`].
    pub symlinks_mode: RunfileSymlinksMode,

    /// Default conflict policy for [`crate::RunfilesBuilder::with_config`].
    pub conflict_policy: ConflictPolicy,

    /// Also place external-repository runfiles under `<workspace>/external`.
    pub legacy_external_runfiles: bool,
}

impl Default for RunfilesConfig {
    fn default() -> Self {
        Self {
            build_runfile_links: true,
            symlinks_mode: RunfileSymlinksMode::default(),
            conflict_policy: ConflictPolicy::default(),
            legacy_external_runfiles: false,
        }
    }
}

impl RunfilesConfig {
    /// Parse configuration from TOML; missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] on malformed TOML or unknown values.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input)
            .map_err(|e| Error::configuration(format!("Failed to parse runfiles config: {e}")))
    }

    /// Create a tree using this configuration's symlink settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `root_path` is not relative.
    pub fn tree(
        &self,
        root_path: impl AsRef<str>,
        runfiles: Runfiles,
        repo_mapping_manifest: Option<Artifact>,
    ) -> Result<RunfilesTree> {
        RunfilesTree::new(
            root_path,
            runfiles,
            repo_mapping_manifest,
            self.symlinks_mode,
            self.build_runfile_links,
        )
    }

    /// Mode applied to `tree` given the global link switch.
    #[must_use]
    pub fn effective_symlinks_mode(&self, tree: &dyn TreeView) -> RunfileSymlinksMode {
        resolve_symlinks_mode(
            tree.symlinks_mode(),
            self.build_runfile_links && tree.is_build_runfile_links(),
        )
    }
}
