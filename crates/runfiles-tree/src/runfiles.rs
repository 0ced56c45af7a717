//! Runfiles contributions collected from upstream targets.
//!
//! A [`Runfiles`] value is the unresolved source of a runfiles tree: the
//! artifacts and explicit symlinks each contributor declared, kept in
//! declaration order. Flattening them into a path mapping happens in
//! [`crate::mapping`].

use crate::{Artifact, ConflictPolicy, Error, RelPath, Result, RunfilesConfig};
use std::collections::HashSet;
use tracing::debug;

/// Declared runtime dependencies for one workspace, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Runfiles {
    workspace_name: RelPath,
    artifacts: Vec<Artifact>,
    symlinks: Vec<(RelPath, Artifact)>,
    root_symlinks: Vec<(RelPath, Artifact)>,
    conflict_policy: ConflictPolicy,
    legacy_external_runfiles: bool,
}

impl Runfiles {
    /// Start building runfiles for the given workspace name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the workspace name is empty or
    /// not a valid relative path.
    pub fn builder(workspace_name: impl AsRef<str>) -> Result<RunfilesBuilder> {
        RunfilesBuilder::new(workspace_name)
    }

    /// Runfiles with no contributions.
    ///
    /// # Errors
    ///
    /// Same as [`Runfiles::builder`].
    pub fn empty(workspace_name: impl AsRef<str>) -> Result<Self> {
        Ok(RunfilesBuilder::new(workspace_name)?.build())
    }

    /// Workspace suffix; main-repository entries are placed under it.
    #[must_use]
    pub fn workspace_name(&self) -> &RelPath {
        &self.workspace_name
    }

    /// Artifacts placed at their own runfiles path.
    #[must_use]
    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    /// Explicit aliases, relative to the workspace directory.
    #[must_use]
    pub fn symlinks(&self) -> &[(RelPath, Artifact)] {
        &self.symlinks
    }

    /// Explicit aliases, relative to the tree root.
    #[must_use]
    pub fn root_symlinks(&self) -> &[(RelPath, Artifact)] {
        &self.root_symlinks
    }

    /// Policy applied to path conflicts while flattening.
    #[must_use]
    pub const fn conflict_policy(&self) -> ConflictPolicy {
        self.conflict_policy
    }

    /// Whether external-repository artifacts are also placed under
    /// `<workspace>/external/<repo>`.
    #[must_use]
    pub const fn legacy_external_runfiles(&self) -> bool {
        self.legacy_external_runfiles
    }

    /// Returns true if nothing was contributed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty() && self.symlinks.is_empty() && self.root_symlinks.is_empty()
    }

    /// Every referenced artifact, de-duplicated, in first-occurrence order.
    ///
    /// Artifacts come first, then symlink targets, then root symlink targets.
    #[must_use]
    pub fn all_artifacts(&self) -> Vec<Artifact> {
        let mut seen = HashSet::new();
        self.artifacts
            .iter()
            .chain(self.symlinks.iter().map(|(_, a)| a))
            .chain(self.root_symlinks.iter().map(|(_, a)| a))
            .filter(|a| seen.insert((*a).clone()))
            .cloned()
            .collect()
    }
}

/// Builder for [`Runfiles`].
#[derive(Debug, Clone)]
pub struct RunfilesBuilder {
    runfiles: Runfiles,
}

impl RunfilesBuilder {
    /// Create a builder for the given workspace name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the workspace name is empty or
    /// not a valid relative path.
    pub fn new(workspace_name: impl AsRef<str>) -> Result<Self> {
        let raw = workspace_name.as_ref();
        let workspace_name = RelPath::new(raw)?;
        if workspace_name.is_empty() {
            return Err(Error::invalid_argument(format!(
                "workspace name must not be empty, got '{raw}'"
            )));
        }
        Ok(Self {
            runfiles: Runfiles {
                workspace_name,
                artifacts: Vec::new(),
                symlinks: Vec::new(),
                root_symlinks: Vec::new(),
                conflict_policy: ConflictPolicy::default(),
                legacy_external_runfiles: false,
            },
        })
    }

    /// Apply conflict policy and legacy layout defaults from configuration.
    #[must_use]
    pub fn with_config(mut self, config: &RunfilesConfig) -> Self {
        self.runfiles.conflict_policy = config.conflict_policy;
        self.runfiles.legacy_external_runfiles = config.legacy_external_runfiles;
        self
    }

    /// Set the conflict policy.
    #[must_use]
    pub fn conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.runfiles.conflict_policy = policy;
        self
    }

    /// Enable or disable the legacy `<workspace>/external/<repo>` layout.
    #[must_use]
    pub fn legacy_external_runfiles(mut self, enabled: bool) -> Self {
        self.runfiles.legacy_external_runfiles = enabled;
        self
    }

    /// Add an artifact at its own runfiles path.
    #[must_use]
    pub fn add_artifact(mut self, artifact: Artifact) -> Self {
        self.runfiles.artifacts.push(artifact);
        self
    }

    /// Add several artifacts, preserving iteration order.
    #[must_use]
    pub fn add_artifacts(mut self, artifacts: impl IntoIterator<Item = Artifact>) -> Self {
        self.runfiles.artifacts.extend(artifacts);
        self
    }

    /// Add an alias under the workspace directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `path` is empty or not relative.
    pub fn add_symlink(mut self, path: impl AsRef<str>, artifact: Artifact) -> Result<Self> {
        let path = entry_path(path.as_ref())?;
        self.runfiles.symlinks.push((path, artifact));
        Ok(self)
    }

    /// Add an alias relative to the tree root.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `path` is empty or not relative.
    pub fn add_root_symlink(mut self, path: impl AsRef<str>, artifact: Artifact) -> Result<Self> {
        let path = entry_path(path.as_ref())?;
        self.runfiles.root_symlinks.push((path, artifact));
        Ok(self)
    }

    /// Append another contributor's runfiles after everything added so far.
    ///
    /// The stricter of the two conflict policies is kept and the legacy
    /// layout is enabled if either side enables it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `other` belongs to a different workspace.
    pub fn merge(mut self, other: &Runfiles) -> Result<Self> {
        if other.workspace_name != self.runfiles.workspace_name {
            return Err(Error::invalid_argument(format!(
                "cannot merge runfiles of workspace '{}' into workspace '{}'",
                other.workspace_name, self.runfiles.workspace_name
            )));
        }
        let target = &mut self.runfiles;
        target.artifacts.extend(other.artifacts.iter().cloned());
        target.symlinks.extend(other.symlinks.iter().cloned());
        target
            .root_symlinks
            .extend(other.root_symlinks.iter().cloned());
        target.conflict_policy = target.conflict_policy.combine(other.conflict_policy);
        target.legacy_external_runfiles |= other.legacy_external_runfiles;
        Ok(self)
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> Runfiles {
        debug!(
            workspace = %self.runfiles.workspace_name,
            artifacts = self.runfiles.artifacts.len(),
            symlinks = self.runfiles.symlinks.len(),
            root_symlinks = self.runfiles.root_symlinks.len(),
            "Built runfiles"
        );
        self.runfiles
    }
}

fn entry_path(raw: &str) -> Result<RelPath> {
    let path = RelPath::new(raw)?;
    if path.is_empty() {
        return Err(Error::invalid_argument(format!(
            "runfiles symlink path must not be empty, got '{raw}'"
        )));
    }
    Ok(path)
}
