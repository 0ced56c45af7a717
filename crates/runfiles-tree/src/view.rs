//! Read contracts shared by runfiles trees and suppliers.
//!
//! Consumers that handle one tree program against [`TreeView`]; consumers
//! that handle every tree of an action program against
//! [`TreeCollectionView`]. A single-tree supplier implements both.

use crate::{
    Artifact, RelPath, Result, RunfileSymlinksMode, RunfilesDiagnostic, RunfilesMapping,
    resolve_symlinks_mode,
};
use std::collections::HashSet;

/// Read access to one runfiles tree.
pub trait TreeView {
    /// Exec-relative directory the tree is materialized under.
    ///
    /// Advisory until checked against the other trees of the same action.
    fn root_path(&self) -> &RelPath;

    /// The resolved path mapping, computed once and cached.
    ///
    /// # Errors
    ///
    /// Returns the flattening error if the mapping cannot be resolved.
    fn mapping(&self) -> Result<&RunfilesMapping>;

    /// Diagnostics recorded while resolving the mapping.
    ///
    /// # Errors
    ///
    /// Same as [`TreeView::mapping`].
    fn diagnostics(&self) -> Result<&[RunfilesDiagnostic]>;

    /// Every artifact the mapping references, in a stable order.
    fn artifacts(&self) -> &[Artifact];

    /// Configured symlink mode.
    fn symlinks_mode(&self) -> RunfileSymlinksMode;

    /// Whether symlinks are created during the build at all.
    fn is_build_runfile_links(&self) -> bool;

    /// Name of the owning workspace.
    fn workspace_name(&self) -> &str;

    /// Mode applied at materialization time.
    fn effective_symlinks_mode(&self) -> RunfileSymlinksMode {
        resolve_symlinks_mode(self.symlinks_mode(), self.is_build_runfile_links())
    }
}

/// Read access to all runfiles trees of one action.
pub trait TreeCollectionView {
    /// The trees, in order.
    fn runfiles_trees(&self) -> Vec<&dyn TreeView>;

    /// Number of trees.
    fn len(&self) -> usize {
        self.runfiles_trees().len()
    }

    /// Returns true if there are no trees.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Artifacts of every tree, de-duplicated, in tree order.
    fn all_artifacts(&self) -> Vec<Artifact> {
        let mut seen = HashSet::new();
        self.runfiles_trees()
            .into_iter()
            .flat_map(|tree| tree.artifacts())
            .filter(|a| seen.insert((*a).clone()))
            .cloned()
            .collect()
    }
}
