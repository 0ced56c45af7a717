//! Runfiles suppliers: the runfiles trees held by one executable action.
//!
//! [`SingleRunfilesSupplier`] adapts one tree to both read contracts: it is a
//! [`TreeView`] in its own right and a [`TreeCollectionView`] whose only
//! element is itself. [`CompositeRunfilesSupplier`] holds any number of trees
//! with distinct roots. [`RunfilesSupplier`] is the variant owners store.

use crate::{
    Artifact, Error, RelPath, Result, RunfileSymlinksMode, Runfiles, RunfilesDiagnostic,
    RunfilesMapping, RunfilesTree, TreeCollectionView, TreeView,
};
use std::collections::HashMap;
use tracing::debug;

/// Supplier wrapping exactly one runfiles tree.
#[derive(Debug, Clone)]
pub struct SingleRunfilesSupplier {
    tree: RunfilesTree,
}

impl SingleRunfilesSupplier {
    /// Create a supplier mapping `runfiles` under `root_path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `root_path` is not relative.
    pub fn new(
        root_path: impl AsRef<str>,
        runfiles: Runfiles,
        repo_mapping_manifest: Option<Artifact>,
        symlinks_mode: RunfileSymlinksMode,
        build_runfile_links: bool,
    ) -> Result<Self> {
        let tree = RunfilesTree::new(
            root_path,
            runfiles,
            repo_mapping_manifest,
            symlinks_mode,
            build_runfile_links,
        )?;
        Ok(Self { tree })
    }

    /// Wrap an existing tree.
    #[must_use]
    pub const fn from_tree(tree: RunfilesTree) -> Self {
        Self { tree }
    }

    /// The wrapped tree.
    #[must_use]
    pub const fn tree(&self) -> &RunfilesTree {
        &self.tree
    }

    /// Unwrap into the tree handle.
    #[must_use]
    pub fn into_tree(self) -> RunfilesTree {
        self.tree
    }
}

impl TreeView for SingleRunfilesSupplier {
    fn root_path(&self) -> &RelPath {
        self.tree.root_path()
    }

    fn mapping(&self) -> Result<&RunfilesMapping> {
        self.tree.mapping()
    }

    fn diagnostics(&self) -> Result<&[RunfilesDiagnostic]> {
        self.tree.diagnostics()
    }

    fn artifacts(&self) -> &[Artifact] {
        self.tree.artifacts()
    }

    fn symlinks_mode(&self) -> RunfileSymlinksMode {
        self.tree.symlinks_mode()
    }

    fn is_build_runfile_links(&self) -> bool {
        self.tree.is_build_runfile_links()
    }

    fn workspace_name(&self) -> &str {
        self.tree.workspace_name()
    }
}

impl TreeCollectionView for SingleRunfilesSupplier {
    fn runfiles_trees(&self) -> Vec<&dyn TreeView> {
        vec![self as &dyn TreeView]
    }
}

/// Supplier holding several runfiles trees with pairwise distinct roots.
///
/// The same tree handle supplied twice is kept once. Distinct trees that
/// share a root path are rejected by [`CompositeRunfilesSupplier::new`].
#[derive(Debug, Clone, Default)]
pub struct CompositeRunfilesSupplier {
    trees: Vec<RunfilesTree>,
}

impl CompositeRunfilesSupplier {
    /// Collect trees, keeping their order.
    ///
    /// Passing the same tree handle more than once keeps only the first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if two distinct trees share a root path.
    pub fn new(trees: impl IntoIterator<Item = RunfilesTree>) -> Result<Self> {
        let mut kept: Vec<RunfilesTree> = Vec::new();
        let mut roots: HashMap<RelPath, usize> = HashMap::new();

        for tree in trees {
            match roots.get(tree.root_path()) {
                Some(&idx) if kept[idx].ptr_eq(&tree) => {
                    debug!(root = %tree.root_path(), "Skipping repeated runfiles tree");
                }
                Some(&idx) => {
                    return Err(Error::invalid_argument(format!(
                        "runfiles trees for workspaces '{}' and '{}' share root '{}'",
                        kept[idx].workspace_name(),
                        tree.workspace_name(),
                        tree.root_path()
                    )));
                }
                None => {
                    roots.insert(tree.root_path().clone(), kept.len());
                    kept.push(tree);
                }
            }
        }

        debug!(trees = kept.len(), "Created composite runfiles supplier");
        Ok(Self { trees: kept })
    }

    /// The trees, in order.
    #[must_use]
    pub fn trees(&self) -> &[RunfilesTree] {
        &self.trees
    }
}

impl TreeCollectionView for CompositeRunfilesSupplier {
    fn runfiles_trees(&self) -> Vec<&dyn TreeView> {
        self.trees.iter().map(|t| t as &dyn TreeView).collect()
    }
}

/// The runfiles an action carries: none, one tree, or several.
#[derive(Debug, Clone, Default)]
pub enum RunfilesSupplier {
    /// No runfiles.
    #[default]
    Empty,
    /// Exactly one tree.
    Single(SingleRunfilesSupplier),
    /// Any number of trees with distinct roots.
    Composite(CompositeRunfilesSupplier),
}

impl RunfilesSupplier {
    /// Choose the variant matching the number of distinct trees.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if two distinct trees share a root path.
    pub fn from_trees(trees: impl IntoIterator<Item = RunfilesTree>) -> Result<Self> {
        let mut composite = CompositeRunfilesSupplier::new(trees)?;
        if composite.trees.len() > 1 {
            return Ok(Self::Composite(composite));
        }
        Ok(composite
            .trees
            .pop()
            .map_or(Self::Empty, |tree| Self::Single(SingleRunfilesSupplier::from_tree(tree))))
    }

    /// Flatten several suppliers into one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if two distinct trees share a root path.
    pub fn compose<'a>(suppliers: impl IntoIterator<Item = &'a Self>) -> Result<Self> {
        Self::from_trees(suppliers.into_iter().flat_map(Self::tree_handles))
    }

    /// Owned handles to every tree, in order.
    #[must_use]
    pub fn tree_handles(&self) -> Vec<RunfilesTree> {
        match self {
            Self::Empty => Vec::new(),
            Self::Single(single) => vec![single.tree().clone()],
            Self::Composite(composite) => composite.trees().to_vec(),
        }
    }

    /// The single-tree adapter, if this supplier holds exactly one tree.
    #[must_use]
    pub const fn as_single(&self) -> Option<&SingleRunfilesSupplier> {
        match self {
            Self::Single(single) => Some(single),
            _ => None,
        }
    }
}

impl TreeCollectionView for RunfilesSupplier {
    fn runfiles_trees(&self) -> Vec<&dyn TreeView> {
        match self {
            Self::Empty => Vec::new(),
            Self::Single(single) => single.runfiles_trees(),
            Self::Composite(composite) => composite.runfiles_trees(),
        }
    }
}

impl From<RunfilesTree> for RunfilesSupplier {
    fn from(tree: RunfilesTree) -> Self {
        Self::Single(SingleRunfilesSupplier::from_tree(tree))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn src(path: &str) -> Artifact {
        Artifact::source(path).unwrap()
    }

    fn runfiles(workspace: &str, file: &str) -> Runfiles {
        Runfiles::builder(workspace)
            .unwrap()
            .add_artifact(src(file))
            .build()
    }

    fn tree(root: &str, workspace: &str, file: &str) -> RunfilesTree {
        RunfilesTree::new(
            root,
            runfiles(workspace, file),
            None,
            RunfileSymlinksMode::Create,
            true,
        )
        .unwrap()
    }

    fn same_object(view: &dyn TreeView, supplier: &SingleRunfilesSupplier) -> bool {
        std::ptr::addr_eq(
            view as *const dyn TreeView,
            supplier as *const SingleRunfilesSupplier,
        )
    }

    #[test]
    fn test_single_supplier_is_its_own_collection() {
        let manifest = Artifact::derived("out/bin", "tool.repo_mapping").unwrap();
        let supplier = SingleRunfilesSupplier::new(
            "out/bin/tool.runfiles",
            runfiles("_main", "data.txt"),
            Some(manifest),
            RunfileSymlinksMode::Force,
            false,
        )
        .unwrap();

        let trees = supplier.runfiles_trees();
        assert_eq!(trees.len(), 1);
        assert!(same_object(trees[0], &supplier));
        assert_eq!(supplier.len(), 1);
        assert!(!supplier.is_empty());
    }

    #[test]
    fn test_single_supplier_delegates_to_tree() {
        let t = tree("tool.runfiles", "_main", "data.txt");
        let supplier = SingleRunfilesSupplier::from_tree(t.clone());

        assert_eq!(supplier.root_path(), t.root_path());
        assert_eq!(supplier.mapping().unwrap(), t.mapping().unwrap());
        assert_eq!(supplier.artifacts(), t.artifacts());
        assert_eq!(supplier.symlinks_mode(), t.symlinks_mode());
        assert_eq!(supplier.is_build_runfile_links(), t.is_build_runfile_links());
        assert_eq!(supplier.workspace_name(), t.workspace_name());
        assert_eq!(supplier.effective_symlinks_mode(), t.effective_symlinks_mode());
        assert!(supplier.tree().ptr_eq(&t));
    }

    #[test]
    fn test_single_supplier_rejects_absolute_root() {
        let err = SingleRunfilesSupplier::new(
            "/abs/tool.runfiles",
            runfiles("_main", "data.txt"),
            None,
            RunfileSymlinksMode::Create,
            true,
        )
        .unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_composite_rejects_shared_root() {
        let err = CompositeRunfilesSupplier::new([
            tree("shared.runfiles", "_main", "a.txt"),
            tree("shared.runfiles", "other", "b.txt"),
        ])
        .unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_composite_root_check_uses_normalised_paths() {
        let err = CompositeRunfilesSupplier::new([
            tree("out/shared.runfiles", "_main", "a.txt"),
            tree("./out//shared.runfiles/", "_main", "b.txt"),
        ]);
        assert!(err.is_err());
    }

    #[test]
    fn test_composite_deduplicates_same_tree() {
        let t = tree("a.runfiles", "_main", "a.txt");
        let composite =
            CompositeRunfilesSupplier::new([t.clone(), tree("b.runfiles", "_main", "b.txt"), t])
                .unwrap();
        assert_eq!(composite.len(), 2);
        let trees = composite.runfiles_trees();
        let roots: Vec<&str> = trees
            .iter()
            .map(|t| t.root_path().as_str())
            .collect();
        assert_eq!(roots, vec!["a.runfiles", "b.runfiles"]);
    }

    #[test]
    fn test_all_artifacts_across_trees() {
        let composite = CompositeRunfilesSupplier::new([
            tree("a.runfiles", "_main", "shared.txt"),
            tree("b.runfiles", "_main", "shared.txt"),
            tree("c.runfiles", "_main", "c.txt"),
        ])
        .unwrap();
        let all: Vec<String> = composite
            .all_artifacts()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(all, vec!["shared.txt", "c.txt"]);
    }

    #[test]
    fn test_from_trees_picks_variant() {
        assert!(matches!(
            RunfilesSupplier::from_trees(Vec::new()).unwrap(),
            RunfilesSupplier::Empty
        ));

        let single = RunfilesSupplier::from_trees([tree("a.runfiles", "_main", "a")]).unwrap();
        assert!(single.as_single().is_some());
        assert_eq!(single.len(), 1);

        let multi = RunfilesSupplier::from_trees([
            tree("a.runfiles", "_main", "a"),
            tree("b.runfiles", "_main", "b"),
        ])
        .unwrap();
        assert!(matches!(multi, RunfilesSupplier::Composite(_)));
        assert_eq!(multi.len(), 2);
    }

    #[test]
    fn test_compose_flattens_and_checks_roots() {
        let a = RunfilesSupplier::from(tree("a.runfiles", "_main", "a"));
        let b = RunfilesSupplier::from(tree("b.runfiles", "_main", "b"));
        let composed = RunfilesSupplier::compose([&a, &b, &RunfilesSupplier::Empty]).unwrap();
        assert_eq!(composed.len(), 2);

        let clash = RunfilesSupplier::from(tree("a.runfiles", "other", "z"));
        assert!(RunfilesSupplier::compose([&a, &clash]).is_err());
    }
}
