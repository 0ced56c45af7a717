//! A single runfiles tree.

use crate::{
    Artifact, Error, RelPath, ResolvedRunfiles, Result, RunfileSymlinksMode, Runfiles,
    RunfilesDiagnostic, RunfilesMapping, TreeView, resolve_mapping,
};
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::debug;

struct TreeInner {
    root_path: RelPath,
    runfiles: Runfiles,
    repo_mapping_manifest: Option<Artifact>,
    symlinks_mode: RunfileSymlinksMode,
    build_runfile_links: bool,
    artifacts: Vec<Artifact>,
    resolved: OnceLock<Result<ResolvedRunfiles>>,
}

/// One runtime-dependency directory of an executable.
///
/// Immutable after construction and cheap to clone; clones share the lazily
/// computed mapping. The first call to [`TreeView::mapping`] resolves the
/// mapping (concurrent first callers wait for that single computation) and
/// every later call returns the same cached result.
#[derive(Clone)]
pub struct RunfilesTree(Arc<TreeInner>);

impl RunfilesTree {
    /// Create a tree mapping `runfiles` under `root_path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `root_path` is absolute or escapes
    /// with `..`.
    pub fn new(
        root_path: impl AsRef<str>,
        runfiles: Runfiles,
        repo_mapping_manifest: Option<Artifact>,
        symlinks_mode: RunfileSymlinksMode,
        build_runfile_links: bool,
    ) -> Result<Self> {
        let raw = root_path.as_ref();
        let root_path = RelPath::new(raw).map_err(|e| {
            Error::invalid_argument(format!("invalid runfiles root '{raw}': {e}"))
        })?;

        let mut artifacts = runfiles.all_artifacts();
        if let Some(manifest) = &repo_mapping_manifest
            && !artifacts.contains(manifest)
        {
            artifacts.push(manifest.clone());
        }

        debug!(
            root = %root_path,
            workspace = %runfiles.workspace_name(),
            artifacts = artifacts.len(),
            %symlinks_mode,
            build_runfile_links,
            "Created runfiles tree"
        );

        Ok(Self(Arc::new(TreeInner {
            root_path,
            runfiles,
            repo_mapping_manifest,
            symlinks_mode,
            build_runfile_links,
            artifacts,
            resolved: OnceLock::new(),
        })))
    }

    /// Start building a tree rooted at `root_path`.
    #[must_use]
    pub fn builder(root_path: impl Into<String>) -> RunfilesTreeBuilder {
        RunfilesTreeBuilder::new(root_path)
    }

    /// The unresolved contributions this tree was built from.
    #[must_use]
    pub fn runfiles(&self) -> &Runfiles {
        &self.0.runfiles
    }

    /// The repo-mapping manifest, if one is injected.
    #[must_use]
    pub fn repo_mapping_manifest(&self) -> Option<&Artifact> {
        self.0.repo_mapping_manifest.as_ref()
    }

    /// Mapping and diagnostics together.
    ///
    /// # Errors
    ///
    /// Returns the cached flattening error, if resolution failed.
    pub fn resolved(&self) -> Result<&ResolvedRunfiles> {
        self.0
            .resolved
            .get_or_init(|| {
                resolve_mapping(&self.0.runfiles, self.0.repo_mapping_manifest.as_ref())
            })
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Returns true if both handles refer to the same tree.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl TreeView for RunfilesTree {
    fn root_path(&self) -> &RelPath {
        &self.0.root_path
    }

    fn mapping(&self) -> Result<&RunfilesMapping> {
        self.resolved().map(ResolvedRunfiles::mapping)
    }

    fn diagnostics(&self) -> Result<&[RunfilesDiagnostic]> {
        self.resolved().map(ResolvedRunfiles::diagnostics)
    }

    fn artifacts(&self) -> &[Artifact] {
        &self.0.artifacts
    }

    fn symlinks_mode(&self) -> RunfileSymlinksMode {
        self.0.symlinks_mode
    }

    fn is_build_runfile_links(&self) -> bool {
        self.0.build_runfile_links
    }

    fn workspace_name(&self) -> &str {
        self.0.runfiles.workspace_name().as_str()
    }
}

impl fmt::Debug for RunfilesTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunfilesTree")
            .field("root_path", &self.0.root_path)
            .field("workspace", &self.0.runfiles.workspace_name())
            .field("symlinks_mode", &self.0.symlinks_mode)
            .field("build_runfile_links", &self.0.build_runfile_links)
            .finish_non_exhaustive()
    }
}

/// Builder for [`RunfilesTree`] that reports missing fields as errors.
#[derive(Debug, Clone)]
pub struct RunfilesTreeBuilder {
    root_path: String,
    runfiles: Option<Runfiles>,
    repo_mapping_manifest: Option<Artifact>,
    symlinks_mode: Option<RunfileSymlinksMode>,
    build_runfile_links: bool,
}

impl RunfilesTreeBuilder {
    /// Start a builder; symlinks are built by default.
    #[must_use]
    pub fn new(root_path: impl Into<String>) -> Self {
        Self {
            root_path: root_path.into(),
            runfiles: None,
            repo_mapping_manifest: None,
            symlinks_mode: None,
            build_runfile_links: true,
        }
    }

    /// Set the contributions (required).
    #[must_use]
    pub fn runfiles(mut self, runfiles: Runfiles) -> Self {
        self.runfiles = Some(runfiles);
        self
    }

    /// Inject a repo-mapping manifest.
    #[must_use]
    pub fn repo_mapping_manifest(mut self, manifest: Artifact) -> Self {
        self.repo_mapping_manifest = Some(manifest);
        self
    }

    /// Set the symlink mode (required).
    #[must_use]
    pub fn symlinks_mode(mut self, mode: RunfileSymlinksMode) -> Self {
        self.symlinks_mode = Some(mode);
        self
    }

    /// Set whether symlinks are created during the build.
    #[must_use]
    pub fn build_runfile_links(mut self, enabled: bool) -> Self {
        self.build_runfile_links = enabled;
        self
    }

    /// Build the tree.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if runfiles or the symlink mode were
    /// never set, or the root path is invalid.
    pub fn build(self) -> Result<RunfilesTree> {
        let runfiles = self.runfiles.ok_or_else(|| {
            Error::invalid_argument(format!("runfiles tree '{}' has no runfiles", self.root_path))
        })?;
        let symlinks_mode = self.symlinks_mode.ok_or_else(|| {
            Error::invalid_argument(format!(
                "runfiles tree '{}' has no symlink mode",
                self.root_path
            ))
        })?;
        RunfilesTree::new(
            self.root_path,
            runfiles,
            self.repo_mapping_manifest,
            symlinks_mode,
            self.build_runfile_links,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConflictPolicy, REPO_MAPPING_MANIFEST_PATH};

    fn src(path: &str) -> Artifact {
        Artifact::source(path).unwrap()
    }

    fn runfiles() -> Runfiles {
        Runfiles::builder("_main")
            .unwrap()
            .add_artifact(src("pkg/data.txt"))
            .add_symlink("alias.txt", src("pkg/real.txt"))
            .unwrap()
            .build()
    }

    fn tree(root: &str) -> Result<RunfilesTree> {
        RunfilesTree::new(root, runfiles(), None, RunfileSymlinksMode::Create, true)
    }

    #[test]
    fn test_relative_root_accepted() {
        let tree = tree("out/bin/pkg/tool.runfiles").unwrap();
        assert_eq!(tree.root_path().as_str(), "out/bin/pkg/tool.runfiles");
        assert_eq!(tree.workspace_name(), "_main");
        assert_eq!(tree.symlinks_mode(), RunfileSymlinksMode::Create);
        assert!(tree.is_build_runfile_links());
    }

    #[test]
    fn test_absolute_root_rejected() {
        let err = tree("/tmp/tool.runfiles").unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_mapping_is_cached() {
        let tree = tree("tool.runfiles").unwrap();
        let first = tree.mapping().unwrap();
        let second = tree.mapping().unwrap();
        assert_eq!(first, second);
        assert!(std::ptr::eq(first, second));
        assert_eq!(first.len(), 2);
        assert!(first.contains("_main/alias.txt"));
    }

    #[test]
    fn test_clones_share_mapping() {
        let tree = tree("tool.runfiles").unwrap();
        let clone = tree.clone();
        assert!(tree.ptr_eq(&clone));
        assert!(std::ptr::eq(tree.mapping().unwrap(), clone.mapping().unwrap()));
    }

    #[test]
    fn test_artifacts_include_manifest() {
        let manifest = Artifact::derived("out/bin", "pkg/tool.repo_mapping").unwrap();
        let tree = RunfilesTree::new(
            "tool.runfiles",
            runfiles(),
            Some(manifest.clone()),
            RunfileSymlinksMode::Skip,
            false,
        )
        .unwrap();
        let names: Vec<String> = tree.artifacts().iter().map(ToString::to_string).collect();
        assert_eq!(
            names,
            vec![
                "pkg/data.txt",
                "pkg/real.txt",
                "out/bin/pkg/tool.repo_mapping"
            ]
        );
        assert_eq!(tree.repo_mapping_manifest(), Some(&manifest));
        assert_eq!(
            tree.mapping().unwrap().get(REPO_MAPPING_MANIFEST_PATH),
            Some(&manifest)
        );
    }

    #[test]
    fn test_conflict_error_is_cached() {
        let runfiles = Runfiles::builder("_main")
            .unwrap()
            .add_symlink("a", src("x"))
            .unwrap()
            .add_symlink("a", src("y"))
            .unwrap()
            .conflict_policy(ConflictPolicy::Error)
            .build();
        let tree =
            RunfilesTree::new("t.runfiles", runfiles, None, RunfileSymlinksMode::Create, true)
                .unwrap();
        let first = tree.mapping().unwrap_err();
        let second = tree.mapping().unwrap_err();
        assert_eq!(first, second);
        assert!(tree.diagnostics().is_err());
    }

    #[test]
    fn test_effective_mode() {
        let tree = RunfilesTree::new(
            "t.runfiles",
            runfiles(),
            None,
            RunfileSymlinksMode::Force,
            false,
        )
        .unwrap();
        assert_eq!(tree.symlinks_mode(), RunfileSymlinksMode::Force);
        assert_eq!(tree.effective_symlinks_mode(), RunfileSymlinksMode::Skip);
    }

    #[test]
    fn test_concurrent_first_access() {
        let tree = tree("tool.runfiles").unwrap();
        let pointers: Vec<usize> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let tree = tree.clone();
                    scope.spawn(move || {
                        std::ptr::from_ref(tree.mapping().unwrap()) as usize
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(pointers.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_builder_requires_fields() {
        let err = RunfilesTree::builder("t.runfiles")
            .symlinks_mode(RunfileSymlinksMode::Create)
            .build()
            .unwrap_err();
        assert!(err.is_invalid_argument());

        let err = RunfilesTree::builder("t.runfiles")
            .runfiles(runfiles())
            .build()
            .unwrap_err();
        assert!(err.is_invalid_argument());

        let tree = RunfilesTree::builder("t.runfiles")
            .runfiles(runfiles())
            .symlinks_mode(RunfileSymlinksMode::Force)
            .build_runfile_links(false)
            .build()
            .unwrap();
        assert!(!tree.is_build_runfile_links());
    }
}
