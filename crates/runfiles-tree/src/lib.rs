//! Runfiles trees: the runtime dependency directories of executables.
//!
//! An executable built by a build action usually needs data files, shared
//! libraries and helper tools at run time. Many upstream targets contribute
//! those files, possibly claiming the same paths. This crate turns the
//! contributions into one deterministic, conflict-resolved mapping from
//! runfiles path to artifact, and exposes it uniformly to whatever
//! materializes the tree on disk.
//!
//! # Key Types
//!
//! - [`Runfiles`]: declared contributions (artifacts, symlinks, root symlinks)
//! - [`RunfilesMapping`]: the resolved `path -> artifact` mapping
//! - [`RunfilesTree`]: one runfiles directory with its mapping and symlink policy
//! - [`RunfilesSupplier`]: every runfiles tree of one action
//! - [`TreeView`] / [`TreeCollectionView`]: the read contracts consumers use
//!
//! # Example
//!
//! ```
//! use runfiles_tree::{
//!     Artifact, RunfileSymlinksMode, Runfiles, SingleRunfilesSupplier, TreeCollectionView,
//!     TreeView,
//! };
//!
//! # fn main() -> runfiles_tree::Result<()> {
//! let runfiles = Runfiles::builder("_main")?
//!     .add_artifact(Artifact::source("pkg/data.txt")?)
//!     .add_symlink("config.json", Artifact::source("pkg/config.prod.json")?)?
//!     .build();
//!
//! let supplier = SingleRunfilesSupplier::new(
//!     "bazel-out/bin/pkg/tool.runfiles",
//!     runfiles,
//!     None,
//!     RunfileSymlinksMode::Create,
//!     true,
//! )?;
//!
//! for tree in supplier.runfiles_trees() {
//!     let mapping = tree.mapping()?;
//!     assert!(mapping.contains("_main/config.json"));
//! }
//! # Ok(())
//! # }
//! ```

mod artifact;
mod config;
mod error;
mod mapping;
mod path;
mod runfiles;
mod supplier;
mod symlinks;
mod tree;
mod view;

pub use artifact::{Artifact, ArtifactKind, ContentDigest};
pub use config::RunfilesConfig;
pub use error::{Error, Result};
pub use mapping::{
    ConflictPolicy, REPO_MAPPING_MANIFEST_PATH, ResolvedRunfiles, RunfilesDiagnostic,
    RunfilesMapping, resolve_mapping,
};
pub use path::RelPath;
pub use runfiles::{Runfiles, RunfilesBuilder};
pub use supplier::{CompositeRunfilesSupplier, RunfilesSupplier, SingleRunfilesSupplier};
pub use symlinks::{RunfileSymlinksMode, resolve_symlinks_mode};
pub use tree::{RunfilesTree, RunfilesTreeBuilder};
pub use view::{TreeCollectionView, TreeView};
