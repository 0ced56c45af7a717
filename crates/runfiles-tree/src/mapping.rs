//! Flattening runfiles contributions into a single path mapping.
//!
//! Contributions are applied in a fixed order:
//!
//! 1. workspace symlinks, then artifacts, each in declaration order;
//! 2. entries hidden below another entry are dropped;
//! 3. entries are placed under the workspace (or their external repository);
//! 4. root symlinks;
//! 5. the repo-mapping manifest at [`REPO_MAPPING_MANIFEST_PATH`].
//!
//! When two different artifacts claim the same path, the [`ConflictPolicy`]
//! decides what happens. Under the default policy the later contribution
//! replaces the earlier one. The manifest path is the exception: a real
//! runfile there is always an [`Error::UnresolvableConflict`].

use crate::{Artifact, ContentDigest, Error, RelPath, Result, Runfiles};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

/// Reserved path of the repo-mapping manifest inside a runfiles tree.
pub const REPO_MAPPING_MANIFEST_PATH: &str = "_repo_mapping";

/// What to do when two different artifacts claim the same runfiles path.
///
/// Variants are ordered from most to least lenient.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Last writer wins, silently.
    #[default]
    Ignore,
    /// Last writer wins; a diagnostic is recorded and logged.
    Warn,
    /// The mapping computation fails.
    Error,
}

impl ConflictPolicy {
    /// The stricter of two policies.
    #[must_use]
    pub fn combine(self, other: Self) -> Self {
        self.max(other)
    }
}

/// Non-fatal findings recorded while flattening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunfilesDiagnostic {
    /// A later contribution replaced a different artifact at `path`.
    Conflict {
        /// Path inside the runfiles tree.
        path: RelPath,
        /// The artifact that was replaced.
        previous: Artifact,
        /// The artifact now mapped at `path`.
        replacement: Artifact,
    },
    /// An entry was dropped because an ancestor path is itself an entry.
    Obscured {
        /// Path of the dropped entry, relative to its workspace or repository.
        path: RelPath,
        /// The dropped artifact.
        artifact: Artifact,
        /// The ancestor entry hiding it.
        obscured_by: RelPath,
    },
}

impl fmt::Display for RunfilesDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conflict {
                path,
                previous,
                replacement,
            } => write!(
                f,
                "runfiles path '{path}' conflict: '{previous}' replaced by '{replacement}'"
            ),
            Self::Obscured {
                path,
                artifact,
                obscured_by,
            } => write!(
                f,
                "runfiles symlink '{path}' -> '{artifact}' obscured by '{obscured_by}'"
            ),
        }
    }
}

/// Resolved mapping of runfiles paths to artifacts.
///
/// Entries are kept sorted by path, so iteration order never depends on
/// hashing or on the order contributions happened to arrive in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunfilesMapping {
    entries: BTreeMap<RelPath, Artifact>,
}

impl RunfilesMapping {
    /// Look up the artifact mapped at `path`.
    #[must_use]
    pub fn get(&self, path: impl AsRef<str>) -> Option<&Artifact> {
        let path = RelPath::new(path).ok()?;
        self.entries.get(&path)
    }

    /// Returns true if `path` is mapped.
    #[must_use]
    pub fn contains(&self, path: impl AsRef<str>) -> bool {
        self.get(path).is_some()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&RelPath, &Artifact)> {
        self.entries.iter()
    }

    /// Iterate over mapped paths in order.
    pub fn paths(&self) -> impl Iterator<Item = &RelPath> {
        self.entries.keys()
    }

    /// `(runfiles path, exec path)` pairs in path order.
    #[must_use]
    pub fn to_manifest_entries(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .map(|(path, artifact)| (path.to_string(), artifact.exec_path().to_string()))
            .collect()
    }

    /// Deterministic digest of the mapping, suitable as a cache key input.
    ///
    /// Covers every path, the exec path it points at and, when known, the
    /// content digest of that artifact.
    #[must_use]
    pub fn fingerprint(&self) -> ContentDigest {
        let mut hasher = Sha256::new();
        for (path, artifact) in &self.entries {
            hasher.update(path.as_str().as_bytes());
            hasher.update([0u8]);
            hasher.update(artifact.exec_path().as_str().as_bytes());
            hasher.update([0u8]);
            if let Some(digest) = artifact.digest() {
                hasher.update(digest.as_bytes());
            }
            hasher.update([b'\n']);
        }
        ContentDigest::from_hasher(hasher)
    }
}

impl<'a> IntoIterator for &'a RunfilesMapping {
    type Item = (&'a RelPath, &'a Artifact);
    type IntoIter = std::collections::btree_map::Iter<'a, RelPath, Artifact>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// A mapping together with the diagnostics produced while computing it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolvedRunfiles {
    mapping: RunfilesMapping,
    diagnostics: Vec<RunfilesDiagnostic>,
}

impl ResolvedRunfiles {
    /// The resolved mapping.
    #[must_use]
    pub fn mapping(&self) -> &RunfilesMapping {
        &self.mapping
    }

    /// Conflicts and obscured entries, in the order they were found.
    #[must_use]
    pub fn diagnostics(&self) -> &[RunfilesDiagnostic] {
        &self.diagnostics
    }

    /// Split into mapping and diagnostics.
    #[must_use]
    pub fn into_parts(self) -> (RunfilesMapping, Vec<RunfilesDiagnostic>) {
        (self.mapping, self.diagnostics)
    }
}

/// Repository of a staged entry; `None` is the main repository.
type StageKey = (Option<String>, RelPath);

struct ConflictChecker {
    policy: ConflictPolicy,
    diagnostics: Vec<RunfilesDiagnostic>,
}

impl ConflictChecker {
    const fn new(policy: ConflictPolicy) -> Self {
        Self {
            policy,
            diagnostics: Vec::new(),
        }
    }

    /// Decide whether `artifact` may replace `previous` at `path`.
    fn check(
        &mut self,
        policy: ConflictPolicy,
        path: &RelPath,
        previous: &Artifact,
        artifact: &Artifact,
    ) -> Result<()> {
        match policy {
            ConflictPolicy::Ignore => {
                debug!(%path, %previous, replacement = %artifact, "Runfiles conflict ignored");
            }
            ConflictPolicy::Warn => {
                warn!(%path, %previous, replacement = %artifact, "Runfiles path conflict");
                self.diagnostics.push(RunfilesDiagnostic::Conflict {
                    path: path.clone(),
                    previous: previous.clone(),
                    replacement: artifact.clone(),
                });
            }
            ConflictPolicy::Error => {
                return Err(Error::PathConflict {
                    path: path.to_string(),
                    previous: previous.to_string(),
                    replacement: artifact.to_string(),
                });
            }
        }
        Ok(())
    }

    fn put(
        &mut self,
        policy: ConflictPolicy,
        map: &mut BTreeMap<RelPath, Artifact>,
        path: RelPath,
        artifact: &Artifact,
    ) -> Result<()> {
        if let Some(previous) = map.get(&path)
            && previous != artifact
        {
            let previous = previous.clone();
            self.check(policy, &path, &previous, artifact)?;
        }
        map.insert(path, artifact.clone());
        Ok(())
    }
}

/// Staged entries keyed by repository and path, remembering the position of
/// each path's first insertion so placement follows declaration order.
#[derive(Default)]
struct Staging {
    entries: BTreeMap<StageKey, (usize, Artifact)>,
    next_seq: usize,
}

impl Staging {
    fn put(
        &mut self,
        checker: &mut ConflictChecker,
        runfiles: &Runfiles,
        key: StageKey,
        artifact: &Artifact,
    ) -> Result<()> {
        match self.entries.get_mut(&key) {
            // Same file declared again; keep the newest handle for its digest.
            Some((_, previous)) if *previous == *artifact => {
                *previous = artifact.clone();
            }
            Some((_, previous)) => {
                let policy = checker.policy;
                let location = placement_root(runfiles, key.0.as_deref()).join(&key.1);
                checker.check(policy, &location, previous, artifact)?;
                *previous = artifact.clone();
            }
            None => {
                self.entries.insert(key, (self.next_seq, artifact.clone()));
                self.next_seq += 1;
            }
        }
        Ok(())
    }

    /// Drop entries whose ancestor (in the same repository) is also an entry.
    fn drop_obscured(&mut self, checker: &mut ConflictChecker) {
        let mut obscured = Vec::new();
        for ((repo, path), (_, artifact)) in &self.entries {
            for ancestor in path.ancestors() {
                let ancestor = RelPath::from_normalised(ancestor);
                let Some((_, hiding)) = self.entries.get(&(repo.clone(), ancestor.clone())) else {
                    continue;
                };
                // Silent when the ancestor is a directory that already holds this file.
                let remainder = path
                    .as_str()
                    .strip_prefix(ancestor.as_str())
                    .map(|rest| rest.trim_start_matches('/'))
                    .unwrap_or_default();
                let via_ancestor = hiding
                    .exec_path()
                    .join(&RelPath::from_normalised(remainder));
                if &via_ancestor != artifact.exec_path() {
                    checker.diagnostics.push(RunfilesDiagnostic::Obscured {
                        path: path.clone(),
                        artifact: artifact.clone(),
                        obscured_by: ancestor,
                    });
                    if checker.policy >= ConflictPolicy::Warn {
                        warn!(%path, %artifact, "Runfiles entry obscured by an ancestor entry");
                    }
                }
                obscured.push((repo.clone(), path.clone()));
                break;
            }
        }
        for key in obscured {
            debug!(path = %key.1, "Dropping obscured runfiles entry");
            self.entries.remove(&key);
        }
    }

    fn into_declaration_order(self) -> Vec<(StageKey, Artifact)> {
        let mut staged: Vec<_> = self
            .entries
            .into_iter()
            .map(|(key, (seq, artifact))| (seq, key, artifact))
            .collect();
        staged.sort_by_key(|(seq, _, _)| *seq);
        staged
            .into_iter()
            .map(|(_, key, artifact)| (key, artifact))
            .collect()
    }
}

fn placement_root(runfiles: &Runfiles, repository: Option<&str>) -> RelPath {
    match repository {
        None => runfiles.workspace_name().clone(),
        Some(repo) => RelPath::from_normalised(repo),
    }
}

/// Flatten `runfiles` into a mapping, injecting the repo-mapping manifest if given.
///
/// The computation is pure: the same contributions in the same declaration
/// order always produce the same mapping.
///
/// # Errors
///
/// - [`Error::UnresolvableConflict`] if a runfile occupies
///   [`REPO_MAPPING_MANIFEST_PATH`] while a manifest is supplied.
/// - [`Error::PathConflict`] for any conflict under [`ConflictPolicy::Error`].
pub fn resolve_mapping(
    runfiles: &Runfiles,
    repo_mapping_manifest: Option<&Artifact>,
) -> Result<ResolvedRunfiles> {
    let policy = runfiles.conflict_policy();
    let mut checker = ConflictChecker::new(policy);

    let mut staging = Staging::default();
    for (path, artifact) in runfiles.symlinks() {
        staging.put(&mut checker, runfiles, (None, path.clone()), artifact)?;
    }
    for artifact in runfiles.artifacts() {
        let key = (
            artifact.repository().map(str::to_string),
            artifact.runfiles_path().clone(),
        );
        staging.put(&mut checker, runfiles, key, artifact)?;
    }
    staging.drop_obscured(&mut checker);

    let mut entries = BTreeMap::new();
    let legacy_external = RelPath::from_normalised("external");
    for ((repo, path), artifact) in staging.into_declaration_order() {
        let root = placement_root(runfiles, repo.as_deref());
        checker.put(policy, &mut entries, root.join(&path), &artifact)?;
        if let Some(repo) = repo.as_deref()
            && runfiles.legacy_external_runfiles()
        {
            let legacy = runfiles
                .workspace_name()
                .join(&legacy_external)
                .join(&RelPath::from_normalised(repo))
                .join(&path);
            checker.put(policy, &mut entries, legacy, &artifact)?;
        }
    }

    // Root symlinks are always at least reported.
    let root_policy = policy.combine(ConflictPolicy::Warn);
    for (path, artifact) in runfiles.root_symlinks() {
        checker.put(root_policy, &mut entries, path.clone(), artifact)?;
    }

    if let Some(manifest) = repo_mapping_manifest {
        let reserved = RelPath::from_normalised(REPO_MAPPING_MANIFEST_PATH);
        // A file at the reserved path would also hide anything mapped below it.
        if let Some((path, existing)) = entries
            .iter()
            .find(|(path, _)| path.starts_with(&reserved))
        {
            return Err(Error::UnresolvableConflict {
                path: path.to_string(),
                artifact: existing.to_string(),
                manifest: manifest.to_string(),
            });
        }
        entries.insert(reserved, manifest.clone());
    }

    debug!(
        workspace = %runfiles.workspace_name(),
        entries = entries.len(),
        diagnostics = checker.diagnostics.len(),
        "Resolved runfiles mapping"
    );

    Ok(ResolvedRunfiles {
        mapping: RunfilesMapping { entries },
        diagnostics: checker.diagnostics,
    })
}
