//! Artifact handles referenced by runfiles trees.
//!
//! Artifacts are owned by the build graph. This crate only holds cheap,
//! shared, read-only handles to them: an exec path (the identity), the
//! location the artifact takes inside a runfiles tree, and an optional
//! content digest.

use crate::{Error, RelPath, Result};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// SHA-256 content digest of an artifact.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    /// Digest of an in-memory byte slice.
    #[must_use]
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest[..]);
        Self(out)
    }

    /// Parse a 64 character hex digest.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the input is not 32 hex-encoded bytes.
    pub fn from_hex(hex_digest: &str) -> Result<Self> {
        let bytes = hex::decode(hex_digest)
            .map_err(|e| Error::invalid_argument(format!("invalid digest '{hex_digest}': {e}")))?;
        let out: [u8; 32] = bytes.try_into().map_err(|_| {
            Error::invalid_argument(format!("digest '{hex_digest}' is not 32 bytes"))
        })?;
        Ok(Self(out))
    }

    /// Raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub(crate) fn from_hasher(hasher: Sha256) -> Self {
        let digest = hasher.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest[..]);
        Self(out)
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({})", self.to_hex())
    }
}

/// Whether an artifact is checked in or produced by an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// A file from a source tree.
    Source,
    /// An output of some build action, living under an output root.
    Derived,
}

#[derive(Debug)]
struct ArtifactInner {
    exec_path: RelPath,
    root_relative: RelPath,
    repository: Option<String>,
    kind: ArtifactKind,
    digest: Option<ContentDigest>,
}

/// Shared handle to a build artifact.
///
/// Cloning is cheap. Equality, hashing and ordering use the exec path only,
/// so two handles naming the same exec path are the same artifact.
#[derive(Clone)]
pub struct Artifact(Arc<ArtifactInner>);

impl Artifact {
    /// A source artifact of the main repository.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `path` is not a non-empty relative path.
    pub fn source(path: impl AsRef<str>) -> Result<Self> {
        Self::build(ArtifactKind::Source, RelPath::empty(), path.as_ref(), None)
    }

    /// A source artifact of an external repository, found at `external/<repo>/<path>`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] on an invalid path or repository name.
    pub fn external_source(repository: &str, path: impl AsRef<str>) -> Result<Self> {
        Self::build(
            ArtifactKind::Source,
            RelPath::empty(),
            path.as_ref(),
            Some(repository),
        )
    }

    /// A derived artifact of the main repository, under `output_root`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] on invalid paths.
    pub fn derived(output_root: impl AsRef<str>, path: impl AsRef<str>) -> Result<Self> {
        let root = RelPath::new(output_root)?;
        Self::build(ArtifactKind::Derived, root, path.as_ref(), None)
    }

    /// A derived artifact of an external repository, under
    /// `<output_root>/external/<repo>/<path>`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] on invalid paths or repository name.
    pub fn external_derived(
        output_root: impl AsRef<str>,
        repository: &str,
        path: impl AsRef<str>,
    ) -> Result<Self> {
        let root = RelPath::new(output_root)?;
        Self::build(ArtifactKind::Derived, root, path.as_ref(), Some(repository))
    }

    fn build(
        kind: ArtifactKind,
        root: RelPath,
        path: &str,
        repository: Option<&str>,
    ) -> Result<Self> {
        let root_relative = RelPath::new(path)?;
        if root_relative.is_empty() {
            return Err(Error::invalid_argument("artifact path must not be empty"));
        }

        let repository = match repository {
            Some(repo) => {
                let repo_path = RelPath::new(repo)?;
                if repo_path.is_empty() || repo_path.segments().count() != 1 {
                    return Err(Error::invalid_argument(format!(
                        "invalid repository name '{repo}'"
                    )));
                }
                Some(repo_path.as_str().to_string())
            }
            None => None,
        };

        let mut exec_path = root;
        if let Some(repo) = &repository {
            exec_path = exec_path.join(&RelPath::new(format!("external/{repo}"))?);
        }
        let exec_path = exec_path.join(&root_relative);

        Ok(Self(Arc::new(ArtifactInner {
            exec_path,
            root_relative,
            repository,
            kind,
            digest: None,
        })))
    }

    /// Attach a content digest, returning a new handle with the same identity.
    ///
    /// The digest is not part of identity: two handles with the same exec
    /// path are the same file. When both are declared for one runfiles path,
    /// the mapping keeps the later handle and its digest.
    #[must_use]
    pub fn with_digest(self, digest: ContentDigest) -> Self {
        let inner = &self.0;
        Self(Arc::new(ArtifactInner {
            exec_path: inner.exec_path.clone(),
            root_relative: inner.root_relative.clone(),
            repository: inner.repository.clone(),
            kind: inner.kind,
            digest: Some(digest),
        }))
    }

    /// Path relative to the execution root. This is the artifact's identity.
    #[must_use]
    pub fn exec_path(&self) -> &RelPath {
        &self.0.exec_path
    }

    /// Path within the owning repository, used to place the artifact in runfiles.
    #[must_use]
    pub fn runfiles_path(&self) -> &RelPath {
        &self.0.root_relative
    }

    /// Owning repository, `None` for the main repository.
    #[must_use]
    pub fn repository(&self) -> Option<&str> {
        self.0.repository.as_deref()
    }

    /// Source or derived.
    #[must_use]
    pub fn kind(&self) -> ArtifactKind {
        self.0.kind
    }

    /// Returns true for source artifacts.
    #[must_use]
    pub fn is_source(&self) -> bool {
        self.0.kind == ArtifactKind::Source
    }

    /// Content digest, if known.
    #[must_use]
    pub fn digest(&self) -> Option<ContentDigest> {
        self.0.digest
    }
}

impl PartialEq for Artifact {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.exec_path == other.0.exec_path
    }
}

impl Eq for Artifact {}

impl Hash for Artifact {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.exec_path.hash(state);
    }
}

impl PartialOrd for Artifact {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Artifact {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.exec_path.cmp(&other.0.exec_path)
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Artifact({})", self.0.exec_path)
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.exec_path)
    }
}
