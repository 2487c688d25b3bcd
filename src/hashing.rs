//! Content hashing for source images.
//!
//! Generated variants live in a directory named after the source file *and*
//! a short hash of its bytes:
//!
//! ```text
//! static/img/dawn.jpg  →  generated/dawn.1a2b3c4/400.jpg
//!                                   dawn.1a2b3c4/400.webp
//! ```
//!
//! The hash is content-based rather than mtime-based, so it survives
//! `git checkout` and identical files at different paths share a hash.
//! Editing a source image produces a new hash and therefore a brand new
//! variant directory; the old directory is orphaned and cleaned up by the
//! next reconciliation run.

use sha2::{Digest, Sha256};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Number of hex characters kept from the SHA-256 digest.
pub const HASH_LEN: usize = 7;

#[derive(Error, Debug, Clone)]
#[error("failed to hash {path}: {message}")]
pub struct HashError {
    pub path: PathBuf,
    pub message: String,
}

impl HashError {
    fn new(path: &Path, err: io::Error) -> Self {
        Self {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}

/// Short lowercase hex digest of a file's bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash(String);

impl ContentHash {
    /// Wrap an already computed hex digest (e.g. one read back from a
    /// directory name).
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// SHA-256 of a file's contents, truncated to [`HASH_LEN`] hex chars.
pub fn hash_file(path: &Path) -> Result<ContentHash, HashError> {
    let mut file = std::fs::File::open(path).map_err(|e| HashError::new(path, e))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(|e| HashError::new(path, e))?;
    let mut hex = format!("{:x}", hasher.finalize());
    hex.truncate(HASH_LEN);
    Ok(ContentHash(hex))
}

/// `<file stem>.<content hash>`, the directory holding one source's variants.
///
/// This is the unit of cache invalidation both on disk and in the remote
/// store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariantDirKey(String);

impl VariantDirKey {
    pub fn new(stem: &str, hash: &ContentHash) -> Self {
        Self(format!("{}.{}", stem, hash))
    }

    /// Hash `source` and build its key.
    pub fn for_source(source: &Path) -> Result<Self, HashError> {
        let hash = hash_file(source)?;
        Ok(Self::new(&source_stem(source), &hash))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VariantDirKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether `name` has the `<stem>.<hash>` shape of a [`VariantDirKey`].
pub fn is_variant_dir_name(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((stem, hash)) => {
            !stem.is_empty()
                && hash.len() == HASH_LEN
                && hash.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        }
        None => false,
    }
}

/// File name without its final extension (`dawn.jpg` → `dawn`).
pub fn source_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
