//! Where variant listings come from.
//!
//! The resolver only needs "list the entries of variant directory `key`".
//! [`VariantSource`] is that seam: [`LocalSource`] reads the generated
//! output tree on disk, [`RemoteSource`](crate::remote::RemoteSource) lists
//! a prefix in the object store. Tests plug in counting fakes.
//!
//! [`VariantLayout`] holds the path facts shared by every source: where the
//! site's static root is (for URLs), where generated output lives, and the
//! width ceiling applied when parsing listings.

use crate::catalog::{DirEntry, RelativePathError, url_prefix_for};
use crate::config::Config;
use crate::hashing::VariantDirKey;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Listing a variant directory failed.
///
/// `Clone` so a single failure can be handed to every caller waiting on
/// the same resolution.
#[derive(Error, Debug, Clone)]
pub enum ListingError {
    #[error("failed to list {path}: {message}")]
    Local { path: PathBuf, message: String },
    #[error("failed to list s3://{bucket}/{prefix}: {message}")]
    Remote {
        bucket: String,
        prefix: String,
        message: String,
    },
}

/// Lists the entries of one variant directory.
#[async_trait]
pub trait VariantSource: Send + Sync {
    async fn list(&self, key: &VariantDirKey) -> Result<Vec<DirEntry>, ListingError>;
}

#[async_trait]
impl<T: VariantSource + ?Sized> VariantSource for Box<T> {
    async fn list(&self, key: &VariantDirKey) -> Result<Vec<DirEntry>, ListingError> {
        (**self).list(key).await
    }
}

/// Generated variants on the local filesystem, `<output_dir>/<key>/`.
#[derive(Debug, Clone)]
pub struct LocalSource {
    output_dir: PathBuf,
}

impl LocalSource {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

#[async_trait]
impl VariantSource for LocalSource {
    async fn list(&self, key: &VariantDirKey) -> Result<Vec<DirEntry>, ListingError> {
        let dir = self.output_dir.join(key.as_str());
        let err = |e: std::io::Error| ListingError::Local {
            path: dir.clone(),
            message: e.to_string(),
        };

        let mut read_dir = match tokio::fs::read_dir(&dir).await {
            Ok(rd) => rd,
            // Nothing generated yet
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(err(e)),
        };

        let mut entries = Vec::new();
        while let Some(entry) = read_dir.next_entry().await.map_err(err)? {
            let is_dir = entry.file_type().await.map_err(err)?.is_dir();
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir,
            });
        }
        Ok(entries)
    }
}

/// Path layout shared by resolution and generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantLayout {
    pub static_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Widest variant that may be referenced (`max_width × max_density`).
    pub max_size: i64,
}

impl VariantLayout {
    pub fn new(
        static_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        max_size: i64,
    ) -> Self {
        Self {
            static_dir: static_dir.into(),
            output_dir: output_dir.into(),
            max_size,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.static_dir, &config.output_dir, config.max_size())
    }

    /// Local directory holding the variants for `key`.
    pub fn dir_for(&self, key: &VariantDirKey) -> PathBuf {
        self.output_dir.join(key.as_str())
    }

    /// Site URL prefix for the variants of `key`.
    pub fn url_prefix(&self, key: &VariantDirKey) -> Result<String, RelativePathError> {
        url_prefix_for(&self.static_dir, &self.dir_for(key))
    }

    /// Whether `path` lies inside the generated output tree.
    pub fn is_generated(&self, path: &Path) -> bool {
        path.starts_with(&self.output_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::ContentHash;
    use tempfile::TempDir;

    fn key() -> VariantDirKey {
        VariantDirKey::new("dawn", &ContentHash::from_hex("1a2b3c4"))
    }

    #[tokio::test]
    async fn local_source_lists_files_and_dirs() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("dawn.1a2b3c4");
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        std::fs::write(dir.join("400.jpg"), b"x").unwrap();
        std::fs::write(dir.join("400.webp"), b"x").unwrap();

        let mut entries = LocalSource::new(tmp.path()).list(&key()).await.unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(
            entries,
            vec![
                DirEntry::file("400.jpg"),
                DirEntry::file("400.webp"),
                DirEntry::dir("nested"),
            ]
        );
    }

    #[tokio::test]
    async fn local_source_missing_dir_is_empty() {
        let tmp = TempDir::new().unwrap();
        let entries = LocalSource::new(tmp.path()).list(&key()).await.unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn local_source_file_in_place_of_dir_errors() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("dawn.1a2b3c4"), b"not a dir").unwrap();

        let result = LocalSource::new(tmp.path()).list(&key()).await;
        assert!(matches!(result, Err(ListingError::Local { .. })));
    }

    #[tokio::test]
    async fn boxed_source_delegates() {
        let tmp = TempDir::new().unwrap();
        let boxed: Box<dyn VariantSource> = Box::new(LocalSource::new(tmp.path()));
        assert!(boxed.list(&key()).await.unwrap().is_empty());
    }

    #[test]
    fn layout_url_prefix() {
        let layout = VariantLayout::new("/site/static", "/site/static/generated", 2400);
        assert_eq!(
            layout.url_prefix(&key()).unwrap(),
            "/generated/dawn.1a2b3c4"
        );
    }

    #[test]
    fn layout_output_outside_static_root_fails() {
        let layout = VariantLayout::new("/site/static", "/site/build", 2400);
        assert!(layout.url_prefix(&key()).is_err());
    }

    #[test]
    fn layout_recognises_generated_paths() {
        let layout = VariantLayout::new("static", "static/generated", 2400);
        assert!(layout.is_generated(Path::new("static/generated/dawn.1a2b3c4/400.jpg")));
        assert!(!layout.is_generated(Path::new("static/img/dawn.jpg")));
    }
}
