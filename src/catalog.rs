//! Variant catalog parsing.
//!
//! A variant directory (local or remote) holds files named `<width>.<ext>`:
//!
//! ```text
//! dawn.1a2b3c4/
//! ├── 400.jpg
//! ├── 400.webp
//! ├── 600.jpg
//! └── 600.webp
//! ```
//!
//! [`parse_listing`] turns such a listing into [`Variant`] records. Anything
//! whose stem is not a base-10 integer is ignored, as is anything wider than
//! the configured ceiling (`max_width × max_density`). Parse failures are
//! skips, never errors.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Component, Path};
use thiserror::Error;

/// The output directory cannot be expressed relative to the static root,
/// so no URL can be built for it.
#[derive(Error, Debug, Clone)]
#[error("unable to get relative path from {root} to {dir}")]
pub struct RelativePathError {
    pub root: String,
    pub dir: String,
}

/// One entry of a directory listing, local or remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

impl DirEntry {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
        }
    }

    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
        }
    }
}

/// A generated image available to `srcset`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Variant {
    pub url: String,
    /// MIME type; empty means "same format as the original, no `type` attribute".
    pub mime: String,
    /// Pixel width.
    pub size: i64,
}

/// MIME types for extensions that get their own `<source type=...>`.
const TYPED_EXTENSIONS: &[(&str, &str)] = &[("webp", "image/webp"), ("avif", "image/avif")];

/// Preferred `<source>` order: most efficient encodings first.
const SOURCE_ORDER: &[&str] = &["image/avif", "image/webp"];

/// MIME type for a variant file extension (`""` for the default group).
pub fn mime_for_extension(ext: &str) -> &'static str {
    TYPED_EXTENSIONS
        .iter()
        .find(|(e, _)| e.eq_ignore_ascii_case(ext))
        .map(|(_, mime)| *mime)
        .unwrap_or("")
}

/// Parse a directory listing into variants.
///
/// `url_prefix` is joined with each entry name to form its URL. Output order
/// follows the listing; use [`VariantCatalog::group_by_type`] for sorted groups.
pub fn parse_listing(entries: &[DirEntry], url_prefix: &str, max_size: i64) -> Vec<Variant> {
    entries
        .iter()
        .filter(|entry| !entry.is_dir)
        .filter_map(|entry| {
            let path = Path::new(&entry.name);
            let stem = path.file_stem()?.to_str()?;
            let size: i64 = stem.parse().ok()?;
            if size > max_size {
                return None;
            }
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            Some(Variant {
                url: join_url(url_prefix, &entry.name),
                mime: mime_for_extension(ext).to_string(),
                size,
            })
        })
        .collect()
}

fn join_url(prefix: &str, name: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), name)
}

/// URL path for `dir`, relative to the site's `static_root`.
///
/// `static/generated/dawn.1a2b3c4` under `static` → `/generated/dawn.1a2b3c4`.
pub fn url_prefix_for(static_root: &Path, dir: &Path) -> Result<String, RelativePathError> {
    let err = || RelativePathError {
        root: static_root.display().to_string(),
        dir: dir.display().to_string(),
    };
    let rel = dir.strip_prefix(static_root).map_err(|_| err())?;

    let mut segments = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(s) => segments.push(s.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => return Err(err()),
        }
    }
    Ok(format!("/{}", segments.join("/")))
}

/// All variants found for one variant directory. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VariantCatalog {
    variants: Vec<Variant>,
}

impl VariantCatalog {
    pub fn new(variants: Vec<Variant>) -> Self {
        Self { variants }
    }

    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    /// Variants grouped by MIME type, each group sorted by ascending size.
    pub fn group_by_type(&self) -> BTreeMap<String, Vec<Variant>> {
        let mut groups: BTreeMap<String, Vec<Variant>> = BTreeMap::new();
        for v in &self.variants {
            groups.entry(v.mime.clone()).or_default().push(v.clone());
        }
        for group in groups.values_mut() {
            group.sort_by_key(|v| v.size);
        }
        groups
    }

    /// Groups in `<source>` order: preferred typed formats, then any other
    /// typed group, then the default (untyped) group last.
    pub fn source_sets(&self) -> Vec<SourceSet> {
        let mut groups = self.group_by_type();
        let mut sets = Vec::with_capacity(groups.len());

        for mime in SOURCE_ORDER {
            if let Some(variants) = groups.remove(*mime) {
                sets.push(SourceSet::new(mime, variants));
            }
        }
        let default = groups.remove("");
        for (mime, variants) in groups {
            sets.push(SourceSet::new(&mime, variants));
        }
        if let Some(variants) = default {
            sets.push(SourceSet::new("", variants));
        }
        sets
    }

    /// Largest variant in the default group; what an `<img src>` should point at.
    pub fn largest_default(&self) -> Option<&Variant> {
        self.variants
            .iter()
            .filter(|v| v.mime.is_empty())
            .max_by_key(|v| v.size)
    }
}

/// One `<source>` worth of variants: same type, ascending width.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSet {
    pub mime: String,
    pub variants: Vec<Variant>,
}

impl SourceSet {
    fn new(mime: &str, variants: Vec<Variant>) -> Self {
        Self {
            mime: mime.to_string(),
            variants,
        }
    }

    /// `srcset` attribute value: `url 400w,url 600w`.
    pub fn srcset(&self) -> String {
        self.variants
            .iter()
            .map(|v| format!("{} {}w", v.url, v.size))
            .collect::<Vec<_>>()
            .join(",")
    }
}
