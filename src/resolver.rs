//! Resolution cache with request coalescing.
//!
//! [`VariantResolver::resolve`] answers "which variants exist for this
//! source image?" at most once per source per process:
//!
//! - **Fast path**: a cache hit returns the stored catalog without hashing
//!   or listing anything.
//! - **Slow path (singleflight)**: the first caller for a source becomes the
//!   leader. It hashes the file, lists the variant directory, parses the
//!   listing and stores the catalog *before* publishing it. Every concurrent
//!   caller for the same source waits on the leader and receives the same
//!   `Arc` (or a clone of the same error).
//!
//! Errors are never cached. A leader whose future is dropped mid-flight
//! removes its in-flight marker on drop, which closes the channel its
//! waiters are parked on; they loop and one of them takes over.
//!
//! Both maps use `std::sync` locks that are never held across an `.await`.
//! Entries are never evicted: the cache lives exactly as long as the
//! resolver, which the CLI builds once per run.

use crate::catalog::{RelativePathError, VariantCatalog, parse_listing};
use crate::hashing::{HashError, VariantDirKey};
use crate::source::{ListingError, VariantLayout, VariantSource};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;

#[derive(Error, Debug, Clone)]
pub enum ResolveError {
    #[error("hash failure: {0}")]
    Hash(#[from] HashError),
    #[error("listing failure: {0}")]
    Listing(#[from] ListingError),
    #[error("relative path failure: {0}")]
    RelativePath(#[from] RelativePathError),
}

type Outcome = Result<Arc<VariantCatalog>, ResolveError>;

/// Process-lifetime variant resolution over a [`VariantSource`].
pub struct VariantResolver<S> {
    source: S,
    layout: VariantLayout,
    cache: RwLock<HashMap<PathBuf, Arc<VariantCatalog>>>,
    in_flight: Mutex<HashMap<PathBuf, watch::Receiver<Option<Outcome>>>>,
}

enum Role<'a, S> {
    Leader(Flight<'a, S>),
    Waiter(watch::Receiver<Option<Outcome>>),
}

/// The leader's claim on a source path. Dropping it clears the in-flight
/// marker and then closes the channel.
struct Flight<'a, S> {
    resolver: &'a VariantResolver<S>,
    path: PathBuf,
    tx: watch::Sender<Option<Outcome>>,
}

impl<S> Flight<'_, S> {
    fn publish(&self, outcome: Outcome) {
        self.tx.send_replace(Some(outcome));
    }
}

impl<S> Drop for Flight<'_, S> {
    fn drop(&mut self) {
        self.resolver
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.path);
    }
}

impl<S: VariantSource> VariantResolver<S> {
    pub fn new(source: S, layout: VariantLayout) -> Self {
        Self {
            source,
            layout,
            cache: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn layout(&self) -> &VariantLayout {
        &self.layout
    }

    /// Variants available for the image at `source`.
    pub async fn resolve(&self, source: &Path) -> Result<Arc<VariantCatalog>, ResolveError> {
        loop {
            if let Some(hit) = self.cached(source) {
                debug!(source = %source.display(), "resolution cache hit");
                return Ok(hit);
            }

            match self.claim(source) {
                Role::Leader(flight) => {
                    debug!(source = %source.display(), "resolution cache miss");
                    let outcome = self.lookup(source).await;
                    if let Ok(catalog) = &outcome {
                        self.cache
                            .write()
                            .unwrap_or_else(PoisonError::into_inner)
                            .insert(source.to_path_buf(), Arc::clone(catalog));
                    }
                    flight.publish(outcome.clone());
                    return outcome;
                }
                Role::Waiter(rx) => {
                    if let Some(outcome) = wait_for_leader(rx).await {
                        return outcome;
                    }
                    debug!(source = %source.display(), "resolution leader went away, retrying");
                }
            }
        }
    }

    /// Number of sources with a cached catalog.
    pub fn cached_count(&self) -> usize {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_cached(&self, source: &Path) -> bool {
        self.cached(source).is_some()
    }

    fn cached(&self, source: &Path) -> Option<Arc<VariantCatalog>> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(source)
            .cloned()
    }

    /// Join an in-flight resolution or start one.
    fn claim(&self, source: &Path) -> Role<'_, S> {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(rx) = in_flight.get(source) {
            return Role::Waiter(rx.clone());
        }

        // A leader that just finished has already filled the cache; don't
        // start a second lookup for it.
        if let Some(hit) = self.cached(source) {
            let (_, rx) = watch::channel(Some(Ok(hit)));
            return Role::Waiter(rx);
        }

        let (tx, rx) = watch::channel(None);
        in_flight.insert(source.to_path_buf(), rx);
        Role::Leader(Flight {
            resolver: self,
            path: source.to_path_buf(),
            tx,
        })
    }

    /// Hash, list and parse. The leader's work.
    async fn lookup(&self, source: &Path) -> Outcome {
        let path = source.to_path_buf();
        let key = tokio::task::spawn_blocking(move || VariantDirKey::for_source(&path))
            .await
            .map_err(|e| HashError {
                path: source.to_path_buf(),
                message: e.to_string(),
            })??;

        let url_prefix = self.layout.url_prefix(&key)?;
        let entries = self.source.list(&key).await?;
        let variants = parse_listing(&entries, &url_prefix, self.layout.max_size);
        debug!(key = %key, entries = entries.len(), variants = variants.len(), "resolved");

        Ok(Arc::new(VariantCatalog::new(variants)))
    }
}

/// Wait for the leader's published outcome. `None` means the leader was
/// dropped without publishing.
async fn wait_for_leader(mut rx: watch::Receiver<Option<Outcome>>) -> Option<Outcome> {
    loop {
        let current = rx.borrow_and_update().clone();
        if current.is_some() {
            return current;
        }
        if rx.changed().await.is_err() {
            // Closed; a value sent just before the close still counts
            return rx.borrow().clone();
        }
    }
}
