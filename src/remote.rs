//! Variant listings from an S3-compatible object store.
//!
//! Variants uploaded by the deploy step live under the same key structure
//! as the local output tree:
//!
//! ```text
//! s3://<bucket>/<prefix>/dawn.1a2b3c4/400.jpg
//! s3://<bucket>/<prefix>/dawn.1a2b3c4/400.webp
//! ```
//!
//! [`RemoteLister`] follows continuation tokens until the listing is
//! exhausted and hands back one complete list. Every listing holds a permit
//! from a shared [`Semaphore`] for its whole duration (all pages), so the
//! number of simultaneous listings across the process never exceeds the
//! configured capacity. No retries: a failed page fails the listing.

use crate::catalog::DirEntry;
use crate::hashing::VariantDirKey;
use crate::source::{ListingError, VariantSource};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

/// Keys per ListObjectsV2 page.
const PAGE_SIZE: i32 = 1000;

/// One page of a prefix listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectPage {
    /// Full object keys.
    pub keys: Vec<String>,
    /// Continuation token; `None` on the last page.
    pub next: Option<String>,
}

/// A ListObjectsV2-shaped object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    fn bucket(&self) -> &str;

    async fn list_page(
        &self,
        prefix: &str,
        continuation: Option<String>,
    ) -> Result<ObjectPage, ListingError>;
}

/// [`ObjectStore`] backed by `aws-sdk-s3`.
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn list_page(
        &self,
        prefix: &str,
        continuation: Option<String>,
    ) -> Result<ObjectPage, ListingError> {
        let mut request = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .max_keys(PAGE_SIZE);

        if let Some(token) = continuation {
            request = request.continuation_token(token);
        }

        let result = request.send().await.map_err(|e| ListingError::Remote {
            bucket: self.bucket.clone(),
            prefix: prefix.to_string(),
            message: DisplayErrorContext(&e).to_string(),
        })?;

        let keys = result
            .contents()
            .iter()
            .filter_map(|obj| obj.key().map(str::to_string))
            .collect();
        let next = if result.is_truncated() == Some(true) {
            result.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ObjectPage { keys, next })
    }
}

/// Build an S3 client.
///
/// Pass an endpoint for S3-compatible services like MinIO; those get
/// path-style addressing. `None` uses the default AWS endpoint.
pub async fn create_s3_client(endpoint_url: Option<&str>, region: &str) -> Client {
    let region = aws_config::Region::new(region.to_string());
    let mut config_loader =
        aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region);

    if let Some(endpoint) = endpoint_url {
        config_loader = config_loader.endpoint_url(endpoint);
    }

    let sdk_config = config_loader.load().await;

    let s3_config = if endpoint_url.is_some() {
        aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build()
    } else {
        aws_sdk_s3::config::Builder::from(&sdk_config).build()
    };

    Client::from_conf(s3_config)
}

/// Paginated, concurrency-bounded prefix listing.
pub struct RemoteLister<S> {
    store: S,
    permits: Arc<Semaphore>,
}

impl<S: ObjectStore> RemoteLister<S> {
    /// A lister with its own semaphore of `max_parallel` permits.
    pub fn new(store: S, max_parallel: usize) -> Self {
        Self::with_semaphore(store, Arc::new(Semaphore::new(max_parallel.max(1))))
    }

    /// A lister sharing an existing semaphore with other listers.
    pub fn with_semaphore(store: S, permits: Arc<Semaphore>) -> Self {
        Self { store, permits }
    }

    pub fn bucket(&self) -> &str {
        self.store.bucket()
    }

    /// List everything directly below `prefix`.
    ///
    /// Objects nested deeper than one level show up once each as a
    /// directory entry named after their first path segment.
    pub async fn list(&self, prefix: &str) -> Result<Vec<DirEntry>, ListingError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ListingError::Remote {
                bucket: self.bucket().to_string(),
                prefix: prefix.to_string(),
                message: "listing semaphore closed".to_string(),
            })?;

        let mut files = Vec::new();
        let mut dirs = BTreeSet::new();
        let mut continuation = None;
        let mut pages = 0usize;

        loop {
            let page = self.store.list_page(prefix, continuation).await?;
            pages += 1;
            debug!(prefix, page = pages, keys = page.keys.len(), "listed page");

            for key in &page.keys {
                let rest = key.strip_prefix(prefix).unwrap_or(key);
                match rest.split_once('/') {
                    Some((dir, _)) if !dir.is_empty() => {
                        dirs.insert(dir.to_string());
                    }
                    Some(_) => {}
                    None if !rest.is_empty() => files.push(DirEntry::file(rest)),
                    None => {}
                }
            }

            match page.next {
                Some(token) => continuation = Some(token),
                None => break,
            }
        }

        files.extend(dirs.into_iter().map(DirEntry::dir));
        Ok(files)
    }
}

/// [`VariantSource`] over `<root_prefix>/<key>/` in the object store.
pub struct RemoteSource<S> {
    lister: RemoteLister<S>,
    root_prefix: String,
}

impl<S: ObjectStore> RemoteSource<S> {
    pub fn new(lister: RemoteLister<S>, root_prefix: impl Into<String>) -> Self {
        Self {
            lister,
            root_prefix: root_prefix.into(),
        }
    }

    /// Object key prefix for `key`, always ending in `/`.
    pub fn prefix_for(&self, key: &VariantDirKey) -> String {
        let root = self.root_prefix.trim_matches('/');
        if root.is_empty() {
            format!("{}/", key)
        } else {
            format!("{}/{}/", root, key)
        }
    }
}

#[async_trait]
impl<S: ObjectStore> VariantSource for RemoteSource<S> {
    async fn list(&self, key: &VariantDirKey) -> Result<Vec<DirEntry>, ListingError> {
        self.lister.list(&self.prefix_for(key)).await
    }
}
