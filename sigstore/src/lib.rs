//! Signature store client: retrieves trace-signature blobs for a resolved
//! input hash from an ordered list of caches, and uploads newly produced
//! signatures to one cache with optimistic concurrency.

mod blob;
mod cache;
mod errors;
mod from_addr;
mod object_store;

pub use blob::SignatureBlob;
pub use cache::{MemorySignatureCache, SignatureCache};
pub use errors::Error;
pub use from_addr::from_addr;
pub use object_store::ObjectStoreSignatureCache;

use std::sync::Arc;
use tracing::warn;

/// Number of `upload` retry attempts on optimistic-concurrency precondition
/// failure, before giving up with [`Error::UploadConflict`].
pub const UPLOAD_RETRIES: u32 = 5;

/// An ordered list of [`SignatureCache`]s, queried in order on `fetch` and
/// merged without deduplication (the verifier deduplicates by value).
#[derive(Clone, Default)]
pub struct SignatureStore {
    caches: Vec<Arc<dyn SignatureCache>>,
}

impl SignatureStore {
    pub fn new(caches: Vec<Arc<dyn SignatureCache>>) -> Self {
        Self { caches }
    }

    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }

    /// Queries every configured cache at `traces/<resolved_input_hash>` and
    /// concatenates the results in cache order. A cache that errors logs a
    /// warning and contributes nothing; it never aborts the remaining
    /// caches.
    pub async fn fetch(&self, resolved_input_hash: &str) -> Vec<String> {
        let mut signatures = Vec::new();
        for cache in &self.caches {
            match cache.fetch(resolved_input_hash).await {
                Ok(mut found) => signatures.append(&mut found),
                Err(e) => warn!(cache = cache.label(), error = %e, "signature fetch failed"),
            }
        }
        signatures
    }

    /// Uploads `signature` to the cache at `index`, per
    /// [`SignatureCache::upload`]'s optimistic-concurrency contract.
    pub async fn upload(
        &self,
        index: usize,
        resolved_input_hash: &str,
        signature: &str,
    ) -> Result<(), Error> {
        let cache = self
            .caches
            .get(index)
            .ok_or_else(|| Error::UnsupportedUrl(format!("no cache at index {index}")))?;
        cache.upload(resolved_input_hash, signature).await
    }
}
