//! A single signature cache: something addressable at `traces/<hash>` that
//! can be read and, with optimistic concurrency, read-modify-written.

use async_trait::async_trait;

use crate::blob::SignatureBlob;
use crate::Error;

/// One configured signature cache. A [`crate::SignatureStore`] fans `fetch`
/// out across an ordered list of these and targets `upload` at exactly one.
#[async_trait]
pub trait SignatureCache: Send + Sync {
    /// A short label for this cache, used in error messages and logs.
    fn label(&self) -> &str;

    /// Raw signature strings stored at `traces/<resolved_input_hash>`.
    /// A missing key is not an error: returns an empty list.
    async fn fetch(&self, resolved_input_hash: &str) -> Result<Vec<String>, Error>;

    /// Appends `signature` to the blob at `traces/<resolved_input_hash>`,
    /// using optimistic concurrency. A no-op if the signature is already
    /// present verbatim. Retries internally; see [`crate::UPLOAD_RETRIES`].
    async fn upload(&self, resolved_input_hash: &str, signature: &str) -> Result<(), Error>;
}

pub(crate) fn trace_key(resolved_input_hash: &str) -> object_store::path::Path {
    object_store::path::Path::from("traces").child(resolved_input_hash)
}

/// An in-memory [`SignatureCache`], used for tests and as a local fallback
/// cache.
#[derive(Default)]
pub struct MemorySignatureCache {
    label: String,
    db: std::sync::Mutex<std::collections::HashMap<String, SignatureBlob>>,
}

impl MemorySignatureCache {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            db: Default::default(),
        }
    }
}

#[async_trait]
impl SignatureCache for MemorySignatureCache {
    fn label(&self) -> &str {
        &self.label
    }

    async fn fetch(&self, resolved_input_hash: &str) -> Result<Vec<String>, Error> {
        let db = self.db.lock().unwrap();
        Ok(db
            .get(resolved_input_hash)
            .map(|blob| blob.signatures.clone())
            .unwrap_or_default())
    }

    async fn upload(&self, resolved_input_hash: &str, signature: &str) -> Result<(), Error> {
        let mut db = self.db.lock().unwrap();
        let blob = db.entry(resolved_input_hash.to_string()).or_default();
        blob.add(signature);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_cache_fetch_of_missing_key_is_empty() {
        let cache = MemorySignatureCache::new("local");
        assert_eq!(cache.fetch("nonexistent").await.unwrap(), Vec::<String>::new());
    }

    #[tokio::test]
    async fn memory_cache_upload_then_fetch_roundtrips() {
        let cache = MemorySignatureCache::new("local");
        cache.upload("X", "sig-a").await.unwrap();
        cache.upload("X", "sig-b").await.unwrap();
        cache.upload("X", "sig-a").await.unwrap(); // idempotent

        let mut got = cache.fetch("X").await.unwrap();
        got.sort();
        assert_eq!(got, vec!["sig-a".to_string(), "sig-b".to_string()]);
    }
}
