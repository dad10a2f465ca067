//! Constructs a [`SignatureCache`] from a cache URL, analogous to how the
//! collaborator's blob and directory services are constructed from `--addr`
//! style URLs.

use std::sync::Arc;
use url::Url;

use crate::cache::{MemorySignatureCache, SignatureCache};
use crate::object_store::ObjectStoreSignatureCache;
use crate::Error;

/// Builds a [`SignatureCache`] from a URL. `memory://` is an ephemeral,
/// process-local cache (mostly useful for tests and the local fallback
/// cache); every other scheme is handed to [object_store].
pub fn from_addr(uri: &str) -> Result<Arc<dyn SignatureCache>, Error> {
    let url = Url::parse(uri).map_err(|_| Error::UnsupportedUrl(uri.to_string()))?;

    match url.scheme() {
        "memory" => {
            if url.has_host() || !url.path().is_empty() {
                return Err(Error::UnsupportedUrl(uri.to_string()));
            }
            Ok(Arc::new(MemorySignatureCache::new(uri)))
        }
        _ => Ok(Arc::new(ObjectStoreSignatureCache::parse_url(uri, &url)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_scheme_with_host_is_rejected() {
        assert!(from_addr("memory://somehost").is_err());
    }

    #[test]
    fn memory_scheme_bare_is_accepted() {
        assert!(from_addr("memory://").is_ok());
    }

    #[test]
    fn file_scheme_is_delegated_to_object_store() {
        assert!(from_addr("file:///tmp/laut-traces").is_ok());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(from_addr("not a url").is_err());
    }
}
