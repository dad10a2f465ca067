//! A [`SignatureCache`] backed by any store supported by the [object_store]
//! crate (S3, GCS, Azure, local filesystem, in-memory...).

use async_trait::async_trait;
use object_store::{path::Path, ObjectStore, PutMode, PutOptions, PutPayload, UpdateVersion};
use tracing::{instrument, warn};
use url::Url;

use crate::blob::SignatureBlob;
use crate::cache::{trace_key, SignatureCache};
use crate::{Error, UPLOAD_RETRIES};

pub struct ObjectStoreSignatureCache {
    label: String,
    store: Box<dyn ObjectStore>,
    base_path: Path,
}

impl ObjectStoreSignatureCache {
    /// Constructs a cache from a [Url] supported by [object_store]. Any path
    /// suffix becomes the base path objects are stored under.
    pub fn parse_url(label: impl Into<String>, url: &Url) -> Result<Self, Error> {
        let (store, base_path) = object_store::parse_url(url)?;
        Ok(Self {
            label: label.into(),
            store,
            base_path,
        })
    }

    fn key(&self, resolved_input_hash: &str) -> Path {
        let suffix = trace_key(resolved_input_hash);
        self.base_path
            .parts()
            .chain(suffix.parts())
            .collect::<Vec<_>>()
            .into_iter()
            .fold(Path::default(), |p, part| p.child(part))
    }
}

#[async_trait]
impl SignatureCache for ObjectStoreSignatureCache {
    fn label(&self) -> &str {
        &self.label
    }

    #[instrument(skip(self), fields(cache = %self.label))]
    async fn fetch(&self, resolved_input_hash: &str) -> Result<Vec<String>, Error> {
        let path = self.key(resolved_input_hash);
        match self.store.get(&path).await {
            Ok(result) => {
                let bytes = result.bytes().await?;
                let blob = SignatureBlob::parse(&bytes)
                    .map_err(|_| Error::MalformedBlob(path.to_string()))?;
                Ok(blob.signatures)
            }
            Err(object_store::Error::NotFound { .. }) => Ok(Vec::new()),
            Err(e) => {
                warn!(error = %e, cache = %self.label, "fetch failed, treating as empty");
                Ok(Vec::new())
            }
        }
    }

    #[instrument(skip(self, signature), fields(cache = %self.label))]
    async fn upload(&self, resolved_input_hash: &str, signature: &str) -> Result<(), Error> {
        let path = self.key(resolved_input_hash);

        for _ in 0..UPLOAD_RETRIES {
            let (mut blob, mode) = match self.store.get(&path).await {
                Ok(result) => {
                    let e_tag = result.meta.e_tag.clone();
                    let version = result.meta.version.clone();
                    let bytes = result.bytes().await?;
                    let blob = SignatureBlob::parse(&bytes)
                        .map_err(|_| Error::MalformedBlob(path.to_string()))?;
                    (blob, PutMode::Update(UpdateVersion { e_tag, version }))
                }
                Err(object_store::Error::NotFound { .. }) => {
                    (SignatureBlob::default(), PutMode::Create)
                }
                Err(e) => return Err(e.into()),
            };

            if !blob.add(signature) {
                return Ok(());
            }

            let payload = PutPayload::from(blob.to_bytes());
            let opts = PutOptions::from(mode);
            match self.store.put_opts(&path, payload, opts).await {
                Ok(_) => return Ok(()),
                Err(object_store::Error::Precondition { .. })
                | Err(object_store::Error::AlreadyExists { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(Error::UploadConflict {
            cache: self.label.clone(),
            attempts: UPLOAD_RETRIES,
        })
    }
}
