use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cache url {0:?} is not supported")]
    UnsupportedUrl(String),

    #[error("object store error: {0}")]
    Backend(#[from] object_store::Error),

    #[error("stored signature blob at {0:?} is not valid JSON")]
    MalformedBlob(String),

    #[error("upload to {cache:?} did not converge after {attempts} attempts")]
    UploadConflict { cache: String, attempts: u32 },
}
