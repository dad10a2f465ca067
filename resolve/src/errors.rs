use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("{0}: resolution requested for an interior node with no input assignment")]
    UnresolvedDependency(String),
    #[error("{0}: placeholder for {1:?} did not resolve to a content hash")]
    DanglingPlaceholder(String, String),
    #[error("{0}")]
    InvalidStorePath(#[from] laut_compat::hash::Error),
    #[error("{0}")]
    InvalidPlaceholder(#[from] laut_compat::placeholder::Error),
    #[error("derivation JSON for {0} could not be reparsed: {1}")]
    InvalidJson(String, serde_json::Error),
    #[error("{0}: ATerm round-trip failed: {1}")]
    InvalidATerm(String, laut_derivation::aterm::Error),
    #[error("{0}")]
    InvalidName(#[from] laut_compat::store_path::Error),
}
