use thiserror::Error;

#[derive(Debug, Error)]
pub enum DerivationError {
    #[error("derivation JSON does not contain an entry for {0}")]
    MissingDerivation(String),
    #[error("{0}: input-addressed derivations are not supported unless allow_ia is set")]
    UnsupportedInputAddressed(String),
    #[error("{0}: input-addressed output {1:?} has no path")]
    MissingOutputPath(String, String),
    #[error("{0}")]
    InvalidStorePath(#[from] laut_compat::hash::Error),
    #[error("derivation JSON for {0} could not be canonicalized: {1}")]
    InvalidJson(String, serde_json::Error),
}
