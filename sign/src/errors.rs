use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignError {
    #[error("{0}: derivation JSON could not be parsed: {1}")]
    InvalidJson(String, serde_json::Error),
    #[error("{0}: fixed-output derivations have nothing to attest")]
    FixedOutput(String),
    #[error("{0}: input-addressed derivations are out of scope for signing")]
    InputAddressed(String),
    #[error("failed to serialize JWS segment: {0}")]
    Serialize(#[from] serde_json::Error),
}
