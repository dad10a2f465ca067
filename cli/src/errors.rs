use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid target {0:?}: not a derivation path and not a flake reference")]
    InvalidTarget(String),
    #[error("failed to invoke the evaluator: {0}")]
    EvaluatorSpawn(#[source] std::io::Error),
    #[error("evaluator exited with {0}: {1}")]
    EvaluatorFailed(std::process::ExitStatus, String),
    #[error("evaluator output for {0:?} was not valid JSON: {1}")]
    EvaluatorJson(String, serde_json::Error),
    #[error("evaluator did not return a derivation for {0:?}")]
    EvaluatorMissingDerivation(String),
    #[error("evaluator output was not valid UTF-8: {0}")]
    EvaluatorUtf8(#[from] std::string::FromUtf8Error),
    #[error("failed to read key file {0:?}: {1}")]
    KeyFile(String, #[source] std::io::Error),
    #[error("invalid key in {0:?}: {1}")]
    KeyParse(String, laut_verify::key::Error),
    #[error(transparent)]
    Derivation(#[from] laut_derivation::DerivationError),
    #[error(transparent)]
    Sign(#[from] laut_sign::SignError),
    #[error(transparent)]
    Engine(#[from] laut_engine::EngineError),
    #[error(transparent)]
    Sigstore(#[from] laut_sigstore::Error),
    #[error("no signature caches configured")]
    NoCaches,
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Tracing(#[from] laut_tracing::Error),
}
