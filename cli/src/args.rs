use clap::{Parser, Subcommand};
use tracing::Level;

/// Issues and verifies build-trace signatures over resolved, content-addressed
/// derivations.
#[derive(Parser)]
pub struct Cli {
    /// A global log level to use when printing logs. `RUST_LOG`, parsed per
    /// `tracing_subscriber::filter::EnvFilter`, always takes priority.
    #[arg(long, default_value_t = Level::INFO, global = true)]
    pub log_level: Level,

    /// The external evaluator binary used to resolve flake references and
    /// fetch derivation JSON.
    #[arg(long, env = "LAUT_EVALUATOR", default_value = "nix", global = true)]
    pub evaluator: String,

    /// The store root a derivation path must live under.
    #[arg(long, env = "NIX_STORE_DIR", default_value = "/nix/store", global = true)]
    pub store_root: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Signs an already-resolved, content-addressed derivation.
    Sign(SignArgs),
    /// Verifies a derivation's build trace against a set of trusted keys.
    Verify(VerifyArgs),
}

#[derive(Parser)]
pub struct SignArgs {
    /// Path to the (already-resolved) derivation to sign.
    #[arg(env = "DRV_PATH")]
    pub drv_path: String,

    /// Private key file(s) to sign with; `"<name>:<base64 seed>"`. Repeat to
    /// produce one signature per key.
    #[arg(long = "secret-key-file", required = true)]
    pub secret_key_files: Vec<String>,

    /// Space-separated `name=path` or `name=path:hash` output attestations,
    /// as the build reports them. Falls back to `OUT_PATHS` if omitted.
    #[arg(long, env = "OUT_PATHS")]
    pub out_paths: Option<String>,

    /// Upload the produced signature(s) to this signature-store cache
    /// instead of printing them to stdout.
    #[arg(long)]
    pub to: Option<String>,

    /// Include the `debug` preimage block in the signed payload.
    #[arg(long)]
    pub debug: bool,
}

#[derive(Parser)]
pub struct VerifyArgs {
    /// A derivation path, or a `<flake>#<attr>` reference resolved via the
    /// external evaluator.
    pub target: String,

    /// Signature-store cache URL(s), queried in the given order.
    #[arg(long = "cache", required = true)]
    pub caches: Vec<String>,

    /// Trusted public-key file(s); `"<name>:<base64 pubkey>"`. Any one
    /// signing the same resolution is sufficient unless `--threshold` says
    /// otherwise.
    #[arg(long = "trusted-key", required = true)]
    pub trusted_keys: Vec<String>,

    /// Number of distinct trusted keys that must agree on the same
    /// resolution. Defaults to 1 (any single trusted key suffices).
    #[arg(long, default_value_t = 1)]
    pub threshold: usize,

    /// Allow input-addressed derivations in the DAG instead of rejecting
    /// them as unsupported.
    #[arg(long)]
    pub allow_ia: bool,
}
