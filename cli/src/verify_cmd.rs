//! `laut verify`: resolves `target` to a derivation path, builds the DAG for
//! its full transitive closure, and asks [`laut_engine`] whether the
//! configured trust model accepts some resolution of it.

use std::fs;

use laut_derivation::build;
use laut_engine::{verify_root, EngineConfig};
use laut_sigstore::SignatureStore;
use laut_verify::{TrustModel, TrustedKey};

use crate::args::VerifyArgs;
use crate::errors::CliError;
use crate::evaluator;

/// Exit code for "no resolution of the target is accepted by the trust
/// model" — a verification failure, not a tool error.
pub const EXIT_TRUST_NOT_SATISFIED: i32 = 118;

fn load_trusted_keys(paths: &[String]) -> Result<Vec<TrustedKey>, CliError> {
    paths
        .iter()
        .map(|path| {
            let contents = fs::read_to_string(path)
                .map_err(|e| CliError::KeyFile(path.clone(), e))?;
            TrustedKey::parse(contents.trim())
                .map_err(|e| CliError::KeyParse(path.clone(), e))
        })
        .collect()
}

/// Any one of `keys` agreeing on a resolution is sufficient when
/// `threshold == 1`; otherwise `threshold` distinct keys must agree.
fn build_trust_model(keys: &[TrustedKey], threshold: usize) -> TrustModel {
    TrustModel::threshold(
        threshold.max(1).min(keys.len().max(1)),
        keys.iter().map(|k| TrustModel::leaf(k.kid())).collect(),
    )
}

/// Runs `laut verify`. Returns the process exit code: `0` if some resolution
/// is accepted, [`EXIT_TRUST_NOT_SATISFIED`] otherwise.
pub async fn run(args: &VerifyArgs, evaluator_bin: &str, store_root: &str) -> Result<i32, CliError> {
    let drv_path = if evaluator::looks_like_drv_path(store_root, &args.target) {
        args.target.clone()
    } else {
        evaluator::resolve_flake_ref(evaluator_bin, &args.target)?
    };

    let raw = evaluator::derivation_closure(evaluator_bin, &drv_path)?;
    let root = build(&drv_path, &raw, args.allow_ia)?;

    let trusted_keys = load_trusted_keys(&args.trusted_keys)?;
    let trust_model = build_trust_model(&trusted_keys, args.threshold);

    let mut caches = Vec::with_capacity(args.caches.len());
    for uri in &args.caches {
        caches.push(laut_sigstore::from_addr(uri)?);
    }
    if caches.is_empty() {
        return Err(CliError::NoCaches);
    }

    let cfg = EngineConfig {
        trust_model,
        trusted_keys,
        signature_store: SignatureStore::new(caches),
    };

    let outcome = verify_root(&root, &cfg).await?;

    if outcome.accepted.is_empty() {
        return Ok(EXIT_TRUST_NOT_SATISFIED);
    }

    for (resolved_input_hash, outputs) in &outcome.accepted {
        let report = serde_json::json!({
            "drv_path": drv_path,
            "resolved_input_hash": resolved_input_hash,
            "outputs": outputs,
        });
        println!("{report}");
    }

    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_defaults_to_any_single_key() {
        let keys = vec![
            TrustedKey {
                name: "a".to_string(),
                verifying_key: ed25519_dalek::SigningKey::from_bytes(&[1u8; 32]).verifying_key(),
            },
            TrustedKey {
                name: "b".to_string(),
                verifying_key: ed25519_dalek::SigningKey::from_bytes(&[2u8; 32]).verifying_key(),
            },
        ];
        let model = build_trust_model(&keys, 1);
        assert!(matches!(
            model,
            TrustModel::Threshold { threshold: 1, .. }
        ));
    }
}
