//! `laut sign`: reads the already-resolved derivation, signs it with every
//! configured key, and either prints the resulting tokens or uploads them.

use std::collections::BTreeMap;
use std::fs;

use laut_sign::{sign, OutputAttestation, SignOutcome, SignRequest};
use laut_verify::SigningKey;

use crate::args::SignArgs;
use crate::errors::CliError;
use crate::evaluator;

/// Exit code for "derivation is unresolved, nothing to sign" — not an error.
pub const EXIT_UNRESOLVED: i32 = 117;

/// Parses the `name=path` or `name=path:hash` pairs `OUT_PATHS`/`--out-paths`
/// carries, space-separated, one per output.
fn parse_out_paths(raw: &str) -> BTreeMap<String, OutputAttestation> {
    let mut outputs = BTreeMap::new();
    for entry in raw.split_whitespace() {
        let Some((name, rest)) = entry.split_once('=') else {
            continue;
        };
        let (path, hash) = match rest.split_once(':') {
            Some((path, hash)) => (Some(path.to_string()), Some(hash.to_string())),
            None => (Some(rest.to_string()), None),
        };
        outputs.insert(name.to_string(), OutputAttestation { path, hash });
    }
    outputs
}

fn load_signing_keys(paths: &[String]) -> Result<Vec<SigningKey>, CliError> {
    paths
        .iter()
        .map(|path| {
            let contents = fs::read_to_string(path)
                .map_err(|e| CliError::KeyFile(path.clone(), e))?;
            SigningKey::parse(contents.trim())
                .map_err(|e| CliError::KeyParse(path.clone(), e))
        })
        .collect()
}

/// Runs `laut sign`. Returns the process exit code: `0` on success (with the
/// signature(s) already printed or uploaded), [`EXIT_UNRESOLVED`] if the
/// derivation still has unresolved input-drvs.
pub async fn run(args: &SignArgs, evaluator_bin: &str) -> Result<i32, CliError> {
    let drv_json = evaluator::derivation_json(evaluator_bin, &args.drv_path)?;

    let out_paths = args
        .out_paths
        .clone()
        .ok_or_else(|| CliError::Usage("no --out-paths given and OUT_PATHS is unset".to_string()))?;
    let outputs = parse_out_paths(&out_paths);

    let keys = load_signing_keys(&args.secret_key_files)?;

    let cache = match &args.to {
        Some(uri) => Some(laut_sigstore::from_addr(uri)?),
        None => None,
    };

    let mut tokens = Vec::with_capacity(keys.len());
    let mut resolved_input_hash = None;
    for key in &keys {
        let request = SignRequest {
            drv_path: &args.drv_path,
            drv_json: &drv_json,
            outputs: outputs.clone(),
            debug: args.debug,
        };
        match sign(&request, key)? {
            SignOutcome::Unresolved => return Ok(EXIT_UNRESOLVED),
            SignOutcome::Signed(token) => {
                if resolved_input_hash.is_none() {
                    let jws = laut_verify::jws::parse(&token)
                        .expect("signer always produces a parseable token");
                    resolved_input_hash = jws.payload.input.rdrv_aterm_ca.clone();
                }
                tokens.push(token);
            }
        }
    }

    match cache {
        Some(cache) => {
            let hash = resolved_input_hash.expect("at least one key is required by clap");
            for token in &tokens {
                cache.upload(&hash, token).await?;
            }
        }
        None => {
            for token in &tokens {
                println!("{token}");
            }
        }
    }

    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_out_paths_handles_path_and_hash() {
        let outputs = parse_out_paths(
            "out=/nix/store/xxx-hello doc=/nix/store/yyy-doc:deadbeef",
        );
        assert_eq!(outputs.len(), 2);
        assert_eq!(
            outputs["out"].path.as_deref(),
            Some("/nix/store/xxx-hello")
        );
        assert_eq!(outputs["doc"].hash.as_deref(), Some("deadbeef"));
    }
}
