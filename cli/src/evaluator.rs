//! The external evaluator collaborator: a subprocess that turns a flake-style
//! reference or a derivation path into the JSON derivation mapping `laut`
//! itself never computes.

use std::process::Command;

use laut_derivation::RawDerivations;
use serde_json::Value;

use crate::errors::CliError;

/// Name of the evaluator binary to invoke, overridable so tests and
/// non-Nix evaluators can swap in a stand-in.
pub const DEFAULT_EVALUATOR: &str = "nix";

fn run(evaluator: &str, args: &[&str]) -> Result<Vec<u8>, CliError> {
    let output = Command::new(evaluator)
        .args(args)
        .output()
        .map_err(CliError::EvaluatorSpawn)?;

    if !output.status.success() {
        return Err(CliError::EvaluatorFailed(
            output.status,
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    Ok(output.stdout)
}

/// Resolves a flake-style `<flake>#<attr>` reference to its derivation path,
/// via `nix eval --raw <flake>#<attr>.drvPath` (or the configured evaluator's
/// equivalent).
pub fn resolve_flake_ref(evaluator: &str, target: &str) -> Result<String, CliError> {
    let (flake, attr) = target
        .split_once('#')
        .ok_or_else(|| CliError::InvalidTarget(target.to_string()))?;
    let expr = format!("{flake}#{attr}.drvPath");
    let stdout = run(evaluator, &["eval", "--raw", &expr])?;
    Ok(String::from_utf8(stdout)?.trim().to_string())
}

/// Evaluates the single derivation at `drv_path`, without its closure.
pub fn derivation_json(evaluator: &str, drv_path: &str) -> Result<Value, CliError> {
    let stdout = run(evaluator, &["derivation", "show", drv_path])?;
    let mut map: RawDerivations = serde_json::from_slice(&stdout)
        .map_err(|e| CliError::EvaluatorJson(drv_path.to_string(), e))?;
    map.remove(drv_path)
        .ok_or_else(|| CliError::EvaluatorMissingDerivation(drv_path.to_string()))
}

/// Evaluates `drv_path` and its full transitive closure of input
/// derivations, via `nix derivation show -r` (recursive mode).
pub fn derivation_closure(evaluator: &str, drv_path: &str) -> Result<RawDerivations, CliError> {
    let stdout = run(evaluator, &["derivation", "show", "-r", drv_path])?;
    serde_json::from_slice(&stdout).map_err(|e| CliError::EvaluatorJson(drv_path.to_string(), e))
}

/// Whether `target` already looks like a derivation path rather than a
/// flake reference, per the `^/<store-root>/.*\.drv$` shape from the CLI
/// summary.
pub fn looks_like_drv_path(store_root: &str, target: &str) -> bool {
    target.starts_with(store_root) && target.ends_with(".drv")
}
