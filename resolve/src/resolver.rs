//! Dependency resolver: substitutes input-derivation placeholders with
//! concrete content hashes to produce a resolved preimage, in both the JSON
//! and ATerm encodings, and computes the resolved input hash of each.

use std::collections::BTreeMap;
use std::sync::Arc;

use laut_compat::hash::{canonical_json, sha256_urlsafe_b64_nopad};
use laut_compat::store_path::build_store_path_from_references;
use laut_derivation::json::DerivationJson;
use laut_derivation::{aterm, UnresolvedDerivation};

use crate::errors::ResolveError;
use crate::model::{Assignment, ResolvedOutput, TrustlesslyResolvedDerivation};

const NIXBASE32_PLACEHOLDER_LEN: usize = 52;
const NIXBASE32_ALPHABET: &[u8] = b"0123456789abcdfghijklmnpqrsvwxyz";

/// The outcome of resolving one derivation's preimage: its hash, the
/// substituted bytes (kept for debug payloads), and any placeholder that
/// could not be substituted (diagnostic only, per the error taxonomy).
pub struct ResolvedPreimage {
    pub input_hash: String,
    pub preimage: Vec<u8>,
    pub dangling_placeholders: Vec<String>,
}

/// Resolves a fixed-output leaf: its resolved input hash is simply its own
/// (unresolved) input hash, and its outputs carry the declared path/hash
/// verbatim. No preimage computation or signature lookup is involved.
pub fn resolve_fixed_output(
    drv: &Arc<UnresolvedDerivation>,
) -> Result<TrustlesslyResolvedDerivation, ResolveError> {
    let parsed: DerivationJson = serde_json::from_value(drv.json_attrs.clone())
        .map_err(|e| ResolveError::InvalidJson(drv.drv_path.clone(), e))?;

    let mut outputs = BTreeMap::new();
    for (name, output) in &parsed.outputs {
        outputs.insert(
            name.clone(),
            ResolvedOutput {
                path: output.path.clone(),
                hash: output.hash.clone(),
            },
        );
    }

    Ok(TrustlesslyResolvedDerivation {
        resolves: drv.clone(),
        drv_path: None,
        input_hash: drv.input_hash.clone(),
        outputs,
    })
}

/// Resolves an interior node via the JSON preimage rule (see module docs).
pub fn resolve_json(
    drv: &UnresolvedDerivation,
    assignment: &Assignment,
) -> Result<ResolvedPreimage, ResolveError> {
    let subs = substitutions(drv, assignment)?;

    let mut value = drv.json_attrs.clone();
    let obj = value
        .as_object_mut()
        .expect("derivation JSON attrs are always a JSON object");

    let mut input_srcs: Vec<String> = obj
        .get("inputSrcs")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    // Per spec, only non-fixed-output input-drvs contribute their referenced
    // outputs' content hashes to inputSrcs here.
    input_srcs.extend(referenced_content_hashes(drv, assignment, true)?);
    input_srcs.sort();
    obj.insert(
        "inputSrcs".to_string(),
        serde_json::Value::Array(input_srcs.into_iter().map(serde_json::Value::String).collect()),
    );
    obj.insert(
        "inputDrvs".to_string(),
        serde_json::Value::Object(serde_json::Map::new()),
    );

    let canonical = canonical_json(&value);
    finish(drv, canonical, &subs)
}

/// Resolves an interior node via the ATerm preimage rule. Also returns the
/// resolved store path computed from the substituted ATerm, matching the
/// system's standard drv-path-from-ATerm rule.
pub fn resolve_aterm(
    drv: &UnresolvedDerivation,
    assignment: &Assignment,
) -> Result<(ResolvedPreimage, String), ResolveError> {
    let subs = substitutions(drv, assignment)?;

    let parsed: DerivationJson = serde_json::from_value(drv.json_attrs.clone())
        .map_err(|e| ResolveError::InvalidJson(drv.drv_path.clone(), e))?;
    let mut term = aterm::from_derivation_json(&parsed);

    // Unlike the JSON rule, the ATerm rule has no fixed-output exclusion:
    // every referenced output's content hash is appended, including those
    // of fixed-output inputs (their path is already resolved, but their
    // content hash still belongs in input_srcs).
    term.input_srcs.extend(referenced_content_hashes(drv, assignment, false)?);
    term.input_drvs.clear();

    let formatted = aterm::format(&term);
    let resolved = finish(drv, formatted, &subs)?;

    let references: std::collections::BTreeSet<String> = term
        .input_srcs
        .iter()
        .cloned()
        .chain(drv.inputs.keys().cloned())
        .collect();

    let name = format!("{}.drv", drv.name);
    let store_path = build_store_path_from_references(&name, &resolved.preimage, references)?;

    Ok((resolved, store_path.to_absolute_path()))
}

fn finish(
    drv: &UnresolvedDerivation,
    canonical: Vec<u8>,
    subs: &BTreeMap<String, String>,
) -> Result<ResolvedPreimage, ResolveError> {
    let substituted = substitute_bytes(&canonical, subs);

    let own_placeholders: std::collections::HashSet<String> = drv
        .outputs
        .values()
        .filter_map(|o| o.placeholder().ok())
        .collect();

    let text = String::from_utf8_lossy(&substituted);
    let dangling_placeholders: Vec<String> = scan_for_placeholders(&text)
        .into_iter()
        .filter(|p| !own_placeholders.contains(p))
        .collect();

    let input_hash = sha256_urlsafe_b64_nopad(&substituted);

    Ok(ResolvedPreimage {
        input_hash,
        preimage: substituted,
        dangling_placeholders,
    })
}

/// Collects, per input, the placeholder -> content-hash substitution that
/// must be applied to this derivation's preimage text. Inputs whose own
/// derivation is fixed-output are skipped: their output path is already a
/// literal string in the unresolved text, not a placeholder. This exclusion
/// is about textual substitution only — it has no bearing on whether an
/// input's content hash belongs in `inputSrcs`/`input_srcs`, which
/// [`referenced_content_hashes`] decides per encoding.
fn substitutions(
    drv: &UnresolvedDerivation,
    assignment: &Assignment,
) -> Result<BTreeMap<String, String>, ResolveError> {
    let mut subs = BTreeMap::new();

    for (input_drv_path, referenced) in &drv.inputs {
        if referenced.derivation.is_fixed_output {
            continue;
        }

        let resolved = assignment
            .get(input_drv_path)
            .ok_or_else(|| ResolveError::UnresolvedDependency(drv.drv_path.clone()))?;

        for (output_name, output) in &referenced.inputs {
            let placeholder = output.placeholder()?;
            let replacement = resolved
                .outputs
                .get(output_name)
                .and_then(|o| o.hash.clone())
                .ok_or_else(|| {
                    ResolveError::DanglingPlaceholder(drv.drv_path.clone(), output_name.clone())
                })?;
            subs.insert(placeholder, replacement);
        }
    }

    Ok(subs)
}

/// Collects the content hash of every referenced output across `drv`'s
/// inputs, to append to `inputSrcs`/`input_srcs`. The JSON rule excludes
/// fixed-output inputs (`skip_fixed_output = true`); the ATerm rule carries
/// no such exclusion (`skip_fixed_output = false`) and appends every
/// referenced output's content hash unconditionally, fixed-output inputs
/// included.
fn referenced_content_hashes(
    drv: &UnresolvedDerivation,
    assignment: &Assignment,
    skip_fixed_output: bool,
) -> Result<Vec<String>, ResolveError> {
    let mut hashes = Vec::new();

    for (input_drv_path, referenced) in &drv.inputs {
        if skip_fixed_output && referenced.derivation.is_fixed_output {
            continue;
        }

        let resolved = assignment
            .get(input_drv_path)
            .ok_or_else(|| ResolveError::UnresolvedDependency(drv.drv_path.clone()))?;

        for output_name in referenced.inputs.keys() {
            let hash = resolved
                .outputs
                .get(output_name)
                .and_then(|o| o.hash.clone())
                .ok_or_else(|| {
                    ResolveError::DanglingPlaceholder(drv.drv_path.clone(), output_name.clone())
                })?;
            hashes.push(hash);
        }
    }

    Ok(hashes)
}

fn substitute_bytes(canonical: &[u8], subs: &BTreeMap<String, String>) -> Vec<u8> {
    let mut text = String::from_utf8_lossy(canonical).into_owned();
    for (placeholder, replacement) in subs {
        text = text.replace(placeholder.as_str(), replacement.as_str());
    }
    text.into_bytes()
}

fn scan_for_placeholders(text: &str) -> Vec<String> {
    let bytes = text.as_bytes();
    let mut found = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'/' {
            let start = i + 1;
            let mut end = start;
            while end < bytes.len() && NIXBASE32_ALPHABET.contains(&bytes[end]) {
                end += 1;
            }
            if end - start == NIXBASE32_PLACEHOLDER_LEN {
                found.push(text[i..end].to_string());
            }
            i = end.max(i + 1);
        } else {
            i += 1;
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn leaf() -> Arc<UnresolvedDerivation> {
        let raw = json!({
            "name": "leaf",
            "system": "x86_64-linux",
            "builder": "/bin/sh",
            "args": [],
            "env": {},
            "outputs": {"out": {}},
            "inputDrvs": {},
            "inputSrcs": []
        });
        laut_derivation::build(
            "/nix/store/g1w7hy3qg1w7hy3qg1w7hy3qg1w7hy3q-leaf.drv",
            &std::iter::once((
                "/nix/store/g1w7hy3qg1w7hy3qg1w7hy3qg1w7hy3q-leaf.drv".to_string(),
                raw,
            ))
            .collect(),
            false,
        )
        .unwrap()
    }

    #[test]
    fn json_resolution_is_deterministic() {
        let drv = leaf();
        let assignment = Assignment::new();
        let a = resolve_json(&drv, &assignment).unwrap();
        let b = resolve_json(&drv, &assignment).unwrap();
        assert_eq!(a.input_hash, b.input_hash);
        assert_eq!(a.preimage, b.preimage);
        assert!(a.dangling_placeholders.is_empty());
    }

    #[test]
    fn scan_finds_nothing_in_plain_text() {
        assert!(scan_for_placeholders("no placeholders here").is_empty());
    }
}
