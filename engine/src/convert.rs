//! Both a verified signature's output map and a resolved derivation's output
//! map describe the same thing, `{output_name -> {path, hash}}`, but the
//! former is keyed to [`laut_verify::jws::OutputClaim`] (what a signature
//! asserts) and the latter to [`laut_resolve::ResolvedOutput`] (what the
//! resolver computed). The engine compares and chains the two, so it needs a
//! cheap conversion both ways.

use std::collections::BTreeMap;

use laut_resolve::ResolvedOutput;
use laut_verify::jws::OutputClaim;
use laut_verify::OutputMap;

pub fn to_output_claims(outputs: &BTreeMap<String, ResolvedOutput>) -> OutputMap {
    outputs
        .iter()
        .map(|(name, output)| {
            (
                name.clone(),
                OutputClaim {
                    path: output.path.clone(),
                    hash: output.hash.clone(),
                },
            )
        })
        .collect()
}

pub fn from_output_claims(outputs: &OutputMap) -> BTreeMap<String, ResolvedOutput> {
    outputs
        .iter()
        .map(|(name, claim)| {
            (
                name.clone(),
                ResolvedOutput {
                    path: claim.path.clone(),
                    hash: claim.hash.clone(),
                },
            )
        })
        .collect()
}
