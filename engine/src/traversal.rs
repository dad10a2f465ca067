//! The post-order DAG walk: for every node, enumerate resolutions and fetch
//! and verify whatever signatures claim them, regardless of whether those
//! claims alone clear the trust model. Acceptance is decided once, globally,
//! by [`crate::Reasoner::accepted`] after the whole tree has been walked —
//! not here, so that the reasoner can still pick a valid chain even when an
//! intermediate node has competing, mutually exclusive signed resolutions.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use laut_derivation::UnresolvedDerivation;
use laut_resolve::{resolve_aterm, resolve_fixed_output, resolve_json, Assignment, TrustlesslyResolvedDerivation};
use laut_sigstore::SignatureStore;
use laut_verify::{jws, OutputMap, TrustModel, TrustedKey, VerifiedClaim};

use crate::convert::{from_output_claims, to_output_claims};
use crate::reasoner::Reasoner;
use crate::EngineError;

pub struct EngineConfig {
    pub trust_model: TrustModel,
    pub trusted_keys: Vec<TrustedKey>,
    pub signature_store: SignatureStore,
}

/// Which root resolutions survived the trust model, or none if the root is
/// not resolvable under it.
pub struct Outcome {
    pub accepted: Vec<(String, OutputMap)>,
}

/// Walks the DAG rooted at `root` and asks the reasoner which resolutions of
/// `root` the configured trust model accepts.
pub async fn verify_root(
    root: &Arc<UnresolvedDerivation>,
    cfg: &EngineConfig,
) -> Result<Outcome, EngineError> {
    let mut memo = HashMap::new();
    let mut reasoner = Reasoner::default();
    resolve_node(root, &mut memo, &mut reasoner, cfg).await?;
    let accepted = reasoner.accepted(&root.drv_path, &cfg.trust_model);
    Ok(Outcome { accepted })
}

type Candidates = Vec<Arc<TrustlesslyResolvedDerivation>>;

fn resolve_node<'a>(
    drv: &'a Arc<UnresolvedDerivation>,
    memo: &'a mut HashMap<String, Candidates>,
    reasoner: &'a mut Reasoner,
    cfg: &'a EngineConfig,
) -> BoxFuture<'a, Result<Candidates, EngineError>> {
    async move {
        if let Some(existing) = memo.get(&drv.drv_path) {
            return Ok(existing.clone());
        }

        let candidates = if drv.is_fixed_output {
            let resolved = resolve_fixed_output(drv)?;
            reasoner.register_fod(
                &drv.drv_path,
                &resolved.input_hash,
                &to_output_claims(&resolved.outputs),
            );
            vec![Arc::new(resolved)]
        } else {
            let mut child_lists = Vec::with_capacity(drv.inputs.len());
            for (input_drv_path, referenced) in &drv.inputs {
                let sub = resolve_node(&referenced.derivation, &mut *memo, &mut *reasoner, cfg).await?;
                if sub.is_empty() {
                    memo.insert(drv.drv_path.clone(), Vec::new());
                    return Ok(Vec::new());
                }
                child_lists.push((input_drv_path.clone(), sub));
            }

            let mut candidates = Vec::new();
            for assignment in cartesian(child_lists) {
                let mut produced = process_assignment(drv, &assignment, reasoner, cfg).await?;
                candidates.append(&mut produced);
            }
            candidates
        };

        memo.insert(drv.drv_path.clone(), candidates.clone());
        Ok(candidates)
    }
    .boxed()
}

/// Resolves one Cartesian assignment of children, fetches signatures at both
/// the ATerm- and JSON-based resolved input hashes, and registers every
/// verified claim with the reasoner — successful or not, trust is decided
/// later. Returns one candidate resolution per distinct verified output map.
async fn process_assignment(
    drv: &Arc<UnresolvedDerivation>,
    assignment: &Assignment,
    reasoner: &mut Reasoner,
    cfg: &EngineConfig,
) -> Result<Candidates, EngineError> {
    let json_res = resolve_json(drv, assignment)?;
    let (aterm_res, resolved_path) = resolve_aterm(drv, assignment)?;
    // The ATerm-based hash is the canonical resolved input hash: it is the
    // one used to key reasoner facts and, by default, to fetch signatures.
    // The JSON-based hash is also queried, for signatures produced by a
    // JSON-mode signer against the same assignment.
    let resolved_input_hash = aterm_res.input_hash.clone();

    let children: BTreeMap<String, OutputMap> = assignment
        .iter()
        .map(|(path, candidate)| (path.clone(), to_output_claims(&candidate.outputs)))
        .collect();
    reasoner.register_resolution(&drv.drv_path, &resolved_input_hash, children);

    let candidate_hashes = [resolved_input_hash.clone(), json_res.input_hash.clone()];
    let mut raw_signatures = Vec::new();
    for hash in &candidate_hashes {
        raw_signatures.extend(cfg.signature_store.fetch(hash).await);
    }
    raw_signatures.sort();
    raw_signatures.dedup();

    let mut seen_outputs: Vec<OutputMap> = Vec::new();
    for raw in &raw_signatures {
        for key in &cfg.trusted_keys {
            let verified = candidate_hashes
                .iter()
                .find_map(|hash| jws::verify(raw, key, hash).ok());

            let Some(verified) = verified else { continue };

            reasoner.register_claim(
                &drv.drv_path,
                &resolved_input_hash,
                VerifiedClaim {
                    kid: verified.kid.clone(),
                    outputs: verified.outputs.clone(),
                },
            );
            if !seen_outputs.contains(&verified.outputs) {
                seen_outputs.push(verified.outputs);
            }
        }
    }

    Ok(seen_outputs
        .into_iter()
        .map(|outputs| {
            Arc::new(TrustlesslyResolvedDerivation {
                resolves: drv.clone(),
                drv_path: Some(resolved_path.clone()),
                input_hash: resolved_input_hash.clone(),
                outputs: from_output_claims(&outputs),
            })
        })
        .collect())
}

/// The empty product is the singleton empty assignment — the case of a node
/// whose only inputs are sources, with no input-drvs to enumerate.
fn cartesian(children: Vec<(String, Candidates)>) -> Vec<Assignment> {
    let mut assignments = vec![Assignment::new()];
    for (key, candidates) in children {
        let mut next = Vec::with_capacity(assignments.len() * candidates.len());
        for assignment in &assignments {
            for candidate in &candidates {
                let mut extended = assignment.clone();
                extended.insert(key.clone(), candidate.clone());
                next.push(extended);
            }
        }
        assignments = next;
    }
    assignments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cartesian_of_no_children_is_one_empty_assignment() {
        let assignments = cartesian(Vec::new());
        assert_eq!(assignments.len(), 1);
        assert!(assignments[0].is_empty());
    }
}
