//! The trust reasoner: an append-only fact base the traversal populates, and
//! a `accepted()` query that applies the trust model bottom-up once the walk
//! is done.
//!
//! The DAG is acyclic and already visited in post-order by the traversal, so
//! the bottom-up query is a single memoized recursion rather than an
//! iterate-to-fixpoint loop — there is nothing forward-referenced left to
//! discover.

use std::collections::BTreeMap;

use laut_verify::{OutputMap, TrustModel, VerifiedClaim};

/// One interior node's resolved-derivation fact: which child candidate
/// (identified by its own output map) was used for each referenced input
/// when this `resolved_input_hash` was computed.
type ChildAssignment = BTreeMap<String, OutputMap>;

#[derive(Default)]
pub struct Reasoner {
    fod: BTreeMap<String, (String, OutputMap)>,
    resolutions: BTreeMap<(String, String), ChildAssignment>,
    claims: BTreeMap<(String, String), Vec<VerifiedClaim>>,
}

impl Reasoner {
    pub fn register_fod(&mut self, drv_path: &str, input_hash: &str, outputs: &OutputMap) {
        self.fod
            .entry(drv_path.to_string())
            .or_insert_with(|| (input_hash.to_string(), outputs.clone()));
    }

    pub fn register_resolution(
        &mut self,
        drv_path: &str,
        resolved_input_hash: &str,
        children: ChildAssignment,
    ) {
        self.resolutions
            .entry((drv_path.to_string(), resolved_input_hash.to_string()))
            .or_insert(children);
    }

    pub fn register_claim(&mut self, drv_path: &str, resolved_input_hash: &str, claim: VerifiedClaim) {
        self.claims
            .entry((drv_path.to_string(), resolved_input_hash.to_string()))
            .or_default()
            .push(claim);
    }

    fn claims_at(&self, drv_path: &str, resolved_input_hash: &str) -> &[VerifiedClaim] {
        self.claims
            .get(&(drv_path.to_string(), resolved_input_hash.to_string()))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// The `(resolved_input_hash, output_map)` pairs at `drv_path` that
    /// satisfy `trust_model`: a fixed-output leaf is trusted by
    /// construction; an interior node's resolution is accepted only if its
    /// own claims clear the trust model's threshold *and* every child output
    /// map it was built from is itself accepted at that child.
    pub fn accepted(&self, drv_path: &str, trust_model: &TrustModel) -> Vec<(String, OutputMap)> {
        let mut memo = BTreeMap::new();
        self.accepted_memo(drv_path, trust_model, &mut memo)
    }

    fn accepted_memo(
        &self,
        drv_path: &str,
        trust_model: &TrustModel,
        memo: &mut BTreeMap<String, Vec<(String, OutputMap)>>,
    ) -> Vec<(String, OutputMap)> {
        if let Some(existing) = memo.get(drv_path) {
            return existing.clone();
        }
        // Breaks cycles defensively; the DAG invariant rules them out, but an
        // empty result here is harmless rather than an infinite loop.
        memo.insert(drv_path.to_string(), Vec::new());

        let result = if let Some((input_hash, outputs)) = self.fod.get(drv_path) {
            vec![(input_hash.clone(), outputs.clone())]
        } else {
            let mut accepted = Vec::new();
            for ((node, resolved_input_hash), children) in &self.resolutions {
                if node != drv_path {
                    continue;
                }

                let chains = children.iter().all(|(child_path, child_outputs)| {
                    self.accepted_memo(child_path, trust_model, memo)
                        .iter()
                        .any(|(_, accepted_outputs)| accepted_outputs == child_outputs)
                });
                if !chains {
                    continue;
                }

                let claims = self.claims_at(drv_path, resolved_input_hash);
                for output_map in trust_model.accepted_output_maps(claims) {
                    accepted.push((resolved_input_hash.clone(), output_map));
                }
            }
            accepted
        };

        memo.insert(drv_path.to_string(), result.clone());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output_map(path: &str) -> OutputMap {
        let mut m = OutputMap::new();
        m.insert(
            "out".to_string(),
            laut_verify::jws::OutputClaim {
                path: Some(path.to_string()),
                hash: Some("h".to_string()),
            },
        );
        m
    }

    #[test]
    fn fod_is_trusted_without_claims() {
        let mut reasoner = Reasoner::default();
        reasoner.register_fod("leaf.drv", "abc", &output_map("/x"));

        let model = TrustModel::leaf("someone-who-never-signed-anything");
        let accepted = reasoner.accepted("leaf.drv", &model);
        assert_eq!(accepted, vec![("abc".to_string(), output_map("/x"))]);
    }

    #[test]
    fn interior_node_requires_both_quorum_and_chain() {
        let mut reasoner = Reasoner::default();
        reasoner.register_fod("leaf.drv", "leaf-hash", &output_map("/leaf"));

        let mut children = ChildAssignment::new();
        children.insert("leaf.drv".to_string(), output_map("/leaf"));
        reasoner.register_resolution("root.drv", "root-hash", children);
        reasoner.register_claim(
            "root.drv",
            "root-hash",
            VerifiedClaim {
                kid: "k1:aaaaaaaaaaaaaaaa".to_string(),
                outputs: output_map("/root"),
            },
        );

        let model = TrustModel::leaf("k1:aaaaaaaaaaaaaaaa");
        let accepted = reasoner.accepted("root.drv", &model);
        assert_eq!(accepted, vec![("root-hash".to_string(), output_map("/root"))]);
    }

    #[test]
    fn interior_node_rejected_if_child_never_accepted() {
        let mut reasoner = Reasoner::default();
        // no FOD fact registered for the child at all

        let mut children = ChildAssignment::new();
        children.insert("leaf.drv".to_string(), output_map("/leaf"));
        reasoner.register_resolution("root.drv", "root-hash", children);
        reasoner.register_claim(
            "root.drv",
            "root-hash",
            VerifiedClaim {
                kid: "k1:aaaaaaaaaaaaaaaa".to_string(),
                outputs: output_map("/root"),
            },
        );

        let model = TrustModel::leaf("k1:aaaaaaaaaaaaaaaa");
        assert!(reasoner.accepted("root.drv", &model).is_empty());
    }
}
