//! Trust model: threshold-of-keys composition over verified signatures for
//! a single resolved input hash.

use std::collections::BTreeMap;

use crate::jws::OutputClaim;

pub type OutputMap = BTreeMap<String, OutputClaim>;

/// One verified `(kid, output_map)` claim at a given resolved input hash.
#[derive(Clone, Debug)]
pub struct VerifiedClaim {
    pub kid: String,
    pub outputs: OutputMap,
}

/// `TrustModel = Leaf(Key) | Threshold(t, [TrustModel])`.
#[derive(Clone, Debug)]
pub enum TrustModel {
    Leaf(String),
    Threshold {
        threshold: usize,
        components: Vec<TrustModel>,
    },
}

impl TrustModel {
    pub fn leaf(kid: impl Into<String>) -> Self {
        TrustModel::Leaf(kid.into())
    }

    pub fn threshold(threshold: usize, components: Vec<TrustModel>) -> Self {
        assert!(
            threshold >= 1 && threshold <= components.len(),
            "threshold must satisfy 1 <= t <= |components|"
        );
        TrustModel::Threshold {
            threshold,
            components,
        }
    }

    /// Whether this model accepts `candidate` given the set of claims
    /// verified for one resolved input hash. A `Leaf` accepts iff its key
    /// signed exactly `candidate`; a `Threshold` accepts iff at least `t`
    /// sub-models accept the same `candidate`.
    pub fn accepts(&self, claims: &[VerifiedClaim], candidate: &OutputMap) -> bool {
        match self {
            TrustModel::Leaf(kid) => claims
                .iter()
                .any(|claim| &claim.kid == kid && &claim.outputs == candidate),
            TrustModel::Threshold {
                threshold,
                components,
            } => {
                components
                    .iter()
                    .filter(|component| component.accepts(claims, candidate))
                    .count()
                    >= *threshold
            }
        }
    }

    /// Every distinct output map among `claims` that this model accepts.
    pub fn accepted_output_maps(&self, claims: &[VerifiedClaim]) -> Vec<OutputMap> {
        let mut seen = Vec::new();
        for claim in claims {
            if seen.contains(&claim.outputs) {
                continue;
            }
            if self.accepts(claims, &claim.outputs) {
                seen.push(claim.outputs.clone());
            }
        }
        seen
    }
}
