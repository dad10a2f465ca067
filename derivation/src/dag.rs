//! Builds an [`UnresolvedDerivation`] DAG from the evaluator's flat
//! `drv_path -> derivation JSON` mapping, memoizing on `drv_path` so that a
//! derivation referenced by many dependents is constructed exactly once.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use laut_compat::hash::extract_store_hash;
use serde_json::Value;

use crate::errors::DerivationError;
use crate::json::DerivationJson;
use crate::model::{UnresolvedDerivation, UnresolvedOutput, UnresolvedReferencedInputs};

/// The raw mapping an evaluator produces: every reachable derivation's path,
/// to its JSON attribute record.
pub type RawDerivations = BTreeMap<String, Value>;

pub struct Builder<'a> {
    raw: &'a RawDerivations,
    allow_ia: bool,
    memo: HashMap<String, Arc<UnresolvedDerivation>>,
}

/// Constructs the DAG rooted at `root_drv_path`, returning the root node.
/// Every transitively referenced derivation is built at most once.
pub fn build(
    root_drv_path: &str,
    raw: &RawDerivations,
    allow_ia: bool,
) -> Result<Arc<UnresolvedDerivation>, DerivationError> {
    let mut builder = Builder {
        raw,
        allow_ia,
        memo: HashMap::new(),
    };
    builder.build(root_drv_path)
}

impl<'a> Builder<'a> {
    #[tracing::instrument(skip(self), fields(drv_path))]
    fn build(&mut self, drv_path: &str) -> Result<Arc<UnresolvedDerivation>, DerivationError> {
        if let Some(existing) = self.memo.get(drv_path) {
            tracing::debug!("already built, reusing memoized node");
            return Ok(existing.clone());
        }

        let raw_value = self
            .raw
            .get(drv_path)
            .ok_or_else(|| DerivationError::MissingDerivation(drv_path.to_string()))?
            .clone();

        let parsed: DerivationJson = serde_json::from_value(raw_value.clone())
            .map_err(|e| DerivationError::InvalidJson(drv_path.to_string(), e))?;

        let is_fixed_output = parsed.is_fixed_output();
        let is_content_addressed = parsed.is_content_addressed();

        if !is_fixed_output && !is_content_addressed && !self.allow_ia {
            return Err(DerivationError::UnsupportedInputAddressed(
                drv_path.to_string(),
            ));
        }

        let mut outputs = BTreeMap::new();
        for (output_name, output_json) in &parsed.outputs {
            let output = if is_content_addressed {
                UnresolvedOutput::content_addressed(drv_path, output_name)
            } else {
                let path = output_json.path.clone().ok_or_else(|| {
                    DerivationError::MissingOutputPath(drv_path.to_string(), output_name.clone())
                })?;
                let input_hash = extract_store_hash(&path)?;
                UnresolvedOutput::input_addressed(drv_path, output_name, path, input_hash)
            };
            outputs.insert(output_name.clone(), output);
        }

        let mut inputs = BTreeMap::new();
        if !is_fixed_output {
            for (input_drv_path, referenced_outputs) in &parsed.input_drvs {
                let input_derivation = self.build(input_drv_path)?;

                let mut selected = BTreeMap::new();
                for output_name in referenced_outputs {
                    if let Some(output) = input_derivation.outputs.get(output_name) {
                        selected.insert(output_name.clone(), output.clone());
                    }
                }

                inputs.insert(
                    input_drv_path.clone(),
                    UnresolvedReferencedInputs {
                        derivation: input_derivation,
                        inputs: selected,
                    },
                );
            }
        }

        let input_hash = extract_store_hash(drv_path)?;

        let derivation = Arc::new(UnresolvedDerivation {
            drv_path: drv_path.to_string(),
            name: parsed.name.clone(),
            json_attrs: raw_value,
            input_hash,
            inputs,
            outputs,
            is_fixed_output,
            is_content_addressed,
        });

        tracing::debug!(inputs = derivation.inputs.len(), "built derivation node");
        self.memo.insert(drv_path.to_string(), derivation.clone());
        Ok(derivation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn leaf_fod() -> Value {
        json!({
            "name": "leaf",
            "system": "x86_64-linux",
            "builder": "/bin/sh",
            "args": [],
            "env": {},
            "outputs": {"out": {"path": "/nix/store/g1w7hy3qg1w7hy3qg1w7hy3qg1w7hy3q-leaf", "hash": "sha256:0000000000000000000000000000000000000000000000000000000000000000", "hashAlgo": "sha256"}},
            "inputDrvs": {},
            "inputSrcs": []
        })
    }

    fn root_referencing_leaf() -> Value {
        json!({
            "name": "root",
            "system": "x86_64-linux",
            "builder": "/bin/sh",
            "args": [],
            "env": {},
            "outputs": {"out": {}},
            "inputDrvs": {"/nix/store/fxz942i5pzia8cgha06swhq216l01p8d-leaf.drv": ["out"]},
            "inputSrcs": []
        })
    }

    #[test]
    fn fixed_output_leaf_has_no_inputs() {
        let mut raw = RawDerivations::new();
        raw.insert(
            "/nix/store/fxz942i5pzia8cgha06swhq216l01p8d-leaf.drv".to_string(),
            leaf_fod(),
        );

        let drv = build(
            "/nix/store/fxz942i5pzia8cgha06swhq216l01p8d-leaf.drv",
            &raw,
            false,
        )
        .unwrap();

        assert!(drv.is_fixed_output);
        assert!(drv.is_leaf());
        assert_eq!(drv.input_hash, "fxz942i5pzia8cgha06swhq216l01p8d");
    }

    #[test]
    fn content_addressed_root_shares_leaf_instance() {
        let mut raw = RawDerivations::new();
        raw.insert(
            "/nix/store/fxz942i5pzia8cgha06swhq216l01p8d-leaf.drv".to_string(),
            leaf_fod(),
        );
        raw.insert(
            "/nix/store/g1w7hy3qg1w7hy3qg1w7hy3qg1w7hy3q-root.drv".to_string(),
            root_referencing_leaf(),
        );

        let root = build(
            "/nix/store/g1w7hy3qg1w7hy3qg1w7hy3qg1w7hy3q-root.drv",
            &raw,
            false,
        )
        .unwrap();

        assert!(root.is_content_addressed);
        assert_eq!(root.inputs.len(), 1);
        let input = root
            .inputs
            .get("/nix/store/fxz942i5pzia8cgha06swhq216l01p8d-leaf.drv")
            .unwrap();
        assert!(input.derivation.is_fixed_output);
        assert_eq!(input.inputs.len(), 1);
    }

    #[test]
    fn missing_derivation_in_map_is_an_error() {
        let raw = RawDerivations::new();
        let err = build("/nix/store/fxz942i5pzia8cgha06swhq216l01p8d-leaf.drv", &raw, false);
        assert!(err.is_err());
    }
}
