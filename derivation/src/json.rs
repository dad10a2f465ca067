//! Serde model of the JSON a derivation evaluator emits for one derivation.
//!
//! This mirrors the shape described in the external interfaces: a mapping
//! `drv_path -> { outputs, inputDrvs, inputSrcs, env, name, system, builder,
//! args }`. Keys are `BTreeMap`/`BTreeSet` throughout so that re-serializing
//! one of these structures is already close to canonical order; the actual
//! canonicalization pass still runs through
//! [`laut_compat::hash::canonical_json`] on the raw [`serde_json::Value`],
//! since this typed view is allowed to drop unknown attributes that must be
//! preserved byte-for-bit in preimages.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// One entry of the evaluator's `drv_path -> derivation` mapping.
pub type DerivationMap = BTreeMap<String, DerivationJson>;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivationJson {
    pub name: String,
    pub system: String,
    pub builder: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    pub outputs: BTreeMap<String, OutputJson>,

    #[serde(rename = "inputDrvs", default)]
    pub input_drvs: BTreeMap<String, BTreeSet<String>>,

    #[serde(rename = "inputSrcs", default)]
    pub input_srcs: BTreeSet<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputJson {
    pub path: Option<String>,
    pub hash: Option<String>,
    #[serde(rename = "hashAlgo")]
    pub hash_algo: Option<String>,
}

impl DerivationJson {
    /// The output that decides whether this derivation is fixed-output or
    /// content-addressed: the first one in key order.
    pub fn representative_output(&self) -> Option<&OutputJson> {
        self.outputs.values().next()
    }

    pub fn is_fixed_output(&self) -> bool {
        self.representative_output()
            .map(|o| o.hash.is_some())
            .unwrap_or(false)
    }

    pub fn is_content_addressed(&self) -> bool {
        self.representative_output()
            .map(|o| o.hash.is_none() && o.path.is_none())
            .unwrap_or(false)
    }
}
