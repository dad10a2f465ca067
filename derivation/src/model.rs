//! The immutable, already-validated entities the rest of `laut` operates on.
//!
//! Construction happens once per `drv_path`, in [`crate::dag`]; after that,
//! every field here is read-only, and sharing between dependents of the same
//! input is expressed as `Arc<UnresolvedDerivation>` rather than by cloning.

use std::collections::BTreeMap;
use std::sync::Arc;

use laut_compat::placeholder;

/// One named output of an [`UnresolvedDerivation`].
#[derive(Clone, Debug)]
pub struct UnresolvedOutput {
    pub output_name: String,
    pub drv_path: String,
    /// Absent for content-addressed outputs, present (and store-hash-shaped)
    /// for input-addressed ones.
    pub input_hash: Option<String>,
    /// The input-addressed path, or `<drv_path>$<output_name>` for a
    /// content-addressed output that has no path yet.
    pub unresolved_path: String,
}

impl PartialEq for UnresolvedOutput {
    fn eq(&self, other: &Self) -> bool {
        self.drv_path == other.drv_path && self.output_name == other.output_name
    }
}
impl Eq for UnresolvedOutput {}

impl UnresolvedOutput {
    pub fn content_addressed(drv_path: &str, output_name: &str) -> Self {
        Self {
            output_name: output_name.to_string(),
            drv_path: drv_path.to_string(),
            input_hash: None,
            unresolved_path: format!("{drv_path}${output_name}"),
        }
    }

    pub fn input_addressed(drv_path: &str, output_name: &str, path: String, input_hash: String) -> Self {
        Self {
            output_name: output_name.to_string(),
            drv_path: drv_path.to_string(),
            input_hash: Some(input_hash),
            unresolved_path: path,
        }
    }

    /// The token that appears in a dependent derivation's preimage wherever
    /// this output is referenced.
    pub fn placeholder(&self) -> Result<String, placeholder::Error> {
        placeholder::upstream_placeholder(&self.drv_path, &self.output_name)
    }
}

/// A dependency edge: one of `derivation`'s outputs, as referenced by a
/// dependent derivation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnresolvedReferencedInputs {
    pub derivation: Arc<UnresolvedDerivation>,
    pub inputs: BTreeMap<String, UnresolvedOutput>,
}

/// An immutable view of one derivation before any of its input-derivation
/// references have been substituted with concrete content hashes.
#[derive(Debug)]
pub struct UnresolvedDerivation {
    pub drv_path: String,
    pub name: String,
    pub json_attrs: serde_json::Value,
    /// The 32-char hash extracted from `drv_path` itself — *not* the
    /// resolved input hash.
    pub input_hash: String,
    pub inputs: BTreeMap<String, UnresolvedReferencedInputs>,
    pub outputs: BTreeMap<String, UnresolvedOutput>,
    pub is_fixed_output: bool,
    pub is_content_addressed: bool,
}

impl PartialEq for UnresolvedDerivation {
    fn eq(&self, other: &Self) -> bool {
        self.input_hash == other.input_hash
    }
}
impl Eq for UnresolvedDerivation {}

impl UnresolvedDerivation {
    pub fn is_leaf(&self) -> bool {
        self.inputs.is_empty()
    }
}
