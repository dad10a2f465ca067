use std::collections::BTreeMap;
use std::sync::Arc;

use laut_derivation::UnresolvedDerivation;

/// An output's content once a derivation has been resolved or declared
/// fixed-output: a content hash and, where known, the store path it lives
/// at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedOutput {
    pub path: Option<String>,
    pub hash: Option<String>,
}

/// A derivation after substituting every input-derivation reference with a
/// concrete content hash.
#[derive(Clone, Debug)]
pub struct TrustlesslyResolvedDerivation {
    pub resolves: Arc<UnresolvedDerivation>,
    /// Absent for fixed-output leaves, which have no separate resolved
    /// path distinct from their declared one.
    pub drv_path: Option<String>,
    /// URL-safe, unpadded base64 SHA-256 of the canonical resolved
    /// preimage.
    pub input_hash: String,
    pub outputs: BTreeMap<String, ResolvedOutput>,
}

impl PartialEq for TrustlesslyResolvedDerivation {
    fn eq(&self, other: &Self) -> bool {
        self.input_hash == other.input_hash && self.outputs == other.outputs
    }
}
impl Eq for TrustlesslyResolvedDerivation {}

/// The chosen resolution for every input of one derivation, keyed the same
/// way as `UnresolvedDerivation::inputs` (by input `drv_path`).
pub type Assignment = BTreeMap<String, Arc<TrustlesslyResolvedDerivation>>;
