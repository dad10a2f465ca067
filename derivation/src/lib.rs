//! Immutable entities for unresolved derivations and the DAG builder that
//! turns an evaluator's flat `drv_path -> derivation JSON` mapping into a
//! shared, memoized tree of them.

pub mod aterm;
pub mod dag;
pub mod errors;
pub mod json;
pub mod model;

pub use dag::{build, RawDerivations};
pub use errors::DerivationError;
pub use model::{UnresolvedDerivation, UnresolvedOutput, UnresolvedReferencedInputs};
