//! The verification engine: the post-order, memoized traversal of an
//! unresolved derivation DAG that ties the derivation model, resolver,
//! signature store, verifier, and trust model together into one
//! accept/reject decision for a root derivation.

mod convert;
mod errors;
mod reasoner;
mod traversal;

pub use errors::EngineError;
pub use reasoner::Reasoner;
pub use traversal::{verify_root, EngineConfig, Outcome};
