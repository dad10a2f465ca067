//! Computes resolved preimages and resolved input hashes for unresolved
//! derivations, once an assignment of input resolutions is known.

pub mod errors;
pub mod model;
pub mod resolver;

pub use errors::ResolveError;
pub use model::{Assignment, ResolvedOutput, TrustlesslyResolvedDerivation};
pub use resolver::{resolve_aterm, resolve_fixed_output, resolve_json, ResolvedPreimage};
