//! Produces JWS trace attestations for already-resolved, content-addressed
//! derivations, matching the preimage rules [`laut_verify`] checks against.

mod errors;
mod signer;

pub use errors::SignError;
pub use signer::{sign, OutputAttestation, SignOutcome, SignRequest, STORE_ROOT};
