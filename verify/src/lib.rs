//! Detached Ed25519 JWS trace-signature validation and the threshold trust
//! model that decides whether a set of verified signatures is sufficient.

pub mod jws;
pub mod key;
pub mod trust;

pub use jws::{verify, Verified};
pub use key::{SigningKey, TrustedKey};
pub use trust::{OutputMap, TrustModel, VerifiedClaim};
