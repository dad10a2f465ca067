//! Primitives shared by every `laut` crate: the nixbase32 alphabet, the
//! restricted ATerm grammar used by Nix derivations, Nix store path parsing,
//! and the canonicalization/hashing rules that make resolved input hashes
//! reproducible bit-for-bit across implementations.

pub mod aterm;
pub mod hash;
pub mod nixbase32;
pub mod placeholder;
pub mod store_path;
