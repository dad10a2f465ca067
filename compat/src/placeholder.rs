//! Upstream output placeholders.
//!
//! When a derivation's `builder`, `args` or `env` reference an output of one
//! of its own inputs, Nix never writes a literal store path there (the input
//! may resolve to any of several content-addressed paths, chosen only at
//! build time). Instead the *.drv* carries a placeholder string in that
//! position, and the resolver substitutes it for the input's actual output
//! path once that is known.
//!
//! This is the cross-derivation `nix-upstream-output:` scheme, not Nix's own
//! self-referential `nix-output:` placeholder used inside fixed-output
//! derivations.

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::nixbase32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("not a nix store path: {0}")]
    NotAStorePath(String),
    #[error("store path component is missing the .drv suffix: {0}")]
    MissingDrvSuffix(String),
    #[error("store path hash component is too short: {0}")]
    HashTooShort(String),
    #[error("store path hash component is not lowercase hex/base32: {0}")]
    InvalidHashChars(String),
}

/// Computes the placeholder for `output` of the derivation at `drv_path`.
///
/// `drv_path` must be a `/nix/store/<hash>-<name>.drv` path. The returned
/// string is itself formatted as an absolute path
/// (`/<nixbase32 digest>`), matching the placeholder Nix substitutes inline
/// wherever a derivation references one of its own inputs' outputs.
pub fn upstream_placeholder(drv_path: &str, output: &str) -> Result<String, Error> {
    let without_suffix = drv_path
        .strip_suffix(".drv")
        .ok_or_else(|| Error::MissingDrvSuffix(drv_path.to_string()))?;

    let components: Vec<&str> = without_suffix.split('/').collect();
    if components.len() < 4 || components[1] != "nix" || components[2] != "store" {
        return Err(Error::NotAStorePath(drv_path.to_string()));
    }

    let last = components[components.len() - 1];
    if last.len() < 33 {
        return Err(Error::HashTooShort(drv_path.to_string()));
    }

    let drv_hash = &last[..32];
    let drv_name = &last[33..];

    if !drv_hash
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    {
        return Err(Error::InvalidHashChars(drv_path.to_string()));
    }

    let output_suffix = if output == "out" {
        String::new()
    } else {
        format!("-{output}")
    };

    let preimage = format!("nix-upstream-output:{drv_hash}:{drv_name}{output_suffix}");
    let digest = Sha256::digest(preimage.as_bytes());

    Ok(format!("/{}", nixbase32::encode(&digest)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_known_fixture() {
        assert_eq!(
            upstream_placeholder(
                "/nix/store/g1w7hy3qg1w7hy3qg1w7hy3qg1w7hy3q-foo.drv",
                "out"
            )
            .unwrap(),
            "/0c6rn30q4frawknapgwq386zq358m8r6msvywcvc89n6m5p2dgbz"
        );
    }

    #[test]
    fn non_out_output_changes_digest() {
        let out = upstream_placeholder(
            "/nix/store/g1w7hy3qg1w7hy3qg1w7hy3qg1w7hy3q-foo.drv",
            "out",
        )
        .unwrap();
        let dev = upstream_placeholder(
            "/nix/store/g1w7hy3qg1w7hy3qg1w7hy3qg1w7hy3q-foo.drv",
            "dev",
        )
        .unwrap();
        assert_ne!(out, dev);
    }

    #[test]
    fn rejects_non_drv_suffix() {
        assert_eq!(
            upstream_placeholder("/nix/store/g1w7hy3qg1w7hy3qg1w7hy3qg1w7hy3q-foo", "out"),
            Err(Error::MissingDrvSuffix(
                "/nix/store/g1w7hy3qg1w7hy3qg1w7hy3qg1w7hy3q-foo".to_string()
            ))
        );
    }

    #[test]
    fn rejects_non_store_path() {
        assert!(upstream_placeholder("/tmp/foo.drv", "out").is_err());
    }
}
