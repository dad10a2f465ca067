//! Canonicalization and digest primitives ("the Hasher" of the build-trace
//! signature protocol).
//!
//! Every resolved input hash in this system is the SHA-256 digest of some
//! canonical byte string — either a JSON Canonicalization Scheme (RFC 8785)
//! rendering of a derivation's attributes, or the ATerm serialization of a
//! derivation. Two implementations that start from the same logical
//! derivation and the same resolution must produce byte-identical preimages,
//! so every step here is spelled out rather than delegated to whatever a
//! JSON library happens to do by default.

use data_encoding::BASE64URL_NOPAD;
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::nixbase32::{self, Nixbase32DecodeError};
use crate::store_path::STORE_DIR_WITH_SLASH;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("invalid store path: {0}")]
    InvalidStorePath(String),
    #[error("hash is not valid nixbase32: {0}")]
    InvalidHashEncoding(Nixbase32DecodeError),
}

/// Serializes `value` per JSON Canonicalization Scheme (RFC 8785): object
/// members sorted lexicographically by their UTF-16 code units at every
/// nesting level, no insignificant whitespace, UTF-8 output.
///
/// Derivation attribute records only ever contain strings, arrays and
/// objects (no floats), so the number formatting rules of RFC 8785 are not
/// exercised in practice, but integers are still rendered as their minimal
/// decimal form for completeness.
pub fn canonical_json(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(b) => out.extend_from_slice(if *b { b"true" } else { b"false" }),
        Value::Number(n) => out.extend_from_slice(canonical_number(n).as_bytes()),
        Value::String(s) => write_canonical_string(s, out),
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out);
            }
            out.push(b']');
        }
        Value::Object(map) => {
            out.push(b'{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_by(|a, b| a.encode_utf16().cmp(b.encode_utf16()));
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical_string(key, out);
                out.push(b':');
                write_canonical(&map[key], out);
            }
            out.push(b'}');
        }
    }
}

fn canonical_number(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    // Falls back to serde_json's own rendering for non-integers; derivation
    // attributes never carry floats, so this path is untested in practice.
    n.to_string()
}

fn write_canonical_string(s: &str, out: &mut Vec<u8>) {
    out.push(b'"');
    for c in s.chars() {
        match c {
            '"' => out.extend_from_slice(b"\\\""),
            '\\' => out.extend_from_slice(b"\\\\"),
            '\n' => out.extend_from_slice(b"\\n"),
            '\r' => out.extend_from_slice(b"\\r"),
            '\t' => out.extend_from_slice(b"\\t"),
            c if (c as u32) < 0x20 => out.extend_from_slice(format!("\\u{:04x}", c as u32).as_bytes()),
            c => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    out.push(b'"');
}

/// Digests `bytes` with SHA-256 and returns the URL-safe, unpadded base64
/// encoding of the digest — the lookup key for resolved input hashes.
pub fn sha256_urlsafe_b64_nopad(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    BASE64URL_NOPAD.encode(&digest)
}

/// Extracts the 32-character nixbase32 hash prefix from a store path of the
/// shape `/<store-root>/<32-char-hash>-<name>`.
pub fn extract_store_hash(path: &str) -> Result<String, Error> {
    let rest = path
        .strip_prefix(STORE_DIR_WITH_SLASH)
        .ok_or_else(|| Error::InvalidStorePath(path.to_string()))?;

    if rest.len() < crate::store_path::ENCODED_DIGEST_SIZE + 1 {
        return Err(Error::InvalidStorePath(path.to_string()));
    }

    let (hash, rest) = rest.split_at(crate::store_path::ENCODED_DIGEST_SIZE);
    if !rest.starts_with('-') {
        return Err(Error::InvalidStorePath(path.to_string()));
    }

    nixbase32::decode(hash.as_bytes()).map_err(Error::InvalidHashEncoding)?;

    Ok(hash.to_string())
}
