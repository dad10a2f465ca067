//! Detached Ed25519 JWS trace signatures: compact-form parsing and the
//! validation procedure that binds a token to one trusted key and one
//! expected resolved input hash.

use std::collections::BTreeMap;

use data_encoding::BASE64URL_NOPAD;
use ed25519_dalek::Verifier;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::key::TrustedKey;

pub const ALG_EDDSA: &str = "EdDSA";
pub const TYPE_LAUT: &str = "laut";
pub const CRV_ED25519: &str = "Ed25519";
pub const VERSION_2: &str = "2";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Header {
    pub alg: String,
    #[serde(rename = "type")]
    pub typ: String,
    pub crv: String,
    pub v: String,
    pub kid: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InputClaim {
    pub rdrv_json: Option<String>,
    pub rdrv_aterm_ca: Option<String>,
    #[serde(default)]
    pub debug: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuilderInfo {
    pub rebuild_id: u32,
    pub store_root: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutputClaim {
    pub path: Option<String>,
    pub hash: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Payload {
    #[serde(rename = "in")]
    pub input: InputClaim,
    pub out: BTreeMap<String, serde_json::Value>,
    pub builder: BuilderInfo,
}

impl Payload {
    /// The `out.nix` namespace: output name -> claimed path/hash.
    pub fn nix_outputs(&self) -> Result<BTreeMap<String, OutputClaim>, serde_json::Error> {
        match self.out.get("nix") {
            Some(value) => serde_json::from_value(value.clone()),
            None => Ok(BTreeMap::new()),
        }
    }
}

#[derive(Debug)]
pub struct CompactJws {
    header_b64: String,
    payload_b64: String,
    signature: [u8; 64],
    pub header: Header,
    pub payload: Payload,
}

impl CompactJws {
    fn signing_input(&self) -> Vec<u8> {
        format!("{}.{}", self.header_b64, self.payload_b64).into_bytes()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("malformed JWS: {0}")]
    Malformed(&'static str),
    #[error("unsupported alg {0:?}, expected EdDSA")]
    UnsupportedAlg(String),
    #[error("kid {0:?} does not match the candidate key's thumbprint")]
    KidMismatch(String),
    #[error("Ed25519 signature verification failed")]
    InvalidSignature,
    #[error("payload declares input hash {actual:?}, expected {expected:?}")]
    InputHashMismatch { expected: String, actual: String },
    #[error("payload out.nix is missing or malformed")]
    MalformedOutputs,
}

/// Parses (but does not verify) a compact JWS string into its header and
/// payload.
pub fn parse(token: &str) -> Result<CompactJws, Error> {
    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(Error::Malformed("missing header"))?;
    let payload_b64 = parts.next().ok_or(Error::Malformed("missing payload"))?;
    let sig_b64 = parts.next().ok_or(Error::Malformed("missing signature"))?;
    if parts.next().is_some() {
        return Err(Error::Malformed("too many segments"));
    }

    let header_bytes = BASE64URL_NOPAD
        .decode(header_b64.as_bytes())
        .map_err(|_| Error::Malformed("header is not valid base64url"))?;
    let header: Header = serde_json::from_slice(&header_bytes)
        .map_err(|_| Error::Malformed("header is not valid JSON"))?;

    let payload_bytes = BASE64URL_NOPAD
        .decode(payload_b64.as_bytes())
        .map_err(|_| Error::Malformed("payload is not valid base64url"))?;
    let payload: Payload = serde_json::from_slice(&payload_bytes)
        .map_err(|_| Error::Malformed("payload is not valid JSON"))?;

    let sig_bytes = BASE64URL_NOPAD
        .decode(sig_b64.as_bytes())
        .map_err(|_| Error::Malformed("signature is not valid base64url"))?;
    let signature: [u8; 64] = sig_bytes
        .try_into()
        .map_err(|_| Error::Malformed("signature is not 64 bytes"))?;

    Ok(CompactJws {
        header_b64: header_b64.to_string(),
        payload_b64: payload_b64.to_string(),
        signature,
        header,
        payload,
    })
}

/// The result of a signature that verified cryptographically and whose
/// claimed input hash matched.
pub struct Verified {
    pub kid: String,
    pub outputs: BTreeMap<String, OutputClaim>,
}

/// Validates one JWS token against one trusted key, per §4.5: header shape,
/// `kid` binding, Ed25519 signature, and the claimed resolved input hash.
pub fn verify(
    token: &str,
    key: &TrustedKey,
    expected_resolved_input_hash: &str,
) -> Result<Verified, Error> {
    let jws = parse(token)?;

    if jws.header.alg != ALG_EDDSA {
        return Err(Error::UnsupportedAlg(jws.header.alg.clone()));
    }

    let kid_suffix = jws
        .header
        .kid
        .rsplit_once(':')
        .map(|(_, suffix)| suffix)
        .ok_or(Error::Malformed("kid has no ':' separator"))?;
    if kid_suffix != key.thumbprint16() {
        return Err(Error::KidMismatch(jws.header.kid.clone()));
    }

    let signature = ed25519_dalek::Signature::from_bytes(&jws.signature);
    key.verifying_key
        .verify(&jws.signing_input(), &signature)
        .map_err(|_| Error::InvalidSignature)?;

    // A payload carries both hash variants (ATerm and JSON preimage); the
    // caller may be checking against either one, so either field matching
    // is sufficient — callers that care which variant matched can compare
    // `expected_resolved_input_hash` against the field they care about
    // themselves.
    let rdrv_aterm_ca = jws.payload.input.rdrv_aterm_ca.as_deref();
    let rdrv_json = jws.payload.input.rdrv_json.as_deref();
    let claimed = rdrv_aterm_ca
        .or(rdrv_json)
        .ok_or(Error::Malformed("payload carries no input hash"))?;

    if rdrv_aterm_ca != Some(expected_resolved_input_hash)
        && rdrv_json != Some(expected_resolved_input_hash)
    {
        return Err(Error::InputHashMismatch {
            expected: expected_resolved_input_hash.to_string(),
            actual: claimed.to_string(),
        });
    }

    let outputs = jws.payload.nix_outputs().map_err(|_| Error::MalformedOutputs)?;
    if outputs.is_empty() {
        return Err(Error::MalformedOutputs);
    }

    Ok(Verified {
        kid: jws.header.kid.clone(),
        outputs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::SigningKey;

    fn sample_token_with_hashes(signing_key: &SigningKey, aterm_hash: &str, json_hash: &str) -> String {
        let header = Header {
            alg: ALG_EDDSA.to_string(),
            typ: TYPE_LAUT.to_string(),
            crv: CRV_ED25519.to_string(),
            v: VERSION_2.to_string(),
            kid: signing_key.verifying_key().kid(),
        };

        let mut out = BTreeMap::new();
        out.insert(
            "nix".to_string(),
            serde_json::json!({"out": {"path": "/nix/store/xxx-out", "hash": "deadbeef"}}),
        );

        let payload = Payload {
            input: InputClaim {
                rdrv_json: Some(json_hash.to_string()),
                rdrv_aterm_ca: Some(aterm_hash.to_string()),
                debug: None,
            },
            out,
            builder: BuilderInfo {
                rebuild_id: 42,
                store_root: "/nix/store".to_string(),
            },
        };

        let header_b64 = BASE64URL_NOPAD.encode(&serde_json::to_vec(&header).unwrap());
        let payload_b64 = BASE64URL_NOPAD.encode(&serde_json::to_vec(&payload).unwrap());
        let signing_input = format!("{header_b64}.{payload_b64}");

        use ed25519_dalek::Signer;
        let signature = signing_key.signing_key.sign(signing_input.as_bytes());

        format!(
            "{header_b64}.{payload_b64}.{}",
            BASE64URL_NOPAD.encode(&signature.to_bytes())
        )
    }

    fn sample_token(signing_key: &SigningKey, input_hash: &str) -> String {
        sample_token_with_hashes(signing_key, input_hash, input_hash)
    }

    #[test]
    fn accepts_a_correctly_signed_token() {
        let signing_key = SigningKey {
            name: "test1".to_string(),
            signing_key: ed25519_dalek::SigningKey::from_bytes(&[9u8; 32]),
        };
        let key = signing_key.verifying_key();
        let token = sample_token(&signing_key, "X");

        let verified = verify(&token, &key, "X").expect("must verify");
        assert_eq!(verified.kid, key.kid());
        assert_eq!(verified.outputs.len(), 1);
    }

    #[test]
    fn accepts_either_hash_variant_when_they_differ() {
        let signing_key = SigningKey {
            name: "test1".to_string(),
            signing_key: ed25519_dalek::SigningKey::from_bytes(&[9u8; 32]),
        };
        let key = signing_key.verifying_key();
        let token = sample_token_with_hashes(&signing_key, "aterm-hash", "json-hash");

        assert!(verify(&token, &key, "aterm-hash").is_ok());
        assert!(verify(&token, &key, "json-hash").is_ok());
        assert!(matches!(
            verify(&token, &key, "neither-hash"),
            Err(Error::InputHashMismatch { .. })
        ));
    }

    #[test]
    fn rejects_wrong_input_hash() {
        let signing_key = SigningKey {
            name: "test1".to_string(),
            signing_key: ed25519_dalek::SigningKey::from_bytes(&[9u8; 32]),
        };
        let key = signing_key.verifying_key();
        let token = sample_token(&signing_key, "X");

        assert!(matches!(
            verify(&token, &key, "Y"),
            Err(Error::InputHashMismatch { .. })
        ));
    }

    #[test]
    fn rejects_tampered_payload() {
        let signing_key = SigningKey {
            name: "test1".to_string(),
            signing_key: ed25519_dalek::SigningKey::from_bytes(&[9u8; 32]),
        };
        let key = signing_key.verifying_key();
        let mut token = sample_token(&signing_key, "X");
        token.push('x');

        assert!(verify(&token, &key, "X").is_err());
    }

    #[test]
    fn rejects_signature_from_wrong_key() {
        let signing_key = SigningKey {
            name: "test1".to_string(),
            signing_key: ed25519_dalek::SigningKey::from_bytes(&[9u8; 32]),
        };
        let other = SigningKey {
            name: "test1".to_string(),
            signing_key: ed25519_dalek::SigningKey::from_bytes(&[3u8; 32]),
        }
        .verifying_key();
        let token = sample_token(&signing_key, "X");

        assert!(verify(&token, &other, "X").is_err());
    }
}
