//! Computes the two resolved-input-hash preimages for an already-resolved
//! derivation and assembles the v2 JWS payload from them.
//!
//! Unlike [`laut_engine`], the signer never substitutes placeholders itself:
//! by the time it runs, the host build system has already rewritten the
//! derivation on disk with `inputDrvs` emptied and the referenced content
//! hashes folded into `inputSrcs`. Hashing that resolved representation
//! directly is what makes the verifier's and signer's preimages byte-exact.

use std::collections::{BTreeMap, BTreeSet};

use data_encoding::BASE64URL_NOPAD;
use ed25519_dalek::Signer as _;
use rand::RngCore;
use serde_json::Value;

use laut_compat::hash::{canonical_json, sha256_urlsafe_b64_nopad};
use laut_compat::store_path::build_store_path_from_references;
use laut_derivation::aterm;
use laut_derivation::json::DerivationJson;
use laut_verify::jws::{
    BuilderInfo, Header, InputClaim, Payload, ALG_EDDSA, CRV_ED25519, TYPE_LAUT, VERSION_2,
};
use laut_verify::SigningKey;

use crate::errors::SignError;

pub const STORE_ROOT: &str = "/nix/store";

/// What the build system is attesting for one output: its store path and/or
/// content hash, as reported by the build (`OUT_PATHS`/`--out-paths`).
#[derive(Clone, Debug, Default)]
pub struct OutputAttestation {
    pub path: Option<String>,
    pub hash: Option<String>,
}

pub struct SignRequest<'a> {
    pub drv_path: &'a str,
    pub drv_json: &'a Value,
    pub outputs: BTreeMap<String, OutputAttestation>,
    pub debug: bool,
}

/// A no-op is not an error: the host build system invokes the signer once
/// before resolution (when a signature would be premature) and once after.
pub enum SignOutcome {
    Unresolved,
    Signed(String),
}

pub fn sign(request: &SignRequest, signing_key: &SigningKey) -> Result<SignOutcome, SignError> {
    let parsed: DerivationJson = serde_json::from_value(request.drv_json.clone())
        .map_err(|e| SignError::InvalidJson(request.drv_path.to_string(), e))?;

    if !parsed.input_drvs.is_empty() {
        return Ok(SignOutcome::Unresolved);
    }
    if parsed.is_fixed_output() {
        return Err(SignError::FixedOutput(request.drv_path.to_string()));
    }
    if !parsed.is_content_addressed() {
        return Err(SignError::InputAddressed(request.drv_path.to_string()));
    }

    let json_preimage = canonical_json(request.drv_json);
    let rdrv_json = sha256_urlsafe_b64_nopad(&json_preimage);

    let term = aterm::from_derivation_json(&parsed);
    let aterm_preimage = aterm::format(&term);
    let rdrv_aterm_ca = sha256_urlsafe_b64_nopad(&aterm_preimage);

    let debug = if request.debug {
        let name = format!("{}.drv", parsed.name);
        let references: BTreeSet<String> = term.input_srcs.iter().cloned().collect();
        let computed_path = build_store_path_from_references(&name, &aterm_preimage, references)
            .map(|p| p.to_absolute_path())
            .unwrap_or_default();

        Some(serde_json::json!({
            "drv_name": parsed.name,
            "rdrv_path": request.drv_path,
            "rdrv_json_preimage": String::from_utf8_lossy(&json_preimage),
            "rdrv_computed_path": computed_path,
            "rdrv_aterm_ca_preimage": String::from_utf8_lossy(&aterm_preimage),
        }))
    } else {
        None
    };

    let mut out_nix = serde_json::Map::new();
    for (name, attestation) in &request.outputs {
        out_nix.insert(
            name.clone(),
            serde_json::json!({"path": attestation.path, "hash": attestation.hash}),
        );
    }
    let mut out = BTreeMap::new();
    out.insert("nix".to_string(), Value::Object(out_nix));

    let payload = Payload {
        input: InputClaim {
            rdrv_json: Some(rdrv_json),
            rdrv_aterm_ca: Some(rdrv_aterm_ca),
            debug,
        },
        out,
        builder: BuilderInfo {
            rebuild_id: rand::thread_rng().next_u32(),
            store_root: STORE_ROOT.to_string(),
        },
    };

    let header = Header {
        alg: ALG_EDDSA.to_string(),
        typ: TYPE_LAUT.to_string(),
        crv: CRV_ED25519.to_string(),
        v: VERSION_2.to_string(),
        kid: signing_key.verifying_key().kid(),
    };

    let header_b64 = BASE64URL_NOPAD.encode(&serde_json::to_vec(&header)?);
    let payload_b64 = BASE64URL_NOPAD.encode(&serde_json::to_vec(&payload)?);
    let signing_input = format!("{header_b64}.{payload_b64}");
    let signature = signing_key.signing_key.sign(signing_input.as_bytes());

    Ok(SignOutcome::Signed(format!(
        "{signing_input}.{}",
        BASE64URL_NOPAD.encode(&signature.to_bytes())
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolved_drv_json() -> Value {
        json!({
            "name": "hello",
            "system": "x86_64-linux",
            "builder": "/bin/sh",
            "args": [],
            "env": {},
            "outputs": {"out": {}},
            "inputDrvs": {},
            "inputSrcs": ["/nix/store/fxz942i5pzia8cgha06swhq216l01p8d-bar"]
        })
    }

    fn key() -> SigningKey {
        SigningKey {
            name: "test1".to_string(),
            signing_key: ed25519_dalek::SigningKey::from_bytes(&[11u8; 32]),
        }
    }

    #[test]
    fn unresolved_derivation_is_a_no_op() {
        let mut json = resolved_drv_json();
        json["inputDrvs"] = json!({"/nix/store/xxx-bar.drv": ["out"]});

        let mut outputs = BTreeMap::new();
        outputs.insert(
            "out".to_string(),
            OutputAttestation {
                path: Some("/nix/store/g1w7hy3qg1w7hy3qg1w7hy3qg1w7hy3q-hello".to_string()),
                hash: Some("deadbeef".to_string()),
            },
        );

        let request = SignRequest {
            drv_path: "/nix/store/g1w7hy3qg1w7hy3qg1w7hy3qg1w7hy3q-hello.drv",
            drv_json: &json,
            outputs,
            debug: false,
        };

        assert!(matches!(sign(&request, &key()).unwrap(), SignOutcome::Unresolved));
    }

    #[test]
    fn fixed_output_is_rejected() {
        let mut json = resolved_drv_json();
        json["outputs"] = json!({"out": {
            "path": "/nix/store/g1w7hy3qg1w7hy3qg1w7hy3qg1w7hy3q-hello",
            "hash": "0".repeat(64),
            "hashAlgo": "sha256",
        }});

        let request = SignRequest {
            drv_path: "/nix/store/g1w7hy3qg1w7hy3qg1w7hy3qg1w7hy3q-hello.drv",
            drv_json: &json,
            outputs: BTreeMap::new(),
            debug: false,
        };

        assert!(matches!(sign(&request, &key()), Err(SignError::FixedOutput(_))));
    }

    #[test]
    fn resolved_content_addressed_derivation_is_signed() {
        let json = resolved_drv_json();
        let mut outputs = BTreeMap::new();
        outputs.insert(
            "out".to_string(),
            OutputAttestation {
                path: Some("/nix/store/g1w7hy3qg1w7hy3qg1w7hy3qg1w7hy3q-hello".to_string()),
                hash: Some("deadbeef".to_string()),
            },
        );

        let request = SignRequest {
            drv_path: "/nix/store/g1w7hy3qg1w7hy3qg1w7hy3qg1w7hy3q-hello.drv",
            drv_json: &json,
            outputs,
            debug: true,
        };

        match sign(&request, &key()).unwrap() {
            SignOutcome::Signed(token) => {
                let parts: Vec<&str> = token.split('.').collect();
                assert_eq!(parts.len(), 3);

                let verified = laut_verify::jws::parse(&token).unwrap();
                assert!(verified.payload.input.debug.is_some());
                let nix_outputs = verified.payload.nix_outputs().unwrap();
                assert_eq!(nix_outputs["out"].hash.as_deref(), Some("deadbeef"));
            }
            SignOutcome::Unresolved => panic!("expected a signature"),
        }
    }

    #[test]
    fn same_input_produces_a_deterministic_hash_pair() {
        let json = resolved_drv_json();
        let request = SignRequest {
            drv_path: "/nix/store/g1w7hy3qg1w7hy3qg1w7hy3qg1w7hy3q-hello.drv",
            drv_json: &json,
            outputs: BTreeMap::new(),
            debug: false,
        };

        let a = sign(&request, &key()).unwrap();
        let b = sign(&request, &key()).unwrap();
        let (SignOutcome::Signed(a), SignOutcome::Signed(b)) = (a, b) else {
            panic!("expected signatures");
        };

        // rebuild_id is random, so the tokens differ, but the rdrv hashes
        // embedded in both must match exactly.
        let parse_input_hash = |t: &str| {
            let jws = laut_verify::jws::parse(t).unwrap();
            jws.payload.input.rdrv_aterm_ca.clone()
        };
        assert_eq!(parse_input_hash(&a), parse_input_hash(&b));
    }
}
