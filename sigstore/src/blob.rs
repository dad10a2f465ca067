use serde::{Deserialize, Serialize};

/// The JSON document stored at `traces/<resolved_input_hash>`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SignatureBlob {
    pub signatures: Vec<String>,
}

impl SignatureBlob {
    pub fn parse(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        // unwrap: Vec<String> always serializes.
        serde_json::to_vec(self).unwrap()
    }

    /// Appends `signature` unless it is already present verbatim. Returns
    /// whether the blob changed.
    pub fn add(&mut self, signature: &str) -> bool {
        if self.signatures.iter().any(|s| s == signature) {
            return false;
        }
        self.signatures.push(signature.to_string());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_idempotent_on_verbatim_match() {
        let mut blob = SignatureBlob::default();
        assert!(blob.add("sig-a"));
        assert!(!blob.add("sig-a"));
        assert_eq!(blob.signatures, vec!["sig-a".to_string()]);
    }

    #[test]
    fn parse_roundtrips_through_to_bytes() {
        let blob = SignatureBlob {
            signatures: vec!["a".to_string(), "b".to_string()],
        };
        let parsed = SignatureBlob::parse(&blob.to_bytes()).unwrap();
        assert_eq!(parsed.signatures, blob.signatures);
    }
}
