//! Trusted Ed25519 keys: the `"<name>:<base64 pubkey>"` file format, and the
//! key-thumbprint derivation (`kid`) used to bind a signature to a specific
//! key without shipping the raw key material in every payload.

use data_encoding::{BASE64, HEXLOWER};
use ed25519_dalek::{PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// The fixed DER prefix of an Ed25519 `SubjectPublicKeyInfo`: a
/// `SEQUENCE { SEQUENCE { OID 1.3.101.112 }, BIT STRING }` header, with the
/// raw 32-byte key appended as the bit string contents.
const SPKI_PREFIX: [u8; 12] = [
    0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00,
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("missing ':' separator between key name and key material")]
    MissingSeparator,
    #[error("invalid key name: {0:?}")]
    InvalidName(String),
    #[error("key material is not valid base64: {0}")]
    DecodeError(String),
    #[error("expected a 32-byte public key, got {0} bytes")]
    InvalidPublicKeyLen(usize),
    #[error("expected a 32- or 64-byte private key, got {0} bytes")]
    InvalidPrivateKeyLen(usize),
    #[error("key bytes do not form a valid Ed25519 key: {0}")]
    InvalidKey(ed25519_dalek::SignatureError),
}

fn validate_name(name: &str) -> Result<(), Error> {
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '.' || c == '_') {
        return Err(Error::InvalidName(name.to_string()));
    }
    Ok(())
}

/// A single trusted Ed25519 verifying key, as named in `--trusted-key`
/// files.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrustedKey {
    pub name: String,
    pub verifying_key: ed25519_dalek::VerifyingKey,
}

impl TrustedKey {
    /// Parses the `"<name>:<base64 32-byte raw ed25519 public key>"` format.
    pub fn parse(input: &str) -> Result<Self, Error> {
        let (name, encoded) = input.split_once(':').ok_or(Error::MissingSeparator)?;
        validate_name(name)?;

        let bytes = BASE64
            .decode(encoded.as_bytes())
            .map_err(|_| Error::DecodeError(input.to_string()))?;

        let bytes: [u8; PUBLIC_KEY_LENGTH] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| Error::InvalidPublicKeyLen(v.len()))?;

        let verifying_key =
            ed25519_dalek::VerifyingKey::from_bytes(&bytes).map_err(Error::InvalidKey)?;

        Ok(Self {
            name: name.to_string(),
            verifying_key,
        })
    }

    /// The DER `SubjectPublicKeyInfo` encoding of this key.
    pub fn spki_der(&self) -> Vec<u8> {
        let mut der = Vec::with_capacity(SPKI_PREFIX.len() + PUBLIC_KEY_LENGTH);
        der.extend_from_slice(&SPKI_PREFIX);
        der.extend_from_slice(self.verifying_key.as_bytes());
        der
    }

    /// The full lowercase-hex SHA-256 thumbprint of the SPKI encoding.
    pub fn thumbprint(&self) -> String {
        HEXLOWER.encode(&Sha256::digest(self.spki_der()))
    }

    /// The first 8 hex characters of [`Self::thumbprint`] — a short form
    /// suitable for display (e.g. in CLI key listings).
    pub fn short_thumbprint(&self) -> String {
        self.thumbprint()[..8].to_string()
    }

    /// The first 16 hex characters of [`Self::thumbprint`] — the value that
    /// appears after `:` in a signature's `kid`.
    pub fn thumbprint16(&self) -> String {
        self.thumbprint()[..16].to_string()
    }

    /// The canonical `kid` this key signs under: `<name>:<thumbprint16>`.
    pub fn kid(&self) -> String {
        format!("{}:{}", self.name, self.thumbprint16())
    }
}

/// A signing key pair: a name plus an Ed25519 signing key, parsed from the
/// private-key file format `"<name>:<base64 32- or 64-byte seed/keypair>"`
/// (the first 32 bytes are always the seed).
pub struct SigningKey {
    pub name: String,
    pub signing_key: ed25519_dalek::SigningKey,
}

impl SigningKey {
    pub fn parse(input: &str) -> Result<Self, Error> {
        let (name, encoded) = input.split_once(':').ok_or(Error::MissingSeparator)?;
        validate_name(name)?;

        let bytes = BASE64
            .decode(encoded.as_bytes())
            .map_err(|_| Error::DecodeError(input.to_string()))?;

        if bytes.len() != SECRET_KEY_LENGTH && bytes.len() != SECRET_KEY_LENGTH + PUBLIC_KEY_LENGTH
        {
            return Err(Error::InvalidPrivateKeyLen(bytes.len()));
        }

        let seed: [u8; SECRET_KEY_LENGTH] = bytes[..SECRET_KEY_LENGTH]
            .try_into()
            .expect("length checked above");

        Ok(Self {
            name: name.to_string(),
            signing_key: ed25519_dalek::SigningKey::from_bytes(&seed),
        })
    }

    pub fn verifying_key(&self) -> TrustedKey {
        TrustedKey {
            name: self.name.clone(),
            verifying_key: self.signing_key.verifying_key(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_keypair_thumbprint_matches_name_suffix() {
        let signing_key = ed25519_dalek::SigningKey::from_bytes(&[7u8; 32]);
        let key = TrustedKey {
            name: "test1".to_string(),
            verifying_key: signing_key.verifying_key(),
        };

        let kid = key.kid();
        assert!(kid.starts_with("test1:"));
        assert_eq!(kid.split_once(':').unwrap().1.len(), 16);
    }

    #[test]
    fn parse_rejects_missing_separator() {
        assert_eq!(TrustedKey::parse("nocolonhere").unwrap_err(), Error::MissingSeparator);
    }

    #[test]
    fn parse_rejects_wrong_length() {
        let key = format!("test1:{}", BASE64.encode(&[0u8; 16]));
        assert!(matches!(
            TrustedKey::parse(&key),
            Err(Error::InvalidPublicKeyLen(16))
        ));
    }
}
