//! Principal identifiers.
//!
//! A principal is the top-level storage namespace and the subject of
//! authorization: a base58check-encoded hash of a secp256k1 public key, the
//! same derivation wallets use for version-0 addresses.

use k256::ecdsa::VerifyingKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use ripemd::Ripemd160;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Version byte prepended before the base58check encoding.
const ADDRESS_VERSION: u8 = 0x00;

/// Errors from parsing a principal identifier.
#[derive(Debug, thiserror::Error)]
pub enum PrincipalError {
    #[error("principal identifier is empty")]
    Empty,

    #[error("principal identifier contains non-base58 character {0:?}")]
    InvalidCharacter(char),
}

/// An opaque principal identifier, constrained to the base58 alphabet
/// (no `0`, `O`, `I`, `l`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    /// Validate and wrap an identifier taken from a request path.
    pub fn parse(s: &str) -> Result<Self, PrincipalError> {
        if s.is_empty() {
            return Err(PrincipalError::Empty);
        }
        if let Some(c) = s.chars().find(|c| !is_base58_char(*c)) {
            return Err(PrincipalError::InvalidCharacter(c));
        }
        Ok(Principal(s.to_string()))
    }

    /// Derive the principal a public key signs for:
    /// `base58check(0x00, ripemd160(sha256(compressed_key)))`.
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        let compressed = key.to_encoded_point(true);
        let sha = Sha256::digest(compressed.as_bytes());
        let hash = Ripemd160::digest(sha);
        let encoded = bs58::encode(hash.as_slice())
            .with_check_version(ADDRESS_VERSION)
            .into_string();
        Principal(encoded)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Principal {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for Principal {
    type Err = PrincipalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Principal::parse(s)
    }
}

fn is_base58_char(c: char) -> bool {
    c.is_ascii_alphanumeric() && !matches!(c, '0' | 'O' | 'I' | 'l')
}
