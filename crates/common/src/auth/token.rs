//! The signed token envelope.
//!
//! Three dotted base64url segments (header, payload, signature), signed with
//! ECDSA over secp256k1 (`ES256K`, SHA-256). Signatures are the 64-byte
//! `r || s` compact form. The payload may nest another envelope as an
//! association token.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};

use super::scopes::ScopeEntry;
use super::AuthError;

/// Signing algorithm accepted by the hub.
pub const ALGORITHM: &str = "ES256K";

/// Envelope header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    pub alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

/// A hub-URL claim: a single URL or a list of candidates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HubUrlClaim {
    One(String),
    Many(Vec<String>),
}

impl HubUrlClaim {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        match self {
            HubUrlClaim::One(url) => std::slice::from_ref(url).iter().map(String::as_str),
            HubUrlClaim::Many(urls) => urls.as_slice().iter().map(String::as_str),
        }
    }
}

/// Envelope payload. Unknown fields are ignored; all timestamps are Unix
/// milliseconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Claims {
    /// Issuer: compressed secp256k1 public key, hex encoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,

    /// Server-name pin; must match the hub's challenge text when present.
    #[serde(default, rename = "gaiaChallenge", skip_serializing_if = "Option::is_none")]
    pub challenge: Option<String>,

    #[serde(default, rename = "hubUrl", skip_serializing_if = "Option::is_none")]
    pub hub_url: Option<HubUrlClaim>,

    /// Client-chosen entropy; accepted, never interpreted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,

    /// Nested envelope whose signer vouches for this envelope's issuer.
    #[serde(default, rename = "associationToken", skip_serializing_if = "Option::is_none")]
    pub association_token: Option<String>,

    /// On association links: the public key being vouched for, hex encoded.
    #[serde(default, rename = "childToAssociate", skip_serializing_if = "Option::is_none")]
    pub child_to_associate: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<ScopeEntry>>,
}

/// A decoded, not-yet-verified token envelope.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub header: Header,
    pub claims: Claims,
    signature: Signature,
    signing_input: String,
}

impl Envelope {
    /// Decode the three-segment wire form. No signature check happens here.
    pub fn decode(token: &str) -> Result<Self, AuthError> {
        let mut segments = token.split('.');
        let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(AuthError::BadTokenFormat(
                "expected three dot-separated segments".to_string(),
            ));
        };

        let header_bytes = URL_SAFE_NO_PAD
            .decode(header_b64)
            .map_err(|_| AuthError::BadTokenFormat("header is not base64url".to_string()))?;
        let header: Header = serde_json::from_slice(&header_bytes)
            .map_err(|e| AuthError::BadTokenFormat(format!("header is not valid JSON: {e}")))?;
        if header.alg != ALGORITHM {
            return Err(AuthError::BadTokenFormat(format!(
                "unsupported algorithm {:?}",
                header.alg
            )));
        }

        let payload_bytes = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| AuthError::BadTokenFormat("payload is not base64url".to_string()))?;
        let claims: Claims = serde_json::from_slice(&payload_bytes)
            .map_err(|e| AuthError::BadTokenFormat(format!("payload is not valid JSON: {e}")))?;

        let signature_bytes = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| AuthError::BadTokenFormat("signature is not base64url".to_string()))?;
        let signature = Signature::from_slice(&signature_bytes)
            .map_err(|_| AuthError::SignatureInvalid)?;

        Ok(Envelope {
            header,
            claims,
            signature,
            signing_input: format!("{header_b64}.{payload_b64}"),
        })
    }

    /// The issuer's public key, parsed from the `iss` claim.
    pub fn issuer_key(&self) -> Result<VerifyingKey, AuthError> {
        let iss = self
            .claims
            .iss
            .as_deref()
            .ok_or_else(|| AuthError::BadTokenFormat("missing iss claim".to_string()))?;
        parse_public_key(iss)
    }

    /// Verify the envelope signature against `key`.
    pub fn verify_signature(&self, key: &VerifyingKey) -> Result<(), AuthError> {
        key.verify(self.signing_input.as_bytes(), &self.signature)
            .map_err(|_| AuthError::SignatureInvalid)
    }

    /// Produce the canonical signed wire form of `claims`. This is the
    /// envelope producer clients use; the hub itself only verifies.
    pub fn sign(claims: &Claims, key: &SigningKey) -> String {
        let header = Header {
            alg: ALGORITHM.to_string(),
            typ: Some("JWT".to_string()),
        };
        let header_b64 = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&header).expect("header serialization is infallible"),
        );
        let payload_b64 = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(claims).expect("claims serialization is infallible"),
        );
        let signing_input = format!("{header_b64}.{payload_b64}");
        let signature: Signature = key.sign(signing_input.as_bytes());
        let signature_b64 = URL_SAFE_NO_PAD.encode(signature.to_bytes());
        format!("{signing_input}.{signature_b64}")
    }
}

/// Parse a hex-encoded compressed secp256k1 public key.
pub fn parse_public_key(hex_key: &str) -> Result<VerifyingKey, AuthError> {
    let bytes = hex::decode(hex_key)
        .map_err(|_| AuthError::BadTokenFormat("public key is not hex".to_string()))?;
    VerifyingKey::from_sec1_bytes(&bytes)
        .map_err(|_| AuthError::BadTokenFormat("invalid secp256k1 public key".to_string()))
}

/// Hex encoding of a key's compressed SEC1 form, as used in `iss` and
/// `childToAssociate` claims.
pub fn public_key_hex(key: &VerifyingKey) -> String {
    use k256::elliptic_curve::sec1::ToEncodedPoint;
    hex::encode(key.to_encoded_point(true).as_bytes())
}
