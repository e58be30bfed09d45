//! Bearer-token authentication and scope extraction.
//!
//! The hub trusts a request when the presented envelope (or the root of its
//! association chain) is signed by the key that derives to the principal in
//! the request path, and every freshness, pinning, and whitelist condition
//! holds. Failure reasons stay fine-grained here for logging; callers
//! collapse them into the single client-visible validation category.

mod scopes;
mod token;

pub use scopes::{AuthScopes, ScopeEntry, ScopeKind, MAX_SCOPES};
pub use token::{
    parse_public_key, public_key_hex, Claims, Envelope, Header, HubUrlClaim, ALGORITHM,
};

use k256::ecdsa::VerifyingKey;

use crate::config::HubConfig;
use crate::principal::Principal;

/// Version tag reported by `hub_info`.
pub const LATEST_AUTH_VERSION: &str = "v1";

/// Longest accepted association chain.
const MAX_ASSOCIATION_DEPTH: usize = 8;

/// Fine-grained authorization failure reasons. Logged verbatim; surfaced to
/// clients only as a generic validation failure.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("malformed authorization: {0}")]
    BadTokenFormat(String),

    #[error("token signature verification failed")]
    SignatureInvalid,

    #[error("invalid association token: {0}")]
    AssociationInvalid(String),

    #[error("token is expired")]
    Expired,

    #[error("token challenge does not match this hub")]
    WrongChallenge,

    #[error("token hub URL does not match this hub")]
    WrongHub,

    #[error("token issuer does not sign for the requested principal")]
    PrincipalMismatch,

    #[error("token issuance predates the revocation clock")]
    Revoked,

    #[error("principal is not on the writer whitelist")]
    NotWhitelisted,

    #[error("invalid scopes: {0}")]
    BadScope(String),
}

/// The outcome of a successful verification.
#[derive(Debug)]
pub struct Verification {
    /// Principal the signing key (or chain root) derives to.
    pub principal: Principal,
    /// Scope lists extracted from the token.
    pub scopes: AuthScopes,
}

/// The text clients must sign into the `gaiaChallenge` claim to pin a token
/// to this hub.
pub fn challenge_text(server_name: &str) -> String {
    serde_json::json!(["breakwater", "0", server_name, "sign_to_store"]).to_string()
}

/// Verify an `Authorization` header value for a request addressing
/// `principal`, against the revocation clock value `oldest_valid_iat_ms`.
pub fn verify_request(
    authorization: Option<&str>,
    principal: &Principal,
    oldest_valid_iat_ms: u64,
    config: &HubConfig,
) -> Result<Verification, AuthError> {
    verify_request_at(
        authorization,
        principal,
        oldest_valid_iat_ms,
        config,
        crate::hub::now_ms(),
    )
}

/// [`verify_request`] against an explicit clock, for deterministic tests.
pub fn verify_request_at(
    authorization: Option<&str>,
    principal: &Principal,
    oldest_valid_iat_ms: u64,
    config: &HubConfig,
    now_ms: u64,
) -> Result<Verification, AuthError> {
    let token = parse_bearer(authorization)?;
    let envelope = Envelope::decode(token)?;

    let leaf_key = envelope.issuer_key()?;
    envelope.verify_signature(&leaf_key)?;

    if let Some(challenge) = envelope.claims.challenge.as_deref() {
        if challenge != challenge_text(&config.server_name) {
            return Err(AuthError::WrongChallenge);
        }
    }
    if let Some(exp) = envelope.claims.exp {
        if now_ms >= exp {
            return Err(AuthError::Expired);
        }
    }

    let root_key = verify_association_chain(&envelope, &leaf_key, oldest_valid_iat_ms, now_ms)?;
    let signing_principal = Principal::from_verifying_key(&root_key);
    if &signing_principal != principal {
        return Err(AuthError::PrincipalMismatch);
    }

    if config.require_correct_hub_url {
        check_hub_url(&envelope, config)?;
    }

    if envelope.claims.iat.unwrap_or(0) < oldest_valid_iat_ms {
        return Err(AuthError::Revoked);
    }

    if let Some(whitelist) = &config.whitelist {
        if !whitelist.iter().any(|p| p == principal.as_str()) {
            return Err(AuthError::NotWhitelisted);
        }
    }

    let scopes = match &envelope.claims.scopes {
        Some(entries) => AuthScopes::from_entries(entries)?,
        None => AuthScopes::default(),
    };

    Ok(Verification {
        principal: signing_principal,
        scopes,
    })
}

/// Extract the token from a `Bearer <token>` header value (scheme
/// case-insensitive).
fn parse_bearer(authorization: Option<&str>) -> Result<&str, AuthError> {
    let value = authorization
        .ok_or_else(|| AuthError::BadTokenFormat("missing Authorization header".to_string()))?;
    let (scheme, token) = value.split_once(' ').ok_or_else(|| {
        AuthError::BadTokenFormat("expected `Bearer <token>` authorization".to_string())
    })?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::BadTokenFormat(format!(
            "unsupported authorization scheme {scheme:?}"
        )));
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::BadTokenFormat("empty bearer token".to_string()));
    }
    Ok(token)
}

/// Walk the association chain, link by link, from the leaf toward the root.
///
/// Each link must be validly signed by its own issuer, vouch (via
/// `childToAssociate`) for the key one step closer to the leaf, be unexpired,
/// and postdate the revocation clock. The returned key is the chain root (or
/// the leaf itself when no chain is present).
fn verify_association_chain(
    leaf: &Envelope,
    leaf_key: &VerifyingKey,
    oldest_valid_iat_ms: u64,
    now_ms: u64,
) -> Result<VerifyingKey, AuthError> {
    let mut authorized_key = leaf_key.clone();
    let mut next_link = leaf.claims.association_token.clone();
    let mut depth = 0;

    while let Some(link_token) = next_link {
        depth += 1;
        if depth > MAX_ASSOCIATION_DEPTH {
            return Err(AuthError::AssociationInvalid(
                "association chain too deep".to_string(),
            ));
        }

        let link = Envelope::decode(&link_token)
            .map_err(|e| AuthError::AssociationInvalid(e.to_string()))?;
        let link_key = link
            .issuer_key()
            .map_err(|e| AuthError::AssociationInvalid(e.to_string()))?;
        link.verify_signature(&link_key)
            .map_err(|_| AuthError::AssociationInvalid("link signature invalid".to_string()))?;

        let child_hex = link.claims.child_to_associate.as_deref().ok_or_else(|| {
            AuthError::AssociationInvalid("link missing childToAssociate".to_string())
        })?;
        let child_key = parse_public_key(child_hex)
            .map_err(|e| AuthError::AssociationInvalid(e.to_string()))?;
        if child_key != authorized_key {
            return Err(AuthError::AssociationInvalid(
                "link does not vouch for the presented key".to_string(),
            ));
        }

        if let Some(exp) = link.claims.exp {
            if now_ms >= exp {
                return Err(AuthError::AssociationInvalid("link is expired".to_string()));
            }
        }
        if link.claims.iat.unwrap_or(0) < oldest_valid_iat_ms {
            return Err(AuthError::Revoked);
        }

        authorized_key = link_key;
        next_link = link.claims.association_token.clone();
    }

    Ok(authorized_key)
}

fn check_hub_url(envelope: &Envelope, config: &HubConfig) -> Result<(), AuthError> {
    let claim = envelope.claims.hub_url.as_ref().ok_or(AuthError::WrongHub)?;
    let accepted = std::iter::once(config.server_name.as_str())
        .chain(config.valid_hub_urls.iter().map(String::as_str));
    for accepted_url in accepted {
        if claim
            .iter()
            .any(|claimed| hub_urls_match(claimed, accepted_url))
        {
            return Ok(());
        }
    }
    Err(AuthError::WrongHub)
}

/// Hub-URL comparison: trailing `/` ignored, `http(s)://` scheme optional.
fn hub_urls_match(claimed: &str, accepted: &str) -> bool {
    fn normalize(url: &str) -> &str {
        let url = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))
            .unwrap_or(url);
        url.trim_end_matches('/')
    }
    normalize(claimed) == normalize(accepted)
}
