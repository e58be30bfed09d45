/**
 * Bearer-token authentication: envelope decode,
 *  ES256K verification, association chains, and
 *  path-scope extraction.
 */
pub mod auth;
/**
 * Hub configuration, owned by the embedding binary.
 */
pub mod config;
/**
 * Client-facing error taxonomy; translated to HTTP
 *  status codes at the transport boundary only.
 */
pub mod error;
/**
 * Request-level pipelines: store, delete, list, and
 *  revocation bump, plus read-URL rewriting.
 */
pub mod hub;
/**
 * Principal identifiers and their derivation from
 *  secp256k1 public keys.
 */
pub mod principal;
/**
 * The social-proof gate contract.
 */
pub mod proof;
/**
 * The per-principal revocation clock.
 */
pub mod revocation;
/**
 * Keyed single-flight lock for coalescing
 *  concurrent work on the same subject.
 */
pub mod singleflight;
/**
 * Byte-stream plumbing: the size-metered
 *  pass-through used by the upload pipeline.
 */
pub mod stream;

pub mod prelude {
    pub use crate::auth::{challenge_text, AuthScopes, ScopeEntry, LATEST_AUTH_VERSION};
    pub use crate::config::HubConfig;
    pub use crate::error::{HubError, Result};
    pub use crate::hub::{
        Hub, HubInfo, ListEntries, ListOutcome, ListRequest, StoreOutcome, StoreRequest,
    };
    pub use crate::principal::Principal;
    pub use crate::proof::{AllowAllProofs, ProofChecker};
    pub use crate::singleflight::SingleFlight;
}
