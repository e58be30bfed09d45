//! Shared test utilities for hub pipeline tests
#![allow(dead_code)]

use std::sync::Arc;

use bytes::Bytes;
use k256::ecdsa::SigningKey;

use common::auth::{public_key_hex, Claims, Envelope, ScopeEntry};
use common::hub::now_ms;
use common::prelude::*;
use drivers::{ByteStream, DriverConfig, ObjectDriver, StorageDriver};

/// A hub over an in-memory driver plus a principal with its signing key.
pub struct TestHub {
    pub hub: Hub,
    pub key: SigningKey,
    pub principal: Principal,
}

pub fn setup_hub() -> TestHub {
    setup_hub_with(HubConfig::default(), drivers::DEFAULT_PAGE_SIZE)
}

pub fn setup_hub_with(config: HubConfig, page_size: usize) -> TestHub {
    let driver: Arc<dyn StorageDriver> =
        Arc::new(ObjectDriver::new(DriverConfig::Memory, page_size).unwrap());
    let hub = Hub::new(config, driver, Arc::new(AllowAllProofs));
    let key = SigningKey::random(&mut rand::thread_rng());
    let principal = Principal::from_verifying_key(key.verifying_key());
    TestHub {
        hub,
        key,
        principal,
    }
}

pub fn scope(kind: &str, domain: &str) -> ScopeEntry {
    ScopeEntry {
        scope: kind.to_string(),
        domain: domain.to_string(),
    }
}

/// Mint a bearer token for `key`, issued now, carrying `scopes`.
pub fn bearer_token(key: &SigningKey, scopes: &[ScopeEntry]) -> String {
    bearer_token_issued_at(key, scopes, now_ms())
}

pub fn bearer_token_issued_at(key: &SigningKey, scopes: &[ScopeEntry], iat: u64) -> String {
    let claims = Claims {
        iss: Some(public_key_hex(key.verifying_key())),
        iat: Some(iat),
        scopes: (!scopes.is_empty()).then(|| scopes.to_vec()),
        ..Default::default()
    };
    format!("Bearer {}", Envelope::sign(&claims, key))
}

pub fn one_chunk(data: &[u8]) -> ByteStream {
    let bytes = Bytes::copy_from_slice(data);
    Box::pin(futures::stream::once(async move { Ok(bytes) }))
}

pub fn many_chunks(chunk: &[u8], count: usize) -> ByteStream {
    let chunks: Vec<std::io::Result<Bytes>> = (0..count)
        .map(|_| Ok(Bytes::copy_from_slice(chunk)))
        .collect();
    Box::pin(futures::stream::iter(chunks))
}

pub fn store_request(
    key: &SigningKey,
    scopes: &[ScopeEntry],
    data: &[u8],
) -> StoreRequest {
    StoreRequest {
        authorization: Some(bearer_token(key, scopes)),
        content_type: Some("text/plain".to_string()),
        content_length: Some(data.len() as u64),
        stream: one_chunk(data),
    }
}

/// Names from a list outcome, sentinel slots included.
pub fn entry_names(outcome: &ListOutcome) -> Vec<Option<String>> {
    match &outcome.entries {
        ListEntries::Names(names) => names.clone(),
        ListEntries::Stats(stats) => stats
            .iter()
            .map(|s| s.as_ref().map(|e| e.name.clone()))
            .collect(),
    }
}
