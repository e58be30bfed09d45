//! Request-level orchestration: upload, delete, list, and revocation bump.
//!
//! Each handler runs the same prelude (revocation lookup, token verification,
//! scope check) and then drives the storage driver. The HTTP transport stays
//! outside; inputs and outcomes here are plain structs.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;

use drivers::{ByteStream, ListEntry, StorageDriver, WriteArgs};

use crate::auth::{self, AuthScopes, LATEST_AUTH_VERSION};
use crate::config::HubConfig;
use crate::error::{HubError, Result};
use crate::principal::Principal;
use crate::proof::ProofChecker;
use crate::revocation::{RevocationClock, AUTH_TIMESTAMP_FILE};
use crate::stream::MeteredStream;

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Inputs to a store request, already lifted out of the transport.
pub struct StoreRequest {
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub stream: ByteStream,
}

/// Outcome of a successful store.
#[derive(Debug, Clone, Serialize)]
pub struct StoreOutcome {
    #[serde(rename = "publicURL")]
    pub public_url: String,
}

/// Inputs to a list request.
#[derive(Debug, Clone, Default)]
pub struct ListRequest {
    pub authorization: Option<String>,
    pub page: Option<String>,
    pub stat: bool,
}

/// Listing entries, name-only or with metadata. A `null` entry is a
/// sentinel: skip the slot and consult the returned cursor.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ListEntries {
    Names(Vec<Option<String>>),
    Stats(Vec<Option<ListEntry>>),
}

impl ListEntries {
    pub fn len(&self) -> usize {
        match self {
            ListEntries::Names(v) => v.len(),
            ListEntries::Stats(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outcome of a list request.
#[derive(Debug, Serialize)]
pub struct ListOutcome {
    pub entries: ListEntries,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
}

/// Public hub metadata served by `/hub_info`.
#[derive(Debug, Clone, Serialize)]
pub struct HubInfo {
    pub challenge_text: String,
    pub latest_auth_version: &'static str,
    pub read_url_prefix: String,
}

/// The write-through storage hub.
pub struct Hub {
    config: HubConfig,
    driver: Arc<dyn StorageDriver>,
    revocation: RevocationClock,
    proofs: Arc<dyn ProofChecker>,
}

impl Hub {
    pub fn new(
        config: HubConfig,
        driver: Arc<dyn StorageDriver>,
        proofs: Arc<dyn ProofChecker>,
    ) -> Self {
        let revocation = RevocationClock::new(driver.clone(), config.auth_timestamp_cache_size);
        Self {
            config,
            driver,
            revocation,
            proofs,
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn driver(&self) -> &Arc<dyn StorageDriver> {
        &self.driver
    }

    /// The URL prefix every returned read URL begins with: the configured
    /// public prefix when present, the driver's natural one otherwise.
    pub fn read_url_prefix(&self) -> String {
        match &self.config.read_url {
            Some(url) => with_trailing_slash(url),
            None => self.driver.read_url_prefix(),
        }
    }

    pub fn info(&self) -> HubInfo {
        HubInfo {
            challenge_text: auth::challenge_text(&self.config.server_name),
            latest_auth_version: LATEST_AUTH_VERSION,
            read_url_prefix: self.read_url_prefix(),
        }
    }

    /// Upload pipeline.
    pub async fn handle_store(
        &self,
        principal: &Principal,
        path: &str,
        req: StoreRequest,
    ) -> Result<StoreOutcome> {
        check_object_path(path)?;
        let scopes = self
            .authenticate(req.authorization.as_deref(), principal)
            .await?;

        let content_type = req
            .content_type
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let archival = scopes.is_archival_restricted();
        if !scopes.allows_write(path) {
            return Err(HubError::Validation(format!(
                "token scopes do not allow writes to {path}"
            )));
        }

        self.proofs.check(principal).await?;

        let max = self.config.max_file_upload_size_bytes;
        if let Some(declared) = req.content_length {
            if declared > max {
                return Err(HubError::PayloadTooLarge(format!(
                    "declared content-length {declared} exceeds the {:.1} MiB limit",
                    bytes_to_mib(max)
                )));
            }
        }

        if archival {
            self.archive_existing(principal, path).await?;
        }

        // The declared size, when finite, becomes the hard ceiling for the
        // observed size; otherwise the configured maximum does.
        let effective_limit = match req.content_length {
            Some(len) if len > 0 => len,
            _ => max,
        };
        let (stream, exceeded) = MeteredStream::wrap(req.stream, effective_limit);

        let write = self
            .driver
            .perform_write(WriteArgs {
                storage_top_level: principal.as_str().to_string(),
                path: path.to_string(),
                stream,
                content_type,
                content_length: req.content_length,
            })
            .await;

        let driver_url = match write {
            Ok(url) => url,
            Err(e) if exceeded.get() => {
                tracing::info!(principal = %principal, path, error = %e, "upload over size limit");
                return Err(HubError::PayloadTooLarge(format!(
                    "stream exceeded the {effective_limit} byte limit"
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let public_url = rewrite_read_url(
            &driver_url,
            &self.driver.read_url_prefix(),
            self.config.read_url.as_deref(),
        );
        tracing::info!(principal = %principal, path, url = %public_url, "object stored");
        Ok(StoreOutcome { public_url })
    }

    /// Delete pipeline. Under archival scopes a delete tombstones via rename
    /// instead of removing.
    pub async fn handle_delete(
        &self,
        principal: &Principal,
        path: &str,
        authorization: Option<&str>,
    ) -> Result<()> {
        check_object_path(path)?;
        let scopes = self.authenticate(authorization, principal).await?;
        if !scopes.allows_delete(path) {
            return Err(HubError::Validation(format!(
                "token scopes do not allow deleting {path}"
            )));
        }

        if scopes.is_archival_restricted() {
            let tombstone = historical_name(path, now_ms());
            self.driver
                .perform_rename(principal.as_str(), path, &tombstone)
                .await?;
            tracing::info!(principal = %principal, path, tombstone = %tombstone, "object tombstoned");
        } else {
            self.driver.perform_delete(principal.as_str(), path).await?;
            tracing::info!(principal = %principal, path, "object deleted");
        }
        Ok(())
    }

    /// Listing. No per-path scope applies; any valid token for the principal
    /// may list. Archival-restricted tokens do not see historical entries.
    pub async fn handle_list(
        &self,
        principal: &Principal,
        req: ListRequest,
    ) -> Result<ListOutcome> {
        let scopes = self
            .authenticate(req.authorization.as_deref(), principal)
            .await?;
        let restricted = scopes.is_archival_restricted();
        let page = req.page.as_deref();

        if req.stat {
            let listing = self
                .driver
                .list_files_stat(principal.as_str(), page)
                .await?;
            let (entries, cursor) =
                filter_historical(listing.entries, listing.page, restricted, |e| e.name.as_str());
            Ok(ListOutcome {
                entries: ListEntries::Stats(entries),
                page: cursor,
            })
        } else {
            let listing = self.driver.list_files(principal.as_str(), page).await?;
            let (entries, cursor) =
                filter_historical(listing.entries, listing.page, restricted, |e| e.as_str());
            Ok(ListOutcome {
                entries: ListEntries::Names(entries),
                page: cursor,
            })
        }
    }

    /// Advance the principal's revocation clock. The bearer must authenticate
    /// as the principal being revoked.
    pub async fn handle_revoke(
        &self,
        principal: &Principal,
        authorization: Option<&str>,
        oldest_valid_timestamp: u64,
    ) -> Result<()> {
        self.authenticate(authorization, principal).await?;
        self.revocation.bump(principal, oldest_valid_timestamp).await
    }

    async fn authenticate(
        &self,
        authorization: Option<&str>,
        principal: &Principal,
    ) -> Result<AuthScopes> {
        let oldest = self.revocation.oldest_valid_iat(principal).await?;
        match auth::verify_request(authorization, principal, oldest, &self.config) {
            Ok(verification) => Ok(verification.scopes),
            Err(reason) => {
                tracing::warn!(principal = %principal, %reason, "authorization rejected");
                Err(HubError::Validation(reason.to_string()))
            }
        }
    }

    /// Move the current object at `path` aside under a freshly minted
    /// historical name. Absence is expected on first write.
    async fn archive_existing(&self, principal: &Principal, path: &str) -> Result<()> {
        let historical = historical_name(path, now_ms());
        match self
            .driver
            .perform_rename(principal.as_str(), path, &historical)
            .await
        {
            Ok(()) => {
                tracing::debug!(principal = %principal, path, historical = %historical, "archived prior object");
                Ok(())
            }
            Err(e) if e.is_does_not_exist() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("config", &self.config)
            .field("revocation", &self.revocation)
            .finish_non_exhaustive()
    }
}

/// Reject malformed or reserved object paths before any driver work.
fn check_object_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(HubError::Validation("empty object path".to_string()));
    }
    if path.split('/').any(|component| component == "..") {
        return Err(HubError::Validation(format!(
            "object path {path:?} contains a parent-directory component"
        )));
    }
    if path == AUTH_TIMESTAMP_FILE {
        return Err(HubError::ConflictingName(path.to_string()));
    }
    Ok(())
}

/// Mint a historical sibling name for `path`:
/// `<dir>/.history.<unixMillis>.<rand10>.<filename>`.
fn historical_name(path: &str, now_ms: u64) -> String {
    let rand10: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect();
    match path.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/.history.{now_ms}.{rand10}.{file}"),
        None => format!(".history.{now_ms}.{rand10}.{path}"),
    }
}

/// Whether a listing entry names a historical object (filename component
/// begins with `.history.`).
fn is_historical(name: &str) -> bool {
    name.rsplit('/')
        .next()
        .is_some_and(|file| file.starts_with(".history."))
}

/// Drop historical entries when the caller is archival-restricted. If that
/// empties a page which still has a cursor, a single `null` sentinel tells
/// the client to keep paging.
fn filter_historical<T>(
    entries: Vec<T>,
    cursor: Option<String>,
    restricted: bool,
    name: impl Fn(&T) -> &str,
) -> (Vec<Option<T>>, Option<String>) {
    if !restricted {
        return (entries.into_iter().map(Some).collect(), cursor);
    }
    let kept: Vec<Option<T>> = entries
        .into_iter()
        .filter(|entry| !is_historical(name(entry)))
        .map(Some)
        .collect();
    if kept.is_empty() && cursor.is_some() {
        (vec![None], cursor)
    } else {
        (kept, cursor)
    }
}

/// Rewrite a driver-form URL onto the hub's public read prefix, when one is
/// configured and differs from the driver's. Idempotent: a URL already in
/// public form is returned unchanged.
pub fn rewrite_read_url(url: &str, driver_prefix: &str, public_prefix: Option<&str>) -> String {
    let Some(public) = public_prefix else {
        return url.to_string();
    };
    let public = with_trailing_slash(public);
    if public == driver_prefix {
        return url.to_string();
    }
    match url.strip_prefix(driver_prefix) {
        Some(rest) => format!("{public}{rest}"),
        None => url.to_string(),
    }
}

fn bytes_to_mib(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

fn with_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn historical_names_carry_dir_stamp_and_entropy() {
        let name = historical_name("foo/bar", 1_700_000_000_123);
        let (dir, file) = name.rsplit_once('/').unwrap();
        assert_eq!(dir, "foo");

        let mut parts = file.splitn(4, '.').skip(1);
        assert_eq!(parts.next(), Some("history"));
        assert_eq!(parts.next(), Some("1700000000123"));
        let tail = parts.next().unwrap();
        let (rand10, orig) = tail.split_once('.').unwrap();
        assert_eq!(rand10.len(), 10);
        assert!(rand10.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(orig, "bar");

        assert!(is_historical(&name));
        assert!(!is_historical("foo/bar"));

        let top = historical_name("bar", 5);
        assert!(top.starts_with(".history.5."));
        assert!(is_historical(&top));
    }

    #[test]
    fn distinct_mints_differ() {
        let a = historical_name("foo/bar", 1);
        let b = historical_name("foo/bar", 1);
        assert_ne!(a, b);
    }

    #[test]
    fn url_rewrite_swaps_only_the_driver_prefix() {
        let driver = "https://bucket.s3.amazonaws.com/";
        let rewritten = rewrite_read_url(
            "https://bucket.s3.amazonaws.com/alice/foo",
            driver,
            Some("https://read.example.com/"),
        );
        assert_eq!(rewritten, "https://read.example.com/alice/foo");

        // No public prefix configured: unchanged.
        assert_eq!(
            rewrite_read_url("https://bucket.s3.amazonaws.com/alice/foo", driver, None),
            "https://bucket.s3.amazonaws.com/alice/foo"
        );

        // Foreign URL: unchanged.
        assert_eq!(
            rewrite_read_url("https://elsewhere.example/x", driver, Some("https://r.example/")),
            "https://elsewhere.example/x"
        );
    }

    #[test]
    fn url_rewrite_is_idempotent() {
        let driver = "https://bucket.s3.amazonaws.com/";
        let public = Some("https://read.example.com");
        let once = rewrite_read_url("https://bucket.s3.amazonaws.com/alice/foo", driver, public);
        let twice = rewrite_read_url(&once, driver, public);
        assert_eq!(once, twice);

        // Equal prefixes are a no-op.
        assert_eq!(
            rewrite_read_url("https://bucket.s3.amazonaws.com/a", driver, Some(driver)),
            "https://bucket.s3.amazonaws.com/a"
        );
    }

    #[test]
    fn mib_conversion_uses_binary_megabytes() {
        assert_eq!(bytes_to_mib(30 * 1024 * 1024), 30.0);
        assert_eq!(bytes_to_mib(0), 0.0);
    }

    #[test]
    fn object_path_guards() {
        assert!(check_object_path("foo/bar").is_ok());
        assert!(check_object_path(".well-known/thing").is_ok());

        assert!(matches!(
            check_object_path(""),
            Err(HubError::Validation(_))
        ));
        assert!(matches!(
            check_object_path("foo/../bar"),
            Err(HubError::Validation(_))
        ));
        assert!(matches!(
            check_object_path(".authTimestamp"),
            Err(HubError::ConflictingName(_))
        ));
        // The reserved name is only reserved at the principal's top level.
        assert!(check_object_path("nested/.authTimestamp").is_ok());
    }

    #[test]
    fn filtering_appends_the_sentinel_only_when_needed() {
        let entries = vec![
            "foo/bar".to_string(),
            "foo/.history.1700000000123.AbCdEfGhIj.bar".to_string(),
        ];

        let (kept, cursor) =
            filter_historical(entries.clone(), None, false, |e| e.as_str());
        assert_eq!(kept.len(), 2);
        assert!(cursor.is_none());

        let (kept, cursor) = filter_historical(entries, None, true, |e| e.as_str());
        assert_eq!(kept, vec![Some("foo/bar".to_string())]);
        assert!(cursor.is_none());

        // Page emptied by filtering, cursor present: single null sentinel.
        let only_history = vec!["foo/.history.1.ABCDEFGHIJ.bar".to_string()];
        let (kept, cursor) =
            filter_historical(only_history, Some("cursor".to_string()), true, |e| {
                e.as_str()
            });
        assert_eq!(kept, vec![None]);
        assert_eq!(cursor.as_deref(), Some("cursor"));

        // Page emptied by filtering but no cursor: plain empty page.
        let only_history = vec!["foo/.history.1.ABCDEFGHIJ.bar".to_string()];
        let (kept, _) = filter_historical(only_history, None, true, |e| e.as_str());
        assert!(kept.is_empty());
    }
}
