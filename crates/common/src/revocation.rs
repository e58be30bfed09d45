//! Per-principal revocation clock.
//!
//! Each principal may declare an oldest acceptable token issuance; tokens
//! issued strictly before it are rejected. The value persists in the driver
//! at the reserved key `<principal>/.authTimestamp` and is fronted by a
//! bounded concurrent cache. Entries never expire by time; eviction is
//! capacity-only.

use std::sync::Arc;

use bytes::Bytes;
use moka::sync::Cache;
use serde::Deserialize;

use drivers::{DriverError, StorageDriver, WriteArgs};

use crate::error::Result;
use crate::principal::Principal;
use crate::stream::single_chunk;

/// Reserved per-principal key holding the revocation timestamp.
pub const AUTH_TIMESTAMP_FILE: &str = ".authTimestamp";

#[derive(Debug, Deserialize)]
struct TimestampFile {
    timestamp: u64,
}

/// Cached, driver-backed mapping from principal to oldest valid `iat`
/// (Unix milliseconds).
pub struct RevocationClock {
    cache: Cache<String, u64>,
    driver: Arc<dyn StorageDriver>,
}

impl RevocationClock {
    pub fn new(driver: Arc<dyn StorageDriver>, capacity: u64) -> Self {
        Self {
            cache: Cache::builder().max_capacity(capacity).build(),
            driver,
        }
    }

    /// The oldest token issuance still accepted for `principal`. A principal
    /// that never bumped its clock is at 0.
    pub async fn oldest_valid_iat(&self, principal: &Principal) -> Result<u64> {
        if let Some(value) = self.cache.get(principal.as_str()) {
            return Ok(value);
        }

        let read = self
            .driver
            .perform_read(principal.as_str(), AUTH_TIMESTAMP_FILE)
            .await?;
        let value = if read.stat.exists {
            let body = read.into_bytes().await.map_err(DriverError::from)?;
            // An unreadable timestamp file behaves like an absent one.
            serde_json::from_slice::<TimestampFile>(&body)
                .map(|f| f.timestamp)
                .unwrap_or(0)
        } else {
            0
        };

        self.cache.insert(principal.as_str().to_string(), value);
        Ok(value)
    }

    /// Advance the clock. Monotonic: a value below the current one is
    /// silently ignored.
    pub async fn bump(&self, principal: &Principal, timestamp: u64) -> Result<()> {
        let current = self.oldest_valid_iat(principal).await?;
        if timestamp < current {
            tracing::debug!(
                principal = %principal,
                timestamp,
                current,
                "ignoring non-monotonic revocation bump"
            );
            return Ok(());
        }

        let body = serde_json::json!({ "timestamp": timestamp }).to_string();
        let len = body.len() as u64;
        self.driver
            .perform_write(WriteArgs {
                storage_top_level: principal.as_str().to_string(),
                path: AUTH_TIMESTAMP_FILE.to_string(),
                stream: single_chunk(Bytes::from(body)),
                content_type: "application/json".to_string(),
                content_length: Some(len),
            })
            .await?;

        self.cache.insert(principal.as_str().to_string(), timestamp);
        tracing::info!(principal = %principal, timestamp, "revocation clock advanced");
        Ok(())
    }
}

impl std::fmt::Debug for RevocationClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevocationClock")
            .field("cached_entries", &self.cache.entry_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drivers::ObjectDriver;

    fn clock_over_memory() -> (RevocationClock, Arc<dyn StorageDriver>) {
        let driver: Arc<dyn StorageDriver> = Arc::new(ObjectDriver::memory());
        (RevocationClock::new(driver.clone(), 1_024), driver)
    }

    fn principal() -> Principal {
        Principal::parse("1Lbcfr7sAHTD9CgdQo3HTMTkV8LK4ZnX71").unwrap()
    }

    #[tokio::test]
    async fn untouched_principal_reads_zero() {
        let (clock, _) = clock_over_memory();
        assert_eq!(clock.oldest_valid_iat(&principal()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn bump_persists_through_the_driver() {
        let (clock, driver) = clock_over_memory();
        let p = principal();

        clock.bump(&p, 1_000).await.unwrap();
        assert_eq!(clock.oldest_valid_iat(&p).await.unwrap(), 1_000);

        // A fresh clock over the same driver sees the persisted value.
        let fresh = RevocationClock::new(driver, 1_024);
        assert_eq!(fresh.oldest_valid_iat(&p).await.unwrap(), 1_000);
    }

    #[tokio::test]
    async fn bump_is_monotonic() {
        let (clock, _) = clock_over_memory();
        let p = principal();

        clock.bump(&p, 1_000).await.unwrap();
        clock.bump(&p, 400).await.unwrap();
        assert_eq!(clock.oldest_valid_iat(&p).await.unwrap(), 1_000);

        clock.bump(&p, 1_000).await.unwrap();
        assert_eq!(clock.oldest_valid_iat(&p).await.unwrap(), 1_000);
    }

    #[tokio::test]
    async fn corrupt_timestamp_file_reads_zero() {
        let (clock, driver) = clock_over_memory();
        let p = principal();

        driver
            .perform_write(WriteArgs {
                storage_top_level: p.as_str().to_string(),
                path: AUTH_TIMESTAMP_FILE.to_string(),
                stream: single_chunk(Bytes::from_static(b"not json")),
                content_type: "application/json".to_string(),
                content_length: Some(8),
            })
            .await
            .unwrap();

        assert_eq!(clock.oldest_valid_iat(&p).await.unwrap(), 0);
    }
}
