//! Backend selection and construction.
//!
//! The backend is a config concern: each variant knows how to build its
//! `object_store` client and what URL prefix its objects are naturally
//! readable under. Cloud credentials come from the conventional environment
//! variables (`AWS_*`, `AZURE_*`, `GOOGLE_*`), never from this struct.

use std::path::PathBuf;
use std::sync::Arc;

use object_store::aws::AmazonS3Builder;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::ObjectStore;
use serde::{Deserialize, Serialize};

use crate::error::{DriverError, Result};

/// Default read URL for backends that have no public endpoint of their own
/// (memory, disk); points at a co-located read gateway.
pub const DEFAULT_LOCAL_READ_URL: &str = "http://localhost:8008/";

/// Configuration for the storage backend.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DriverConfig {
    /// In-memory storage (for testing)
    #[default]
    Memory,

    /// Local filesystem storage
    Disk {
        /// Root directory objects are stored beneath
        path: PathBuf,
        /// Public URL objects are readable under; defaults to the local
        /// read gateway
        read_url: Option<String>,
    },

    /// S3-compatible storage (AWS S3, MinIO, ...)
    S3 {
        bucket: String,
        region: Option<String>,
        /// Custom endpoint for S3-compatible stores
        endpoint: Option<String>,
        /// Override for the natural `https://<bucket>.s3.amazonaws.com/` prefix
        read_url: Option<String>,
    },

    /// Azure Blob Storage
    Azure {
        account: String,
        container: String,
        read_url: Option<String>,
    },

    /// Google Cloud Storage
    Gcs {
        bucket: String,
        read_url: Option<String>,
    },
}

impl DriverConfig {
    /// Build the backend client for this configuration.
    pub(crate) fn build_store(&self) -> Result<Arc<dyn ObjectStore>> {
        let store: Arc<dyn ObjectStore> = match self {
            DriverConfig::Memory => Arc::new(InMemory::new()),

            DriverConfig::Disk { path, .. } => {
                std::fs::create_dir_all(path)?;
                Arc::new(
                    LocalFileSystem::new_with_prefix(path)
                        .map_err(|e| DriverError::InvalidConfig(e.to_string()))?,
                )
            }

            DriverConfig::S3 {
                bucket,
                region,
                endpoint,
                ..
            } => {
                let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);
                if let Some(region) = region {
                    builder = builder.with_region(region);
                }
                if let Some(endpoint) = endpoint {
                    builder = builder
                        .with_endpoint(endpoint)
                        .with_allow_http(endpoint.starts_with("http://"));
                }
                Arc::new(
                    builder
                        .build()
                        .map_err(|e| DriverError::InvalidConfig(e.to_string()))?,
                )
            }

            DriverConfig::Azure {
                account, container, ..
            } => Arc::new(
                MicrosoftAzureBuilder::from_env()
                    .with_account(account)
                    .with_container_name(container)
                    .build()
                    .map_err(|e| DriverError::InvalidConfig(e.to_string()))?,
            ),

            DriverConfig::Gcs { bucket, .. } => Arc::new(
                GoogleCloudStorageBuilder::from_env()
                    .with_bucket_name(bucket)
                    .build()
                    .map_err(|e| DriverError::InvalidConfig(e.to_string()))?,
            ),
        };
        Ok(store)
    }

    /// The absolute URL prefix this backend naturally serves objects under.
    pub(crate) fn read_url_prefix(&self) -> String {
        let natural = match self {
            DriverConfig::Memory => DEFAULT_LOCAL_READ_URL.to_string(),
            DriverConfig::Disk { read_url, .. } => {
                return normalized(read_url.as_deref().unwrap_or(DEFAULT_LOCAL_READ_URL));
            }
            DriverConfig::S3 {
                bucket, read_url, ..
            } => read_url
                .clone()
                .unwrap_or_else(|| format!("https://{bucket}.s3.amazonaws.com/")),
            DriverConfig::Azure {
                account,
                container,
                read_url,
            } => read_url.clone().unwrap_or_else(|| {
                format!("https://{account}.blob.core.windows.net/{container}/")
            }),
            DriverConfig::Gcs { bucket, read_url } => read_url
                .clone()
                .unwrap_or_else(|| format!("https://storage.googleapis.com/{bucket}/")),
        };
        normalized(&natural)
    }

    /// Whether the backend persists a content-type attribute alongside
    /// objects. The local filesystem cannot; readers there fall back to
    /// type-by-extension.
    pub(crate) fn persists_content_type(&self) -> bool {
        !matches!(self, DriverConfig::Disk { .. })
    }

    /// Bucket/container name for startup probing, when the backend has one.
    pub(crate) fn bucket_name(&self) -> Option<&str> {
        match self {
            DriverConfig::S3 { bucket, .. } | DriverConfig::Gcs { bucket, .. } => Some(bucket),
            DriverConfig::Azure { container, .. } => Some(container),
            DriverConfig::Memory | DriverConfig::Disk { .. } => None,
        }
    }
}

fn normalized(url: &str) -> String {
    let mut url = url.to_string();
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn natural_prefixes_end_with_slash() {
        let s3 = DriverConfig::S3 {
            bucket: "hub-data".to_string(),
            region: None,
            endpoint: None,
            read_url: None,
        };
        assert_eq!(s3.read_url_prefix(), "https://hub-data.s3.amazonaws.com/");

        let gcs = DriverConfig::Gcs {
            bucket: "hub-data".to_string(),
            read_url: None,
        };
        assert_eq!(
            gcs.read_url_prefix(),
            "https://storage.googleapis.com/hub-data/"
        );

        let azure = DriverConfig::Azure {
            account: "hubacct".to_string(),
            container: "data".to_string(),
            read_url: None,
        };
        assert_eq!(
            azure.read_url_prefix(),
            "https://hubacct.blob.core.windows.net/data/"
        );
    }

    #[test]
    fn read_url_override_wins_and_is_normalized() {
        let disk = DriverConfig::Disk {
            path: "/tmp/hub".into(),
            read_url: Some("https://read.example.com".to_string()),
        };
        assert_eq!(disk.read_url_prefix(), "https://read.example.com/");
    }
}
