//! The uniform contract every storage backend satisfies.
//!
//! A driver stores objects beneath a per-principal top level
//! (`<storageTopLevel>/<path>`), serves them back as byte streams, and
//! reports the absolute URL prefix its objects are naturally readable under.
//! Listing is lexicographic and paginated with an opaque cursor.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use futures::TryStreamExt;

use crate::error::Result;

/// Byte transport between the hub and a driver. Items are chunks; an `Err`
/// tears the transfer down.
pub type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Arguments to [`StorageDriver::perform_write`].
pub struct WriteArgs {
    /// Top-level namespace (the principal identifier).
    pub storage_top_level: String,
    /// Object path relative to the top level.
    pub path: String,
    /// Content to store. Consumed to end-of-input.
    pub stream: ByteStream,
    /// MIME type recorded with the object.
    pub content_type: String,
    /// Declared size, when the caller knows it. Purely a sizing hint here;
    /// enforcement happens upstream.
    pub content_length: Option<u64>,
}

impl std::fmt::Debug for WriteArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteArgs")
            .field("storage_top_level", &self.storage_top_level)
            .field("path", &self.path)
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Object metadata, as returned by stat and read.
#[derive(Debug, Clone, Default)]
pub struct ObjectStat {
    pub exists: bool,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl ObjectStat {
    /// Metadata for an absent object.
    pub fn absent() -> Self {
        Self::default()
    }
}

/// A read result: metadata plus a lazily consumed byte stream.
///
/// The stream is `Some` exactly when the object exists. Callers must consume
/// or drop it.
pub struct ObjectRead {
    pub stat: ObjectStat,
    pub stream: Option<ByteStream>,
}

impl ObjectRead {
    /// Collect the full object body into memory. Intended for small internal
    /// objects (metadata files), not client payloads.
    pub async fn into_bytes(self) -> std::io::Result<Bytes> {
        let Some(stream) = self.stream else {
            return Ok(Bytes::new());
        };
        let mut buf = BytesMut::new();
        let mut stream = stream;
        while let Some(chunk) = stream.try_next().await? {
            buf.extend_from_slice(&chunk);
        }
        Ok(buf.freeze())
    }
}

impl std::fmt::Debug for ObjectRead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectRead")
            .field("stat", &self.stat)
            .field("stream", &self.stream.is_some())
            .finish()
    }
}

/// One listing entry with metadata, for stat-mode listings.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ListEntry {
    pub name: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtime: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

/// One page of a listing. `page` is an opaque cursor: present when more
/// entries may follow, fed back verbatim to continue.
#[derive(Debug, Clone)]
pub struct ListPage<T> {
    pub entries: Vec<T>,
    pub page: Option<String>,
}

/// The uniform storage backend contract.
///
/// Implementations are shared across all in-flight requests and must be safe
/// for concurrent use. Object paths use `/` separators and are joined beneath
/// `storage_top_level`; drivers never interpret path contents beyond that.
#[async_trait]
pub trait StorageDriver: Send + Sync + 'static {
    /// Probe the backend and prepare it for use (create directories, verify
    /// the bucket exists). Called once at startup.
    async fn ensure_initialized(&self) -> Result<()>;

    /// Store an object, consuming the stream to end-of-input, and return the
    /// canonical read URL in this driver's natural prefix form.
    ///
    /// A stream error aborts the write; the key must not become readable with
    /// partial content.
    async fn perform_write(&self, args: WriteArgs) -> Result<String>;

    /// Remove an object. Fails with [`DriverError::DoesNotExist`] when absent.
    ///
    /// [`DriverError::DoesNotExist`]: crate::error::DriverError::DoesNotExist
    async fn perform_delete(&self, storage_top_level: &str, path: &str) -> Result<()>;

    /// Move an object. Fails with `DoesNotExist` when the source is absent;
    /// an existing destination is overwritten.
    async fn perform_rename(
        &self,
        storage_top_level: &str,
        path: &str,
        new_path: &str,
    ) -> Result<()>;

    /// Fetch an object's metadata and byte stream. An absent object yields
    /// `stat.exists == false` rather than an error.
    async fn perform_read(&self, storage_top_level: &str, path: &str) -> Result<ObjectRead>;

    /// Fetch an object's metadata without opening its stream.
    async fn perform_stat(&self, storage_top_level: &str, path: &str) -> Result<ObjectStat>;

    /// List object names beneath `path_prefix`, lexicographically, one page at
    /// a time. Names are relative to the prefix.
    async fn list_files(
        &self,
        path_prefix: &str,
        page: Option<&str>,
    ) -> Result<ListPage<String>>;

    /// Same as [`list_files`](Self::list_files) with per-entry metadata.
    async fn list_files_stat(
        &self,
        path_prefix: &str,
        page: Option<&str>,
    ) -> Result<ListPage<ListEntry>>;

    /// The absolute URL prefix this driver naturally serves objects under.
    /// Always ends with `/`.
    fn read_url_prefix(&self) -> String;

    /// Release backend resources. Drivers without any may keep the default.
    async fn dispose(&self) {}
}
