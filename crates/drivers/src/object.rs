//! The `object_store`-backed driver.
//!
//! One implementation covers every backend: the config picks the
//! `object_store` client, the driver layers the hub's key layout, pagination,
//! and URL semantics on top.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::BytesMut;
use futures::{StreamExt, TryStreamExt};
use object_store::path::Path as ObjectPath;
use object_store::{Attribute, Attributes, GetOptions, ObjectMeta, ObjectStore, PutOptions};

use crate::api::{
    ByteStream, ListEntry, ListPage, ObjectRead, ObjectStat, StorageDriver, WriteArgs,
};
use crate::config::DriverConfig;
use crate::error::{DriverError, Result};

/// Default number of names per listing page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Storage driver over any `object_store` backend.
#[derive(Clone)]
pub struct ObjectDriver {
    store: Arc<dyn ObjectStore>,
    read_url_prefix: String,
    page_size: usize,
    persist_content_type: bool,
    probe_bucket: Option<String>,
}

impl ObjectDriver {
    /// Build a driver from backend configuration.
    pub fn new(config: DriverConfig, page_size: usize) -> Result<Self> {
        let store = config.build_store()?;
        Ok(Self {
            store,
            read_url_prefix: config.read_url_prefix(),
            page_size: page_size.max(1),
            persist_content_type: config.persists_content_type(),
            probe_bucket: config.bucket_name().map(str::to_string),
        })
    }

    /// An in-memory driver with default paging. Handy for tests.
    pub fn memory() -> Self {
        Self::new(DriverConfig::Memory, DEFAULT_PAGE_SIZE).expect("memory driver")
    }

    fn location(&self, storage_top_level: &str, path: &str) -> ObjectPath {
        ObjectPath::from(format!(
            "{}/{}",
            storage_top_level.trim_matches('/'),
            path.trim_start_matches('/')
        ))
    }

    fn content_type_of(&self, attributes: &Attributes, path: &str) -> String {
        attributes
            .get(&Attribute::ContentType)
            .map(|v| v.to_string())
            .unwrap_or_else(|| {
                mime_guess::from_path(path)
                    .first_or_octet_stream()
                    .to_string()
            })
    }

    fn stat_from(&self, meta: &ObjectMeta, attributes: &Attributes, path: &str) -> ObjectStat {
        ObjectStat {
            exists: true,
            content_type: Some(self.content_type_of(attributes, path)),
            content_length: Some(meta.size),
            etag: meta.e_tag.clone(),
            last_modified: Some(meta.last_modified),
        }
    }

    /// Collect every key under `path_prefix`, sorted lexicographically by the
    /// name relative to the prefix.
    ///
    /// Backends disagree on listing order (local directory walks are not
    /// sorted), so ordering and cursoring are imposed here. The cursor is the
    /// last name of the previous page.
    async fn list_sorted(&self, path_prefix: &str) -> Result<Vec<(String, ObjectMeta)>> {
        let prefix_str = path_prefix.trim_matches('/').to_string();
        let prefix = ObjectPath::from(prefix_str.clone());
        let metas: Vec<ObjectMeta> = self.store.list(Some(&prefix)).try_collect().await?;

        let strip = format!("{prefix_str}/");
        let mut entries: Vec<(String, ObjectMeta)> = metas
            .into_iter()
            .filter_map(|meta| {
                let name = meta.location.as_ref().strip_prefix(&strip)?.to_string();
                Some((name, meta))
            })
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }

    fn paginate<T>(
        &self,
        entries: Vec<(String, ObjectMeta)>,
        page: Option<&str>,
        f: impl Fn(String, ObjectMeta) -> T,
    ) -> ListPage<T> {
        let after = page.unwrap_or("");
        let mut remaining = entries
            .into_iter()
            .filter(|(name, _)| name.as_str() > after);

        let out: Vec<(String, ObjectMeta)> =
            remaining.by_ref().take(self.page_size).collect();
        // A cursor is returned only when a further entry actually follows.
        let page = if remaining.next().is_some() {
            out.last().map(|(name, _)| name.clone())
        } else {
            None
        };

        ListPage {
            entries: out.into_iter().map(|(name, meta)| f(name, meta)).collect(),
            page,
        }
    }
}

impl std::fmt::Debug for ObjectDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectDriver")
            .field("read_url_prefix", &self.read_url_prefix)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl StorageDriver for ObjectDriver {
    async fn ensure_initialized(&self) -> Result<()> {
        // Probe cloud buckets by listing; fails fast on a missing or
        // misconfigured bucket.
        if let Some(bucket) = &self.probe_bucket {
            let mut listing = self.store.list(None);
            match listing.try_next().await {
                Ok(_) => {}
                Err(object_store::Error::NotFound { .. }) => {
                    return Err(DriverError::BucketNotFound(bucket.clone()));
                }
                Err(e) => {
                    let msg = e.to_string();
                    if msg.contains("NoSuchBucket") || (msg.contains("bucket") && msg.contains("not")) {
                        return Err(DriverError::BucketNotFound(bucket.clone()));
                    }
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }

    async fn perform_write(&self, args: WriteArgs) -> Result<String> {
        let location = self.location(&args.storage_top_level, &args.path);

        // Drain the stream fully before a single atomic put: a failed or
        // oversized stream never becomes visible at the key.
        let hint = args.content_length.unwrap_or(0).min(64 * 1024 * 1024) as usize;
        let mut buf = BytesMut::with_capacity(hint);
        let mut stream = args.stream;
        while let Some(chunk) = stream.try_next().await? {
            buf.extend_from_slice(&chunk);
        }
        let written = buf.len();

        let mut opts = PutOptions::default();
        if self.persist_content_type {
            let mut attributes = Attributes::new();
            attributes.insert(Attribute::ContentType, args.content_type.clone().into());
            opts.attributes = attributes;
        }
        self.store.put_opts(&location, buf.freeze().into(), opts).await?;

        tracing::debug!(
            key = %location,
            size = written,
            content_type = %args.content_type,
            "object stored"
        );
        Ok(format!(
            "{}{}/{}",
            self.read_url_prefix, args.storage_top_level, args.path
        ))
    }

    async fn perform_delete(&self, storage_top_level: &str, path: &str) -> Result<()> {
        let location = self.location(storage_top_level, path);
        match self.store.delete(&location).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => {
                Err(DriverError::DoesNotExist(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn perform_rename(
        &self,
        storage_top_level: &str,
        path: &str,
        new_path: &str,
    ) -> Result<()> {
        let from = self.location(storage_top_level, path);
        let to = self.location(storage_top_level, new_path);
        match self.store.rename(&from, &to).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => {
                Err(DriverError::DoesNotExist(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn perform_read(&self, storage_top_level: &str, path: &str) -> Result<ObjectRead> {
        let location = self.location(storage_top_level, path);
        match self.store.get(&location).await {
            Ok(result) => {
                let stat = self.stat_from(&result.meta, &result.attributes, path);
                let stream = result
                    .into_stream()
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
                    .boxed();
                Ok(ObjectRead {
                    stat,
                    stream: Some(stream),
                })
            }
            Err(object_store::Error::NotFound { .. }) => Ok(ObjectRead {
                stat: ObjectStat::absent(),
                stream: None,
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn perform_stat(&self, storage_top_level: &str, path: &str) -> Result<ObjectStat> {
        let location = self.location(storage_top_level, path);
        let options = GetOptions {
            head: true,
            ..Default::default()
        };
        match self.store.get_opts(&location, options).await {
            Ok(result) => Ok(self.stat_from(&result.meta, &result.attributes, path)),
            Err(object_store::Error::NotFound { .. }) => Ok(ObjectStat::absent()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_files(
        &self,
        path_prefix: &str,
        page: Option<&str>,
    ) -> Result<ListPage<String>> {
        let entries = self.list_sorted(path_prefix).await?;
        Ok(self.paginate(entries, page, |name, _| name))
    }

    async fn list_files_stat(
        &self,
        path_prefix: &str,
        page: Option<&str>,
    ) -> Result<ListPage<ListEntry>> {
        let entries = self.list_sorted(path_prefix).await?;
        Ok(self.paginate(entries, page, |name, meta| ListEntry {
            name,
            size: meta.size,
            mtime: Some(meta.last_modified),
            etag: meta.e_tag,
        }))
    }

    fn read_url_prefix(&self) -> String {
        self.read_url_prefix.clone()
    }
}
