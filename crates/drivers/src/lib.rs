//! Storage backends for the hub.
//!
//! Every backend satisfies the [`StorageDriver`] contract; which one runs is
//! purely a [`DriverConfig`] concern. The single [`ObjectDriver`]
//! implementation covers in-memory, local-disk, S3-compatible, Azure Blob,
//! and Google Cloud Storage backends through `object_store`.

mod api;
mod config;
mod error;
mod object;

pub use api::{ByteStream, ListEntry, ListPage, ObjectRead, ObjectStat, StorageDriver, WriteArgs};
pub use config::{DriverConfig, DEFAULT_LOCAL_READ_URL};
pub use error::{DriverError, Result};
pub use object::{ObjectDriver, DEFAULT_PAGE_SIZE};
