use async_trait::async_trait;
use std::pin::Pin;
use tokio::io::AsyncRead;

use crate::error::Result;

/// Readable byte stream handed to and returned from a blob store
pub type BlobReader = Pin<Box<dyn AsyncRead + Send>>;

/// Blob store trait
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persist the whole stream under a new unique name derived from
    /// `original_name`, returning the opaque storage path
    async fn save(&self, reader: BlobReader, original_name: &str) -> Result<String>;

    /// Open a previously saved blob for reading
    async fn fetch(&self, storage_path: &str) -> Result<BlobReader>;

    /// Get the storage type name
    fn storage_type(&self) -> &'static str;
}
