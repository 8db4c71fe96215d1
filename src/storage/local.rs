use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::error::{AppError, Result};
use crate::storage::{BlobReader, BlobStore};

/// Longest base name, in bytes, kept before the unique suffix
const MAX_BASE_BYTES: usize = 128;

/// Longest extension, in bytes, without its dot
const MAX_EXT_BYTES: usize = 16;

/// Local file system blob store
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            base_path: PathBuf::from(&config.local_path),
        }
    }

    /// Join a storage path onto the root, refusing anything but plain names
    fn get_full_path(&self, storage_path: &str) -> Result<PathBuf> {
        let relative = Path::new(storage_path);
        let mut components = relative.components().peekable();
        if components.peek().is_none() {
            return Err(invalid_storage_path());
        }
        if !components.all(|c| matches!(c, Component::Normal(_))) {
            return Err(invalid_storage_path());
        }
        Ok(self.base_path.join(relative))
    }
}

fn invalid_storage_path() -> AppError {
    AppError::bad_request("Invalid storage path")
}

fn blob_not_found() -> AppError {
    AppError::not_found("File not found").with_detail("Blob is missing from the file store")
}

/// Reduce a client supplied name to a safe single file name and make it
/// unique: `../../scan.dcm` becomes `scan_<32 hex digits>.dcm`.
///
/// Base and extension are cleaned and capped separately, so the result
/// stays well under the 255 byte file name limit of common file systems.
pub fn unique_file_name(original_name: &str) -> String {
    let name = display_name(original_name);
    let (base, ext) = match name.rsplit_once('.') {
        Some((base, ext)) => (base, ext),
        None => (name, ""),
    };

    let base = sanitize_part(base);
    let ext = sanitize_part(ext);
    let base = truncate_bytes(&base, MAX_BASE_BYTES);
    let ext = truncate_bytes(&ext, MAX_EXT_BYTES);

    let suffix = Uuid::new_v4().simple();
    if ext.is_empty() {
        format!("{}_{}", base, suffix)
    } else {
        format!("{}_{}.{}", base, suffix, ext)
    }
}

fn sanitize_part(part: &str) -> String {
    sanitize_filename::sanitize_with_options(
        part,
        sanitize_filename::Options {
            windows: cfg!(windows),
            truncate: false,
            replacement: "",
        },
    )
}

/// Longest prefix of `s` within `max` bytes that ends on a char boundary
fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Final path segment of a client supplied name, whichever separator it uses
pub fn display_name(original_name: &str) -> &str {
    original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
}

async fn write_stream(reader: &mut BlobReader, file: &mut fs::File) -> std::io::Result<u64> {
    let written = tokio::io::copy(reader, file).await?;
    file.flush().await?;
    file.sync_all().await?;
    Ok(written)
}

#[async_trait]
impl BlobStore for LocalStorage {
    async fn save(&self, mut reader: BlobReader, original_name: &str) -> Result<String> {
        let file_name = unique_file_name(original_name);
        let full_path = self.get_full_path(&file_name)?;

        fs::create_dir_all(&self.base_path).await?;

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full_path)
            .await?;

        match write_stream(&mut reader, &mut file).await {
            Ok(written) => {
                tracing::debug!("Saved {} bytes to {:?}", written, full_path);
                Ok(file_name)
            }
            Err(e) => {
                drop(file);
                if let Err(cleanup) = fs::remove_file(&full_path).await {
                    tracing::warn!("Failed to remove partial file {:?}: {}", full_path, cleanup);
                }
                Err(e.into())
            }
        }
    }

    async fn fetch(&self, storage_path: &str) -> Result<BlobReader> {
        let full_path = self.get_full_path(storage_path)?;

        let not_found_or_io = |e: std::io::Error| {
            if e.kind() == ErrorKind::NotFound {
                blob_not_found()
            } else {
                AppError::Io(e)
            }
        };

        // Symlinks inside the root must not lead out of it
        let root = fs::canonicalize(&self.base_path).await.map_err(not_found_or_io)?;
        let resolved = fs::canonicalize(&full_path).await.map_err(not_found_or_io)?;
        if !resolved.starts_with(&root) {
            tracing::warn!("Rejected storage path escaping the root: {}", storage_path);
            return Err(invalid_storage_path());
        }

        let metadata = fs::metadata(&resolved).await.map_err(not_found_or_io)?;
        if !metadata.is_file() {
            return Err(blob_not_found());
        }

        let file = fs::File::open(&resolved).await.map_err(not_found_or_io)?;
        Ok(Box::pin(file))
    }

    fn storage_type(&self) -> &'static str {
        "local"
    }
}
