use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use tokio_util::io::SyncIoBridge;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::imaging::{DicomParser, DicomSource, ParserError};
use crate::models::{DicomFileSummary, HeaderResponse, UploadResponse};
use crate::services::DicomFileService;
use crate::storage::{display_name, BlobStore};

/// Display name used when the client sends none
const UNNAMED_FILE: &str = "unnamed.dcm";

/// A rendered frame ready to be sent
#[derive(Debug)]
pub struct RenderedFrame {
    pub file_name: String,
    pub frame: u32,
    pub png: Vec<u8>,
}

/// Coordinates the blob store, the metadata records and the DICOM parser
pub struct DicomService;

impl DicomService {
    /// List all uploaded files, newest first
    pub async fn list_files(db: &Database) -> Result<Vec<DicomFileSummary>> {
        let files = DicomFileService::list(db).await?;
        Ok(files.into_iter().map(DicomFileSummary::from).collect())
    }

    /// Look up a single header value of a stored file
    pub async fn get_header(
        db: &Database,
        store: &dyn BlobStore,
        parser: Arc<dyn DicomParser>,
        file_id: &str,
        tag: Option<String>,
    ) -> Result<HeaderResponse> {
        let tag = tag
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::bad_request("Tag is required"))?;

        let file = DicomFileService::get_file(db, file_id).await?;
        let source = open_blob(store, &file.file_path).await?;

        let value = run_blocking({
            let tag = tag.clone();
            move || {
                parser.read_tag(source, &tag).map_err(|e| match e {
                    ParserError::InvalidTag(_) => {
                        AppError::bad_request("Invalid tag format").with_detail(e.to_string())
                    }
                    ParserError::TagNotFound(_) => {
                        AppError::not_found("Tag not found").with_detail(e.to_string())
                    }
                    other => {
                        tracing::error!("Failed to read header of {}: {}", file.id, other);
                        AppError::Internal(
                            "An error occurred while reading the DICOM header".to_string(),
                        )
                    }
                })
            }
        })
        .await?;

        Ok(HeaderResponse { tag, value })
    }

    /// Render one frame of a stored file as PNG
    pub async fn render_image(
        db: &Database,
        store: &dyn BlobStore,
        parser: Arc<dyn DicomParser>,
        file_id: &str,
        frame: Option<i64>,
    ) -> Result<RenderedFrame> {
        let file = DicomFileService::get_file(db, file_id).await?;
        let source = open_blob(store, &file.file_path).await?;
        let requested = frame.unwrap_or(0);

        let (frame, png) = run_blocking(move || {
            // A stored blob that no longer parses is reported like a bad upload
            let document = parser.load(source).map_err(|e| match e {
                ParserError::Parse(_) => {
                    AppError::bad_request("Invalid DICOM file").with_detail(e.to_string())
                }
                other => {
                    tracing::error!("Failed to load dataset: {}", other);
                    AppError::Internal("An error occurred while loading the DICOM file".to_string())
                }
            })?;

            let total = document.frame_count();
            let frame = u32::try_from(requested)
                .ok()
                .filter(|idx| *idx < total)
                .ok_or_else(|| invalid_frame(total))?;

            let png = document.render_frame(frame).map_err(|e| match e {
                ParserError::FrameOutOfRange { total, .. } => invalid_frame(total),
                other => {
                    tracing::error!("Failed to render frame {}: {}", frame, other);
                    AppError::Internal("An error occurred while rendering the frame".to_string())
                }
            })?;

            Ok((frame, png))
        })
        .await?;

        Ok(RenderedFrame {
            file_name: file.file_name,
            frame,
            png,
        })
    }

    /// Validate and store an upload spooled at `spool_path`, then record it.
    ///
    /// The blob is written before the record, so a record never points at a
    /// missing blob. If recording fails the blob is left behind.
    pub async fn upload(
        db: &Database,
        store: &dyn BlobStore,
        parser: Arc<dyn DicomParser>,
        original_name: &str,
        spool_path: &Path,
    ) -> Result<UploadResponse> {
        if tokio::fs::metadata(spool_path).await?.len() == 0 {
            return Err(AppError::bad_request("File is required"));
        }

        let valid = run_blocking({
            let spool_path = spool_path.to_path_buf();
            move || {
                let spool = std::fs::File::open(&spool_path)?;
                Ok(parser.validate(Box::new(BufReader::new(spool))))
            }
        })
        .await?;
        if !valid {
            return Err(AppError::bad_request("Invalid DICOM file"));
        }

        let spool = tokio::fs::File::open(spool_path).await?;
        let file_path = store
            .save(Box::pin(spool), original_name)
            .await
            .map_err(|e| {
                tracing::error!("Failed to save {} to {} store: {}", original_name, store.storage_type(), e);
                AppError::Internal("An error occurred while saving the file".to_string())
            })?;

        let file_name = match display_name(original_name) {
            "" => UNNAMED_FILE,
            name => name,
        };

        let file = DicomFileService::create(db, file_name, &file_path)
            .await
            .map_err(|e| {
                tracing::warn!("Blob {} stored but not recorded: {}", file_path, e);
                e
            })?;

        tracing::info!("Uploaded DICOM file {} as {}", file.id, file.file_path);
        Ok(UploadResponse::from(file))
    }
}

fn invalid_frame(total: u32) -> AppError {
    let detail = match total {
        0 => "The file contains no renderable frames".to_string(),
        n => format!("Frame index must be between 0 and {}", n - 1),
    };
    AppError::bad_request("Invalid frame index").with_detail(detail)
}

/// Blocking view of a stored blob. Must be created on the runtime and read
/// on the blocking pool.
async fn open_blob(store: &dyn BlobStore, storage_path: &str) -> Result<DicomSource> {
    let reader = store.fetch(storage_path).await?;
    Ok(Box::new(SyncIoBridge::new(reader)))
}

/// Run parser work on the blocking pool
async fn run_blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| {
        tracing::error!("DICOM worker failed: {}", e);
        AppError::Internal("An error occurred while processing the DICOM file".to_string())
    })?
}
