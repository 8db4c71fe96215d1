use axum::{
    body::Body,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::QueryRejection,
        Multipart, Path, Query, State,
    },
    http::{header, StatusCode},
    response::Response,
    Json,
};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{DicomFileSummary, HeaderQuery, HeaderResponse, ImageQuery, UploadResponse};
use crate::services::DicomService;
use crate::AppState;

/// Temporary copy of an upload, removed when dropped
struct SpoolFile {
    path: PathBuf,
}

impl SpoolFile {
    fn new() -> Self {
        let path = std::env::temp_dir().join(format!("dicom_upload_{}", Uuid::new_v4()));
        Self { path }
    }
}

impl Drop for SpoolFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::error!("Failed to remove temp file {:?}: {}", self.path, e);
            }
        }
    }
}

fn file_required() -> AppError {
    AppError::bad_request("File is required")
}

/// Oversized bodies are 413, any other broken multipart body means no file
fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        file_required().with_detail(e.body_text())
    }
}

/// List uploaded files
/// GET /files
pub async fn list_files(State(state): State<AppState>) -> Result<Json<Vec<DicomFileSummary>>> {
    let files = DicomService::list_files(&state.db).await?;
    Ok(Json(files))
}

/// Read one header value
/// GET /files/:id/header?tag=GGGG,EEEE
pub async fn get_header(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<HeaderQuery>,
) -> Result<Json<HeaderResponse>> {
    let header = DicomService::get_header(
        &state.db,
        state.store.as_ref(),
        state.parser.clone(),
        &id,
        query.tag,
    )
    .await?;
    Ok(Json(header))
}

/// Render a frame as PNG for inline display
/// GET /files/:id/image?frame=N
pub async fn get_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
    query: std::result::Result<Query<ImageQuery>, QueryRejection>,
) -> Result<Response> {
    let Query(query) = query.map_err(|e| {
        AppError::bad_request("Invalid frame index").with_detail(e.body_text())
    })?;

    let rendered = DicomService::render_image(
        &state.db,
        state.store.as_ref(),
        state.parser.clone(),
        &id,
        query.frame,
    )
    .await?;

    let stem = std::path::Path::new(&rendered.file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("frame");
    let image_name = format!("{}_frame{}.png", stem, rendered.frame);
    let fallback_name: String = image_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();
    let encoded_name = urlencoding::encode(&image_name);

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "image/png")
        .header(header::CONTENT_LENGTH, rendered.png.len())
        .header(
            header::CONTENT_DISPOSITION,
            format!(
                "inline; filename=\"{}\"; filename*=UTF-8''{}",
                fallback_name, encoded_name
            ),
        )
        .body(Body::from(rendered.png))
        .map_err(|e| {
            tracing::error!("Failed to build image response: {}", e);
            AppError::Internal("An error occurred while sending the image".to_string())
        })?;

    Ok(response)
}

/// Upload a DICOM file
/// POST /files (multipart, field "file")
pub async fn upload_file(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>> {
    let mut multipart = multipart.map_err(|e| file_required().with_detail(e.body_text()))?;
    let mut upload: Option<(SpoolFile, String)> = None;

    // Process multipart fields
    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") || upload.is_some() {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let spool = SpoolFile::new();

        let mut file = tokio::fs::File::create(&spool.path).await.map_err(|e| {
            tracing::error!("Failed to create temp file: {}", e);
            AppError::Internal("An error occurred while receiving the file".to_string())
        })?;

        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            file.write_all(&chunk).await.map_err(|e| {
                tracing::error!("Failed to write to temp file: {}", e);
                AppError::Internal("An error occurred while receiving the file".to_string())
            })?;
        }

        file.flush().await.map_err(|e| {
            tracing::error!("Failed to flush temp file: {}", e);
            AppError::Internal("An error occurred while receiving the file".to_string())
        })?;

        upload = Some((spool, file_name));
    }

    let (spool, file_name) = upload.ok_or_else(file_required)?;

    let response = DicomService::upload(
        &state.db,
        state.store.as_ref(),
        state.parser.clone(),
        &file_name,
        &spool.path,
    )
    .await?;

    Ok(Json(response))
}
