use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Metadata row for one uploaded DICOM file
#[derive(Debug, Clone, FromRow)]
pub struct DicomFile {
    pub id: String,
    /// Client supplied name, for display only
    pub file_name: String,
    /// Opaque blob store path, never client supplied
    pub file_path: String,
    pub uploaded_at: String,
    pub preview_path: Option<String>,
}

/// Listing entry, never exposes the storage path
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DicomFileSummary {
    pub id: String,
    pub file_name: String,
    pub uploaded_at: String,
}

impl From<DicomFile> for DicomFileSummary {
    fn from(file: DicomFile) -> Self {
        Self {
            id: file.id,
            file_name: file.file_name,
            uploaded_at: file.uploaded_at,
        }
    }
}

/// Upload response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub id: String,
    pub file_name: String,
    pub file_path: String,
}

impl From<DicomFile> for UploadResponse {
    fn from(file: DicomFile) -> Self {
        Self {
            id: file.id,
            file_name: file.file_name,
            file_path: file.file_path,
        }
    }
}

/// Header lookup response
#[derive(Debug, Clone, Serialize)]
pub struct HeaderResponse {
    pub tag: String,
    pub value: String,
}

/// Header query parameters
#[derive(Debug, Deserialize)]
pub struct HeaderQuery {
    /// Tag in "GGGG,EEEE" form
    pub tag: Option<String>,
}

/// Image query parameters
#[derive(Debug, Deserialize)]
pub struct ImageQuery {
    /// Zero-based frame index, defaults to 0
    pub frame: Option<i64>,
}
