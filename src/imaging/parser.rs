use std::io::Read;

/// Byte source of one DICOM file, read once from the start
pub type DicomSource = Box<dyn Read + Send>;

/// Errors raised by a DICOM parser
#[derive(Debug, thiserror::Error)]
pub enum ParserError {
    #[error("Invalid DICOM tag format: {0} - expected 'GGGG,EEEE' or '(GGGG,EEEE)'")]
    InvalidTag(String),

    #[error("Tag {0} not found in DICOM file")]
    TagNotFound(String),

    #[error("Frame index {index} is out of range. Total frames: {total}")]
    FrameOutOfRange { index: u32, total: u32 },

    #[error("Failed to parse DICOM data: {0}")]
    Parse(String),

    #[error("Failed to render frame: {0}")]
    Render(String),
}

/// Parsing and rendering capability over DICOM byte streams.
///
/// Implementations are synchronous and CPU bound; callers in async code
/// run them on the blocking pool. Sources are consumed as streams so a
/// file is never buffered twice.
#[cfg_attr(test, mockall::automock)]
pub trait DicomParser: Send + Sync {
    /// Whether the source parses as a DICOM file. Malformed input is
    /// `false`, never an error.
    fn validate(&self, source: DicomSource) -> bool;

    /// Single value of `tag` ("GGGG,EEEE") as text
    fn read_tag(&self, source: DicomSource, tag: &str) -> Result<String, ParserError>;

    /// Parse the source into a document that can be rendered
    fn load(&self, source: DicomSource) -> Result<Box<dyn DicomDocument>, ParserError>;
}

/// A parsed DICOM data set
#[cfg_attr(test, mockall::automock)]
pub trait DicomDocument: Send {
    /// Number of renderable frames
    fn frame_count(&self) -> u32;

    /// Encode the zero-based `frame` as PNG
    fn render_frame(&self, frame: u32) -> Result<Vec<u8>, ParserError>;
}
