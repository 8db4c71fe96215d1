pub mod dicom;
pub mod file;

pub use dicom::DicomService;
pub use file::DicomFileService;
