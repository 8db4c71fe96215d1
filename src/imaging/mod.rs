pub mod dicom_rs;
pub mod parser;
pub mod tag;

pub use dicom_rs::*;
pub use parser::*;
pub use tag::*;
