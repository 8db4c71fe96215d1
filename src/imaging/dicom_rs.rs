use std::io::{Cursor, Read};

use dicom_dictionary_std::tags;
use dicom_object::{from_reader, DefaultDicomObject, FileMetaTable};
use dicom_pixeldata::PixelDecoder;
use image::ImageFormat;

use crate::imaging::{DicomDocument, DicomParser, DicomSource, ParserError, TagKey};

const PREAMBLE_LEN: usize = 128;
const MAGIC_CODE: &[u8; 4] = b"DICM";

/// File meta information group
const META_GROUP: u16 = 0x0002;

/// DicomParser backed by the dicom-rs toolkit
#[derive(Debug, Default, Clone, Copy)]
pub struct DicomRsParser;

impl DicomRsParser {
    pub fn new() -> Self {
        Self
    }
}

/// Parse a DICOM file with or without its 128 byte preamble. Only the
/// leading bytes are buffered to find the magic code.
fn open(mut source: DicomSource) -> Result<DefaultDicomObject, ParserError> {
    let head_len = PREAMBLE_LEN + MAGIC_CODE.len();
    let mut head = Vec::with_capacity(head_len);
    (&mut source)
        .take(head_len as u64)
        .read_to_end(&mut head)
        .map_err(|e| ParserError::Parse(e.to_string()))?;

    let start = if head.len() == head_len && &head[PREAMBLE_LEN..] == MAGIC_CODE {
        PREAMBLE_LEN
    } else if head.starts_with(MAGIC_CODE) {
        0
    } else {
        return Err(ParserError::Parse("missing DICM magic code".to_string()));
    };
    head.drain(..start);

    from_reader(Cursor::new(head).chain(source)).map_err(|e| ParserError::Parse(e.to_string()))
}

fn trim_padding(value: &str) -> String {
    value.trim_end_matches(['\0', ' ']).to_string()
}

/// Values of the file meta group, which dicom-rs keeps apart from the data set
fn meta_value(meta: &FileMetaTable, key: TagKey) -> Option<String> {
    let value = match key.element {
        0x0000 => meta.information_group_length.to_string(),
        0x0002 => trim_padding(&meta.media_storage_sop_class_uid),
        0x0003 => trim_padding(&meta.media_storage_sop_instance_uid),
        0x0010 => trim_padding(&meta.transfer_syntax),
        0x0012 => trim_padding(&meta.implementation_class_uid),
        0x0013 => trim_padding(meta.implementation_version_name.as_deref()?),
        0x0016 => trim_padding(meta.source_application_entity_title.as_deref()?),
        _ => return None,
    };
    Some(value)
}

impl DicomParser for DicomRsParser {
    fn validate(&self, source: DicomSource) -> bool {
        match open(source) {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!("DICOM validation failed: {}", e);
                false
            }
        }
    }

    fn read_tag(&self, source: DicomSource, tag: &str) -> Result<String, ParserError> {
        let obj = open(source)?;
        let key: TagKey = tag.parse()?;
        let not_found = || ParserError::TagNotFound(key.to_string());

        if key.group == META_GROUP {
            return meta_value(obj.meta(), key).ok_or_else(not_found);
        }

        let element = obj.element(key.into()).map_err(|_| not_found())?;
        // Sequences and binary values have no single text value
        let value = element.to_str().map_err(|_| not_found())?;
        Ok(trim_padding(&value))
    }

    fn load(&self, source: DicomSource) -> Result<Box<dyn DicomDocument>, ParserError> {
        let obj = open(source)?;
        Ok(Box::new(DicomRsDocument { obj }))
    }
}

/// A data set parsed by dicom-rs
pub struct DicomRsDocument {
    obj: DefaultDicomObject,
}

impl DicomDocument for DicomRsDocument {
    fn frame_count(&self) -> u32 {
        if self.obj.element(tags::PIXEL_DATA).is_err() {
            return 0;
        }
        self.obj
            .element(tags::NUMBER_OF_FRAMES)
            .ok()
            .and_then(|e| e.to_int::<u32>().ok())
            .unwrap_or(1)
    }

    fn render_frame(&self, frame: u32) -> Result<Vec<u8>, ParserError> {
        let total = self.frame_count();
        if frame >= total {
            return Err(ParserError::FrameOutOfRange {
                index: frame,
                total,
            });
        }

        let pixels = self
            .obj
            .decode_pixel_data()
            .map_err(|e| ParserError::Render(e.to_string()))?;
        let image = pixels
            .to_dynamic_image(frame)
            .map_err(|e| ParserError::Render(e.to_string()))?;

        let mut png = Cursor::new(Vec::new());
        image
            .write_to(&mut png, ImageFormat::Png)
            .map_err(|e| ParserError::Render(e.to_string()))?;

        Ok(png.into_inner())
    }
}
