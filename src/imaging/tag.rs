use std::fmt;
use std::str::FromStr;

use crate::imaging::ParserError;

/// Two-part DICOM tag key: group and element numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TagKey {
    pub group: u16,
    pub element: u16,
}

impl TagKey {
    #[cfg(test)]
    pub fn new(group: u16, element: u16) -> Self {
        Self { group, element }
    }
}

fn parse_hex4(part: &str) -> Option<u16> {
    let part = part.trim();
    if part.len() != 4 || !part.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u16::from_str_radix(part, 16).ok()
}

/// Accepts `GGGG,EEEE`, `(GGGG,EEEE)` and `GGGGEEEE`
impl FromStr for TagKey {
    type Err = ParserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParserError::InvalidTag(s.to_string());

        let trimmed = s.trim();
        let inner = match (trimmed.strip_prefix('('), trimmed.ends_with(')')) {
            (Some(rest), true) => &rest[..rest.len() - 1],
            (None, false) => trimmed,
            _ => return Err(invalid()),
        };

        let (group, element) = match inner.split_once(',') {
            Some((group, element)) => (group, element),
            None if inner.len() == 8 && inner.is_char_boundary(4) => inner.split_at(4),
            None => return Err(invalid()),
        };

        match (parse_hex4(group), parse_hex4(element)) {
            (Some(group), Some(element)) => Ok(Self { group, element }),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:04X},{:04X})", self.group, self.element)
    }
}

impl From<TagKey> for dicom_core::Tag {
    fn from(key: TagKey) -> Self {
        dicom_core::Tag(key.group, key.element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepted_forms() {
        let expected = TagKey::new(0x0010, 0x0010);
        for raw in ["0010,0010", "(0010,0010)", "00100010", " 0010, 0010 ", "(0010,0010) "] {
            assert_eq!(raw.parse::<TagKey>().unwrap(), expected, "{raw}");
        }
        assert_eq!(
            "7fe0,0010".parse::<TagKey>().unwrap(),
            TagKey::new(0x7FE0, 0x0010)
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for raw in [
            "", "BAD,TAG", "0010", "0010,", "(0010,0010", "0010,0010)", "10,10",
            "00010,0010", "+010,0010", "0010,0010,0010", "001G0010",
        ] {
            let err = raw.parse::<TagKey>().unwrap_err();
            assert!(matches!(err, ParserError::InvalidTag(ref t) if t == raw), "{raw}");
        }
    }

    #[test]
    fn test_display_and_conversion() {
        let key = TagKey::new(0x0028, 0x0008);
        assert_eq!(key.to_string(), "(0028,0008)");
        assert_eq!(dicom_core::Tag::from(key), dicom_core::Tag(0x0028, 0x0008));
    }
}
