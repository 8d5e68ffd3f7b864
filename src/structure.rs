//! Structure representation for parsed JPEG files

use crate::{error::Result, formats::jpeg_io::JpegIO, segment::Segment};

/// The discovered segment layout of a JPEG file
///
/// Holds owned copies of every segment so the structure does not borrow
/// the caller's input buffer. The metadata segment is held apart from the
/// pass-through segments; on reassembly it is always written directly
/// after start-of-image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Structure {
    /// Pass-through segments in original order (start-of-image and end-of-image excluded)
    pub segments: Vec<Segment>,

    /// The EXIF APP1 segment, verbatim, if the file had one
    pub metadata: Option<Segment>,

    /// Offset just past end-of-image
    pub total_size: u64,

    /// Bytes found after end-of-image (ignored, not preserved)
    pub trailing_bytes: u64,
}

impl Structure {
    /// Create an empty structure
    pub fn new() -> Self {
        Self::default()
    }

    /// Payload of the metadata segment (after marker and length field)
    pub fn metadata_payload(&self) -> Option<&[u8]> {
        self.metadata.as_ref().map(Segment::payload)
    }

    /// Check if the file carried an EXIF segment
    pub fn has_metadata(&self) -> bool {
        self.metadata.is_some()
    }

    /// The start-of-scan segments (one for baseline, several for progressive)
    pub fn scans(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter().filter(|s| s.is_scan())
    }

    /// Reassemble a complete file with `metadata` as the new EXIF payload
    pub fn reassemble(&self, metadata: &[u8]) -> Result<Vec<u8>> {
        JpegIO::new().reassemble(metadata, &self.segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{EXIF_SIGNATURE, SOS};

    #[test]
    fn test_reassemble_preserves_segment_order() {
        let mut structure = Structure::new();
        structure
            .segments
            .push(Segment::new(0xFFFE, 10, vec![0xFF, 0xFE, 0x00, 0x03, b'a']));
        structure
            .segments
            .push(Segment::new(SOS, 15, vec![0xFF, 0xDA, 0x00, 0x02, 0x7F]));

        let out = structure.reassemble(EXIF_SIGNATURE).unwrap();

        let mut expected = vec![0xFF, 0xD8, 0xFF, 0xE1, 0x00, 0x08];
        expected.extend_from_slice(EXIF_SIGNATURE);
        expected.extend_from_slice(&[0xFF, 0xFE, 0x00, 0x03, b'a']);
        expected.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x02, 0x7F]);
        expected.extend_from_slice(&[0xFF, 0xD9]);
        assert_eq!(out, expected);
        assert_eq!(structure.scans().count(), 1);
    }

    #[test]
    fn test_no_metadata() {
        let structure = Structure::new();
        assert!(!structure.has_metadata());
        assert_eq!(structure.metadata_payload(), None);
    }
}
