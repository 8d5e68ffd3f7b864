//! Segment types and marker definitions

/// A byte range in a file (offset and size)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// Offset from start of file
    pub offset: u64,
    /// Size in bytes
    pub size: u64,
}

impl ByteRange {
    /// Create a new byte range
    pub fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }
}

// JPEG markers (full 16-bit codes)
/// Start of Image
pub const SOI: u16 = 0xFFD8;
/// End of Image
pub const EOI: u16 = 0xFFD9;
/// Start of Scan (entropy-coded image data follows)
pub const SOS: u16 = 0xFFDA;
/// APP1, carrier of EXIF (and XMP)
pub const APP1: u16 = 0xFFE1;

/// Signature at the start of an EXIF APP1 payload
pub const EXIF_SIGNATURE: &[u8] = b"Exif\0\0";
/// Signature at the start of an XMP APP1 payload
pub const XMP_SIGNATURE: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";

/// Largest payload a length-prefixed segment can carry (the 16-bit length includes itself)
pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize - 2;

/// Get human-readable label for a JPEG marker
pub fn marker_label(marker: u16) -> &'static str {
    match marker {
        0xFFD8 => "SOI",
        0xFFD9 => "EOI",
        0xFFDA => "SOS",
        0xFFDB => "DQT",
        0xFFC0 => "SOF0",
        0xFFC1 => "SOF1",
        0xFFC2 => "SOF2",
        0xFFC4 => "DHT",
        0xFFDD => "DRI",
        0xFFFE => "COM",
        0xFFD0..=0xFFD7 => "RST",
        0xFFE0 => "APP0",
        0xFFE1 => "APP1",
        0xFFE2 => "APP2",
        0xFFE3 => "APP3",
        0xFFE4 => "APP4",
        0xFFE5 => "APP5",
        0xFFE6 => "APP6",
        0xFFE7 => "APP7",
        0xFFE8 => "APP8",
        0xFFE9 => "APP9",
        0xFFEA => "APP10",
        0xFFEB => "APP11",
        0xFFEC => "APP12",
        0xFFED => "APP13",
        0xFFEE => "APP14",
        0xFFEF => "APP15",
        _ => "OTHER",
    }
}

/// Logical classification of a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    /// EXIF metadata: any APP1 that is not XMP, normally signed `Exif\0\0`
    Exif,
    /// XMP metadata (APP1 with the XMP namespace signature)
    Xmp,
    /// Start of scan plus its entropy-coded data
    ImageData,
    /// Any other marker segment
    Other,
}

impl SegmentKind {
    /// Get a string representation of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exif => "exif",
            Self::Xmp => "xmp",
            Self::ImageData => "image_data",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One marker-delimited segment of a JPEG file
///
/// The segment owns a verbatim copy of its bytes as they appeared on disk:
/// the two marker bytes, the length field (absent for start-of-scan) and
/// the payload. Writing [`Segment::bytes`] back reproduces the original
/// segment exactly.
///
/// # Examples
///
/// ```
/// use exif_io::{Segment, SegmentKind};
///
/// let com = Segment::new(0xFFFE, 2, vec![0xFF, 0xFE, 0x00, 0x04, b'h', b'i']);
/// assert_eq!(com.label(), "COM");
/// assert_eq!(com.payload(), b"hi");
/// assert_eq!(com.kind(), SegmentKind::Other);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// 16-bit marker code (`0xFFxx`)
    pub marker: u16,

    /// Where the segment sat in the source buffer
    pub location: ByteRange,

    bytes: Vec<u8>,
}

impl Segment {
    /// Create a segment from its full on-disk bytes
    pub fn new(marker: u16, offset: u64, bytes: Vec<u8>) -> Self {
        Self {
            marker,
            location: ByteRange::new(offset, bytes.len() as u64),
            bytes,
        }
    }

    /// The verbatim bytes: marker, length field (if any) and payload
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the segment, returning its bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Bytes after the marker and, for length-prefixed segments, the length field
    pub fn payload(&self) -> &[u8] {
        let header = if self.has_length_field() { 4 } else { 2 };
        self.bytes.get(header..).unwrap_or(&[])
    }

    /// Total size on disk
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True when the segment holds no bytes at all
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Start-of-scan segments carry no usable length for their full span
    pub fn has_length_field(&self) -> bool {
        self.marker != SOS
    }

    /// Check if this is the start-of-scan segment
    pub fn is_scan(&self) -> bool {
        self.marker == SOS
    }

    /// Human-readable marker label
    pub fn label(&self) -> &'static str {
        marker_label(self.marker)
    }

    /// Classify the segment by marker and payload signature
    pub fn kind(&self) -> SegmentKind {
        match self.marker {
            SOS => SegmentKind::ImageData,
            APP1 if self.payload().starts_with(XMP_SIGNATURE) => SegmentKind::Xmp,
            APP1 => SegmentKind::Exif,
            _ => SegmentKind::Other,
        }
    }

    /// Check if this APP1 segment is a metadata segment candidate
    pub fn is_exif(&self) -> bool {
        self.kind() == SegmentKind::Exif
    }

    /// Check if this is an XMP segment
    pub fn is_xmp(&self) -> bool {
        self.kind() == SegmentKind::Xmp
    }
}
