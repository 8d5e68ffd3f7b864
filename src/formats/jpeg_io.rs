//! JPEG container I/O implementation

use crate::{
    codec::MetadataCodec,
    error::{Error, Result},
    segment::{Segment, APP1, EOI, MAX_PAYLOAD_SIZE, SOI, SOS},
    structure::Structure,
};
use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use log::debug;

// Markers without a length field
const TEM: u16 = 0xFF01;
const RST0: u16 = 0xFFD0;
const RST7: u16 = 0xFFD7;

// Second byte after 0xFF inside entropy-coded data
const STUFFING: u8 = 0x00;
const FILL: u8 = 0xFF;

/// True for the restart marker codes RST0..RST7 (0xD0..=0xD7)
fn is_restart(code: u8) -> bool {
    matches!(code, 0xD0..=0xD7)
}

/// Outcome of handing the metadata segment to a codec
#[derive(Debug)]
pub enum MetadataHandle<B> {
    /// The file carries no EXIF segment
    Absent,
    /// The codec decoded the EXIF segment
    Decoded(B),
    /// The codec rejected the EXIF segment; the rest of the container parsed fine
    Failed(Error),
}

impl<B> MetadataHandle<B> {
    /// Check if no metadata segment was present
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Get the decoded block, if any
    pub fn decoded(&self) -> Option<&B> {
        match self {
            Self::Decoded(block) => Some(block),
            _ => None,
        }
    }

    /// Convert into a result: `Ok(None)` when absent, the decode error when it failed
    pub fn into_result(self) -> Result<Option<B>> {
        match self {
            Self::Absent => Ok(None),
            Self::Decoded(block) => Ok(Some(block)),
            Self::Failed(err) => Err(err),
        }
    }
}

/// Container structure together with the decoded metadata handle
#[derive(Debug)]
pub struct Parsed<B> {
    /// Ordered pass-through segments and the raw metadata segment
    pub structure: Structure,
    /// Codec decode outcome for the metadata segment
    pub metadata: MetadataHandle<B>,
}

/// JPEG container I/O implementation
#[derive(Debug, Clone, Copy)]
pub struct JpegIO;

impl JpegIO {
    /// Create a new JPEG I/O implementation
    pub fn new() -> Self {
        Self
    }

    /// File extensions this handler accepts
    pub fn extensions() -> &'static [&'static str] {
        &["jpg", "jpeg", "jpe", "jfif"]
    }

    /// MIME types this handler accepts
    pub fn mime_types() -> &'static [&'static str] {
        &["image/jpeg", "image/jpg"]
    }

    /// Detect if this is a JPEG file from header
    pub fn detect(header: &[u8]) -> bool {
        // JPEG magic bytes: FF D8
        header.len() >= 2 && header[0] == 0xFF && header[1] == 0xD8
    }

    /// Walk the marker segments of `data`
    ///
    /// The first APP1 segment becomes the metadata segment, whatever its
    /// payload, unless it carries the XMP signature. Every other segment is
    /// kept verbatim, in order.
    /// Start-of-image is skipped and end-of-image stops the walk; bytes
    /// after end-of-image are counted but not kept.
    pub fn parse(&self, data: &[u8]) -> Result<Structure> {
        if data.is_empty() {
            return Err(Error::InvalidFormat("Empty buffer".into()));
        }

        let mut structure = Structure::new();
        let mut pos = 0usize;

        loop {
            let marker = read_u16(data, pos)?;

            if marker >> 8 != 0xFF {
                return Err(Error::InvalidSegment {
                    offset: pos as u64,
                    reason: format!("Expected 0xFF, got 0x{:02X}", data[pos]),
                });
            }

            // Fill bytes before a marker
            if marker == 0xFFFF {
                pos += 1;
                continue;
            }

            let start = pos;
            let end = match marker {
                SOI => {
                    pos += 2;
                    continue;
                }

                EOI => {
                    pos += 2;
                    structure.total_size = pos as u64;
                    structure.trailing_bytes = (data.len() - pos) as u64;
                    if structure.trailing_bytes > 0 {
                        debug!(
                            "ignoring {} trailing bytes after EOI",
                            structure.trailing_bytes
                        );
                    }
                    break;
                }

                SOS => find_scan_end(data, start)?,

                // Standalone markers carry no length
                TEM | RST0..=RST7 => start + 2,

                _ => {
                    let size = read_u16(data, start + 2)? as usize;
                    if size < 2 {
                        return Err(Error::InvalidSegment {
                            offset: start as u64,
                            reason: format!("Declared length {} is smaller than the length field", size),
                        });
                    }
                    let end = start + 2 + size;
                    if end > data.len() {
                        return Err(Error::TruncatedSegment {
                            offset: start as u64,
                            needed: (2 + size) as u64,
                            available: (data.len() - start) as u64,
                        });
                    }
                    end
                }
            };

            let segment = Segment::new(marker, start as u64, data[start..end].to_vec());
            debug!(
                "{} segment at {} ({} bytes, {})",
                segment.label(),
                start,
                segment.len(),
                segment.kind()
            );

            if structure.metadata.is_none() && segment.is_exif() {
                structure.metadata = Some(segment);
            } else {
                structure.segments.push(segment);
            }

            pos = end;
        }

        Ok(structure)
    }

    /// Parse `data` and hand the metadata segment to `codec`
    ///
    /// A codec rejection is reported through [`MetadataHandle::Failed`]
    /// rather than as an error, so the caller decides whether to continue
    /// without metadata. Container errors are still returned as `Err`.
    pub fn parse_with<C: MetadataCodec>(&self, data: &[u8], codec: &C) -> Result<Parsed<C::Block>> {
        let structure = self.parse(data)?;

        let metadata = match &structure.metadata {
            None => MetadataHandle::Absent,
            Some(segment) => match codec.decode(segment.bytes()) {
                Ok(block) => MetadataHandle::Decoded(block),
                Err(Error::MetadataDecodeFailed(reason)) => {
                    MetadataHandle::Failed(Error::MetadataDecodeFailed(reason))
                }
                Err(other) => MetadataHandle::Failed(Error::MetadataDecodeFailed(other.to_string())),
            },
        };

        Ok(Parsed {
            structure,
            metadata,
        })
    }

    /// Build a JPEG file from a metadata payload and pass-through segments
    ///
    /// Output order is always: start-of-image, the APP1 metadata segment,
    /// every segment of `segments` verbatim, end-of-image.
    pub fn reassemble(&self, metadata: &[u8], segments: &[Segment]) -> Result<Vec<u8>> {
        if metadata.is_empty() {
            return Err(Error::EmptyMetadata);
        }
        if metadata.len() > MAX_PAYLOAD_SIZE {
            return Err(Error::DataTooLarge {
                size: metadata.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let body: usize = segments.iter().map(Segment::len).sum();
        let mut writer = Vec::with_capacity(2 + 4 + metadata.len() + body + 2);

        writer.write_u16::<BigEndian>(SOI)?;

        writer.write_u16::<BigEndian>(APP1)?;
        writer.write_u16::<BigEndian>((metadata.len() + 2) as u16)?;
        writer.extend_from_slice(metadata);

        for segment in segments {
            writer.extend_from_slice(segment.bytes());
        }

        writer.write_u16::<BigEndian>(EOI)?;

        Ok(writer)
    }
}

impl Default for JpegIO {
    fn default() -> Self {
        Self::new()
    }
}

// Helper functions

/// Read a big-endian u16 at `pos`, reporting truncation instead of reading out of bounds
fn read_u16(data: &[u8], pos: usize) -> Result<u16> {
    match data.get(pos..pos + 2) {
        Some(bytes) => Ok(BigEndian::read_u16(bytes)),
        None => Err(Error::TruncatedSegment {
            offset: pos as u64,
            needed: 2,
            available: data.len().saturating_sub(pos) as u64,
        }),
    }
}

/// Find the end of the start-of-scan segment beginning at `start`
///
/// Skips the scan header (its declared length), then searches the
/// entropy-coded data for a 0xFF followed by a byte that is neither a
/// stuffing byte nor a restart marker. Fill bytes (0xFF 0xFF) stay in the
/// scan so the returned offset points at the 0xFF of the next marker.
fn find_scan_end(data: &[u8], start: usize) -> Result<usize> {
    let header = read_u16(data, start + 2)? as usize;
    if header < 2 {
        return Err(Error::InvalidSegment {
            offset: start as u64,
            reason: format!("Scan header length {} is smaller than the length field", header),
        });
    }
    let mut p = start + 2 + header;
    if p > data.len() {
        return Err(Error::TruncatedSegment {
            offset: start as u64,
            needed: (2 + header) as u64,
            available: (data.len() - start) as u64,
        });
    }

    loop {
        while p < data.len() && data[p] != 0xFF {
            p += 1;
        }
        if p + 1 >= data.len() {
            return Err(Error::UnterminatedScan {
                offset: start as u64,
            });
        }

        match data[p + 1] {
            STUFFING => p += 2,
            code if is_restart(code) => p += 2,
            FILL => p += 1,
            _ => return Ok(p),
        }
    }
}
