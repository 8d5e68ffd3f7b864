//! TIFF/EXIF codec
//!
//! Decodes the TIFF structure inside an EXIF APP1 payload into per-IFD
//! entry tables and encodes it back. Structural tags (sub-IFD pointers and
//! the IFD1 thumbnail location) are not stored as entries; they are
//! rebuilt on encode from the layout actually written.
//!
//! TIFF Structure:
//! - Header: byte order (II/MM), magic (0x002A), IFD offset
//! - IFD (Image File Directory): tag count, tags (12 bytes each), next IFD offset
//! - Tags: tag ID (2), type (2), count (4), value/offset (4)

use crate::{
    codec::MetadataCodec,
    error::{Error, Result},
    segment::{APP1, EXIF_SIGNATURE},
};
use log::{debug, warn};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// TIFF/EXIF tag IDs
pub mod tags {
    // IFD0 (main image) tags
    pub const IMAGE_WIDTH: u16 = 0x0100;
    pub const IMAGE_LENGTH: u16 = 0x0101;
    pub const IMAGE_DESCRIPTION: u16 = 0x010E;
    pub const MAKE: u16 = 0x010F;
    pub const MODEL: u16 = 0x0110;
    pub const ORIENTATION: u16 = 0x0112;
    pub const SOFTWARE: u16 = 0x0131;
    pub const DATE_TIME: u16 = 0x0132;
    pub const ARTIST: u16 = 0x013B;
    pub const COPYRIGHT: u16 = 0x8298;
    pub const EXIF_IFD_POINTER: u16 = 0x8769;
    pub const GPS_IFD_POINTER: u16 = 0x8825;

    // EXIF sub-IFD tags
    pub const EXPOSURE_TIME: u16 = 0x829A;
    pub const F_NUMBER: u16 = 0x829D;
    pub const ISO_SPEED: u16 = 0x8827;
    pub const DATE_TIME_ORIGINAL: u16 = 0x9003;
    pub const DATE_TIME_DIGITIZED: u16 = 0x9004;
    pub const SHUTTER_SPEED_VALUE: u16 = 0x9201;
    pub const APERTURE_VALUE: u16 = 0x9202;
    pub const FLASH: u16 = 0x9209;
    pub const FOCAL_LENGTH: u16 = 0x920A;
    pub const USER_COMMENT: u16 = 0x9286;
    pub const INTEROP_IFD_POINTER: u16 = 0xA005;

    // GPS tags
    pub const GPS_LATITUDE_REF: u16 = 0x0001;
    pub const GPS_LATITUDE: u16 = 0x0002;
    pub const GPS_LONGITUDE_REF: u16 = 0x0003;
    pub const GPS_LONGITUDE: u16 = 0x0004;
    pub const GPS_ALTITUDE: u16 = 0x0006;

    // IFD1 (thumbnail) tags
    pub const JPEG_INTERCHANGE_FORMAT: u16 = 0x0201;
    pub const JPEG_INTERCHANGE_FORMAT_LENGTH: u16 = 0x0202;
}

/// Maximum number of tags in an IFD (prevents DOS attacks)
const MAX_IFD_TAGS: u16 = 1000;

const TIFF_MAGIC: u16 = 0x002A;
const TIFF_HEADER_SIZE: usize = 8;

/// Image File Directory groups of an EXIF block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Ifd {
    /// Main image
    Ifd0,
    /// EXIF sub-IFD (camera settings, capture dates)
    Exif,
    /// GPS sub-IFD
    Gps,
    /// Interoperability sub-IFD
    Interoperability,
    /// Thumbnail image
    Ifd1,
}

impl Ifd {
    /// Every group, in encode order of appearance
    pub const ALL: [Ifd; 5] = [
        Ifd::Ifd0,
        Ifd::Exif,
        Ifd::Gps,
        Ifd::Interoperability,
        Ifd::Ifd1,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Get a string representation of this group
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ifd0 => "IFD0",
            Self::Exif => "EXIF",
            Self::Gps => "GPS",
            Self::Interoperability => "Interoperability",
            Self::Ifd1 => "IFD1",
        }
    }
}

impl fmt::Display for Ifd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Byte order of the TIFF data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    /// "II" (Intel)
    Little,
    /// "MM" (Motorola)
    #[default]
    Big,
}

impl Endian {
    fn read_u16(&self, data: &[u8]) -> u16 {
        match self {
            Endian::Little => u16::from_le_bytes([data[0], data[1]]),
            Endian::Big => u16::from_be_bytes([data[0], data[1]]),
        }
    }

    fn read_u32(&self, data: &[u8]) -> u32 {
        match self {
            Endian::Little => u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            Endian::Big => u32::from_be_bytes([data[0], data[1], data[2], data[3]]),
        }
    }

    fn read_u64(&self, data: &[u8]) -> u64 {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&data[..8]);
        match self {
            Endian::Little => u64::from_le_bytes(bytes),
            Endian::Big => u64::from_be_bytes(bytes),
        }
    }

    fn u16_bytes(&self, value: u16) -> [u8; 2] {
        match self {
            Endian::Little => value.to_le_bytes(),
            Endian::Big => value.to_be_bytes(),
        }
    }

    fn u32_bytes(&self, value: u32) -> [u8; 4] {
        match self {
            Endian::Little => value.to_le_bytes(),
            Endian::Big => value.to_be_bytes(),
        }
    }

    fn u64_bytes(&self, value: u64) -> [u8; 8] {
        match self {
            Endian::Little => value.to_le_bytes(),
            Endian::Big => value.to_be_bytes(),
        }
    }

    fn signature(&self) -> &'static [u8; 2] {
        match self {
            Endian::Little => b"II",
            Endian::Big => b"MM",
        }
    }
}

/// TIFF data types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Format {
    Byte = 1,
    Ascii = 2,
    Short = 3,
    Long = 4,
    Rational = 5,
    SByte = 6,
    Undefined = 7,
    SShort = 8,
    SLong = 9,
    SRational = 10,
    Float = 11,
    Double = 12,
}

impl Format {
    /// Map a TIFF type code to a format
    pub fn from_u16(code: u16) -> Option<Self> {
        Some(match code {
            1 => Self::Byte,
            2 => Self::Ascii,
            3 => Self::Short,
            4 => Self::Long,
            5 => Self::Rational,
            6 => Self::SByte,
            7 => Self::Undefined,
            8 => Self::SShort,
            9 => Self::SLong,
            10 => Self::SRational,
            11 => Self::Float,
            12 => Self::Double,
            _ => return None,
        })
    }

    /// Size of one component in bytes
    pub fn unit_size(&self) -> usize {
        match self {
            Self::Byte | Self::Ascii | Self::SByte | Self::Undefined => 1,
            Self::Short | Self::SShort => 2,
            Self::Long | Self::SLong | Self::Float => 4,
            Self::Rational | Self::SRational | Self::Double => 8,
        }
    }
}

/// A typed tag value, independent of the block's byte order
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Byte(Vec<u8>),
    /// Raw ASCII bytes, usually NUL-terminated
    Ascii(Vec<u8>),
    Short(Vec<u16>),
    Long(Vec<u32>),
    Rational(Vec<(u32, u32)>),
    SByte(Vec<i8>),
    Undefined(Vec<u8>),
    SShort(Vec<i16>),
    SLong(Vec<i32>),
    SRational(Vec<(i32, i32)>),
    Float(Vec<f32>),
    Double(Vec<f64>),
}

impl Value {
    /// NUL-terminated ASCII text
    pub fn ascii(text: &str) -> Self {
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);
        Self::Ascii(bytes)
    }

    /// Untyped bytes, the default encoding for raw writes
    pub fn undefined(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Undefined(bytes.into())
    }

    /// TIFF data type of this value
    pub fn format(&self) -> Format {
        match self {
            Self::Byte(_) => Format::Byte,
            Self::Ascii(_) => Format::Ascii,
            Self::Short(_) => Format::Short,
            Self::Long(_) => Format::Long,
            Self::Rational(_) => Format::Rational,
            Self::SByte(_) => Format::SByte,
            Self::Undefined(_) => Format::Undefined,
            Self::SShort(_) => Format::SShort,
            Self::SLong(_) => Format::SLong,
            Self::SRational(_) => Format::SRational,
            Self::Float(_) => Format::Float,
            Self::Double(_) => Format::Double,
        }
    }

    /// Number of components
    pub fn count(&self) -> usize {
        match self {
            Self::Byte(v) | Self::Ascii(v) | Self::Undefined(v) => v.len(),
            Self::Short(v) => v.len(),
            Self::Long(v) => v.len(),
            Self::Rational(v) => v.len(),
            Self::SByte(v) => v.len(),
            Self::SShort(v) => v.len(),
            Self::SLong(v) => v.len(),
            Self::SRational(v) => v.len(),
            Self::Float(v) => v.len(),
            Self::Double(v) => v.len(),
        }
    }

    /// ASCII value as a string, trimmed at the first NUL
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Ascii(bytes) => Some(ascii_text(bytes)),
            _ => None,
        }
    }

    /// First component of an unsigned integer value
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Self::Byte(v) => v.first().map(|&b| b as u32),
            Self::Short(v) => v.first().map(|&s| s as u32),
            Self::Long(v) => v.first().copied(),
            _ => None,
        }
    }

    /// First component of a rational value
    pub fn as_rational(&self) -> Option<(u32, u32)> {
        match self {
            Self::Rational(v) => v.first().copied(),
            _ => None,
        }
    }

    fn decode(format: Format, raw: &[u8], order: Endian) -> Self {
        match format {
            Format::Byte => Self::Byte(raw.to_vec()),
            Format::Ascii => Self::Ascii(raw.to_vec()),
            Format::Undefined => Self::Undefined(raw.to_vec()),
            Format::SByte => Self::SByte(raw.iter().map(|&b| b as i8).collect()),
            Format::Short => Self::Short(raw.chunks_exact(2).map(|c| order.read_u16(c)).collect()),
            Format::SShort => Self::SShort(
                raw.chunks_exact(2)
                    .map(|c| order.read_u16(c) as i16)
                    .collect(),
            ),
            Format::Long => Self::Long(raw.chunks_exact(4).map(|c| order.read_u32(c)).collect()),
            Format::SLong => Self::SLong(
                raw.chunks_exact(4)
                    .map(|c| order.read_u32(c) as i32)
                    .collect(),
            ),
            Format::Rational => Self::Rational(
                raw.chunks_exact(8)
                    .map(|c| (order.read_u32(&c[..4]), order.read_u32(&c[4..])))
                    .collect(),
            ),
            Format::SRational => Self::SRational(
                raw.chunks_exact(8)
                    .map(|c| (order.read_u32(&c[..4]) as i32, order.read_u32(&c[4..]) as i32))
                    .collect(),
            ),
            Format::Float => Self::Float(
                raw.chunks_exact(4)
                    .map(|c| f32::from_bits(order.read_u32(c)))
                    .collect(),
            ),
            Format::Double => Self::Double(
                raw.chunks_exact(8)
                    .map(|c| f64::from_bits(order.read_u64(c)))
                    .collect(),
            ),
        }
    }

    fn encode(&self, order: Endian) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.count() * self.format().unit_size());
        match self {
            Self::Byte(v) | Self::Ascii(v) | Self::Undefined(v) => out.extend_from_slice(v),
            Self::SByte(v) => out.extend(v.iter().map(|&b| b as u8)),
            Self::Short(v) => v.iter().for_each(|&s| out.extend(order.u16_bytes(s))),
            Self::SShort(v) => v.iter().for_each(|&s| out.extend(order.u16_bytes(s as u16))),
            Self::Long(v) => v.iter().for_each(|&l| out.extend(order.u32_bytes(l))),
            Self::SLong(v) => v.iter().for_each(|&l| out.extend(order.u32_bytes(l as u32))),
            Self::Rational(v) => v.iter().for_each(|&(n, d)| {
                out.extend(order.u32_bytes(n));
                out.extend(order.u32_bytes(d));
            }),
            Self::SRational(v) => v.iter().for_each(|&(n, d)| {
                out.extend(order.u32_bytes(n as u32));
                out.extend(order.u32_bytes(d as u32));
            }),
            Self::Float(v) => v.iter().for_each(|&x| out.extend(order.u32_bytes(x.to_bits()))),
            Self::Double(v) => v.iter().for_each(|&x| out.extend(order.u64_bytes(x.to_bits()))),
        }
        out
    }
}

fn ascii_text(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim_end().to_string()
}

fn printable_text(bytes: &[u8]) -> Option<&str> {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    std::str::from_utf8(&bytes[..end])
        .ok()
        .filter(|s| !s.chars().any(char::is_control))
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

fn write_ratios<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[(T, T)]) -> fmt::Result {
    for (i, (n, d)) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}/{}", n, d)?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascii(bytes) => write!(f, "{}", ascii_text(bytes)),
            Self::Byte(bytes) | Self::Undefined(bytes) => match printable_text(bytes) {
                Some(text) => write!(f, "{}", text),
                None => {
                    let hex: Vec<String> = bytes.iter().map(|b| format!("{:02X}", b)).collect();
                    write!(f, "{}", hex.join(" "))
                }
            },
            Self::Short(v) => write_list(f, v),
            Self::Long(v) => write_list(f, v),
            Self::SByte(v) => write_list(f, v),
            Self::SShort(v) => write_list(f, v),
            Self::SLong(v) => write_list(f, v),
            Self::Float(v) => write_list(f, v),
            Self::Double(v) => write_list(f, v),
            Self::Rational(v) => write_ratios(f, v),
            Self::SRational(v) => write_ratios(f, v),
        }
    }
}

/// Basic EXIF metadata summary
#[derive(Debug, Default)]
pub struct ExifInfo {
    /// Camera manufacturer (e.g., "Canon", "Nikon")
    pub make: Option<String>,
    /// Camera model (e.g., "EOS R5", "D850")
    pub model: Option<String>,
    /// Image orientation (1-8, where 1 is normal)
    pub orientation: Option<u16>,
    /// Software used to create/edit the image
    pub software: Option<String>,
    /// Date and time of image creation (format: "YYYY:MM:DD HH:MM:SS")
    pub date_time: Option<String>,
    /// Original capture date/time (from EXIF sub-IFD)
    pub date_time_original: Option<String>,
    /// Artist/photographer name
    pub artist: Option<String>,
    /// Copyright notice
    pub copyright: Option<String>,
}

impl fmt::Display for ExifInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(ref make) = self.make {
            parts.push(make.clone());
        }
        if let Some(ref model) = self.model {
            parts.push(model.clone());
        }
        if let Some(dt) = self.date_time_original.as_ref().or(self.date_time.as_ref()) {
            parts.push(dt.clone());
        }
        if parts.is_empty() {
            write!(f, "(no metadata)")
        } else {
            write!(f, "{}", parts.join(" | "))
        }
    }
}

/// Tags that encode layout rather than content
fn is_structural(ifd: Ifd, tag: u16) -> bool {
    matches!(
        (ifd, tag),
        (Ifd::Ifd0, tags::EXIF_IFD_POINTER | tags::GPS_IFD_POINTER)
            | (Ifd::Exif, tags::INTEROP_IFD_POINTER)
            | (
                Ifd::Ifd1,
                tags::JPEG_INTERCHANGE_FORMAT | tags::JPEG_INTERCHANGE_FORMAT_LENGTH
            )
    )
}

fn decode_error(reason: impl Into<String>) -> Error {
    Error::MetadataDecodeFailed(reason.into())
}

/// Decoded EXIF block
///
/// Entries are kept per IFD, unique by tag and ordered by tag id, which
/// is also the order TIFF requires on disk.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExifData {
    byte_order: Endian,
    ifds: [BTreeMap<u16, Value>; 5],
    thumbnail: Option<Vec<u8>>,
}

impl ExifData {
    /// Create an empty block (big-endian)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty block with the given byte order
    pub fn with_byte_order(byte_order: Endian) -> Self {
        Self {
            byte_order,
            ..Self::default()
        }
    }

    /// Byte order used on encode
    pub fn byte_order(&self) -> Endian {
        self.byte_order
    }

    /// Look up an entry
    pub fn get(&self, ifd: Ifd, tag: u16) -> Option<&Value> {
        self.ifds[ifd.index()].get(&tag)
    }

    /// Create or replace an entry, returning the previous value
    pub fn set(&mut self, ifd: Ifd, tag: u16, value: Value) -> Option<Value> {
        self.ifds[ifd.index()].insert(tag, value)
    }

    /// Remove an entry, returning its value
    pub fn remove(&mut self, ifd: Ifd, tag: u16) -> Option<Value> {
        self.ifds[ifd.index()].remove(&tag)
    }

    /// Entries of one IFD in tag order
    pub fn entries(&self, ifd: Ifd) -> impl Iterator<Item = (u16, &Value)> {
        self.ifds[ifd.index()].iter().map(|(&tag, value)| (tag, value))
    }

    /// True when no IFD holds entries and there is no thumbnail
    pub fn is_empty(&self) -> bool {
        self.ifds.iter().all(BTreeMap::is_empty) && self.thumbnail.is_none()
    }

    /// Raw bytes of the IFD1 JPEG thumbnail
    pub fn thumbnail(&self) -> Option<&[u8]> {
        self.thumbnail.as_deref()
    }

    /// Replace or drop the IFD1 thumbnail
    pub fn set_thumbnail(&mut self, thumbnail: Option<Vec<u8>>) {
        self.thumbnail = thumbnail;
    }

    /// Summary of the common descriptive tags
    pub fn info(&self) -> ExifInfo {
        let text = |ifd: Ifd, tag: u16| {
            self.get(ifd, tag)
                .and_then(Value::as_text)
                .filter(|s| !s.is_empty())
        };
        ExifInfo {
            make: text(Ifd::Ifd0, tags::MAKE),
            model: text(Ifd::Ifd0, tags::MODEL),
            orientation: self
                .get(Ifd::Ifd0, tags::ORIENTATION)
                .and_then(Value::as_u32)
                .map(|o| o as u16),
            software: text(Ifd::Ifd0, tags::SOFTWARE),
            date_time: text(Ifd::Ifd0, tags::DATE_TIME),
            date_time_original: text(Ifd::Exif, tags::DATE_TIME_ORIGINAL),
            artist: text(Ifd::Ifd0, tags::ARTIST),
            copyright: text(Ifd::Ifd0, tags::COPYRIGHT),
        }
    }

    /// Decode an EXIF block
    ///
    /// Accepts the full APP1 segment (marker and length included), the
    /// APP1 payload starting with `Exif\0\0`, or bare TIFF data. IFD0 must
    /// be readable; broken sub-IFDs, thumbnails and entries are dropped
    /// with a warning.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let tiff = tiff_body(bytes);

        if tiff.len() < TIFF_HEADER_SIZE {
            return Err(decode_error(format!(
                "TIFF header needs {} bytes, found {}",
                TIFF_HEADER_SIZE,
                tiff.len()
            )));
        }

        // Byte order: "II" (0x4949) = little endian, "MM" (0x4D4D) = big endian
        let byte_order = match &tiff[0..2] {
            b"II" => Endian::Little,
            b"MM" => Endian::Big,
            other => {
                return Err(decode_error(format!(
                    "Unknown byte order mark {:02X}{:02X}",
                    other[0], other[1]
                )))
            }
        };

        let magic = byte_order.read_u16(&tiff[2..4]);
        if magic != TIFF_MAGIC {
            return Err(decode_error(format!("Bad TIFF magic 0x{:04X}", magic)));
        }

        let mut reader = IfdReader::new(tiff, byte_order);
        let mut exif = ExifData::with_byte_order(byte_order);

        let ifd0 = reader.read(Ifd::Ifd0, byte_order.read_u32(&tiff[4..8]))?;
        exif.ifds[Ifd::Ifd0.index()] = ifd0.entries;

        if let Some(exif_ifd) = ifd0
            .links
            .get(&tags::EXIF_IFD_POINTER)
            .and_then(|&offset| reader.read_optional(Ifd::Exif, offset))
        {
            exif.ifds[Ifd::Exif.index()] = exif_ifd.entries;
            if let Some(interop) = exif_ifd
                .links
                .get(&tags::INTEROP_IFD_POINTER)
                .and_then(|&offset| reader.read_optional(Ifd::Interoperability, offset))
            {
                exif.ifds[Ifd::Interoperability.index()] = interop.entries;
            }
        }

        if let Some(gps) = ifd0
            .links
            .get(&tags::GPS_IFD_POINTER)
            .and_then(|&offset| reader.read_optional(Ifd::Gps, offset))
        {
            exif.ifds[Ifd::Gps.index()] = gps.entries;
        }

        if ifd0.next != 0 {
            if let Some(ifd1) = reader.read_optional(Ifd::Ifd1, ifd0.next) {
                exif.thumbnail = reader.thumbnail(&ifd1);
                exif.ifds[Ifd::Ifd1.index()] = ifd1.entries;
            }
        }

        Ok(exif)
    }

    /// Encode into an APP1 payload (`Exif\0\0` followed by TIFF data)
    ///
    /// Layout: header, IFD0, EXIF, Interoperability, GPS, IFD1, thumbnail.
    /// Each directory is written in tag order with its out-of-line values
    /// directly after it, word-aligned.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let has_interop = !self.ifds[Ifd::Interoperability.index()].is_empty();
        let has_exif = !self.ifds[Ifd::Exif.index()].is_empty() || has_interop;
        let has_gps = !self.ifds[Ifd::Gps.index()].is_empty();
        let has_ifd1 = !self.ifds[Ifd::Ifd1.index()].is_empty() || self.thumbnail.is_some();

        let mut writer = TiffWriter::new(self.byte_order);

        let mut ifd0 = self.content_entries(Ifd::Ifd0);
        if has_exif {
            ifd0.insert(tags::EXIF_IFD_POINTER, Value::Long(vec![0]));
        }
        if has_gps {
            ifd0.insert(tags::GPS_IFD_POINTER, Value::Long(vec![0]));
        }
        let ifd0_slots = writer.write_ifd(&ifd0)?;

        if has_exif {
            let mut exif = self.content_entries(Ifd::Exif);
            if has_interop {
                exif.insert(tags::INTEROP_IFD_POINTER, Value::Long(vec![0]));
            }
            let at = writer.next_offset()?;
            writer.patch_link(&ifd0_slots, tags::EXIF_IFD_POINTER, at);
            let exif_slots = writer.write_ifd(&exif)?;

            if has_interop {
                let at = writer.next_offset()?;
                writer.patch_link(&exif_slots, tags::INTEROP_IFD_POINTER, at);
                writer.write_ifd(&self.content_entries(Ifd::Interoperability))?;
            }
        }

        if has_gps {
            let at = writer.next_offset()?;
            writer.patch_link(&ifd0_slots, tags::GPS_IFD_POINTER, at);
            writer.write_ifd(&self.content_entries(Ifd::Gps))?;
        }

        if has_ifd1 {
            let mut ifd1 = self.content_entries(Ifd::Ifd1);
            if let Some(thumbnail) = &self.thumbnail {
                let size = u32::try_from(thumbnail.len())
                    .map_err(|_| Error::Encode("Thumbnail exceeds 4 GiB".into()))?;
                ifd1.insert(tags::JPEG_INTERCHANGE_FORMAT, Value::Long(vec![0]));
                ifd1.insert(tags::JPEG_INTERCHANGE_FORMAT_LENGTH, Value::Long(vec![size]));
            }
            let at = writer.next_offset()?;
            writer.patch(ifd0_slots.next, at);
            let ifd1_slots = writer.write_ifd(&ifd1)?;

            if let Some(thumbnail) = &self.thumbnail {
                let at = writer.next_offset()?;
                writer.patch_link(&ifd1_slots, tags::JPEG_INTERCHANGE_FORMAT, at);
                writer.buf.extend_from_slice(thumbnail);
            }
        }

        let mut payload = Vec::with_capacity(EXIF_SIGNATURE.len() + writer.buf.len());
        payload.extend_from_slice(EXIF_SIGNATURE);
        payload.extend_from_slice(&writer.buf);
        Ok(payload)
    }

    /// Entries of `ifd` without structural tags
    fn content_entries(&self, ifd: Ifd) -> BTreeMap<u16, Value> {
        self.ifds[ifd.index()]
            .iter()
            .filter(|(&tag, _)| !is_structural(ifd, tag))
            .map(|(&tag, value)| (tag, value.clone()))
            .collect()
    }
}

/// Strip the APP1 marker/length and the `Exif\0\0` signature, if present
fn tiff_body(bytes: &[u8]) -> &[u8] {
    let mut body = bytes;
    if body.len() >= 4 && u16::from_be_bytes([body[0], body[1]]) == APP1 {
        let declared = u16::from_be_bytes([body[2], body[3]]) as usize;
        let end = if declared >= 2 && 2 + declared <= body.len() {
            2 + declared
        } else {
            body.len()
        };
        body = &body[4..end];
    }
    body.strip_prefix(EXIF_SIGNATURE).unwrap_or(body)
}

/// One directory as read from disk
struct RawIfd {
    entries: BTreeMap<u16, Value>,
    /// Structural tag values (pointers, thumbnail location)
    links: BTreeMap<u16, u32>,
    next: u32,
}

struct IfdReader<'a> {
    data: &'a [u8],
    order: Endian,
    visited: HashSet<u32>,
}

impl<'a> IfdReader<'a> {
    fn new(data: &'a [u8], order: Endian) -> Self {
        Self {
            data,
            order,
            visited: HashSet::new(),
        }
    }

    /// Read a sub-directory, dropping it with a warning when it is unreadable
    fn read_optional(&mut self, ifd: Ifd, offset: u32) -> Option<RawIfd> {
        match self.read(ifd, offset) {
            Ok(raw) => Some(raw),
            Err(err) => {
                warn!("dropping {} IFD: {}", ifd, err);
                None
            }
        }
    }

    fn read(&mut self, ifd: Ifd, offset: u32) -> Result<RawIfd> {
        if !self.visited.insert(offset) {
            return Err(decode_error(format!("{} IFD at {} was already read", ifd, offset)));
        }

        let start = offset as usize;
        let count_bytes = self
            .data
            .get(start..start.saturating_add(2))
            .ok_or_else(|| decode_error(format!("{} IFD offset {} out of bounds", ifd, offset)))?;
        let count = self.order.read_u16(count_bytes);

        // Validate tag count to prevent DOS attacks
        if count > MAX_IFD_TAGS {
            return Err(decode_error(format!("{} IFD has {} tags", ifd, count)));
        }

        let table_end = start + 2 + count as usize * 12;
        let table = self
            .data
            .get(start + 2..table_end)
            .ok_or_else(|| decode_error(format!("{} IFD entries extend beyond data", ifd)))?;

        // A missing next-IFD offset ends the chain
        let next = self
            .data
            .get(table_end..table_end + 4)
            .map_or(0, |b| self.order.read_u32(b));

        let mut entries = BTreeMap::new();
        let mut links = BTreeMap::new();

        for raw in table.chunks_exact(12) {
            let tag = self.order.read_u16(&raw[0..2]);
            let type_code = self.order.read_u16(&raw[2..4]);
            let count = self.order.read_u32(&raw[4..8]);
            let value_field = &raw[8..12];

            if is_structural(ifd, tag) {
                let value = if type_code == Format::Short as u16 {
                    self.order.read_u16(value_field) as u32
                } else {
                    self.order.read_u32(value_field)
                };
                links.insert(tag, value);
                continue;
            }

            let Some(format) = Format::from_u16(type_code) else {
                debug!("{}: skipping tag 0x{:04X} with unknown type {}", ifd, tag, type_code);
                continue;
            };

            let Some(size) = (count as usize).checked_mul(format.unit_size()) else {
                warn!("{}: tag 0x{:04X} count {} overflows", ifd, tag, count);
                continue;
            };

            let raw_value = if size <= 4 {
                &value_field[..size]
            } else {
                let offset = self.order.read_u32(value_field) as usize;
                match offset
                    .checked_add(size)
                    .and_then(|end| self.data.get(offset..end))
                {
                    Some(bytes) => bytes,
                    None => {
                        warn!(
                            "{}: tag 0x{:04X} value ({} bytes at {}) out of bounds",
                            ifd, tag, size, offset
                        );
                        continue;
                    }
                }
            };

            entries.insert(tag, Value::decode(format, raw_value, self.order));
        }

        debug!("{} IFD at {}: {} entries", ifd, offset, entries.len());

        Ok(RawIfd {
            entries,
            links,
            next,
        })
    }

    /// Locate the JPEG thumbnail described by IFD1
    fn thumbnail(&self, ifd1: &RawIfd) -> Option<Vec<u8>> {
        let offset = *ifd1.links.get(&tags::JPEG_INTERCHANGE_FORMAT)? as usize;
        let size = *ifd1.links.get(&tags::JPEG_INTERCHANGE_FORMAT_LENGTH)? as usize;
        match offset
            .checked_add(size)
            .and_then(|end| self.data.get(offset..end))
        {
            Some(bytes) => Some(bytes.to_vec()),
            None => {
                warn!("dropping thumbnail: {} bytes at {} out of bounds", size, offset);
                None
            }
        }
    }
}

/// Value-field positions of one written directory
struct IfdSlots {
    links: BTreeMap<u16, usize>,
    next: usize,
}

struct TiffWriter {
    buf: Vec<u8>,
    order: Endian,
}

impl TiffWriter {
    fn new(order: Endian) -> Self {
        let mut buf = Vec::new();
        buf.extend_from_slice(order.signature());
        buf.extend(order.u16_bytes(TIFF_MAGIC));
        buf.extend(order.u32_bytes(TIFF_HEADER_SIZE as u32));
        Self { buf, order }
    }

    /// Align and return the offset the next directory will start at
    fn next_offset(&mut self) -> Result<u32> {
        if self.buf.len() % 2 == 1 {
            self.buf.push(0);
        }
        u32::try_from(self.buf.len()).map_err(|_| Error::Encode("TIFF data exceeds 4 GiB".into()))
    }

    fn patch(&mut self, at: usize, value: u32) {
        let bytes = self.order.u32_bytes(value);
        self.buf[at..at + 4].copy_from_slice(&bytes);
    }

    fn patch_link(&mut self, slots: &IfdSlots, tag: u16, value: u32) {
        if let Some(&at) = slots.links.get(&tag) {
            self.patch(at, value);
        }
    }

    fn write_ifd(&mut self, entries: &BTreeMap<u16, Value>) -> Result<IfdSlots> {
        let start = self.next_offset()? as usize;
        let count = u16::try_from(entries.len())
            .map_err(|_| Error::Encode(format!("{} entries in one IFD", entries.len())))?;
        let data_start = start + 2 + entries.len() * 12 + 4;

        let mut data = Vec::new();
        let mut links = BTreeMap::new();

        self.buf.extend(self.order.u16_bytes(count));
        for (&tag, value) in entries {
            let raw = value.encode(self.order);
            let components = u32::try_from(value.count())
                .map_err(|_| Error::Encode(format!("tag 0x{:04X} has too many components", tag)))?;

            self.buf.extend(self.order.u16_bytes(tag));
            self.buf.extend(self.order.u16_bytes(value.format() as u16));
            self.buf.extend(self.order.u32_bytes(components));
            links.insert(tag, self.buf.len());

            if raw.len() <= 4 {
                let mut field = [0u8; 4];
                field[..raw.len()].copy_from_slice(&raw);
                self.buf.extend_from_slice(&field);
            } else {
                let at = u32::try_from(data_start + data.len())
                    .map_err(|_| Error::Encode("TIFF data exceeds 4 GiB".into()))?;
                self.buf.extend(self.order.u32_bytes(at));
                data.extend_from_slice(&raw);
                if data.len() % 2 == 1 {
                    data.push(0);
                }
            }
        }

        let next = self.buf.len();
        self.buf.extend(self.order.u32_bytes(0));
        self.buf.extend_from_slice(&data);

        Ok(IfdSlots { links, next })
    }
}

/// The built-in [`MetadataCodec`] for TIFF-structured EXIF
#[derive(Debug, Clone, Copy, Default)]
pub struct TiffCodec;

impl MetadataCodec for TiffCodec {
    type Block = ExifData;

    fn empty(&self) -> ExifData {
        ExifData::new()
    }

    fn decode(&self, bytes: &[u8]) -> Result<ExifData> {
        ExifData::decode(bytes)
    }

    fn encode(&self, block: &ExifData) -> Result<Vec<u8>> {
        block.encode()
    }

    fn get(&self, block: &ExifData, ifd: Ifd, tag: u16) -> Option<Value> {
        block.get(ifd, tag).cloned()
    }

    fn set(&self, block: &mut ExifData, ifd: Ifd, tag: u16, value: Value) {
        block.set(ifd, tag, value);
    }

    fn remove(&self, block: &mut ExifData, ifd: Ifd, tag: u16) -> bool {
        block.remove(ifd, tag).is_some()
    }

    fn thumbnail<'a>(&self, block: &'a ExifData) -> Option<&'a [u8]> {
        block.thumbnail()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::sample_exif_payload;

    #[test]
    fn test_byte_order() {
        let be = Endian::Big;
        let le = Endian::Little;

        assert_eq!(be.read_u16(&[0x12, 0x34]), 0x1234);
        assert_eq!(le.read_u16(&[0x34, 0x12]), 0x1234);

        assert_eq!(be.read_u32(&[0x12, 0x34, 0x56, 0x78]), 0x12345678);
        assert_eq!(le.read_u32(&[0x78, 0x56, 0x34, 0x12]), 0x12345678);
    }

    #[test]
    fn test_decode_sample() {
        let exif = ExifData::decode(&sample_exif_payload()).unwrap();

        assert_eq!(exif.byte_order(), Endian::Big);
        assert_eq!(
            exif.get(Ifd::Ifd0, tags::MAKE).and_then(Value::as_text),
            Some("Canon".to_string())
        );
        assert_eq!(
            exif.get(Ifd::Ifd0, tags::ORIENTATION),
            Some(&Value::Short(vec![1]))
        );
        assert_eq!(
            exif.get(Ifd::Exif, tags::DATE_TIME_ORIGINAL)
                .and_then(Value::as_text),
            Some("2017:01:02 03:04:05".to_string())
        );
        assert_eq!(exif.thumbnail(), Some(&[0xFF, 0xD8, 0xFF, 0xD9][..]));

        // Structural tags are not exposed as entries
        assert!(exif.get(Ifd::Ifd0, tags::EXIF_IFD_POINTER).is_none());
        assert!(exif.get(Ifd::Ifd1, tags::JPEG_INTERCHANGE_FORMAT).is_none());
    }

    #[test]
    fn test_decode_accepts_segment_payload_and_bare_tiff() {
        let payload = sample_exif_payload();
        let mut segment = vec![0xFF, 0xE1];
        segment.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
        segment.extend_from_slice(&payload);

        let from_segment = ExifData::decode(&segment).unwrap();
        let from_payload = ExifData::decode(&payload).unwrap();
        let from_tiff = ExifData::decode(&payload[EXIF_SIGNATURE.len()..]).unwrap();

        assert_eq!(from_segment, from_payload);
        assert_eq!(from_payload, from_tiff);
    }

    #[test]
    fn test_encode_decode_preserves_block() {
        let exif = ExifData::decode(&sample_exif_payload()).unwrap();
        let encoded = exif.encode().unwrap();
        assert!(encoded.starts_with(EXIF_SIGNATURE));
        assert_eq!(ExifData::decode(&encoded).unwrap(), exif);
    }

    #[test]
    fn test_encode_is_deterministic() {
        let mut exif = ExifData::with_byte_order(Endian::Little);
        exif.set(Ifd::Ifd0, tags::ARTIST, Value::ascii("Someone"));
        exif.set(Ifd::Gps, tags::GPS_LATITUDE, Value::Rational(vec![(52, 1), (30, 1), (0, 1)]));
        assert_eq!(exif.encode().unwrap(), exif.encode().unwrap());
    }

    #[test]
    fn test_all_groups_survive_little_endian() {
        let mut exif = ExifData::with_byte_order(Endian::Little);
        exif.set(Ifd::Ifd0, tags::MAKE, Value::ascii("Nikon"));
        exif.set(Ifd::Exif, tags::SHUTTER_SPEED_VALUE, Value::SRational(vec![(-1, 3)]));
        exif.set(Ifd::Interoperability, 0x0001, Value::ascii("R98"));
        exif.set(Ifd::Gps, tags::GPS_ALTITUDE, Value::Rational(vec![(1234, 10)]));
        exif.set(Ifd::Ifd1, tags::ORIENTATION, Value::Short(vec![6]));
        exif.set(Ifd::Ifd0, 0xC000, Value::Double(vec![1.5]));
        exif.set(Ifd::Ifd0, 0xC001, Value::SByte(vec![-3, 4]));
        exif.set_thumbnail(Some(vec![0xFF, 0xD8, 0x00, 0xFF, 0xD9]));

        let decoded = ExifData::decode(&exif.encode().unwrap()).unwrap();
        assert_eq!(decoded, exif);
    }

    #[test]
    fn test_empty_block_encodes_header_and_ifd0() {
        let encoded = ExifData::new().encode().unwrap();
        // signature + header + empty IFD0 (count + next)
        assert_eq!(encoded.len(), 6 + 8 + 2 + 4);
        assert!(ExifData::decode(&encoded).unwrap().is_empty());
    }

    #[test]
    fn test_user_set_structural_tag_is_not_written() {
        let mut exif = ExifData::new();
        exif.set(Ifd::Ifd0, tags::GPS_IFD_POINTER, Value::Long(vec![0xDEAD]));
        let decoded = ExifData::decode(&exif.encode().unwrap()).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            ExifData::decode(b"Exif\0\0"),
            Err(Error::MetadataDecodeFailed(_))
        ));
        assert!(matches!(
            ExifData::decode(b"Exif\0\0XX\0\x2a\0\0\0\x08"),
            Err(Error::MetadataDecodeFailed(_))
        ));
        assert!(matches!(
            ExifData::decode(b"Exif\0\0MM\0\x2b\0\0\0\x08"),
            Err(Error::MetadataDecodeFailed(_))
        ));
        // IFD0 offset past end
        assert!(matches!(
            ExifData::decode(b"MM\0\x2a\0\0\x01\0"),
            Err(Error::MetadataDecodeFailed(_))
        ));
    }

    #[test]
    fn test_ifd_loop_is_dropped() {
        // IFD0 at 8 with zero entries whose next pointer loops back to itself
        let tiff = b"MM\0\x2a\0\0\0\x08\0\0\0\0\0\x08";
        let exif = ExifData::decode(tiff).unwrap();
        assert!(exif.is_empty());
    }

    #[test]
    fn test_out_of_bounds_value_is_skipped() {
        let mut tiff = b"MM\0\x2a\0\0\0\x08".to_vec();
        tiff.extend_from_slice(&[0, 1]); // one entry
        tiff.extend_from_slice(&[0x01, 0x0F, 0, 2, 0, 0, 0, 20, 0, 0, 0x10, 0]); // Make, 20 bytes at 4096
        tiff.extend_from_slice(&[0, 0, 0, 0]);
        let exif = ExifData::decode(&tiff).unwrap();
        assert!(exif.get(Ifd::Ifd0, tags::MAKE).is_none());
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::ascii("Canon").to_string(), "Canon");
        assert_eq!(Value::Short(vec![1, 2]).to_string(), "1, 2");
        assert_eq!(Value::Rational(vec![(28, 10)]).to_string(), "28/10");
        assert_eq!(Value::SRational(vec![(-1, 3)]).to_string(), "-1/3");
        assert_eq!(Value::undefined(b"hello".to_vec()).to_string(), "hello");
        assert_eq!(Value::undefined(vec![0x01, 0xAB]).to_string(), "01 AB");
    }

    #[test]
    fn test_info_summary() {
        let exif = ExifData::decode(&sample_exif_payload()).unwrap();
        let info = exif.info();
        assert_eq!(info.make.as_deref(), Some("Canon"));
        assert_eq!(info.orientation, Some(1));
        assert_eq!(info.to_string(), "Canon | 2017:01:02 03:04:05");
        assert_eq!(ExifInfo::default().to_string(), "(no metadata)");
    }
}
