//! Test utilities for building synthetic JPEG files.
//!
//! This module provides helpers for tests and fuzzers, including:
//! - [`JpegBuilder`] for assembling marker segments by hand
//! - A hand-laid-out big-endian EXIF block ([`sample_exif_payload`])
//! - Named fixtures built in memory, with a file-writing helper
//!
//! # Usage
//!
//! ```
//! use exif_io::test_utils::*;
//!
//! # fn example() -> exif_io::Result<()> {
//! // Use predefined fixture constants
//! let bytes = fixture_bytes(WITH_EXIF)?;
//! assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
//!
//! // Or assemble one segment at a time
//! let jpeg = JpegBuilder::new()
//!     .segment(0xFFFE, b"comment")
//!     .scan(&[0x01, 0x01, 0x00, 0x00, 0x3F, 0x00], &entropy_data())
//!     .build();
//! # Ok(())
//! # }
//! ```

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use crate::{Error, Result};

/// Builder for JPEG byte streams
///
/// `build` wraps the collected segments in start-of-image and end-of-image.
#[derive(Debug, Default, Clone)]
pub struct JpegBuilder {
    body: Vec<u8>,
}

impl JpegBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a length-prefixed segment
    pub fn segment(mut self, marker: u16, payload: &[u8]) -> Self {
        self.body.extend_from_slice(&marker.to_be_bytes());
        self.body
            .extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
        self.body.extend_from_slice(payload);
        self
    }

    /// Append an APP1 segment with the given payload
    pub fn exif(self, payload: &[u8]) -> Self {
        self.segment(0xFFE1, payload)
    }

    /// Append a start-of-scan segment: header (length-prefixed) then entropy data
    pub fn scan(mut self, header: &[u8], entropy: &[u8]) -> Self {
        self = self.segment(0xFFDA, header);
        self.body.extend_from_slice(entropy);
        self
    }

    /// Append raw bytes
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(bytes);
        self
    }

    /// Finish the file
    pub fn build(self) -> Vec<u8> {
        let mut out = vec![0xFF, 0xD8];
        out.extend_from_slice(&self.body);
        out.extend_from_slice(&[0xFF, 0xD9]);
        out
    }
}

/// JFIF APP0 payload
pub fn jfif_payload() -> Vec<u8> {
    b"JFIF\0\x01\x01\0\0\x01\0\x01\0\0".to_vec()
}

/// XMP APP1 payload
pub fn xmp_payload() -> Vec<u8> {
    let mut payload = b"http://ns.adobe.com/xap/1.0/\0".to_vec();
    payload.extend_from_slice(br#"<x:xmpmeta xmlns:x="adobe:ns:meta/"/>"#);
    payload
}

/// Single-component scan header
pub fn scan_header() -> Vec<u8> {
    vec![0x01, 0x01, 0x00, 0x00, 0x3F, 0x00]
}

/// Entropy-coded bytes containing stuffed 0xFF bytes and restart markers
pub fn entropy_data() -> Vec<u8> {
    vec![
        0x12, 0x34, 0xFF, 0x00, 0x56, 0xFF, 0xD0, 0x78, 0x9A, 0xFF, 0x00, 0xFF, 0xD7, 0xBC,
        0xFF, 0xD1, 0xDE,
    ]
}

/// A hand-laid-out big-endian EXIF APP1 payload
///
/// Contents: IFD0 with Make "Canon" and Orientation 1, an EXIF sub-IFD
/// with DateTimeOriginal "2017:01:02 03:04:05", and IFD1 pointing at a
/// 4-byte JPEG thumbnail.
pub fn sample_exif_payload() -> Vec<u8> {
    let mut t = Vec::new();
    let u16be = |t: &mut Vec<u8>, v: u16| t.extend_from_slice(&v.to_be_bytes());
    let u32be = |t: &mut Vec<u8>, v: u32| t.extend_from_slice(&v.to_be_bytes());
    let entry = |t: &mut Vec<u8>, tag: u16, format: u16, count: u32, value: u32| {
        t.extend_from_slice(&tag.to_be_bytes());
        t.extend_from_slice(&format.to_be_bytes());
        t.extend_from_slice(&count.to_be_bytes());
        t.extend_from_slice(&value.to_be_bytes());
    };

    // Header, IFD0 at 8
    t.extend_from_slice(b"MM");
    u16be(&mut t, 0x002A);
    u32be(&mut t, 8);

    // IFD0 at 8..50, Make data at 50..56
    u16be(&mut t, 3);
    entry(&mut t, 0x010F, 2, 6, 50);
    entry(&mut t, 0x0112, 3, 1, 0x0001_0000);
    entry(&mut t, 0x8769, 4, 1, 56);
    u32be(&mut t, 94);
    t.extend_from_slice(b"Canon\0");

    // EXIF IFD at 56..74, DateTimeOriginal data at 74..94
    u16be(&mut t, 1);
    entry(&mut t, 0x9003, 2, 20, 74);
    u32be(&mut t, 0);
    t.extend_from_slice(b"2017:01:02 03:04:05\0");

    // IFD1 at 94..124, thumbnail at 124..128
    u16be(&mut t, 2);
    entry(&mut t, 0x0201, 4, 1, 124);
    entry(&mut t, 0x0202, 4, 1, 4);
    u32be(&mut t, 0);
    t.extend_from_slice(&[0xFF, 0xD8, 0xFF, 0xD9]);

    debug_assert_eq!(t.len(), 128);

    let mut payload = b"Exif\0\0".to_vec();
    payload.extend_from_slice(&t);
    payload
}

/// Baseline-looking file with no EXIF segment
fn plain_jpeg() -> Vec<u8> {
    JpegBuilder::new()
        .segment(0xFFE0, &jfif_payload())
        .segment(0xFFDB, &[0x00; 65])
        .segment(0xFFC0, &[0x08, 0x00, 0x10, 0x00, 0x10, 0x01, 0x01, 0x11, 0x00])
        .segment(0xFFC4, &[0x00; 20])
        .scan(&scan_header(), &entropy_data())
        .build()
}

/// EXIF directly after start-of-image, XMP kept as a pass-through APP1
fn with_exif_jpeg() -> Vec<u8> {
    JpegBuilder::new()
        .exif(&sample_exif_payload())
        .exif(&xmp_payload())
        .segment(0xFFDB, &[0x00; 65])
        .segment(0xFFC0, &[0x08, 0x00, 0x10, 0x00, 0x10, 0x01, 0x01, 0x11, 0x00])
        .segment(0xFFC4, &[0x00; 20])
        .scan(&scan_header(), &entropy_data())
        .build()
}

/// EXIF after other segments; relocated on save
fn exif_late_jpeg() -> Vec<u8> {
    JpegBuilder::new()
        .segment(0xFFE0, &jfif_payload())
        .segment(0xFFFE, b"made by hand")
        .exif(&sample_exif_payload())
        .scan(&scan_header(), &entropy_data())
        .build()
}

/// Progressive-style file with two scans and a table between them
fn two_scans_jpeg() -> Vec<u8> {
    JpegBuilder::new()
        .exif(&sample_exif_payload())
        .segment(0xFFC2, &[0x08, 0x00, 0x10, 0x00, 0x10, 0x01, 0x01, 0x11, 0x00])
        .scan(&scan_header(), &entropy_data())
        .segment(0xFFC4, &[0x00; 20])
        .scan(&scan_header(), &[0x01, 0xFF, 0x00, 0x02])
        .build()
}

/// EXIF segment whose TIFF header is corrupt
fn bad_exif_jpeg() -> Vec<u8> {
    JpegBuilder::new()
        .exif(b"Exif\0\0ZZ\0\x2a\0\0\0\x08")
        .scan(&scan_header(), &entropy_data())
        .build()
}

/// Macro to define named in-memory fixtures
macro_rules! define_fixtures {
    ($($name:ident => ($file:expr, $builder:path)),* $(,)?) => {
        // Define constants for fixture names
        $(
            #[allow(dead_code)]
            pub const $name: &str = $file;
        )*

        static FIXTURES: LazyLock<HashMap<&'static str, fn() -> Vec<u8>>> =
            LazyLock::new(|| {
                let mut map: HashMap<&'static str, fn() -> Vec<u8>> = HashMap::new();
                $(
                    map.insert($file, $builder as fn() -> Vec<u8>);
                )*
                map
            });

        /// List all defined fixtures
        pub fn list_fixtures() -> Vec<&'static str> {
            vec![$($file),*]
        }
    };
}

define_fixtures!(
    PLAIN => ("plain.jpg", plain_jpeg),
    WITH_EXIF => ("with_exif.jpg", with_exif_jpeg),
    EXIF_LATE => ("exif_late.jpg", exif_late_jpeg),
    TWO_SCANS => ("two_scans.jpg", two_scans_jpeg),
    BAD_EXIF => ("bad_exif.jpg", bad_exif_jpeg),
);

/// Helper to get fixture data as bytes
pub fn fixture_bytes(name: &str) -> Result<Vec<u8>> {
    FIXTURES
        .get(name)
        .map(|build| build())
        .ok_or_else(|| Error::InvalidFormat(format!("Unknown fixture {}", name)))
}

/// Write a fixture into `dir` and return its path
pub fn write_fixture(dir: &Path, name: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, fixture_bytes(name)?)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_constants() {
        assert_eq!(WITH_EXIF, "with_exif.jpg");
        assert_eq!(PLAIN, "plain.jpg");
    }

    #[test]
    fn test_list_fixtures() {
        let fixtures = list_fixtures();
        assert_eq!(fixtures.len(), 5);
        for name in fixtures {
            let bytes = fixture_bytes(name).unwrap();
            assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
            assert_eq!(&bytes[bytes.len() - 2..], &[0xFF, 0xD9]);
        }
    }

    #[test]
    fn test_unknown_fixture() {
        assert!(fixture_bytes("missing.jpg").is_err());
    }

    #[test]
    fn test_builder_length_fields() {
        let jpeg = JpegBuilder::new().segment(0xFFFE, b"abc").build();
        assert_eq!(jpeg, vec![0xFF, 0xD8, 0xFF, 0xFE, 0x00, 0x05, b'a', b'b', b'c', 0xFF, 0xD9]);
    }
}
