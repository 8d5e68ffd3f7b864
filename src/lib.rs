//! Lossless EXIF tag editing for JPEG files.
//!
//! This crate splits a JPEG file into its marker segments, hands the EXIF
//! APP1 segment to a metadata codec, and puts the file back together with
//! every other segment reproduced byte for byte.
//!
//! # Design Principles
//!
//! - **Verbatim pass-through**: only the EXIF segment is ever rewritten
//! - **Owned structure**: parsed segments are copies, never borrows of the input
//! - **Codec boundary**: the container never looks inside the metadata block
//! - **Absent is not an error**: a missing field reads as `None`
//!
//! # Quick Start
//!
//! The simplest way to use this library is with the [`Session`] API:
//!
//! ```no_run
//! use exif_io::Session;
//!
//! # fn main() -> exif_io::Result<()> {
//! let mut session = Session::open("image.jpg")?;
//!
//! // Read fields by name
//! if let Some(date) = session.metadata().read_text("DateTimeOriginal")? {
//!     println!("Taken: {}", date);
//! }
//!
//! // Edit and save in place (atomic replace)
//! session.metadata_mut().write_text("Copyright", "(c) 2024 Jane Doe")?;
//! session.save()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Container API
//!
//! For more control, parse and reassemble the segments directly:
//!
//! ```
//! use exif_io::{JpegIO, Metadata};
//!
//! # fn main() -> exif_io::Result<()> {
//! let data = [0xFF, 0xD8, 0xFF, 0xE1, 0x00, 0x08, b'E', b'x', b'i', b'f', 0, 0, 0xFF, 0xD9];
//!
//! let handler = JpegIO::new();
//! let structure = handler.parse(&data)?;
//! assert_eq!(structure.metadata_payload(), Some(&b"Exif\0\0"[..]));
//!
//! // Unchanged metadata bytes reproduce the input exactly
//! let out = structure.reassemble(structure.metadata_payload().unwrap())?;
//! assert_eq!(out, data);
//!
//! // Or decode, edit and encode a fresh block
//! let mut metadata = Metadata::empty();
//! metadata.write_text("Artist", "Jane Doe")?;
//! let edited = structure.reassemble(&metadata.encode()?)?;
//! assert!(edited.starts_with(&[0xFF, 0xD8, 0xFF, 0xE1]));
//! # Ok(())
//! # }
//! ```

mod codec;
mod error;
pub mod fields;
mod formats;
mod metadata;
mod options;
mod segment;
mod session;
mod structure;
pub mod tiff;

pub use codec::MetadataCodec;
pub use error::{Error, Result};
pub use fields::{Field, FieldKind};
pub use formats::{
    detect_from_extension, detect_from_mime, get_handler,
    jpeg_io::{JpegIO, MetadataHandle, Parsed},
};
pub use metadata::Metadata;
pub use options::{MetadataPolicy, Options, MAX_FILE_SIZE};
pub use segment::{
    marker_label, ByteRange, Segment, SegmentKind, APP1, EOI, EXIF_SIGNATURE, MAX_PAYLOAD_SIZE,
    SOI, SOS, XMP_SIGNATURE,
};
pub use session::{Editor, Session};
pub use structure::Structure;
pub use tiff::{Endian, ExifData, ExifInfo, Format, Ifd, TiffCodec, Value};

// Test utilities - only compiled for tests or when explicitly enabled
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
