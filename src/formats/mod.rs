//! Container format handlers

pub mod jpeg_io;

use crate::error::{Error, Result};
use jpeg_io::JpegIO;

/// Detect the container from a file extension
pub fn detect_from_extension(ext: &str) -> Option<JpegIO> {
    let ext = ext.to_ascii_lowercase();
    JpegIO::extensions()
        .contains(&ext.as_str())
        .then(JpegIO::new)
}

/// Detect the container from a MIME type
pub fn detect_from_mime(mime: &str) -> Option<JpegIO> {
    JpegIO::mime_types().contains(&mime).then(JpegIO::new)
}

/// Select a handler for the given file header
pub fn get_handler(header: &[u8]) -> Result<JpegIO> {
    if JpegIO::detect(header) {
        Ok(JpegIO::new())
    } else {
        Err(Error::InvalidFormat("Not a JPEG file".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_from_extension() {
        assert!(detect_from_extension("JPG").is_some());
        assert!(detect_from_extension("jfif").is_some());
        assert!(detect_from_extension("png").is_none());
    }

    #[test]
    fn test_detect_from_mime() {
        assert!(detect_from_mime("image/jpeg").is_some());
        assert!(detect_from_mime("image/png").is_none());
    }

    #[test]
    fn test_get_handler() {
        assert!(get_handler(&[0xFF, 0xD8, 0xFF, 0xE0]).is_ok());
        assert!(matches!(
            get_handler(b"GIF89a"),
            Err(Error::InvalidFormat(_))
        ));
    }
}
