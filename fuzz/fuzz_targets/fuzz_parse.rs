#![no_main]

use exif_io::{ExifData, JpegIO, TiffCodec};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Container parse and codec decode must never panic, only return errors
    let handler = JpegIO::new();

    if let Ok(parsed) = handler.parse_with(data, &TiffCodec) {
        let structure = parsed.structure;
        let _ = structure.scans().count();

        if let Ok(Some(exif)) = parsed.metadata.into_result() {
            let _ = exif.info().to_string();
            let _ = exif.thumbnail();
        }
    }

    // Feed the raw bytes to the TIFF decoder as well
    let _ = ExifData::decode(data);
});
