#![no_main]

use exif_io::{MetadataPolicy, Options, Session, TiffCodec};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Parse, edit and reassemble
    let options = Options::new().metadata_policy(MetadataPolicy::Discard);

    if let Ok(mut session) = Session::from_bytes_with(TiffCodec, data, options) {
        let _ = session.to_bytes();

        let metadata = session.metadata_mut();
        let _ = metadata.write_text("Artist", "fuzz");
        let _ = metadata.write_text("DateTimeOriginal", "2024:01:01 00:00:00");
        let _ = metadata.write_text("FNumber", "2.8");
        let _ = metadata.remove_field("Make");

        // A saved file must parse again
        if let Ok(out) = session.to_bytes() {
            assert!(Session::from_bytes(&out).is_ok());
        }
    }
});
