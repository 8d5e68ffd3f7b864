//! Property tests for segment boundaries and round-trip fidelity

use exif_io::{
    test_utils::{sample_exif_payload, scan_header, JpegBuilder},
    Ifd, JpegIO, Metadata, Segment, Value,
};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

/// Entropy-coded bytes: plain bytes, stuffed 0xFF 0x00 pairs and restart markers
fn entropy() -> impl Strategy<Value = Vec<u8>> {
    let token = prop_oneof![
        4 => (0u8..0xFF).prop_map(|b| vec![b]),
        1 => Just(vec![0xFF, 0x00]),
        1 => (0xD0u8..=0xD7).prop_map(|code| vec![0xFF, code]),
    ];
    prop::collection::vec(token, 0..200).prop_map(|tokens| tokens.concat())
}

/// Ordinary length-prefixed segments that never carry EXIF
fn segment() -> impl Strategy<Value = (u16, Vec<u8>)> {
    let marker = prop::sample::select(vec![0xFFE0u16, 0xFFE2, 0xFFED, 0xFFDB, 0xFFC4, 0xFFC0, 0xFFFE]);
    (marker, prop::collection::vec(any::<u8>(), 0..300))
}

fn fail(err: exif_io::Error) -> TestCaseError {
    TestCaseError::fail(err.to_string())
}

proptest! {
    /// Stuffing and restart markers never end a scan
    #[test]
    fn scan_ends_only_at_a_real_marker(data in entropy()) {
        let jpeg = JpegBuilder::new()
            .scan(&scan_header(), &data)
            .segment(0xFFFE, b"after")
            .build();

        let structure = JpegIO::new().parse(&jpeg).map_err(fail)?;
        prop_assert_eq!(structure.segments.len(), 2);

        let scan = &structure.segments[0];
        prop_assert!(scan.is_scan());
        prop_assert_eq!(scan.len(), 4 + scan_header().len() + data.len());
        prop_assert_eq!(&scan.payload()[2 + scan_header().len()..], &data[..]);
        prop_assert_eq!(structure.segments[1].marker, 0xFFFE);
    }

    /// Re-encoded metadata leaves every other segment untouched and in order
    #[test]
    fn pass_through_segments_survive_save(
        before in prop::collection::vec(segment(), 0..5),
        after in prop::collection::vec(segment(), 0..5),
        data in entropy(),
        artist in "[A-Za-z0-9][A-Za-z0-9 ]{0,31}",
    ) {
        let mut builder = JpegBuilder::new();
        for (marker, payload) in &before {
            builder = builder.segment(*marker, payload);
        }
        builder = builder.exif(&sample_exif_payload());
        for (marker, payload) in &after {
            builder = builder.segment(*marker, payload);
        }
        let jpeg = builder.scan(&scan_header(), &data).build();

        let handler = JpegIO::new();
        let structure = handler.parse(&jpeg).map_err(fail)?;
        let segment = structure.metadata.as_ref().ok_or_else(|| TestCaseError::fail("no metadata"))?;

        let mut metadata = Metadata::open(segment.bytes()).map_err(fail)?;
        metadata.write_text("Artist", &artist).map_err(fail)?;
        let out = structure.reassemble(&metadata.encode().map_err(fail)?).map_err(fail)?;

        let reparsed = handler.parse(&out).map_err(fail)?;
        let original: Vec<&[u8]> = structure.segments.iter().map(Segment::bytes).collect();
        let saved: Vec<&[u8]> = reparsed.segments.iter().map(Segment::bytes).collect();
        prop_assert_eq!(original, saved);

        let reopened = Metadata::open(reparsed.metadata_payload().unwrap_or_default()).map_err(fail)?;
        prop_assert_eq!(reopened.read_text("Artist").map_err(fail)?, Some(artist.trim().to_string()));
        prop_assert_eq!(reopened.read_text("Make").map_err(fail)?, Some("Canon".to_string()));
    }

    /// Writing the same value twice stores it once
    #[test]
    fn set_field_is_idempotent(text in "[ -~]{0,64}") {
        let mut metadata = Metadata::empty();
        let value = Value::ascii(&text);
        metadata.set_field(Ifd::Ifd0, "Model", value.clone()).map_err(fail)?;
        metadata.set_field(Ifd::Ifd0, "Model", value.clone()).map_err(fail)?;

        prop_assert_eq!(metadata.get_field("Model").map_err(fail)?, Some(value));
        prop_assert_eq!(metadata.exif().entries(Ifd::Ifd0).count(), 1);
    }

    /// Arbitrary input is rejected with an error, never a panic
    #[test]
    fn parse_never_panics(data in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = JpegIO::new().parse(&data);
        let _ = exif_io::ExifData::decode(&data);
    }
}
