//! Frame round trips through every bundled compression, plus the failure
//! modes a reader must catch before handing bytes to the decoder.
use std::sync::Arc;

use graphser_codecs::{
    compression_by_id, compression_by_name, default_registry, Deflate, Lz4, PassThrough,
    PropertyBag, Zstd,
};
use graphser_core::frame::{Compression, FORMAT_VERSION, HEADER_SIZE};
use graphser_core::{from_bytes, to_bytes, Error, Frame};

// ── helpers ───────────────────────────────────────────────────────────────

fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("graphser_test_{}.bin", name))
}

fn sample_stream() -> Vec<u8> {
    let registry = default_registry().unwrap();
    let bag: PropertyBag = (0..200)
        .map(|i| (format!("org.example.key{i}"), format!("value-{}", i % 7)))
        .collect();
    to_bytes(&registry, &Arc::new(bag)).unwrap()
}

fn roundtrip(compression: &dyn Compression, name: &str) {
    let raw = sample_stream();
    let path = temp_path(name);

    let header = Frame::write_file(&path, &raw, compression).unwrap();
    assert_eq!(header.compression_id, compression.id());
    assert_eq!(header.raw_len, raw.len() as u64);

    let frame = Frame::read_file(&path).unwrap();
    assert_eq!(frame.header, header);
    let reader_side = compression_by_id(frame.header.compression_id).unwrap();
    let restored = frame.open(reader_side.as_ref()).unwrap();
    assert_eq!(restored, raw, "{name} round-trip should be byte-exact");

    let registry = default_registry().unwrap();
    let bag: Arc<PropertyBag> = from_bytes(&registry, &restored).unwrap();
    assert_eq!(bag.find("org.example.key13"), Some("value-6"));
}

// ── tests ──────────────────────────────────────────────────────────────────

#[test]
fn test_roundtrip_passthrough() {
    roundtrip(&PassThrough, "none");
}

#[test]
fn test_roundtrip_zstd() {
    roundtrip(&Zstd::default(), "zstd");
}

#[test]
fn test_roundtrip_lz4() {
    roundtrip(&Lz4, "lz4");
}

#[test]
fn test_roundtrip_deflate() {
    roundtrip(&Deflate::default(), "deflate");
}

#[test]
fn test_repetitive_stream_compresses() {
    let raw = sample_stream();
    let frame = Frame::seal(&raw, &Zstd::default()).unwrap();
    assert!(
        frame.header.payload_len < frame.header.raw_len,
        "zstd should shrink repetitive keys: stored={} raw={}",
        frame.header.payload_len,
        frame.header.raw_len
    );
}

#[test]
fn test_checksum_mismatch_detected() {
    let raw = sample_stream();
    let mut bytes = Vec::new();
    Frame::seal(&raw, &Lz4).unwrap().write_to(&mut bytes).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;

    let err = Frame::read_from(bytes.as_slice()).unwrap_err();
    assert!(matches!(err, Error::ChecksumMismatch { .. }), "got {err:?}");
    assert!(err.is_corruption());
}

#[test]
fn test_compression_mismatch_error() {
    let raw = sample_stream();
    let frame = Frame::seal(&raw, &Zstd::default()).unwrap();
    let err = frame.open(&Lz4).unwrap_err();
    assert!(
        err.to_string().contains("compression mismatch"),
        "error message should mention compression mismatch, got: {err}"
    );
}

#[test]
fn test_bad_magic_and_version() {
    let raw = sample_stream();
    let mut bytes = Vec::new();
    Frame::seal(&raw, &PassThrough).unwrap().write_to(&mut bytes).unwrap();

    let mut bad_magic = bytes.clone();
    bad_magic[0] = b'X';
    assert!(matches!(Frame::read_from(bad_magic.as_slice()), Err(Error::BadHeader(_))));

    let mut bad_version = bytes.clone();
    bad_version[8..10].copy_from_slice(&(FORMAT_VERSION + 1).to_le_bytes());
    assert!(matches!(
        Frame::read_from(bad_version.as_slice()),
        Err(Error::UnsupportedVersion(v)) if v == FORMAT_VERSION + 1
    ));

    assert!(matches!(Frame::read_from(&bytes[..HEADER_SIZE - 1]), Err(Error::BadHeader(_))));
}

#[test]
fn test_truncated_payload() {
    let raw = sample_stream();
    let mut bytes = Vec::new();
    Frame::seal(&raw, &PassThrough).unwrap().write_to(&mut bytes).unwrap();
    bytes.truncate(bytes.len() - 10);

    let err = Frame::read_from(bytes.as_slice()).unwrap_err();
    assert!(matches!(err, Error::Truncated { .. }), "got {err:?}");
}

#[test]
fn test_decompress_rejects_output_past_header_length() {
    let raw = sample_stream();
    let compressions: [&dyn Compression; 4] = [&PassThrough, &Zstd::default(), &Lz4, &Deflate::default()];
    for compression in compressions {
        let stored = compression.compress(&raw).unwrap();
        assert_eq!(compression.decompress(&stored, raw.len()).unwrap(), raw);

        let err = compression.decompress(&stored, raw.len() - 1).unwrap_err();
        assert!(
            matches!(err, Error::Decompress(_)),
            "{} should refuse to grow past raw_len, got {err:?}",
            compression.name()
        );
    }
}

#[test]
fn test_compression_lookup() {
    assert_eq!(compression_by_name("zstd", 5).unwrap().name(), "zstd");
    assert_eq!(compression_by_name("lz4", 0).unwrap().id(), Lz4.id());
    assert_eq!(compression_by_name("deflate", 30).unwrap().name(), "deflate");
    assert!(compression_by_name("brotli", 0).is_err());
    assert!(compression_by_id(42).is_err());
    for id in 0..4 {
        assert_eq!(compression_by_id(id).unwrap().id(), id);
    }
}
