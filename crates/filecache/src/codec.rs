//! Payload encoding: CBOR, optionally gzipped
//!
//! Every payload starts with a one-byte format tag so entries written with
//! and without compression can share one directory, and files that were not
//! written by this crate are rejected instead of misread.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Tag of an uncompressed CBOR payload
pub const PLAIN_TAG: u8 = 0xc0;
/// Tag of a gzipped CBOR payload
pub const GZIP_TAG: u8 = 0xc1;

/// Codec failure; callers attach the key or path
#[derive(Debug, Error)]
#[error("{0}")]
pub struct CodecError(pub String);

/// Serialize `value`, gzipping the result when `compress` is set
pub fn encode<T: Serialize>(value: &T, compress: bool) -> Result<Vec<u8>, CodecError> {
    let mut body = Vec::new();
    ciborium::into_writer(value, &mut body).map_err(|e| CodecError(e.to_string()))?;

    if !compress {
        let mut out = Vec::with_capacity(body.len() + 1);
        out.push(PLAIN_TAG);
        out.extend_from_slice(&body);
        return Ok(out);
    }

    let mut out = Vec::with_capacity(body.len() / 2 + 1);
    out.push(GZIP_TAG);
    let mut encoder = GzEncoder::new(out, Compression::default());
    encoder
        .write_all(&body)
        .map_err(|e| CodecError(format!("compression failed: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| CodecError(format!("compression failed: {}", e)))
}

/// Reverse of [`encode`]
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    match bytes.split_first() {
        Some((&PLAIN_TAG, body)) => from_cbor(body),
        Some((&GZIP_TAG, body)) => {
            let mut cbor = Vec::new();
            GzDecoder::new(body)
                .read_to_end(&mut cbor)
                .map_err(|e| CodecError(format!("decompression failed: {}", e)))?;
            from_cbor(&cbor)
        }
        Some((tag, _)) => Err(CodecError(format!("unknown payload tag 0x{:02x}", tag))),
        None => Err(CodecError("empty payload".to_string())),
    }
}

fn from_cbor<T: DeserializeOwned>(body: &[u8]) -> Result<T, CodecError> {
    let mut reader = body;
    let value = ciborium::from_reader(&mut reader).map_err(|e| CodecError(e.to_string()))?;
    if !reader.is_empty() {
        return Err(CodecError(format!("{} trailing bytes", reader.len())));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::HashMap;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Report {
        title: String,
        rows: Vec<(u32, f64)>,
        tags: HashMap<String, bool>,
    }

    fn sample() -> Report {
        Report {
            title: "weekly".into(),
            rows: vec![(1, 0.5), (2, 1.25)],
            tags: HashMap::from([("draft".to_string(), false)]),
        }
    }

    #[test]
    fn test_compressed_payload_is_tagged() {
        let bytes = encode(&sample(), true).unwrap();
        assert_eq!(bytes[0], GZIP_TAG);
        let back: Report = decode(&bytes).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn test_plain_payload_is_tagged() {
        let bytes = encode(&sample(), false).unwrap();
        assert_eq!(bytes[0], PLAIN_TAG);
        let back: Report = decode(&bytes).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn test_non_finite_floats_round_trip() {
        for compress in [true, false] {
            let values = vec![f64::NAN, f64::INFINITY, f64::NEG_INFINITY, -0.0];
            let back: Vec<f64> = decode(&encode(&values, compress).unwrap()).unwrap();
            assert!(back[0].is_nan());
            assert_eq!(back[1], f64::INFINITY);
            assert_eq!(back[2], f64::NEG_INFINITY);
            assert!(back[3] == 0.0 && back[3].is_sign_negative());
        }
    }

    #[test]
    fn test_non_string_map_keys_round_trip() {
        let grid: HashMap<(u8, u8), String> =
            HashMap::from([((0, 1), "a".to_string()), ((255, 7), "b".to_string())]);
        let back: HashMap<(u8, u8), String> = decode(&encode(&grid, true).unwrap()).unwrap();
        assert_eq!(back, grid);
    }

    #[test]
    fn test_self_describing_values_round_trip() {
        let value = serde_json::json!({ "id": 3, "tags": ["x", null], "ratio": 0.25 });
        let back: serde_json::Value = decode(&encode(&value, false).unwrap()).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_truncated_gzip_fails() {
        let bytes = encode(&sample(), true).unwrap();
        let result: Result<Report, _> = decode(&bytes[..bytes.len() / 2]);
        assert!(result.is_err());
    }

    #[test]
    fn test_trailing_bytes_fail() {
        let mut bytes = encode(&7u32, false).unwrap();
        bytes.extend_from_slice(b"junk");
        assert!(decode::<u32>(&bytes).is_err());
    }

    #[test]
    fn test_foreign_bytes_fail() {
        assert!(decode::<Report>(b"a:1:{s:4:\"name\";}").is_err());
        assert!(decode::<u32>(b"").is_err());
        assert!(decode::<u32>(b"\x1f\x8bgarbage").is_err());
    }

    #[test]
    fn test_type_mismatch_fails() {
        let bytes = encode(&vec![1, 2, 3], true).unwrap();
        let result: Result<Report, _> = decode(&bytes);
        assert!(result.is_err());
    }
}
