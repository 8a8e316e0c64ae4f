//! Module: codec
//! Responsibility: canonical string encoding of scalar field values and
//! splitting of oversized values into store-sized chunks.
//! Does not own: decoding into typed fields (hydration collaborators do).

mod chunk;

pub use chunk::{CHUNK_SUFFIX_LEN, reassemble_chunks, split_value};

use crate::{error::InternalError, value::Value};
use std::fmt::Write as _;

const SIGN_BIT: u64 = 1 << 63;

/// Encode one scalar value as its canonical attribute string.
///
/// Integers are fixed-width and offset so that lexicographic order matches
/// numeric order. `Null` encodes as the empty string (collection elements).
pub fn encode_scalar(value: &Value) -> Result<String, InternalError> {
    let encoded = match value {
        Value::Null => String::new(),
        Value::Bool(v) => v.to_string(),
        Value::Int(v) => encode_int(*v),
        Value::Uint(v) => encode_uint(*v),
        Value::Float(v) => v.to_string(),
        Value::Text(s) | Value::Enum(s) => s.clone(),
        Value::Blob(bytes) => encode_hex(bytes),
        Value::List(_) => {
            return Err(InternalError::encoding(
                "nested collections cannot be stored as attribute values",
            ));
        }
    };

    Ok(encoded)
}

/// Zero-padded unsigned encoding; also used for version tokens.
#[must_use]
pub fn encode_uint(v: u64) -> String {
    format!("{v:020}")
}

/// Signed encoding: flip the sign bit, then pad like an unsigned value.
#[must_use]
pub fn encode_int(v: i64) -> String {
    encode_uint(u64::from_ne_bytes(v.to_ne_bytes()) ^ SIGN_BIT)
}

/// Encode raw bytes as lowercase hex.
#[must_use]
pub fn encode_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}
