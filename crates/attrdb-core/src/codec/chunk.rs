use crate::error::InternalError;

/// Width of the decimal sequence counter appended to every chunk.
pub const CHUNK_SUFFIX_LEN: usize = 4;

const SUFFIX_MODULUS: usize = 10_000;

/// Split `value` into chunks when its UTF-8 length exceeds `max_bytes`.
///
/// Each chunk holds at most `chunk_bytes` bytes, never ends inside a
/// multi-byte sequence, and carries a zero-padded four-digit counter.
/// Values within the limit are returned unchanged and unsuffixed.
#[must_use]
pub fn split_value(value: &str, max_bytes: usize, chunk_bytes: usize) -> Vec<String> {
    if value.len() <= max_bytes {
        return vec![value.to_string()];
    }

    let len = value.len();
    let mut chunks = Vec::with_capacity(len.div_ceil(chunk_bytes.max(1)));
    let mut pos = 0;

    while pos < len {
        let mut end = (pos + chunk_bytes).min(len);

        // Continuation bytes (10xxxxxx) stay attached to their lead byte.
        while end > pos && !value.is_char_boundary(end) {
            end -= 1;
        }
        // A chunk smaller than one code point still has to make progress.
        if end == pos {
            end = pos + 1;
            while !value.is_char_boundary(end) {
                end += 1;
            }
        }

        let seq = chunks.len() % SUFFIX_MODULUS;
        chunks.push(format!("{}{seq:04}", &value[pos..end]));
        pos = end;
    }

    chunks
}

/// Reassemble chunked attribute values into the original string.
///
/// Values are ordered by their counter suffix; store order is irrelevant.
pub fn reassemble_chunks<S: AsRef<str>>(values: &[S]) -> Result<String, InternalError> {
    let mut parts = Vec::with_capacity(values.len());

    for value in values {
        let value = value.as_ref();
        let split = value
            .len()
            .checked_sub(CHUNK_SUFFIX_LEN)
            .filter(|at| value.is_char_boundary(*at))
            .ok_or_else(|| InternalError::encoding("chunk is shorter than its sequence suffix"))?;
        let (body, suffix) = value.split_at(split);
        let seq = suffix
            .parse::<u16>()
            .ok()
            .filter(|_| suffix.bytes().all(|b| b.is_ascii_digit()))
            .ok_or_else(|| {
                InternalError::encoding(format!("invalid chunk sequence suffix '{suffix}'"))
            })?;

        parts.push((seq, body));
    }

    parts.sort_by_key(|(seq, _)| *seq);

    Ok(parts.into_iter().map(|(_, body)| body).collect())
}
