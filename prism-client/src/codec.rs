//! Newline-delimited bulk record codec
//!
//! One compact JSON document per line, UTF-8, `\n` separated, no trailing
//! separator on encode. Decoding accepts `\r\n` line endings and a single
//! trailing newline; any other malformed line fails the whole decode.

use crate::error::{ClientError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encode records, one per line, in input order
pub fn encode<T: Serialize>(records: &[T]) -> Result<String> {
    let mut out = String::new();
    for (index, record) in records.iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        let line = serde_json::to_string(record).map_err(|e| ClientError::MalformedRecord {
            line: index,
            message: e.to_string(),
        })?;
        out.push_str(&line);
    }
    Ok(out)
}

/// Decode every line of `text`. Line indices in errors are 0-based
pub fn decode<T: DeserializeOwned>(text: &str) -> Result<Vec<T>> {
    let body = text
        .strip_suffix('\n')
        .map(|rest| rest.strip_suffix('\r').unwrap_or(rest))
        .unwrap_or(text);

    if body.is_empty() {
        return Ok(Vec::new());
    }

    body.split('\n')
        .enumerate()
        .map(|(index, line)| {
            let line = line.strip_suffix('\r').unwrap_or(line);
            serde_json::from_str(line).map_err(|e| ClientError::MalformedRecord {
                line: index,
                message: e.to_string(),
            })
        })
        .collect()
}
