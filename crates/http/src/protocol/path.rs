//! Percent-decoding and segmentation of request paths.

use crate::ensure;
use crate::protocol::ParseError;

/// Percent-decodes a path, rejecting truncated or non-hex escapes and
/// escapes that decode to invalid UTF-8.
pub fn decode_path(raw: &str) -> Result<String, ParseError> {
    let bytes = raw.as_bytes();
    let mut index = 0;
    while let Some(offset) = bytes[index..].iter().position(|b| *b == b'%') {
        let start = index + offset;
        ensure!(
            bytes.len() > start + 2 && bytes[start + 1].is_ascii_hexdigit() && bytes[start + 2].is_ascii_hexdigit(),
            ParseError::invalid_uri(format!("malformed percent-encoding at offset {start}"))
        );
        index = start + 3;
    }

    urlencoding::decode(raw)
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| ParseError::invalid_uri(format!("path is not valid utf-8 once decoded: {e}")))
}

/// Splits a decoded path into its non-empty segments.
pub fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

/// Decodes `raw` and returns its segments.
pub fn decode_and_split(raw: &str) -> Result<Vec<String>, ParseError> {
    let decoded = decode_path(raw)?;
    Ok(split_path(&decoded).map(str::to_owned).collect())
}

/// Normalizes a decoded path so it always ends with `/`.
pub fn with_trailing_slash(path: &str) -> String {
    if path.ends_with('/') {
        path.to_owned()
    } else {
        let mut owned = String::with_capacity(path.len() + 1);
        owned.push_str(path);
        owned.push('/');
        owned
    }
}

/// The registration paths that could serve a request, longest first.
///
/// `["a", "b"]` yields `/a/b/`, `/a/` and finally `/`.
pub fn prefix_candidates(segments: &[String]) -> impl Iterator<Item = String> + '_ {
    (0..=segments.len()).rev().map(|len| {
        let mut candidate = String::from("/");
        for segment in &segments[..len] {
            candidate.push_str(segment);
            candidate.push('/');
        }
        candidate
    })
}
