//! Byte-exact `multipart/form-data` decoder.
//!
//! Uploaded receipts are arbitrary binary (JPEG, PNG, PDF), so the body is
//! never decoded as text. The decoder is a small state machine over the raw
//! buffer that searches for the `--<boundary>` delimiter byte-for-byte; only
//! the header block of each part is interpreted as (lossy) UTF-8.
//!
//! # Algorithm
//!
//! 1. **Preamble**: skip everything before the first delimiter.
//! 2. After each delimiter: a trailing `--` marks the close delimiter and
//!    ends the scan; otherwise one line break is skipped and a part begins.
//! 3. **Part**: the region up to the next delimiter is one part. Headers end
//!    at the first blank line (`\r\n\r\n`, or `\n\n` for LF-only clients);
//!    one trailing line break is stripped from the content.
//! 4. A region without a header terminator is dropped, and a region that is
//!    never closed by another delimiter is discarded.
//!
//! Decoding never fails: a missing boundary yields no parts and callers
//! fall back to [`attachment_or_body`].
//!
//! # Example
//!
//! ```rust
//! use wedexpense_core::multipart::{boundary_from_content_type, decode};
//!
//! let body = b"--xyz\r\nContent-Disposition: form-data; name=\"file\"; filename=\"a.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n\xff\xd8\r\n--xyz--\r\n";
//! let boundary = boundary_from_content_type("multipart/form-data; boundary=xyz").unwrap();
//! let parts = decode(body, &boundary);
//! assert_eq!(parts.len(), 1);
//! assert_eq!(parts[0].file_name.as_deref(), Some("a.jpg"));
//! assert_eq!(parts[0].content, b"\xff\xd8");
//! ```

use crate::models::{UploadedPart, DEFAULT_MEDIA_TYPE};

/// Extract the `boundary` parameter from a `multipart/*` content-type value.
///
/// Returns `None` for non-multipart media types and for empty boundaries.
/// Quoted boundaries (`boundary="a b"`) are unquoted.
pub fn boundary_from_content_type(content_type: &str) -> Option<String> {
    let mut params = content_type.split(';');
    let media_type = params.next()?.trim().to_ascii_lowercase();
    if !media_type.starts_with("multipart/") {
        return None;
    }
    params
        .filter_map(|p| p.split_once('='))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, v)| v.trim().trim_matches('"').to_string())
        .filter(|b| !b.is_empty())
}

/// Decode a multipart body into its parts, in order of appearance.
pub fn decode(body: &[u8], boundary: &str) -> Vec<UploadedPart> {
    if boundary.is_empty() {
        return Vec::new();
    }
    let delimiter = format!("--{}", boundary).into_bytes();
    let mut parts = Vec::new();
    let mut state = ScanState::Preamble;

    loop {
        state = match state {
            ScanState::Preamble => match find(body, &delimiter, 0) {
                Some(idx) => after_delimiter(body, idx + delimiter.len()),
                None => ScanState::Done,
            },
            ScanState::Part { start } => match find(body, &delimiter, start) {
                Some(idx) => {
                    if let Some(part) = parse_part(&body[start..idx]) {
                        parts.push(part);
                    }
                    after_delimiter(body, idx + delimiter.len())
                }
                None => ScanState::Done,
            },
            ScanState::Done => break,
        };
    }

    parts
}

/// The first part that carries a file attachment.
pub fn first_file_part(parts: &[UploadedPart]) -> Option<&UploadedPart> {
    parts.iter().find(|p| p.is_file())
}

/// Resolve the uploaded file from a request body.
///
/// Returns the first file part of a multipart body. When the body is not
/// multipart, the boundary is unusable, or no part declares a `filename`,
/// the entire body becomes one anonymous attachment whose media type is the
/// request's own content type (for raw uploads) or [`DEFAULT_MEDIA_TYPE`].
pub fn attachment_or_body(content_type: Option<&str>, body: &[u8]) -> UploadedPart {
    let boundary = content_type.and_then(boundary_from_content_type);
    if let Some(boundary) = boundary {
        let parts = decode(body, &boundary);
        if let Some(part) = first_file_part(&parts) {
            return part.clone();
        }
    }

    let media_type = content_type
        .map(|ct| ct.split(';').next().unwrap_or("").trim().to_string())
        .filter(|ct| !ct.is_empty() && !ct.to_ascii_lowercase().starts_with("multipart/"))
        .unwrap_or_else(|| DEFAULT_MEDIA_TYPE.to_string());

    UploadedPart {
        name: String::new(),
        file_name: None,
        media_type,
        content: body.to_vec(),
    }
}

#[derive(Debug, Clone, Copy)]
enum ScanState {
    Preamble,
    Part { start: usize },
    Done,
}

/// Classify what follows a delimiter: the close marker, or a new part
/// starting after the delimiter's line break.
fn after_delimiter(body: &[u8], pos: usize) -> ScanState {
    let rest = &body[pos..];
    if rest.starts_with(b"--") {
        return ScanState::Done;
    }
    ScanState::Part {
        start: pos + line_break_len(rest),
    }
}

fn line_break_len(bytes: &[u8]) -> usize {
    if bytes.starts_with(b"\r\n") {
        2
    } else if bytes.starts_with(b"\n") {
        1
    } else {
        0
    }
}

fn parse_part(region: &[u8]) -> Option<UploadedPart> {
    let (header_bytes, content) = split_headers(region)?;
    let headers = String::from_utf8_lossy(header_bytes);

    let mut name = String::new();
    let mut file_name = None;
    let mut media_type = None;

    for line in headers.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.eq_ignore_ascii_case("content-disposition") {
            if let Some(n) = disposition_param(value, "name") {
                name = n;
            }
            file_name = disposition_param(value, "filename").filter(|f| !f.is_empty());
        } else if key.eq_ignore_ascii_case("content-type") {
            let value = value.trim();
            if !value.is_empty() {
                media_type = Some(value.to_string());
            }
        }
    }

    Some(UploadedPart {
        name,
        file_name,
        media_type: media_type.unwrap_or_else(|| DEFAULT_MEDIA_TYPE.to_string()),
        content: strip_trailing_line_break(content).to_vec(),
    })
}

/// Split a part region at the blank line that ends its header block.
///
/// Whichever of `\r\n\r\n` and `\n\n` comes first is the separator; the
/// content after it may contain either sequence.
fn split_headers(region: &[u8]) -> Option<(&[u8], &[u8])> {
    let no_headers: &[u8] = &[];
    if let Some(rest) = region.strip_prefix(b"\r\n") {
        return Some((no_headers, rest));
    }
    if let Some(rest) = region.strip_prefix(b"\n") {
        return Some((no_headers, rest));
    }
    let crlf = find(region, b"\r\n\r\n", 0).map(|idx| (idx, 4));
    let lf = find(region, b"\n\n", 0).map(|idx| (idx, 2));
    let (idx, len) = match (crlf, lf) {
        (Some(crlf), Some(lf)) if lf.0 < crlf.0 => lf,
        (crlf, lf) => crlf.or(lf)?,
    };
    Some((&region[..idx], &region[idx + len..]))
}

fn strip_trailing_line_break(content: &[u8]) -> &[u8] {
    content
        .strip_suffix(b"\r\n")
        .or_else(|| content.strip_suffix(b"\n"))
        .unwrap_or(content)
}

/// Read one `key=value` parameter of a `Content-Disposition` header.
fn disposition_param(value: &str, key: &str) -> Option<String> {
    split_params(value)
        .into_iter()
        .filter_map(|p| p.split_once('='))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case(key))
        .map(|(_, v)| {
            let v = v.trim();
            v.strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
                .unwrap_or(v)
                .to_string()
        })
}

/// Split header parameters on `;`, ignoring separators inside quotes.
fn split_params(value: &str) -> Vec<&str> {
    let mut params = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    for (i, c) in value.char_indices() {
        match c {
            '"' => quoted = !quoted,
            ';' if !quoted => {
                params.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    params.push(&value[start..]);
    params
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from > haystack.len() || haystack.len() - from < needle.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}
