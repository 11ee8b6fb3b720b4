//! Line-level HTTP/1.1 request codec.
//!
//! The socket layer hands the assembler one CRLF-terminated line per read
//! while headers are being read; these functions decode a single such line.

use url::Url;

use crate::http::request::Method;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("malformed request line")]
    InvalidRequest,
    #[error("unsupported request method")]
    InvalidMethod,
    #[error("malformed header line")]
    InvalidHeader,
    #[error("invalid request target")]
    InvalidUri,
    #[error("invalid chunk size line")]
    InvalidChunkSize,
    #[error("chunk data not terminated by CRLF")]
    InvalidChunk,
    #[error("request body exceeds the configured limit")]
    BodyTooLarge,
}

/// Decoded `METHOD target VERSION` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: Method,
    pub target: String,
    pub version: String,
}

/// Strips the trailing line ending and checks the line is UTF-8.
fn line_str(line: &[u8]) -> Option<&str> {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    std::str::from_utf8(line).ok()
}

/// True for an empty line, the end-of-headers marker.
pub fn is_blank_line(line: &[u8]) -> bool {
    matches!(line_str(line), Some(""))
}

pub fn decode_request_line(line: &[u8]) -> Result<RequestLine, ParseError> {
    let line = line_str(line).ok_or(ParseError::InvalidRequest)?;
    let mut parts = line.split_whitespace();

    let method_str = parts.next().ok_or(ParseError::InvalidRequest)?;
    let target = parts.next().ok_or(ParseError::InvalidRequest)?;
    let version = parts.next().ok_or(ParseError::InvalidRequest)?;

    if parts.next().is_some() || !version.starts_with("HTTP/") {
        return Err(ParseError::InvalidRequest);
    }

    let method = Method::from_str(method_str).ok_or(ParseError::InvalidMethod)?;

    Ok(RequestLine {
        method,
        target: target.to_string(),
        version: version.to_string(),
    })
}

pub fn decode_header(line: &[u8]) -> Result<(String, String), ParseError> {
    let line = line_str(line).ok_or(ParseError::InvalidHeader)?;

    let (key, value) = line.split_once(':').ok_or(ParseError::InvalidHeader)?;

    if key.is_empty() || key.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ParseError::InvalidHeader);
    }

    Ok((key.to_string(), value.trim().to_string()))
}

/// Decodes a chunk-size line (`1a;ext=1`), ignoring chunk extensions.
pub fn decode_chunk_size(line: &[u8]) -> Result<usize, ParseError> {
    let line = line_str(line).ok_or(ParseError::InvalidChunkSize)?;
    let size = line.split(';').next().unwrap_or_default().trim();

    if size.is_empty() {
        return Err(ParseError::InvalidChunkSize);
    }

    usize::from_str_radix(size, 16).map_err(|_| ParseError::InvalidChunkSize)
}

/// Normalizes a request target into `(path, query)`.
///
/// Dot segments are resolved and repeated slashes collapsed, so the path
/// can never climb above `/`.
pub fn normalize_uri(target: &str) -> Result<(String, Option<String>), ParseError> {
    let base = Url::parse("http://localhost/").map_err(|_| ParseError::InvalidUri)?;

    let joined = if target.starts_with('/') {
        let mut collapsed = String::with_capacity(target.len());
        for c in target.chars() {
            if c == '/' && collapsed.ends_with('/') {
                continue;
            }
            collapsed.push(c);
        }
        base.join(&collapsed)
    } else if target.starts_with("http://") || target.starts_with("https://") {
        Url::parse(target)
    } else {
        return Err(ParseError::InvalidUri);
    };
    let url = joined.map_err(|_| ParseError::InvalidUri)?;

    Ok((url.path().to_string(), url.query().map(str::to_string)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_request_line() {
        let line = decode_request_line(b"GET / HTTP/1.1\r\n").unwrap();

        assert_eq!(line.method, Method::GET);
        assert_eq!(line.target, "/");
        assert_eq!(line.version, "HTTP/1.1");
    }

    #[test]
    fn header_value_is_trimmed() {
        let (k, v) = decode_header(b"Host:   example.com \r\n").unwrap();
        assert_eq!(k, "Host");
        assert_eq!(v, "example.com");
    }

    #[test]
    fn dot_segments_cannot_escape_root() {
        let (path, _) = normalize_uri("/../../etc/passwd").unwrap();
        assert_eq!(path, "/etc/passwd");
    }

    #[test]
    fn chunk_extensions_are_ignored() {
        assert_eq!(decode_chunk_size(b"1A;name=value\r\n").unwrap(), 26);
    }
}
