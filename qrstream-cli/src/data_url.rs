//! Data URLs: how the CLI turns file bytes into a text payload and back

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::path::Path;

/// Media type guessed from the file extension
pub fn media_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("txt") | Some("md") => "text/plain",
        Some("json") => "application/json",
        Some("html") | Some("htm") => "text/html",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        _ => "application/octet-stream",
    }
}

/// Encode bytes as a base64 data URL
pub fn encode(media_type: &str, data: &[u8]) -> String {
    format!("data:{};base64,{}", media_type, STANDARD.encode(data))
}

/// Decode a data URL into its bytes
///
/// Payloads without a `data:` prefix are returned unchanged.
pub fn decode(payload: &[u8]) -> Result<Vec<u8>> {
    let Some(rest) = payload.strip_prefix(b"data:") else {
        return Ok(payload.to_vec());
    };

    let Some(comma) = rest.iter().position(|&b| b == b',') else {
        bail!("Data URL has no ',' separator");
    };
    let (params, data) = (&rest[..comma], &rest[comma + 1..]);

    if params.ends_with(b";base64") {
        STANDARD
            .decode(data)
            .context("Data URL carries invalid base64")
    } else {
        Ok(data.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let url = encode("text/plain", b"Test file");
        assert_eq!(url, "data:text/plain;base64,VGVzdCBmaWxl");
        assert_eq!(decode(url.as_bytes()).unwrap(), b"Test file");
    }

    #[test]
    fn test_plain_payloads() {
        assert_eq!(decode(b"data:text/plain,hello").unwrap(), b"hello");
        assert_eq!(decode(b"raw bytes").unwrap(), b"raw bytes");
        assert!(decode(b"data:text/plain;base64").is_err());
        assert!(decode(b"data:;base64,***").is_err());
    }

    #[test]
    fn test_media_type() {
        assert_eq!(media_type(Path::new("a/b.TXT")), "text/plain");
        assert_eq!(media_type(Path::new("photo.jpeg")), "image/jpeg");
        assert_eq!(media_type(Path::new("blob")), "application/octet-stream");
    }
}
