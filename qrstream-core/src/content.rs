//! Content stream: the header and payload that get sliced into frames
//!
//! Layout, every field VLQ-encoded:
//! 1. Version (`1`)
//! 2. Hash: FNV-1a of the decoded path followed by the payload, in decimal
//! 3. Path, percent-encoded
//! 4. Payload (opaque; the CLI sends a base64 data URL)

use crate::constants::{CONTENT_VERSION, FNV_OFFSET_BASIS, FNV_PRIME};
use crate::error::FrameError;
use crate::vlq;
use bytes::{Bytes, BytesMut};
use percent_encoding::{percent_decode, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Bytes escaped in the path field: everything except `A-Z a-z 0-9 - _ . ! ~ * ' ( )`
const PATH_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Incremental 32-bit FNV-1a hasher
#[derive(Debug, Clone, Copy)]
pub struct Fnv1a {
    state: u32,
}

impl Fnv1a {
    /// Start from the standard offset basis
    pub const fn new() -> Self {
        Self::with_seed(FNV_OFFSET_BASIS)
    }

    /// Continue from a previous hash value
    pub const fn with_seed(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Feed bytes into the hash
    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        for &b in data {
            self.state ^= u32::from(b);
            self.state = self.state.wrapping_mul(FNV_PRIME);
        }
        self
    }

    /// Current hash value
    pub const fn finish(&self) -> u32 {
        self.state
    }
}

impl Default for Fnv1a {
    fn default() -> Self {
        Self::new()
    }
}

/// FNV-1a hash of a byte slice
pub fn fnv1a_32(data: &[u8]) -> u32 {
    Fnv1a::new().update(data).finish()
}

/// Hash carried in the content header for a given path and payload
///
/// The path is hashed as its UTF-8 bytes, so non-ASCII paths hash differently
/// from senders that hash UTF-16 code units.
pub fn content_hash(path: &str, payload: &[u8]) -> u32 {
    Fnv1a::new().update(path.as_bytes()).update(payload).finish()
}

/// Metadata decoded from the start of a content stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentHeader {
    /// Content version
    pub version: u64,

    /// Hash announced by the sender
    pub hash: u32,

    /// Decoded path
    pub path: String,

    /// Offset of the payload field (its length prefix) in the content stream
    pub payload_field: usize,

    /// Offset of the payload value in the content stream
    pub payload_offset: usize,

    /// Length of the payload value
    pub payload_len: usize,
}

impl ContentHeader {
    /// Total length of the content stream described by this header
    pub fn content_len(&self) -> usize {
        self.payload_offset + self.payload_len
    }
}

/// A fully decoded and verified content stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedContent {
    /// Header fields
    pub header: ContentHeader,

    /// The payload
    pub payload: Bytes,
}

/// Build the content stream for a path and payload
pub fn encode_content(path: &str, payload: &[u8]) -> Result<Bytes, FrameError> {
    let encoded_path = utf8_percent_encode(path, PATH_ESCAPE).to_string();
    let hash = content_hash(path, payload);

    let mut buf = BytesMut::with_capacity(payload.len() + encoded_path.len() + 32);
    vlq::put_uint(&mut buf, CONTENT_VERSION)?;
    vlq::put_uint(&mut buf, u64::from(hash))?;
    vlq::put_bytes(&mut buf, encoded_path.as_bytes())?;
    vlq::put_bytes(&mut buf, payload)?;

    Ok(buf.freeze())
}

/// Decode the header of a (possibly partial) content stream
///
/// Only the length prefix of the payload has to be present. A
/// [`FrameError::TruncatedValue`] means more of the stream is needed.
pub fn decode_header(stream: &[u8]) -> Result<ContentHeader, FrameError> {
    let (version, from) = vlq::decode_uint(stream, 0)?;
    if version != CONTENT_VERSION {
        return Err(FrameError::UnsupportedVersion(version));
    }

    let (hash, from) = vlq::decode_uint(stream, from)?;
    let hash = u32::try_from(hash)
        .map_err(|_| FrameError::InvalidStructure(format!("hash {} exceeds 32 bits", hash)))?;

    let path_field = vlq::decode(stream, from)?;
    let path = percent_decode(path_field.value)
        .decode_utf8()
        .map_err(|e| FrameError::InvalidStructure(format!("path is not UTF-8: {}", e)))?
        .into_owned();

    let (payload_len, payload_offset) = vlq::decode_length(stream, path_field.next)?;

    Ok(ContentHeader {
        version,
        hash,
        path,
        payload_field: path_field.next,
        payload_offset,
        payload_len,
    })
}

/// Decode a complete content stream and verify its hash
pub fn decode_content(stream: &[u8]) -> Result<DecodedContent, FrameError> {
    let header = decode_header(stream)?;
    let payload = vlq::decode(stream, header.payload_field)?;

    let actual = content_hash(&header.path, payload.value);
    if actual != header.hash {
        return Err(FrameError::IncorrectHash {
            expected: header.hash,
            actual,
        });
    }

    Ok(DecodedContent {
        payload: Bytes::copy_from_slice(payload.value),
        header,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_uses_utf8_path() {
        let mut joined = "café".as_bytes().to_vec();
        joined.extend_from_slice(b"data");
        assert_eq!(content_hash("café", b"data"), fnv1a_32(&joined));
        assert_eq!("café".len(), 5);
    }

    #[test]
    fn test_fnv1a_vectors() {
        assert_eq!(fnv1a_32(b""), 0x811c9dc5);
        assert_eq!(fnv1a_32(b"a"), 0xe40c292c);
        assert_eq!(fnv1a_32(b"foobar"), 0xbf9cf968);
    }

    #[test]
    fn test_content_hash_is_concatenation() {
        assert_eq!(content_hash("foo", b"bar"), fnv1a_32(b"foobar"));
    }

    #[test]
    fn test_encode_layout() {
        let stream = encode_content("a b.txt", b"xyz").unwrap();
        let hash = content_hash("a b.txt", b"xyz").to_string();

        let mut expected = Vec::new();
        expected.extend_from_slice(b"111");
        expected.extend_from_slice(format!("1{}{}", hash.len(), hash).as_bytes());
        expected.extend_from_slice(b"19a%20b.txt");
        expected.extend_from_slice(b"13xyz");
        assert_eq!(&stream[..], &expected[..]);
    }

    #[test]
    fn test_round_trip() {
        let stream = encode_content("dir/ünïcode.bin", b"data:;base64,AAAA").unwrap();
        let decoded = decode_content(&stream).unwrap();

        assert_eq!(decoded.header.version, CONTENT_VERSION);
        assert_eq!(decoded.header.path, "dir/ünïcode.bin");
        assert_eq!(&decoded.payload[..], b"data:;base64,AAAA");
        assert_eq!(decoded.header.content_len(), stream.len());
    }

    #[test]
    fn test_header_from_partial_stream() {
        let stream = encode_content("in.txt", &[b'x'; 500]).unwrap();
        let header = decode_header(&stream[..40]).unwrap();

        assert_eq!(header.path, "in.txt");
        assert_eq!(header.payload_len, 500);
        assert_eq!(header.content_len(), stream.len());
    }

    #[test]
    fn test_header_needs_more_data() {
        let stream = encode_content("in.txt", b"payload").unwrap();
        assert!(decode_header(&stream[..5]).unwrap_err().is_truncation());
    }

    #[test]
    fn test_unsupported_version() {
        let mut buf = BytesMut::new();
        vlq::put_uint(&mut buf, 2).unwrap();
        vlq::put_uint(&mut buf, 0).unwrap();
        vlq::put_bytes(&mut buf, b"x").unwrap();
        vlq::put_bytes(&mut buf, b"y").unwrap();

        assert_eq!(
            decode_content(&buf),
            Err(FrameError::UnsupportedVersion(2))
        );
    }

    #[test]
    fn test_incorrect_hash() {
        let stream = encode_content("in.txt", b"payload").unwrap();
        let mut corrupted = stream.to_vec();
        let last = corrupted.len() - 1;
        corrupted[last] ^= 0x01;

        assert!(matches!(
            decode_content(&corrupted),
            Err(FrameError::IncorrectHash { .. })
        ));
    }

    #[test]
    fn test_truncated_payload() {
        let stream = encode_content("in.txt", b"payload").unwrap();
        assert!(decode_content(&stream[..stream.len() - 1])
            .unwrap_err()
            .is_truncation());
    }
}
