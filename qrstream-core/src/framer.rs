//! Content framing: slicing the content stream into indexed frames
//!
//! Each content frame is two VLQ fields: the frame index in decimal and a
//! chunk of the content stream. Chunks partition the stream left to right.

use crate::constants::MAX_FRAMES;
use crate::content::{self, content_hash};
use crate::error::FrameError;
use crate::fec::FrameLookup;
use crate::vlq;
use bytes::{Bytes, BytesMut};

/// A decoded content frame borrowing its chunk from the raw frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentFrame<'a> {
    /// Zero-based position of the chunk in the content stream
    pub index: usize,

    /// The chunk
    pub chunk: &'a [u8],

    /// Number of bytes of the raw frame covered by the two fields
    pub encoded_len: usize,
}

/// Encode one content frame
pub fn encode_content_frame(index: usize, chunk: &[u8]) -> Result<Bytes, FrameError> {
    let mut buf = BytesMut::with_capacity(chunk.len() + 16);
    vlq::put_uint(&mut buf, index as u64)?;
    vlq::put_bytes(&mut buf, chunk)?;
    Ok(buf.freeze())
}

/// Decode a content frame
///
/// Bytes after the chunk field are ignored; `encoded_len` tells where the
/// frame really ends. Frames recovered by XOR carry zero padding there.
pub fn decode_content_frame(raw: &[u8]) -> Result<ContentFrame<'_>, FrameError> {
    let (index, from) = vlq::decode_uint(raw, 0)?;
    let index = usize::try_from(index)
        .ok()
        .filter(|&i| i < MAX_FRAMES)
        .ok_or_else(|| FrameError::InvalidStructure(format!("frame index {} out of range", index)))?;

    let chunk = vlq::decode(raw, from)?;

    Ok(ContentFrame {
        index,
        chunk: chunk.value,
        encoded_len: chunk.next,
    })
}

/// Number of frames needed for `content_len` bytes at `data_capacity` bytes per frame
pub fn number_of_frames(content_len: usize, data_capacity: usize) -> usize {
    content_len.div_ceil(data_capacity).max(1)
}

/// The sender's precomputed content frames
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSet {
    frames: Vec<Bytes>,
    content_len: usize,
    data_capacity: usize,
    hash: u32,
}

impl FrameSet {
    /// Slice an encoded content stream into frames of `data_capacity` bytes
    pub fn from_stream(stream: &[u8], data_capacity: usize) -> Result<Self, FrameError> {
        if data_capacity == 0 {
            return Err(FrameError::InvalidConfig(
                "data capacity must be at least 1".to_string(),
            ));
        }

        let count = number_of_frames(stream.len(), data_capacity);
        if count > MAX_FRAMES {
            return Err(FrameError::TooManyFrames(count, MAX_FRAMES));
        }

        let header = content::decode_header(stream)?;

        let frames = stream
            .chunks(data_capacity)
            .enumerate()
            .map(|(index, chunk)| encode_content_frame(index, chunk))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            frames,
            content_len: stream.len(),
            data_capacity,
            hash: header.hash,
        })
    }

    /// Encoded frames in index order
    pub fn frames(&self) -> &[Bytes] {
        &self.frames
    }

    /// Encoded frame at `index`
    pub fn get(&self, index: usize) -> Option<&Bytes> {
        self.frames.get(index)
    }

    /// Number of frames
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether there are no frames
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Length of the content stream
    pub fn content_len(&self) -> usize {
        self.content_len
    }

    /// Chunk capacity used for slicing
    pub fn data_capacity(&self) -> usize {
        self.data_capacity
    }

    /// Hash announced in the content header
    pub fn hash(&self) -> u32 {
        self.hash
    }

    /// Length of the longest encoded frame
    pub fn max_frame_len(&self) -> usize {
        self.frames.iter().map(Bytes::len).max().unwrap_or(0)
    }
}

impl FrameLookup for FrameSet {
    fn frame(&self, index: usize) -> Option<&[u8]> {
        self.frames.get(index).map(|f| f.as_ref())
    }
}

/// Builder for the frames of one file
pub struct ContentBuilder {
    path: String,
    payload: Bytes,
    data_capacity: usize,
}

impl ContentBuilder {
    /// Start a builder for the file at `path`
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            payload: Bytes::new(),
            data_capacity: 0,
        }
    }

    /// Set the payload
    pub fn payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Set how many content stream bytes go into one frame
    pub fn data_capacity(mut self, data_capacity: usize) -> Self {
        self.data_capacity = data_capacity;
        self
    }

    /// Hash the built content will carry
    pub fn hash(&self) -> u32 {
        content_hash(&self.path, &self.payload)
    }

    /// Encode the content stream without slicing it
    pub fn build_stream(&self) -> Result<Bytes, FrameError> {
        content::encode_content(&self.path, &self.payload)
    }

    /// Encode and slice into frames
    pub fn build(self) -> Result<FrameSet, FrameError> {
        let stream = self.build_stream()?;
        FrameSet::from_stream(&stream, self.data_capacity)
    }
}
