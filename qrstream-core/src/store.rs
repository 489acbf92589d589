//! Receiver-side frame store

use crate::error::FrameError;
use crate::fec::FrameLookup;
use crate::framer::decode_content_frame;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt::Write as _;

#[cfg(feature = "logging")]
use tracing::{debug, warn};

/// Result of saving a content frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// First time this index was seen
    Decoded {
        /// Frame index
        index: usize,
    },

    /// The index was known with different content, which was overwritten
    Replaced {
        /// Frame index
        index: usize,
    },

    /// The index was known with identical content
    AlreadyKnown {
        /// Frame index
        index: usize,
    },
}

impl SaveOutcome {
    /// Index of the saved frame
    pub fn index(&self) -> usize {
        match *self {
            Self::Decoded { index } | Self::Replaced { index } | Self::AlreadyKnown { index } => {
                index
            }
        }
    }

    /// Whether the store changed
    pub fn is_new_data(&self) -> bool {
        !matches!(self, Self::AlreadyKnown { .. })
    }
}

/// Sparse map of received content frames, keyed by index
///
/// Entries hold the full encoded frame, trimmed to its decoded extent.
#[derive(Debug, Clone, Default)]
pub struct FrameStore {
    frames: BTreeMap<usize, Bytes>,
}

impl FrameStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode and store a raw content frame
    pub fn save_frame(&mut self, raw: &[u8]) -> Result<SaveOutcome, FrameError> {
        let frame = decode_content_frame(raw)?;
        let index = frame.index;
        let encoded = &raw[..frame.encoded_len];

        match self.frames.get(&index) {
            Some(existing) if existing.as_ref() == encoded => {
                return Ok(SaveOutcome::AlreadyKnown { index });
            }
            Some(_) => {
                #[cfg(feature = "logging")]
                warn!("Frame {} received again with different content, replacing it", index);

                self.frames.insert(index, Bytes::copy_from_slice(encoded));
                return Ok(SaveOutcome::Replaced { index });
            }
            None => {}
        }

        #[cfg(feature = "logging")]
        debug!("Stored frame {} ({} bytes of chunk)", index, frame.chunk.len());

        self.frames.insert(index, Bytes::copy_from_slice(encoded));
        Ok(SaveOutcome::Decoded { index })
    }

    /// Raw frame at `index`
    pub fn get(&self, index: usize) -> Option<&Bytes> {
        self.frames.get(&index)
    }

    /// Decoded chunk of the frame at `index`
    pub fn chunk(&self, index: usize) -> Option<Result<&[u8], FrameError>> {
        self.frames
            .get(&index)
            .map(|raw| decode_content_frame(raw).map(|f| f.chunk))
    }

    /// Whether `index` is known
    pub fn contains(&self, index: usize) -> bool {
        self.frames.contains_key(&index)
    }

    /// Number of distinct stored indices
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Highest stored index
    pub fn max_index(&self) -> Option<usize> {
        self.frames.keys().next_back().copied()
    }

    /// Indices in `0..=max_index` that are not stored
    pub fn missing_frames(&self) -> Vec<usize> {
        self.missing_below(self.max_index().map_or(0, |max| max + 1))
    }

    /// Indices in `0..end` that are not stored
    pub fn missing_below(&self, end: usize) -> Vec<usize> {
        (0..end).filter(|i| !self.frames.contains_key(i)).collect()
    }

    /// Number of stored indices below `end`
    pub fn count_below(&self, end: usize) -> usize {
        self.frames.range(..end).count()
    }

    /// Stored frames in index order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Bytes)> {
        self.frames.iter().map(|(&i, raw)| (i, raw))
    }

    /// Drop every frame
    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

impl FrameLookup for FrameStore {
    fn frame(&self, index: usize) -> Option<&[u8]> {
        self.frames.get(&index).map(|raw| raw.as_ref())
    }
}

/// Format sorted indices as runs: `[1, 2, 3, 5, 6]` becomes `"1+2, 5+1"`
///
/// `N` alone is a single index; `N+K` is the `K + 1` consecutive indices
/// starting at `N`.
pub fn compact_ranges(indices: &[usize]) -> String {
    let mut out = String::new();
    let mut iter = indices.iter().copied().peekable();

    while let Some(start) = iter.next() {
        let mut end = start;
        while iter.peek() == Some(&(end + 1)) {
            end += 1;
            iter.next();
        }

        if !out.is_empty() {
            out.push_str(", ");
        }
        // Writing to a String cannot fail
        let _ = if end == start {
            write!(out, "{}", start)
        } else {
            write!(out, "{}+{}", start, end - start)
        };
    }
    out
}
