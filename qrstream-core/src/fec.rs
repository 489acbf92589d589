//! Progressive forward error correction with XOR parity frames
//!
//! For an assumed loss rate of `p` percent the sender emits
//! `m = ceil(n * p / 100)` correction frames. Correction frame `i` is the XOR
//! of content frames `i, i+m, i+2m, …`, so any single missing member of that
//! group can be rebuilt from the others. Sender and receiver derive the group
//! from `(n, p, i)` alone.

use crate::constants::{CORRECTION_MARKER, MAX_FRAMES, MAX_LOSS_RATE_PERCENT};
use crate::error::FrameError;
use crate::vlq;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::{BufMut, Bytes, BytesMut};

/// Number of correction frames for `total_frames` frames at `loss_rate_percent`
pub fn correction_frames_count(total_frames: usize, loss_rate_percent: u8) -> usize {
    (total_frames * usize::from(loss_rate_percent)).div_ceil(100)
}

/// Indices of the content frames XORed into correction frame `index`
///
/// The result always has at least two entries.
pub fn correction_indices(total_frames: usize, loss_rate_percent: u8, index: usize) -> Vec<usize> {
    let step = correction_frames_count(total_frames, loss_rate_percent).max(1);

    let mut indices: Vec<usize> = (index..total_frames).step_by(step).collect();
    if indices.len() < 2 {
        let extra = if index == 0 {
            total_frames.saturating_sub(1)
        } else {
            0
        };
        indices.insert(0, extra);
    }
    indices
}

/// XOR `other` into `acc`, zero-padding whichever is shorter
pub fn xor_into(acc: &mut Vec<u8>, other: &[u8]) {
    if acc.len() < other.len() {
        acc.resize(other.len(), 0);
    }
    for (a, b) in acc.iter_mut().zip(other) {
        *a ^= b;
    }
}

/// XOR two byte strings, zero-padding the shorter one
///
/// `xor_bytes(&xor_bytes(a, b), b)` gives back `a` followed by zeros up to
/// the longer of the two lengths.
pub fn xor_bytes(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut out = a.to_vec();
    xor_into(&mut out, b);
    out
}

/// Whether a raw payload is a correction frame
pub fn is_correction_frame(raw: &[u8]) -> bool {
    raw.first() == Some(&CORRECTION_MARKER)
}

/// Access to encoded content frames by index
pub trait FrameLookup {
    /// The raw encoded frame at `index`, if known
    fn frame(&self, index: usize) -> Option<&[u8]>;
}

impl FrameLookup for [Bytes] {
    fn frame(&self, index: usize) -> Option<&[u8]> {
        self.get(index).map(|f| f.as_ref())
    }
}

/// A correction frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectionFrame {
    /// Assumed loss rate in percent (1..=99)
    pub loss_rate_percent: u8,

    /// Position of this frame among the correction frames of its loss rate
    pub index: usize,

    /// XOR of the referenced content frames
    pub parity: Bytes,
}

impl CorrectionFrame {
    /// Encode as `C` + VLQ(loss rate) + VLQ(index) + base64(parity)
    pub fn encode(&self) -> Result<Bytes, FrameError> {
        let mut buf = BytesMut::with_capacity(16 + self.parity.len().div_ceil(3) * 4);
        buf.put_u8(CORRECTION_MARKER);
        vlq::put_uint(&mut buf, u64::from(self.loss_rate_percent))?;
        vlq::put_uint(&mut buf, self.index as u64)?;
        buf.put_slice(STANDARD.encode(&self.parity).as_bytes());
        Ok(buf.freeze())
    }

    /// Decode a raw correction frame
    pub fn decode(raw: &[u8]) -> Result<Self, FrameError> {
        if !is_correction_frame(raw) {
            return Err(FrameError::InvalidCorrection(
                "missing correction marker".to_string(),
            ));
        }

        let (loss_rate, from) = vlq::decode_uint(raw, 1)?;
        let loss_rate_percent = u8::try_from(loss_rate)
            .ok()
            .filter(|p| (1..=MAX_LOSS_RATE_PERCENT).contains(p))
            .ok_or_else(|| {
                FrameError::InvalidCorrection(format!("loss rate {}% out of range", loss_rate))
            })?;

        let (index, from) = vlq::decode_uint(raw, from)?;
        let index = usize::try_from(index)
            .ok()
            .filter(|&i| i < MAX_FRAMES)
            .ok_or_else(|| {
                FrameError::InvalidCorrection(format!("correction index {} out of range", index))
            })?;

        let parity = STANDARD
            .decode(&raw[from..])
            .map_err(|e| FrameError::InvalidCorrection(format!("bad parity encoding: {}", e)))?;

        Ok(Self {
            loss_rate_percent,
            index,
            parity: Bytes::from(parity),
        })
    }

    /// Content frame indices this frame covers, for a transfer of `total_frames`
    pub fn indices(&self, total_frames: usize) -> Result<Vec<usize>, FrameError> {
        let count = correction_frames_count(total_frames, self.loss_rate_percent);
        if self.index >= count {
            return Err(FrameError::InvalidCorrection(format!(
                "index {} beyond the {} correction frames of {}% for {} frames",
                self.index, count, self.loss_rate_percent, total_frames
            )));
        }
        Ok(correction_indices(
            total_frames,
            self.loss_rate_percent,
            self.index,
        ))
    }
}

/// Trait for producing correction frames from content frames
pub trait RedundancyEncoder {
    /// Build correction frame `index` for `loss_rate_percent`
    ///
    /// # Arguments
    /// * `frames` - Lookup of the encoded content frames
    /// * `total_frames` - Number of content frames in the transfer
    fn encode_correction<L: FrameLookup + ?Sized>(
        &self,
        frames: &L,
        total_frames: usize,
        loss_rate_percent: u8,
        index: usize,
    ) -> Result<CorrectionFrame, FrameError>;
}

/// Trait for rebuilding a missing content frame from a correction frame
pub trait RedundancyDecoder {
    /// Rebuild the frame at `missing` from `correction` and the other known frames
    ///
    /// The returned frame may carry trailing zero padding.
    fn recover<L: FrameLookup + ?Sized>(
        &self,
        correction: &CorrectionFrame,
        frames: &L,
        total_frames: usize,
        missing: usize,
    ) -> Result<Bytes, FrameError>;

    /// Whether a correction frame with `missing_count` unknown members can be used
    fn can_reconstruct(&self, missing_count: usize) -> bool;
}

/// Byte-wise XOR parity
#[derive(Debug, Clone, Copy, Default)]
pub struct XorParity;

impl RedundancyEncoder for XorParity {
    fn encode_correction<L: FrameLookup + ?Sized>(
        &self,
        frames: &L,
        total_frames: usize,
        loss_rate_percent: u8,
        index: usize,
    ) -> Result<CorrectionFrame, FrameError> {
        let mut parity = Vec::new();
        for i in correction_indices(total_frames, loss_rate_percent, index) {
            let frame = frames.frame(i).ok_or_else(|| {
                FrameError::InvalidStructure(format!("content frame {} not available", i))
            })?;
            xor_into(&mut parity, frame);
        }

        Ok(CorrectionFrame {
            loss_rate_percent,
            index,
            parity: Bytes::from(parity),
        })
    }
}

impl RedundancyDecoder for XorParity {
    fn recover<L: FrameLookup + ?Sized>(
        &self,
        correction: &CorrectionFrame,
        frames: &L,
        total_frames: usize,
        missing: usize,
    ) -> Result<Bytes, FrameError> {
        let mut acc = correction.parity.to_vec();
        for i in correction.indices(total_frames)? {
            if i == missing {
                continue;
            }
            let frame = frames.frame(i).ok_or_else(|| {
                FrameError::InvalidCorrection(format!("frame {} needed for recovery is missing", i))
            })?;
            xor_into(&mut acc, frame);
        }
        Ok(Bytes::from(acc))
    }

    fn can_reconstruct(&self, missing_count: usize) -> bool {
        missing_count == 1
    }
}
