//! Correction cache and recovery engine
//!
//! Correction frames that cannot be used yet (header unknown, or two or more
//! of their frames missing) wait in an arena. Every time new frames become
//! known the arena is swept again until a full pass recovers nothing.

use crate::error::FrameError;
use crate::fec::{CorrectionFrame, RedundancyDecoder, XorParity};
use crate::store::{FrameStore, SaveOutcome};
use bytes::Bytes;
use hashbrown::HashSet;

#[cfg(feature = "logging")]
use tracing::{debug, warn};

/// A content frame rebuilt from a correction frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveredFrame {
    /// Index the correction frame was expected to rebuild
    pub expected: usize,

    /// How the rebuilt frame was stored (its own decoded index inside)
    pub outcome: SaveOutcome,
}

impl RecoveredFrame {
    /// Index the rebuilt frame decoded to
    pub fn index(&self) -> usize {
        self.outcome.index()
    }
}

/// Result of decoding one correction frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionOutcome {
    /// Exactly one frame was missing and has been rebuilt
    Decoded(RecoveredFrame),

    /// Every frame it covers is already known
    AllDataKnown,

    /// It cannot be used yet and was cached
    MoreFramesMissing,

    /// It cannot be used yet and was already cached
    MoreFramesMissingDuplicate,
}

#[derive(Debug, Clone)]
struct CachedCorrection {
    raw: Bytes,
    frame: CorrectionFrame,
}

enum Attempt {
    Blocked,
    AllDataKnown,
    Recovered(RecoveredFrame),
}

/// Holds unusable correction frames and applies them when possible
#[derive(Debug, Default)]
pub struct RecoveryEngine {
    entries: Vec<CachedCorrection>,
    seen: HashSet<Bytes>,
    decoder: XorParity,
}

impl RecoveryEngine {
    /// Create an engine with an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached correction frames
    pub fn cache_len(&self) -> usize {
        self.entries.len()
    }

    /// Drop every cached correction frame
    pub fn clear(&mut self) {
        self.entries.clear();
        self.seen.clear();
    }

    /// Decode a raw correction frame and use it if possible
    ///
    /// `total_frames` is `None` while the header is unknown; the frame is
    /// then cached for later.
    pub fn decode_correction(
        &mut self,
        raw: &[u8],
        store: &mut FrameStore,
        total_frames: Option<usize>,
    ) -> Result<CorrectionOutcome, FrameError> {
        let frame = CorrectionFrame::decode(raw)?;

        let Some(total) = total_frames else {
            return Ok(self.cache(raw, frame));
        };

        match self.apply(&frame, store, total)? {
            Attempt::AllDataKnown => Ok(CorrectionOutcome::AllDataKnown),
            Attempt::Recovered(recovered) => Ok(CorrectionOutcome::Decoded(recovered)),
            Attempt::Blocked => Ok(self.cache(raw, frame)),
        }
    }

    /// Apply cached correction frames until no more frames can be rebuilt
    ///
    /// Entries that rebuilt a frame, cover only known frames, or turn out to
    /// be invalid are dropped. Returns the frames rebuilt, in order.
    pub fn recover_with_cache(
        &mut self,
        store: &mut FrameStore,
        total_frames: usize,
    ) -> Vec<RecoveredFrame> {
        let mut recovered = Vec::new();

        loop {
            let mut progress = false;
            let mut i = 0;

            while i < self.entries.len() {
                match self.apply(&self.entries[i].frame, store, total_frames) {
                    Ok(Attempt::Blocked) => i += 1,
                    Ok(Attempt::AllDataKnown) => self.remove(i),
                    Ok(Attempt::Recovered(frame)) => {
                        self.remove(i);
                        progress |= frame.outcome.is_new_data();
                        recovered.push(frame);
                    }
                    Err(_e) => {
                        #[cfg(feature = "logging")]
                        warn!("Dropping cached correction frame: {}", _e);

                        self.remove(i);
                    }
                }
            }

            if !progress {
                break;
            }
        }

        recovered
    }

    /// Try to rebuild a frame while the number of frames is still unknown
    ///
    /// `total_frames` is a guess. A cached correction frame with exactly one
    /// missing member under that guess rebuilds it, and the result is stored
    /// only when `accept(index, rebuilt, store)` approves it, so the caller
    /// can check that the header agrees with the guess. The entry that
    /// produced it is dropped.
    pub fn recover_with_guess<F>(
        &mut self,
        store: &mut FrameStore,
        total_frames: usize,
        accept: F,
    ) -> Option<RecoveredFrame>
    where
        F: Fn(usize, &[u8], &FrameStore) -> bool,
    {
        for i in 0..self.entries.len() {
            let frame = &self.entries[i].frame;
            let Ok(indices) = frame.indices(total_frames) else {
                continue;
            };
            let mut missing = indices.iter().copied().filter(|&j| !store.contains(j));
            let (Some(expected), None) = (missing.next(), missing.next()) else {
                continue;
            };

            let Ok(rebuilt) = self.decoder.recover(frame, &*store, total_frames, expected) else {
                continue;
            };
            if !accept(expected, &rebuilt, store) {
                continue;
            }
            let Ok(outcome) = store.save_frame(&rebuilt) else {
                continue;
            };

            #[cfg(feature = "logging")]
            debug!("Recovered frame {} assuming {} frames", expected, total_frames);

            self.remove(i);
            return Some(RecoveredFrame { expected, outcome });
        }

        None
    }

    fn cache(&mut self, raw: &[u8], frame: CorrectionFrame) -> CorrectionOutcome {
        let raw = Bytes::copy_from_slice(raw);
        if !self.seen.insert(raw.clone()) {
            return CorrectionOutcome::MoreFramesMissingDuplicate;
        }

        #[cfg(feature = "logging")]
        debug!(
            "Caching correction frame {} of {}%",
            frame.index, frame.loss_rate_percent
        );

        self.entries.push(CachedCorrection { raw, frame });
        CorrectionOutcome::MoreFramesMissing
    }

    fn remove(&mut self, i: usize) {
        let entry = self.entries.swap_remove(i);
        self.seen.remove(&entry.raw);
    }

    fn apply(
        &self,
        frame: &CorrectionFrame,
        store: &mut FrameStore,
        total_frames: usize,
    ) -> Result<Attempt, FrameError> {
        let indices = frame.indices(total_frames)?;
        let missing: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|&i| !store.contains(i))
            .collect();

        if missing.is_empty() {
            return Ok(Attempt::AllDataKnown);
        }
        if !self.decoder.can_reconstruct(missing.len()) {
            return Ok(Attempt::Blocked);
        }

        let expected = missing[0];
        let rebuilt = self
            .decoder
            .recover(frame, &*store, total_frames, expected)?;
        let outcome = store.save_frame(&rebuilt)?;

        if outcome.index() != expected {
            #[cfg(feature = "logging")]
            warn!(
                "Correction frame {} of {}% rebuilt frame {} instead of {}",
                frame.index,
                frame.loss_rate_percent,
                outcome.index(),
                expected
            );
        } else {
            #[cfg(feature = "logging")]
            debug!("Recovered frame {}", expected);
        }

        Ok(Attempt::Recovered(RecoveredFrame { expected, outcome }))
    }
}
