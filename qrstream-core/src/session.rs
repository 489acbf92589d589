//! Receiver session: the state machine fed with scanned payloads
//!
//! A [`Session`] owns the frame store and the correction cache. Each scanned
//! payload goes through [`Session::on_scan`], which stores or applies it,
//! learns the file metadata as soon as the leading frames allow, runs
//! recovery, and reassembles the file once every frame is known.

use crate::constants::MAX_FRAMES;
use crate::content::{self, ContentHeader};
use crate::error::FrameError;
use crate::fec::is_correction_frame;
use crate::framer::{decode_content_frame, number_of_frames};
use crate::recovery::{CorrectionOutcome, RecoveredFrame, RecoveryEngine};
use crate::store::{compact_ranges, FrameStore, SaveOutcome};
use bytes::Bytes;
use serde::Serialize;
use std::fmt;

#[cfg(feature = "logging")]
use tracing::{debug, info, warn};

/// Result code of one processed payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ScanResult {
    /// A content frame added new data
    FrameDecoded,
    /// A content frame that was already stored
    FrameAlreadyKnown,
    /// A correction frame rebuilt a missing frame
    CorrectionDecoded,
    /// A correction frame whose frames are all known
    CorrectionAllDataKnown,
    /// A correction frame that was cached for later
    CorrectionMoreFramesMissing,
    /// A correction frame that was already cached
    CorrectionMoreFramesMissingDuplicate,
}

impl ScanResult {
    /// Whether the payload added data to the session
    pub fn is_progress(&self) -> bool {
        matches!(self, Self::FrameDecoded | Self::CorrectionDecoded)
    }
}

impl fmt::Display for ScanResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FrameDecoded => "frame decoded",
            Self::FrameAlreadyKnown => "frame already known",
            Self::CorrectionDecoded => "correction decoded",
            Self::CorrectionAllDataKnown => "correction: all data known",
            Self::CorrectionMoreFramesMissing => "correction: more frames missing",
            Self::CorrectionMoreFramesMissingDuplicate => {
                "correction: more frames missing (duplicate)"
            }
        };
        f.write_str(name)
    }
}

/// File metadata learned from the content header
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileMetadata {
    /// Decoded path
    pub path: String,

    /// Announced FNV-1a hash
    pub hash: u32,

    /// Length of the whole content stream
    pub content_len: usize,

    /// Length of the payload
    pub payload_len: usize,

    /// Number of content frames
    pub total_frames: usize,

    /// Chunk capacity, taken from frame 0
    pub data_capacity: usize,
}

impl FileMetadata {
    fn from_header(header: &ContentHeader, data_capacity: usize) -> Result<Self, FrameError> {
        let total_frames = number_of_frames(header.content_len(), data_capacity);
        if total_frames > MAX_FRAMES {
            return Err(FrameError::TooManyFrames(total_frames, MAX_FRAMES));
        }

        Ok(Self {
            path: header.path.clone(),
            hash: header.hash,
            content_len: header.content_len(),
            payload_len: header.payload_len,
            total_frames,
            data_capacity,
        })
    }
}

/// A reassembled and verified file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFile {
    /// Path announced by the sender
    pub path: String,

    /// Verified hash
    pub hash: u32,

    /// The payload
    pub payload: Bytes,
}

/// Outcome of a reassembly attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconstruction {
    /// Every frame is known and the hash matches
    Complete(ReceivedFile),

    /// Some frames are still missing
    Incomplete {
        /// Missing indices
        missing: Vec<usize>,
    },

    /// Every frame is known but the content does not check out
    Corrupt(FrameError),
}

/// Snapshot of the receiver's progress
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TransferStatus {
    /// Distinct content frames stored
    pub received: usize,

    /// Highest stored index
    pub max_index: Option<usize>,

    /// Number of content frames, once the header is known
    pub total_frames: Option<usize>,

    /// Correction frames waiting in the cache
    pub cached_corrections: usize,

    /// Indices up to the highest stored one that are missing
    pub missing: Vec<usize>,
}

impl TransferStatus {
    /// Missing indices as compact runs, e.g. `"1+2, 5+1"`
    pub fn missing_ranges(&self) -> String {
        compact_ranges(&self.missing)
    }
}

/// What happened to one scanned payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    /// Result code
    pub result: ScanResult,

    /// Index of the stored or rebuilt frame, when there is one
    pub frame: Option<usize>,

    /// Frames rebuilt from correction frames while processing this payload
    pub recovered: Vec<usize>,

    /// Metadata, when this payload completed the header
    pub metadata: Option<FileMetadata>,

    /// The file, when this payload completed it for the first time
    pub completed: Option<ReceivedFile>,

    /// Why header decoding or reassembly failed, if it did
    pub reconstruction_error: Option<FrameError>,

    /// Progress after this payload
    pub status: TransferStatus,
}

/// State of one incoming transfer
#[derive(Debug, Default)]
pub struct Session {
    store: FrameStore,
    engine: RecoveryEngine,
    metadata: Option<FileMetadata>,
    hash_saved: Option<u32>,
}

impl Session {
    /// Create an empty session
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one scanned payload
    ///
    /// Errors mean the payload itself was rejected and nothing changed.
    pub fn on_scan(&mut self, payload: &[u8]) -> Result<ScanReport, FrameError> {
        let mut recovered = Vec::new();

        let (result, frame, mut new_data) = if is_correction_frame(payload) {
            let total = self.total_frames();
            match self.engine.decode_correction(payload, &mut self.store, total)? {
                CorrectionOutcome::Decoded(rebuilt) => {
                    self.note_recovered(&rebuilt);
                    recovered.push(rebuilt.index());
                    (
                        ScanResult::CorrectionDecoded,
                        Some(rebuilt.index()),
                        rebuilt.outcome.is_new_data(),
                    )
                }
                CorrectionOutcome::AllDataKnown => (ScanResult::CorrectionAllDataKnown, None, false),
                CorrectionOutcome::MoreFramesMissing => {
                    (ScanResult::CorrectionMoreFramesMissing, None, false)
                }
                CorrectionOutcome::MoreFramesMissingDuplicate => {
                    (ScanResult::CorrectionMoreFramesMissingDuplicate, None, false)
                }
            }
        } else {
            let outcome = self.store.save_frame(payload)?;
            self.note_saved(outcome);
            match outcome {
                SaveOutcome::AlreadyKnown { index } => {
                    (ScanResult::FrameAlreadyKnown, Some(index), false)
                }
                SaveOutcome::Decoded { index } | SaveOutcome::Replaced { index } => {
                    (ScanResult::FrameDecoded, Some(index), true)
                }
            }
        };

        let mut report = ScanReport {
            result,
            frame,
            recovered: Vec::new(),
            metadata: None,
            completed: None,
            reconstruction_error: None,
            status: TransferStatus::default(),
        };

        if new_data {
            self.refresh_header(&mut report);
        }

        if matches!(
            report.result,
            ScanResult::FrameDecoded | ScanResult::CorrectionMoreFramesMissing
        ) {
            if let Some(rebuilt) = self.recover_guessed() {
                recovered.push(rebuilt.index());
                new_data = true;
                if report.result == ScanResult::CorrectionMoreFramesMissing {
                    report.result = ScanResult::CorrectionDecoded;
                    report.frame = Some(rebuilt.index());
                }
                self.refresh_header(&mut report);
            }
        }

        if new_data {
            if let Some(total) = self.total_frames() {
                for rebuilt in self.engine.recover_with_cache(&mut self.store, total) {
                    self.note_recovered(&rebuilt);
                    recovered.push(rebuilt.index());
                }
                // A rebuilt frame 0 can change the header
                self.refresh_header(&mut report);
            }

            if self.all_frames_read() {
                self.finish(&mut report);
            }
        }

        report.recovered = recovered;
        report.status = self.status();
        Ok(report)
    }

    /// Metadata, once the header has been decoded
    pub fn metadata(&self) -> Option<&FileMetadata> {
        self.metadata.as_ref()
    }

    /// Number of content frames, once the header has been decoded
    pub fn total_frames(&self) -> Option<usize> {
        self.metadata.as_ref().map(|m| m.total_frames)
    }

    /// Hash of the last file handed out
    pub fn hash_saved(&self) -> Option<u32> {
        self.hash_saved
    }

    /// Stored content frames
    pub fn store(&self) -> &FrameStore {
        &self.store
    }

    /// Whether the header is known and every frame below the total is stored
    pub fn all_frames_read(&self) -> bool {
        self.total_frames()
            .is_some_and(|total| self.store.count_below(total) >= total)
    }

    /// Indices up to the highest stored one that are missing
    pub fn missing_frames(&self) -> Vec<usize> {
        self.store.missing_frames()
    }

    /// Try to decode the header from the contiguous leading frames
    ///
    /// `Ok(None)` means more leading frames are needed. The capacity of the
    /// sender is read from the chunk length of frame 0.
    pub fn decode_header(&self) -> Result<Option<FileMetadata>, FrameError> {
        let Some(first) = self.store.chunk(0) else {
            return Ok(None);
        };
        let data_capacity = first?.len();
        if data_capacity == 0 {
            return Err(FrameError::InvalidStructure(
                "frame 0 carries an empty chunk".to_string(),
            ));
        }

        let mut stream = Vec::new();
        let mut index = 0;
        while let Some(chunk) = self.store.chunk(index) {
            stream.extend_from_slice(chunk?);
            index += 1;
        }

        match content::decode_header(&stream) {
            Ok(header) => FileMetadata::from_header(&header, data_capacity).map(Some),
            Err(e) if e.is_truncation() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Reassemble the file from the stored frames
    pub fn reconstruct(&self) -> Reconstruction {
        let Some(total) = self.total_frames() else {
            return Reconstruction::Incomplete {
                missing: self.store.missing_frames(),
            };
        };

        let missing = self.store.missing_below(total);
        if !missing.is_empty() {
            return Reconstruction::Incomplete { missing };
        }

        let content_len = self.metadata.as_ref().map_or(0, |m| m.content_len);
        let mut stream = Vec::with_capacity(content_len);
        for (expected, raw) in self.store.iter().take_while(|(i, _)| *i < total) {
            let frame = match decode_content_frame(raw) {
                Ok(frame) => frame,
                Err(e) => return Reconstruction::Corrupt(e),
            };
            if frame.index != expected {
                #[cfg(feature = "logging")]
                warn!("Frame stored at {} decodes as {}", expected, frame.index);

                return Reconstruction::Corrupt(FrameError::FrameIndexMismatch {
                    expected,
                    actual: frame.index,
                });
            }
            stream.extend_from_slice(frame.chunk);
        }

        let decoded = match content::decode_content(&stream) {
            Ok(decoded) => decoded,
            Err(e) if e.is_truncation() => {
                return Reconstruction::Corrupt(FrameError::NotAllData(e.to_string()))
            }
            Err(e) => return Reconstruction::Corrupt(e),
        };

        if decoded.header.content_len() != stream.len() {
            return Reconstruction::Corrupt(FrameError::NotAllData(format!(
                "{} bytes reassembled for a {} byte stream",
                stream.len(),
                decoded.header.content_len()
            )));
        }

        Reconstruction::Complete(ReceivedFile {
            path: decoded.header.path,
            hash: decoded.header.hash,
            payload: decoded.payload,
        })
    }

    /// Progress snapshot
    pub fn status(&self) -> TransferStatus {
        TransferStatus {
            received: self.store.len(),
            max_index: self.store.max_index(),
            total_frames: self.total_frames(),
            cached_corrections: self.engine.cache_len(),
            missing: self.store.missing_frames(),
        }
    }

    /// Forget everything and start a new transfer
    pub fn reset(&mut self) {
        #[cfg(feature = "logging")]
        debug!("Resetting receiver session");

        self.store.clear();
        self.engine.clear();
        self.metadata = None;
        self.hash_saved = None;
    }

    fn note_saved(&mut self, outcome: SaveOutcome) {
        if matches!(outcome, SaveOutcome::Replaced { index: 0 }) && self.metadata.take().is_some() {
            #[cfg(feature = "logging")]
            warn!("Frame 0 changed, decoding the header again");
        }
    }

    fn note_recovered(&mut self, rebuilt: &RecoveredFrame) {
        self.note_saved(rebuilt.outcome);
    }

    /// Rebuild a frame from the cache before the header is known
    ///
    /// Guesses that the highest stored index is the last frame and keeps the
    /// rebuilt frame only if the header it completes agrees with the guess.
    fn recover_guessed(&mut self) -> Option<RecoveredFrame> {
        if self.metadata.is_some() || self.engine.cache_len() == 0 {
            return None;
        }
        let guess = self.store.max_index()? + 1;
        if guess < 2 {
            return None;
        }

        self.engine
            .recover_with_guess(&mut self.store, guess, |index, raw, store| {
                header_fits(index, raw, store, guess)
            })
    }

    fn refresh_header(&mut self, report: &mut ScanReport) {
        if self.metadata.is_some() {
            return;
        }

        match self.decode_header() {
            Ok(Some(metadata)) => {
                #[cfg(feature = "logging")]
                info!(
                    "Receiving {} ({} bytes in {} frames)",
                    metadata.path, metadata.payload_len, metadata.total_frames
                );

                self.metadata = Some(metadata.clone());
                report.metadata = Some(metadata);
            }
            Ok(None) => {}
            Err(e) => {
                #[cfg(feature = "logging")]
                warn!("Cannot decode header: {}", e);

                report.reconstruction_error = Some(e);
            }
        }
    }

    fn finish(&mut self, report: &mut ScanReport) {
        match self.reconstruct() {
            Reconstruction::Complete(file) => {
                if self.hash_saved == Some(file.hash) {
                    return;
                }

                #[cfg(feature = "logging")]
                info!("Received {} ({} bytes)", file.path, file.payload.len());

                self.hash_saved = Some(file.hash);
                report.completed = Some(file);
            }
            Reconstruction::Incomplete { .. } => {}
            Reconstruction::Corrupt(e) => {
                #[cfg(feature = "logging")]
                warn!("All frames read but the file does not check out: {}", e);

                report.reconstruction_error = Some(e);
            }
        }
    }
}

/// Whether `raw`, standing in for frame `index`, completes a header that
/// describes `total_frames` frames
fn header_fits(index: usize, raw: &[u8], store: &FrameStore, total_frames: usize) -> bool {
    let Ok(candidate) = decode_content_frame(raw) else {
        return false;
    };
    if candidate.index != index {
        return false;
    }

    let chunk_at = |i: usize| {
        if i == index {
            Some(candidate.chunk)
        } else {
            store.chunk(i).and_then(|chunk| chunk.ok())
        }
    };

    let Some(first) = chunk_at(0).filter(|chunk| !chunk.is_empty()) else {
        return false;
    };

    let mut stream = Vec::new();
    let mut i = 0;
    while let Some(chunk) = chunk_at(i) {
        stream.extend_from_slice(chunk);
        i += 1;
    }

    content::decode_header(&stream).is_ok_and(|header| {
        number_of_frames(header.content_len(), first.len()) == total_frames
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fec::{RedundancyEncoder, XorParity};
    use crate::framer::{ContentBuilder, FrameSet};

    fn frame_set(payload: &[u8], capacity: usize) -> FrameSet {
        ContentBuilder::new("docs/report.txt")
            .payload(payload.to_vec())
            .data_capacity(capacity)
            .build()
            .unwrap()
    }

    #[test]
    fn test_in_order_completion() {
        let set = frame_set(b"hello, optical world", 10);
        let mut session = Session::new();

        let mut completed = None;
        for (i, raw) in set.frames().iter().enumerate() {
            let report = session.on_scan(raw).unwrap();
            assert_eq!(report.result, ScanResult::FrameDecoded);
            assert_eq!(report.frame, Some(i));
            if let Some(file) = report.completed {
                completed = Some(file);
            }
        }

        let file = completed.unwrap();
        assert_eq!(file.path, "docs/report.txt");
        assert_eq!(&file.payload[..], b"hello, optical world");
        assert_eq!(session.hash_saved(), Some(file.hash));
    }

    #[test]
    fn test_header_learned_from_leading_frames() {
        let set = frame_set(&[b'z'; 200], 8);
        let mut session = Session::new();

        // Frame 1 alone is not enough
        session.on_scan(&set.frames()[1]).unwrap();
        assert!(session.metadata().is_none());

        let mut learned = None;
        for raw in &set.frames()[..6] {
            if let Some(meta) = session.on_scan(raw).unwrap().metadata {
                learned = Some(meta);
            }
        }

        let meta = learned.unwrap();
        assert_eq!(meta.path, "docs/report.txt");
        assert_eq!(meta.payload_len, 200);
        assert_eq!(meta.data_capacity, 8);
        assert_eq!(meta.total_frames, set.len());
        assert_eq!(meta.content_len, set.content_len());
    }

    #[test]
    fn test_duplicate_frame() {
        let set = frame_set(b"abc", 4);
        let mut session = Session::new();

        session.on_scan(&set.frames()[1]).unwrap();
        let report = session.on_scan(&set.frames()[1]).unwrap();
        assert_eq!(report.result, ScanResult::FrameAlreadyKnown);
        assert_eq!(report.status.received, 1);
        assert_eq!(report.status.missing, vec![0]);
    }

    #[test]
    fn test_rejected_payload() {
        let mut session = Session::new();
        assert!(session.on_scan(b"not a frame").is_err());
        assert!(session.on_scan(b"Cgarbage").is_err());
        assert_eq!(session.status(), TransferStatus::default());
    }

    #[test]
    fn test_reconstruct_reports_missing() {
        let set = frame_set(&[b'q'; 100], 10);
        let mut session = Session::new();
        for (i, raw) in set.frames().iter().enumerate() {
            if i != 4 && i != 7 {
                session.on_scan(raw).unwrap();
            }
        }

        assert!(!session.all_frames_read());
        assert_eq!(
            session.reconstruct(),
            Reconstruction::Incomplete {
                missing: vec![4, 7]
            }
        );
        assert_eq!(session.status().missing_ranges(), "4, 7");
    }

    #[test]
    fn test_correction_before_header() {
        // Short path so that frame 0 alone carries the header
        let set = ContentBuilder::new("a")
            .payload(&b"two frames only"[..])
            .data_capacity(24)
            .build()
            .unwrap();
        assert_eq!(set.len(), 2);

        let correction = XorParity
            .encode_correction(&set, 2, 55, 0)
            .unwrap()
            .encode()
            .unwrap();

        let mut session = Session::new();
        let report = session.on_scan(&correction).unwrap();
        assert_eq!(report.result, ScanResult::CorrectionMoreFramesMissing);
        assert_eq!(report.status.cached_corrections, 1);

        let report = session.on_scan(&set.frames()[0]).unwrap();
        assert_eq!(report.recovered, vec![1]);
        assert!(report.completed.is_some());
        assert_eq!(report.status.cached_corrections, 0);
    }

    #[test]
    fn test_reset() {
        let set = frame_set(b"abc", 100);
        let mut session = Session::new();
        assert!(session.on_scan(&set.frames()[0]).unwrap().completed.is_some());

        session.reset();
        assert!(session.metadata().is_none());
        assert!(session.hash_saved().is_none());

        // The same file completes again in a new transfer
        assert!(session.on_scan(&set.frames()[0]).unwrap().completed.is_some());
    }
}
