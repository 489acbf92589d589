//! # qrstream Core
//!
//! Framing and progressive forward error correction for one-way file transfer
//! over a sequence of optical codes. The channel loses, repeats and reorders
//! codes and cannot acknowledge anything, so every frame is self-describing
//! and the sender keeps adding XOR parity frames for rising assumed loss rates.
//!
//! ## Modules
//!
//! - `vlq`: Length-prefixed field codec used by every frame
//! - `content`: Content stream header, payload and FNV-1a hash
//! - `framer`: Slicing the content stream into content frames
//! - `fec`: Correction frames and the XOR parity encoder/decoder
//! - `scheduler`: The sender's endless round of content and correction frames
//! - `store`: Received content frames
//! - `recovery`: Correction cache and fixed-point recovery
//! - `session`: Receiver state machine and reassembly
//! - `queue`: Single-consumer processing of scanned payloads (`runtime` feature)
//! - `config`: Capacity and timing configuration

#![warn(missing_docs)]

pub mod config;
pub mod constants;
pub mod content;
pub mod error;
pub mod fec;
pub mod framer;
#[cfg(feature = "runtime")]
pub mod queue;
pub mod recovery;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod vlq;

// Re-export commonly used types
pub use config::TransferConfig;
pub use error::FrameError;
pub use fec::CorrectionFrame;
pub use framer::{ContentBuilder, FrameSet};
#[cfg(feature = "runtime")]
pub use queue::{ProcessingQueue, ReceiverEvent, Submission};
pub use scheduler::{FrameKind, ScheduledFrame, TransmissionScheduler};
pub use session::{
    FileMetadata, ReceivedFile, Reconstruction, ScanReport, ScanResult, Session, TransferStatus,
};

/// Result type alias for qrstream operations
pub type Result<T> = std::result::Result<T, FrameError>;
