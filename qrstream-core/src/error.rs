//! Error types for qrstream operations

/// Errors that can occur while framing, decoding or reassembling a transfer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// A VLQ length (or its digit count) is not a decimal number
    #[error("Malformed length field: {0}")]
    MalformedLength(String),

    /// Fewer bytes remain than a field announces
    #[error("Truncated value: expected {expected} bytes, got {actual}")]
    TruncatedValue {
        /// The number of bytes announced by the field.
        expected: usize,
        /// The number of bytes actually available.
        actual: usize,
    },

    /// A value is too long to be described by a single-digit length of length
    #[error("Value length {0} needs more than 9 length digits")]
    LengthTooLong(usize),

    /// Unsupported content stream version
    #[error("Unsupported content version: {0}")]
    UnsupportedVersion(u64),

    /// Invalid frame or content structure
    #[error("Invalid frame structure: {0}")]
    InvalidStructure(String),

    /// Invalid correction frame
    #[error("Invalid correction frame: {0}")]
    InvalidCorrection(String),

    /// The reassembled content does not match the hash it carries
    #[error("Hash mismatch: expected {expected}, got {actual}")]
    IncorrectHash {
        /// The hash carried in the content header.
        expected: u32,
        /// The hash recomputed from the decoded path and payload.
        actual: u32,
    },

    /// The reassembled content stream could not be decoded
    #[error("Not all data: {0}")]
    NotAllData(String),

    /// A frame disagrees with the position it was expected at
    #[error("Frame index mismatch: expected {expected}, got {actual}")]
    FrameIndexMismatch {
        /// The index the frame was expected to carry.
        expected: usize,
        /// The index the frame actually carries.
        actual: usize,
    },

    /// A payload would exceed the configured code capacity
    #[error("Payload size {0} exceeds capacity {1}")]
    PayloadTooLarge(usize, usize),

    /// The content needs more frames than an index field can address
    #[error("Content needs {0} frames, at most {1} are supported")]
    TooManyFrames(usize, usize),

    /// Invalid transfer configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error in a collaborator
    #[error("IO error: {0}")]
    Io(String),

    /// The processing queue worker is no longer running
    #[error("Processing queue worker stopped: {0}")]
    WorkerStopped(String),
}

impl FrameError {
    /// True when the error only means that more data is needed
    pub fn is_truncation(&self) -> bool {
        matches!(self, FrameError::TruncatedValue { .. })
    }
}

impl From<std::io::Error> for FrameError {
    fn from(err: std::io::Error) -> Self {
        FrameError::Io(err.to_string())
    }
}
