//! Transfer configuration

use crate::constants::{
    decimal_digits, CORRECTION_HEADER_MAX, DEFAULT_CAPACITY_TOTAL, DEFAULT_FRAME_INTERVAL_MS,
    INDEX_FIELD_MAX,
};
use crate::error::FrameError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration inputs shared by sender and receiver tooling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Largest payload one optical code can carry, in bytes
    pub capacity_total: usize,

    /// Time between two displayed codes, in milliseconds
    pub frame_interval_ms: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            capacity_total: DEFAULT_CAPACITY_TOTAL,
            frame_interval_ms: DEFAULT_FRAME_INTERVAL_MS,
        }
    }
}

impl TransferConfig {
    /// Create a configuration
    pub fn new(capacity_total: usize, frame_interval_ms: u64) -> Self {
        Self {
            capacity_total,
            frame_interval_ms,
        }
    }

    /// Largest encoded content frame whose correction frame still fits
    ///
    /// A correction frame carries the base64 of a frame-sized XOR behind a
    /// short header, so content frames get three quarters of what is left.
    pub fn frame_capacity(&self) -> Result<usize, FrameError> {
        let budget = self
            .capacity_total
            .checked_sub(CORRECTION_HEADER_MAX)
            .ok_or_else(|| self.too_small())?;
        Ok(3 * (budget / 4))
    }

    /// Number of content stream bytes carried by one content frame
    pub fn data_capacity(&self) -> Result<usize, FrameError> {
        let frame_capacity = self.frame_capacity()?;
        let overhead = INDEX_FIELD_MAX + 1 + decimal_digits(frame_capacity);

        match frame_capacity.checked_sub(overhead) {
            Some(capacity) if capacity > 0 => Ok(capacity),
            _ => Err(self.too_small()),
        }
    }

    /// Inter-frame display duration
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), FrameError> {
        self.data_capacity().map(|_| ())
    }

    fn too_small(&self) -> FrameError {
        FrameError::InvalidConfig(format!(
            "capacity {} is too small to carry any data",
            self.capacity_total
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capacities() {
        let config = TransferConfig::default();
        assert_eq!(config.frame_capacity().unwrap(), 213);
        assert_eq!(config.data_capacity().unwrap(), 201);
        assert_eq!(config.frame_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_correction_fits_capacity() {
        for total in [40usize, 100, 300, 1000, 2953] {
            let config = TransferConfig::new(total, 0);
            let frame = config.frame_capacity().unwrap();
            let base64_len = 4 * frame.div_ceil(3);
            assert!(CORRECTION_HEADER_MAX + base64_len <= total);
        }
    }

    #[test]
    fn test_too_small() {
        assert!(matches!(
            TransferConfig::new(10, 0).data_capacity(),
            Err(FrameError::InvalidConfig(_))
        ));
        assert!(TransferConfig::new(20, 0).validate().is_err());
    }
}
