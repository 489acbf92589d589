//! Loading the transfer configuration for a command

use anyhow::{Context, Result};
use qrstream_core::TransferConfig;
use std::fs;
use tracing::debug;

/// Build the configuration from an optional JSON file and command-line overrides
///
/// Missing fields in the file keep their defaults; flags win over the file.
pub fn load(
    path: Option<&str>,
    capacity_total: Option<usize>,
    frame_interval_ms: Option<u64>,
) -> Result<TransferConfig> {
    let mut config = match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse config file: {}", path))?
        }
        None => TransferConfig::default(),
    };

    if let Some(capacity_total) = capacity_total {
        config.capacity_total = capacity_total;
    }
    if let Some(frame_interval_ms) = frame_interval_ms {
        config.frame_interval_ms = frame_interval_ms;
    }

    config.validate().context("Invalid transfer configuration")?;
    debug!(
        "Using capacity {} bytes, {} ms per frame",
        config.capacity_total, config.frame_interval_ms
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        assert_eq!(load(None, None, None).unwrap(), TransferConfig::default());
    }

    #[test]
    fn test_flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"capacity_total": 500}"#).unwrap();

        let config = load(path.to_str(), None, Some(40)).unwrap();
        assert_eq!(config.capacity_total, 500);
        assert_eq!(config.frame_interval_ms, 40);

        let config = load(path.to_str(), Some(120), None).unwrap();
        assert_eq!(config.capacity_total, 120);
    }

    #[test]
    fn test_rejects_tiny_capacity() {
        assert!(load(None, Some(15), None).is_err());
    }
}
