use crate::OutputFormat;
use anyhow::{Context, Result};
use qrstream_core::fec::{is_correction_frame, CorrectionFrame};
use qrstream_core::framer::decode_content_frame;
use serde::Serialize;
use std::fs;
use tracing::info;

/// What one captured payload turned out to be
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PayloadInfo {
    /// A content frame
    Content {
        index: usize,
        chunk_len: usize,
        encoded_len: usize,
    },
    /// A correction frame
    Correction {
        loss_rate_percent: u8,
        index: usize,
        parity_len: usize,
        parity_prefix: String,
    },
    /// Neither
    Invalid { error: String },
}

/// A classified line of the input
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InspectedLine {
    /// One-based line number
    pub line: usize,

    /// Raw payload length
    pub len: usize,

    #[serde(flatten)]
    pub info: PayloadInfo,
}

/// Classify one payload without any receiver state
pub fn classify(raw: &[u8]) -> PayloadInfo {
    if is_correction_frame(raw) {
        return match CorrectionFrame::decode(raw) {
            Ok(frame) => PayloadInfo::Correction {
                loss_rate_percent: frame.loss_rate_percent,
                index: frame.index,
                parity_len: frame.parity.len(),
                parity_prefix: hex::encode(&frame.parity[..frame.parity.len().min(8)]),
            },
            Err(e) => PayloadInfo::Invalid { error: e.to_string() },
        };
    }

    match decode_content_frame(raw) {
        Ok(frame) => PayloadInfo::Content {
            index: frame.index,
            chunk_len: frame.chunk.len(),
            encoded_len: frame.encoded_len,
        },
        Err(e) => PayloadInfo::Invalid { error: e.to_string() },
    }
}

/// Classify every non-empty line of `input`
pub fn execute(input: &str, format: OutputFormat, output: Option<&str>) -> Result<Vec<InspectedLine>> {
    info!("Inspecting payloads in {}", input);

    let data = fs::read(input).with_context(|| format!("Failed to read input file: {}", input))?;

    let lines: Vec<InspectedLine> = data
        .split(|&b| b == b'\n')
        .enumerate()
        .map(|(i, line)| (i + 1, line.strip_suffix(b"\r").unwrap_or(line)))
        .filter(|(_, line)| !line.is_empty())
        .map(|(line, raw)| InspectedLine {
            line,
            len: raw.len(),
            info: classify(raw),
        })
        .collect();

    let rendered = match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(&lines).context("Failed to serialize inspection")?
        }
        OutputFormat::Text => render_text(&lines),
    };

    match output {
        Some(output_path) => {
            fs::write(output_path, rendered)
                .with_context(|| format!("Failed to write output file: {}", output_path))?;
            info!("Inspection written to: {}", output_path);
        }
        None => println!("{}", rendered),
    }

    Ok(lines)
}

fn render_text(lines: &[InspectedLine]) -> String {
    let mut out = String::from("=== Payloads ===\n");
    let mut content = 0;
    let mut corrections = 0;
    let mut invalid = 0;

    for l in lines {
        let text = match &l.info {
            PayloadInfo::Content {
                index, chunk_len, ..
            } => {
                content += 1;
                format!("content frame {} ({} byte chunk)", index, chunk_len)
            }
            PayloadInfo::Correction {
                loss_rate_percent,
                index,
                parity_len,
                parity_prefix,
            } => {
                corrections += 1;
                format!(
                    "correction {}% #{} ({} parity bytes, {}..)",
                    loss_rate_percent, index, parity_len, parity_prefix
                )
            }
            PayloadInfo::Invalid { error } => {
                invalid += 1;
                format!("invalid: {}", error)
            }
        };
        out.push_str(&format!("Line {:>5}: {} bytes, {}\n", l.line, l.len, text));
    }

    out.push_str(&format!(
        "\nContent frames: {}\nCorrection frames: {}\nInvalid: {}",
        content, corrections, invalid
    ));
    out
}
