use crate::data_url;
use anyhow::{Context, Result};
use qrstream_core::scheduler::{transmit, FrameRenderer, ScheduledFrame};
use qrstream_core::{ContentBuilder, FrameError, TransferConfig, TransmissionScheduler};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tracing::info;

/// Writes each payload as one line, standing in for the code display
pub struct LineRenderer<W: Write> {
    writer: W,
}

impl<W: Write> LineRenderer<W> {
    /// Render into `writer`
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Flush and hand back the writer
    pub fn finish(mut self) -> io::Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write> FrameRenderer for LineRenderer<W> {
    fn render(&mut self, frame: &ScheduledFrame) -> Result<(), FrameError> {
        self.writer.write_all(&frame.payload)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Frame `input` and show its payloads, one line each
///
/// Payloads go to `output`, or stdout when it is `None`. `rounds` bounds the
/// number of rounds; `None` repeats forever. Returns the number of payloads
/// written.
pub async fn execute(
    input: &str,
    output: Option<&str>,
    config: &TransferConfig,
    rounds: Option<u64>,
) -> Result<u64> {
    let data = fs::read(input).with_context(|| format!("Failed to read input file: {}", input))?;
    let path = Path::new(input);
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Input has no usable file name: {}", input))?;

    info!(
        "Sending {} ({} bytes, blake3 {})",
        name,
        data.len(),
        blake3::hash(&data).to_hex()
    );

    let payload = data_url::encode(data_url::media_type(path), &data);
    let frames = ContentBuilder::new(name)
        .payload(payload.into_bytes())
        .data_capacity(config.data_capacity()?)
        .build()
        .context("Failed to frame input")?;

    info!(
        "{} content frames of up to {} bytes",
        frames.len(),
        frames.max_frame_len()
    );

    let mut scheduler = TransmissionScheduler::new(frames).with_capacity_limit(config.capacity_total)?;
    info!("{} payloads per round", scheduler.round_len());

    let writer: Box<dyn Write + Send> = match output {
        Some(output) => Box::new(
            fs::File::create(output)
                .with_context(|| format!("Failed to create output file: {}", output))?,
        ),
        None => Box::new(io::stdout()),
    };

    let mut renderer = LineRenderer::new(writer);
    let shown = transmit(&mut scheduler, &mut renderer, config.frame_interval(), rounds).await?;
    renderer.finish()?;

    info!("Shown {} payloads in {} rounds", shown, scheduler.round() - 1);
    Ok(shown)
}
