use crate::data_url;
use anyhow::{Context, Result};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use qrstream_core::{ProcessingQueue, ReceivedFile, ReceiverEvent, Submission, TransferStatus};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

/// Totals of one receive run
#[derive(Debug, Default)]
pub struct ReceiveSummary {
    /// Lines read
    pub scanned: usize,

    /// Lines dropped as repeats of the previous one
    pub duplicates: usize,

    /// Lines the session rejected
    pub rejected: usize,

    /// Files written
    pub saved: Vec<PathBuf>,

    /// Receiver state at the end
    pub status: TransferStatus,
}

/// Read payload lines from `input` (stdin when `None`) and save completed
/// files into `output_dir`
pub async fn execute(input: Option<&str>, output_dir: &str, progress: bool) -> Result<ReceiveSummary> {
    let summary = match input {
        Some(path) => {
            info!("Reading payloads from {}", path);
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open input file: {}", path))?;
            receive_from(file, Path::new(output_dir), progress).await?
        }
        None => {
            info!("Reading payloads from stdin");
            receive_from(tokio::io::stdin(), Path::new(output_dir), progress).await?
        }
    };

    print_summary(&summary);
    Ok(summary)
}

/// Feed every line of `reader` through a processing queue
pub async fn receive_from<R>(reader: R, output_dir: &Path, progress: bool) -> Result<ReceiveSummary>
where
    R: AsyncRead + Unpin,
{
    let (mut queue, events) = ProcessingQueue::spawn();
    let bar = if progress {
        ProgressBar::new(0)
    } else {
        ProgressBar::hidden()
    };
    let handler = tokio::spawn(handle_events(events, output_dir.to_path_buf(), bar));

    let mut scanned = 0;
    let mut duplicates = 0;
    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read payload line")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        scanned += 1;
        match queue.submit(line.as_bytes().to_vec()) {
            Submission::Queued => {}
            Submission::Duplicate => duplicates += 1,
            Submission::Closed => anyhow::bail!("Receiver worker stopped"),
        }
    }

    let session = queue.shutdown().await?;
    let handled = handler.await.context("Event handler panicked")??;

    Ok(ReceiveSummary {
        scanned,
        duplicates,
        rejected: handled.rejected,
        saved: handled.saved,
        status: session.status(),
    })
}

#[derive(Default)]
struct Handled {
    rejected: usize,
    saved: Vec<PathBuf>,
}

async fn handle_events(
    mut events: UnboundedReceiver<ReceiverEvent>,
    output_dir: PathBuf,
    bar: ProgressBar,
) -> Result<Handled> {
    let mut handled = Handled::default();

    while let Some(event) = events.recv().await {
        match event {
            ReceiverEvent::Metadata(metadata) => {
                info!(
                    "Receiving {} ({} frames)",
                    metadata.path, metadata.total_frames
                );
                bar.set_length(metadata.total_frames as u64);
                bar.set_style(
                    ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len} frames")
                        .context("Invalid progress template")?,
                );
                bar.set_message(metadata.path);
            }
            ReceiverEvent::Processed { report, pending } => {
                debug!(
                    "{} (frame {:?}, {} pending, missing {})",
                    report.result,
                    report.frame,
                    pending,
                    report.status.missing_ranges()
                );
                bar.set_position(report.status.received as u64);
            }
            ReceiverEvent::Rejected { error, .. } => {
                warn!("Ignoring payload: {}", error);
                handled.rejected += 1;
            }
            ReceiverEvent::Completed(file) => {
                let path = save(&file, &output_dir).await?;
                bar.println(format!("{} Saved {}", "✓".green(), path.display()));
                handled.saved.push(path);
            }
        }
    }

    bar.finish_and_clear();
    Ok(handled)
}

/// Write a completed file under the last component of its announced path
async fn save(file: &ReceivedFile, output_dir: &Path) -> Result<PathBuf> {
    let name = Path::new(&file.path)
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "received.bin".into());
    let path = output_dir.join(name);

    let data = data_url::decode(&file.payload)
        .with_context(|| format!("Failed to decode payload of {}", file.path))?;

    tokio::fs::create_dir_all(output_dir)
        .await
        .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;
    tokio::fs::write(&path, &data)
        .await
        .with_context(|| format!("Failed to write output file: {}", path.display()))?;

    info!(
        "Saved {} ({} bytes, blake3 {})",
        path.display(),
        data.len(),
        blake3::hash(&data).to_hex()
    );
    Ok(path)
}

fn print_summary(summary: &ReceiveSummary) {
    println!("\n=== Receive Results ===");
    println!("Payloads read:      {}", summary.scanned);
    println!("Repeated payloads:  {}", summary.duplicates);
    if summary.rejected > 0 {
        println!("Rejected payloads:  {}", summary.rejected.to_string().red());
    } else {
        println!("Rejected payloads:  {}", "0".green());
    }
    println!("Frames received:    {}", summary.status.received);
    if let Some(total) = summary.status.total_frames {
        println!("Frames in file:     {}", total);
    }
    println!();

    if summary.saved.is_empty() {
        println!("{} No file completed", "✗".red());
        if !summary.status.missing.is_empty() {
            println!("  Missing frames: {}", summary.status.missing_ranges());
        }
    } else {
        for path in &summary.saved {
            println!("{} Received {}", "✓".green(), path.display());
        }
    }
}
