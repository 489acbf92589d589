//! Example: frame a small file and read it back in order

use qrstream_core::{ContentBuilder, Session, TransmissionScheduler};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("qrstream Basic Transfer Example\n");

    let text = "The quick brown fox jumps over the lazy dog. ".repeat(8);

    // Step 1: Frame the file
    let frames = ContentBuilder::new("notes/fox.txt")
        .payload(text.clone().into_bytes())
        .data_capacity(64)
        .build()?;

    println!("Content hash: {:#010x}", frames.hash());
    println!("Content stream: {} bytes in {} frames\n", frames.content_len(), frames.len());

    // Step 2: Show one round
    let mut scheduler = TransmissionScheduler::new(frames);
    println!("One round is {} payloads:", scheduler.round_len());
    let mut session = Session::new();

    for _ in 0..scheduler.round_len() {
        let frame = scheduler.next_frame()?;
        let preview: String = String::from_utf8_lossy(&frame.payload).chars().take(40).collect();
        println!("  {:?}: {}", frame.kind, preview);

        // Step 3: Scan it
        let report = session.on_scan(&frame.payload)?;
        if let Some(file) = report.completed {
            println!("\nReceived {} ({} bytes)", file.path, file.payload.len());
            assert_eq!(&file.payload[..], text.as_bytes());
        }
    }

    let status = session.status();
    println!("\nFrames received: {}", status.received);
    println!("Corrections cached: {}", status.cached_corrections);

    Ok(())
}
