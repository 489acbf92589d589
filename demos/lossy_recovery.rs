//! Example: recovering lost frames from correction frames

use qrstream_core::{ContentBuilder, FrameKind, ScanResult, Session, TransmissionScheduler};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("qrstream Lossy Recovery Example\n");

    let payload: Vec<u8> = (0..1_500u32).map(|i| b'a' + (i % 26) as u8).collect();
    let frames = ContentBuilder::new("alphabet.txt")
        .payload(payload.clone())
        .data_capacity(100)
        .build()?;
    let n = frames.len();
    println!("Sending {} content frames", n);

    let mut scheduler = TransmissionScheduler::new(frames);
    let mut session = Session::new();
    let mut shown = 0;

    // Lose every third content frame of the first round; keep all corrections
    loop {
        let frame = scheduler.next_frame()?;
        shown += 1;

        if let FrameKind::Content { index } = frame.kind {
            if frame.round == 1 && index % 3 == 1 {
                println!("  lost frame {}", index);
                continue;
            }
        }

        let report = session.on_scan(&frame.payload)?;
        if report.result == ScanResult::CorrectionDecoded || !report.recovered.is_empty() {
            println!(
                "  {} → frame {:?}, also recovered {:?}",
                report.result, report.frame, report.recovered
            );
        }

        if let Some(file) = report.completed {
            assert_eq!(&file.payload[..], &payload[..]);
            println!(
                "\nReceived {} after {} payloads (round {})",
                file.path, shown, frame.round
            );
            break;
        }
    }

    Ok(())
}
