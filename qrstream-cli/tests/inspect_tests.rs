use std::fs;
use tempfile::tempdir;

use qrstream_cli::commands::inspect::{self, PayloadInfo};
use qrstream_cli::commands::simulate::{self, SimulateOptions};
use qrstream_cli::OutputFormat;
use qrstream_core::{ContentBuilder, TransferConfig, TransmissionScheduler};

fn write_capture(path: &std::path::Path) -> usize {
    let set = ContentBuilder::new("x.txt")
        .payload(b"captured payload for inspection".to_vec())
        .data_capacity(12)
        .build()
        .unwrap();
    let n = set.len();
    let mut scheduler = TransmissionScheduler::new(set);

    let mut text = String::new();
    for _ in 0..scheduler.round_len() {
        let frame = scheduler.next_frame().unwrap();
        text.push_str(std::str::from_utf8(&frame.payload).unwrap());
        text.push('\n');
    }
    text.push_str("garbage\n\n");
    fs::write(path, text).unwrap();
    n
}

#[test]
fn inspect_text_classifies_every_line() {
    let td = tempdir().unwrap();
    let in_path = td.path().join("capture.txt");
    let n = write_capture(&in_path);

    let lines = inspect::execute(in_path.to_str().unwrap(), OutputFormat::Text, None).unwrap();

    let content: Vec<usize> = lines
        .iter()
        .filter_map(|l| match l.info {
            PayloadInfo::Content { index, .. } => Some(index),
            _ => None,
        })
        .collect();
    assert_eq!(content, (0..n).collect::<Vec<_>>());

    let corrections = lines
        .iter()
        .filter(|l| matches!(l.info, PayloadInfo::Correction { .. }))
        .count();
    assert!(corrections >= 10);

    let last = lines.last().unwrap();
    assert!(matches!(last.info, PayloadInfo::Invalid { .. }));
    assert_eq!(last.line, lines.len());
}

#[test]
fn inspect_json_to_file() {
    let td = tempdir().unwrap();
    let in_path = td.path().join("capture.txt");
    let out_path = td.path().join("inspect.json");
    write_capture(&in_path);

    let lines = inspect::execute(
        in_path.to_str().unwrap(),
        OutputFormat::Json,
        out_path.to_str(),
    )
    .unwrap();

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out_path).unwrap()).unwrap();
    let array = json.as_array().unwrap();
    assert_eq!(array.len(), lines.len());
    assert_eq!(array[0]["kind"], "content");
    assert_eq!(array[0]["index"], 0);
    assert_eq!(array.last().unwrap()["kind"], "invalid");
}

#[test]
fn simulate_file_completes() {
    let td = tempdir().unwrap();
    let in_path = td.path().join("report.csv");
    let data: String = (0..200).map(|i| format!("{},{}\n", i, i * i)).collect();
    fs::write(&in_path, &data).unwrap();

    let options = SimulateOptions {
        loss: 0.25,
        seed: 3,
        max_rounds: 40,
    };
    let report = simulate::execute(
        in_path.to_str().unwrap(),
        &TransferConfig::new(300, 0),
        options,
    )
    .unwrap();

    assert!(report.completed);
    assert!(report.rounds <= 40);
}
