use crate::data_url;
use anyhow::{Context, Result};
use colored::*;
use qrstream_core::{ContentBuilder, Session, TransferConfig, TransmissionScheduler};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Loss channel settings for a simulated transfer
#[derive(Debug, Clone, Copy)]
pub struct SimulateOptions {
    /// Probability that a shown payload is never scanned
    pub loss: f64,

    /// Seed of the loss channel
    pub seed: u64,

    /// Give up after this many rounds
    pub max_rounds: u64,
}

impl Default for SimulateOptions {
    fn default() -> Self {
        Self {
            loss: 0.1,
            seed: 0,
            max_rounds: 20,
        }
    }
}

/// Outcome of a simulated transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationReport {
    /// Payloads the sender showed
    pub shown: u64,

    /// Payloads that reached the receiver
    pub received: u64,

    /// Rounds started, including the one in progress at completion
    pub rounds: u64,

    /// Content frames rebuilt from corrections
    pub recovered: usize,

    /// Whether the receiver saved the file
    pub completed: bool,
}

/// Run the sender against a receiver over a seeded lossy channel
pub fn run(
    name: &str,
    data: &[u8],
    media_type: &str,
    config: &TransferConfig,
    options: SimulateOptions,
) -> Result<SimulationReport> {
    anyhow::ensure!(
        (0.0..1.0).contains(&options.loss),
        "Loss probability must be in [0, 1), got {}",
        options.loss
    );

    let payload = data_url::encode(media_type, data);
    let frames = ContentBuilder::new(name)
        .payload(payload.into_bytes())
        .data_capacity(config.data_capacity()?)
        .build()
        .context("Failed to frame input")?;
    let mut scheduler = TransmissionScheduler::new(frames).with_capacity_limit(config.capacity_total)?;
    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut session = Session::new();

    let mut report = SimulationReport {
        shown: 0,
        received: 0,
        rounds: 0,
        recovered: 0,
        completed: false,
    };

    while scheduler.round() <= options.max_rounds {
        let frame = scheduler.next_frame()?;
        report.shown += 1;
        report.rounds = frame.round;

        if rng.gen_bool(options.loss) {
            continue;
        }
        report.received += 1;

        let scan = match session.on_scan(&frame.payload) {
            Ok(scan) => scan,
            Err(e) => anyhow::bail!("Receiver rejected a sender payload: {}", e),
        };
        report.recovered += scan.recovered.len();
        if !scan.recovered.is_empty() {
            debug!("Recovered frames {:?} in round {}", scan.recovered, frame.round);
        }

        if let Some(file) = scan.completed {
            let decoded = data_url::decode(&file.payload)?;
            anyhow::ensure!(decoded == data, "Received file differs from the input");
            report.completed = true;
            break;
        }
    }

    Ok(report)
}

/// Simulate sending `input` and print the result
pub fn execute(input: &str, config: &TransferConfig, options: SimulateOptions) -> Result<SimulationReport> {
    let data = fs::read(input).with_context(|| format!("Failed to read input file: {}", input))?;
    let path = Path::new(input);
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Input has no usable file name: {}", input))?;

    info!(
        "Simulating {} ({} bytes) at {:.0}% loss, seed {}",
        name,
        data.len(),
        options.loss * 100.0,
        options.seed
    );

    let report = run(name, &data, data_url::media_type(path), config, options)?;

    println!("\n=== Simulation Results ===");
    println!("Payloads shown:     {}", report.shown);
    println!("Payloads received:  {}", report.received);
    println!("Rounds:             {}", report.rounds);
    println!("Recovered frames:   {}", report.recovered);
    if report.completed {
        println!("{} Transfer complete", "✓".green());
    } else {
        println!(
            "{} Not complete after {} rounds",
            "✗".red(),
            options.max_rounds
        );
    }

    Ok(report)
}
