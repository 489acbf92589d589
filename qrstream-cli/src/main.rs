use anyhow::Result;
use clap::{Parser, Subcommand};
use qrstream_cli::commands::simulate::SimulateOptions;
use qrstream_cli::{commands, config, OutputFormat};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "qrstream")]
#[command(about = "qrstream - One-way file transfer over a stream of optical codes", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON transfer configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Frame a file and write its payloads, one per line
    Send {
        /// File to send
        #[arg(short, long)]
        input: String,

        /// Output file for payloads (stdout when omitted)
        #[arg(short, long)]
        output: Option<String>,

        /// Largest payload one code carries, in bytes
        #[arg(long)]
        capacity: Option<usize>,

        /// Milliseconds between payloads
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Number of rounds to send
        #[arg(long, default_value = "1")]
        rounds: u64,

        /// Repeat rounds until interrupted
        #[arg(long = "loop", conflicts_with = "rounds")]
        repeat: bool,
    },

    /// Read scanned payloads, one per line, and save completed files
    Receive {
        /// File with scanned payloads (stdin when omitted)
        #[arg(short, long)]
        input: Option<String>,

        /// Directory for received files
        #[arg(short = 'd', long, default_value = ".")]
        output_dir: String,

        /// Hide the progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Classify captured payloads without reassembling anything
    Inspect {
        /// File with payloads, one per line
        #[arg(short, long)]
        input: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Write the result to a file instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Send a file through a simulated lossy channel
    Simulate {
        /// File to send
        #[arg(short, long)]
        input: String,

        /// Probability that a payload is lost
        #[arg(long, default_value = "0.1")]
        loss: f64,

        /// Seed for the loss channel
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Largest payload one code carries, in bytes
        #[arg(long)]
        capacity: Option<usize>,

        /// Give up after this many rounds
        #[arg(long, default_value = "20")]
        max_rounds: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging; payloads may go to stdout
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Send {
            input,
            output,
            capacity,
            interval_ms,
            rounds,
            repeat,
        } => {
            let config = config::load(cli.config.as_deref(), capacity, interval_ms)?;
            let rounds = if repeat { None } else { Some(rounds) };
            commands::send::execute(&input, output.as_deref(), &config, rounds).await?;
        }

        Commands::Receive {
            input,
            output_dir,
            no_progress,
        } => {
            let summary =
                commands::receive::execute(input.as_deref(), &output_dir, !no_progress).await?;
            if summary.saved.is_empty() {
                anyhow::bail!("No file was completed");
            }
        }

        Commands::Inspect {
            input,
            format,
            output,
        } => {
            commands::inspect::execute(&input, format, output.as_deref())?;
        }

        Commands::Simulate {
            input,
            loss,
            seed,
            capacity,
            max_rounds,
        } => {
            let config = config::load(cli.config.as_deref(), capacity, Some(0))?;
            let options = SimulateOptions {
                loss,
                seed,
                max_rounds,
            };
            let report = commands::simulate::execute(&input, &config, options)?;
            if !report.completed {
                anyhow::bail!("Simulated transfer did not complete");
            }
        }
    }

    Ok(())
}
