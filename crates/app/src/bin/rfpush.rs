//! Replay a raw sample file back into the test rig over the synchronous
//! FIFO, the mirror image of the capture path.

use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;

use rfgrab_app::is_clean_cli_exit;
use rfgrab_capture::packing::SAMPLES_PER_BYTE;
use rfgrab_capture::FtdiSyncFifo;
use rfgrab_foundation::{parse_pid, parse_size, AppError, ShutdownFlag};

/// Bulk-out transfers of this size keep the FIFO fed without long stalls.
const DEFAULT_CHUNK_BYTES: usize = 4096;

#[derive(Parser, Debug)]
#[command(name = "rfpush")]
#[command(version)]
#[command(about = "Stream a raw sample file to the RF front-end test rig")]
#[command(
    long_about = "Pushes samples from a capture file back to the device over the \
synchronous FIFO. The front-end must already be in FIFO mode. \
Stops at end of file, at the sample budget, or on Ctrl-C."
)]
struct Cli {
    /// File to read samples from
    filename: PathBuf,

    /// Number of samples to push before exiting (suffix k, M or G)
    #[arg(short = 's', long, value_name = "N")]
    size: Option<String>,

    /// USB product id of the front-end, in hex
    #[arg(short = 'i', long, value_name = "PID")]
    id: Option<String>,

    /// Bulk transfer size in bytes (suffix k, M or G)
    #[arg(short = 'c', long, value_name = "SIZE")]
    chunk: Option<String>,

    /// Print progress information
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() -> ExitCode {
    // clap's own exit path reports argument errors with code 2; route
    // them through the documented failure code instead.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if is_clean_cli_exit(e.kind()) {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            };
        }
    };
    let default = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let bytes_wanted = match &cli.size {
        Some(s) => parse_size(s)?.div_ceil(SAMPLES_PER_BYTE),
        None => 0,
    };
    let chunk_bytes = match &cli.chunk {
        Some(s) => parse_size(s)? as usize,
        None => DEFAULT_CHUNK_BYTES,
    };
    let pid = cli.id.as_deref().map(parse_pid).transpose()?;

    let shutdown = ShutdownFlag::new();
    {
        let flag = shutdown.clone();
        ctrlc::set_handler(move || flag.request())
            .map_err(|e| AppError::Fatal(format!("failed to install signal handler: {e}")))?;
    }

    let mut file = File::open(&cli.filename)
        .with_context(|| format!("cannot open sample file {}", cli.filename.display()))?;
    let device = FtdiSyncFifo::open(pid)?;
    device.purge_tx()?;

    tracing::info!("pushing samples from {}", cli.filename.display());
    let start = Instant::now();
    let mut buf = vec![0u8; chunk_bytes.max(1)];
    let mut total: u64 = 0;
    let mut last_report = Instant::now();

    while !shutdown.is_requested() {
        let remaining = match bytes_wanted {
            0 => buf.len(),
            wanted => {
                let left = wanted.saturating_sub(total) as usize;
                if left == 0 {
                    break;
                }
                buf.len().min(left)
            }
        };
        let n = file
            .read(&mut buf[..remaining])
            .with_context(|| format!("read failed at byte offset {total}"))?;
        if n == 0 {
            tracing::info!("end of sample file");
            break;
        }

        // Bulk writes can be short; keep the stream gapless by finishing
        // the chunk before reading the next one.
        let mut sent = 0;
        while sent < n && !shutdown.is_requested() {
            sent += device.write_samples(&buf[sent..n])?;
        }
        total += sent as u64;

        if cli.verbose && last_report.elapsed().as_secs() >= 1 {
            let elapsed = start.elapsed().as_secs_f64();
            tracing::info!(
                "{:8.2}s {:9.3} MiB pushed {:7.1} kB/s",
                elapsed,
                total as f64 / (1024.0 * 1024.0),
                total as f64 / elapsed.max(f64::EPSILON) / 1024.0,
            );
            last_report = Instant::now();
        }
    }

    tracing::info!(bytes = total, "sample pushing ended");
    Ok(())
}
