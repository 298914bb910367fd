use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::SystemTime;

use clap::Parser;

use rfgrab_capture::ingest::DEFAULT_FLUSH_BYTES;
use rfgrab_capture::packing::SAMPLES_PER_BYTE;
use rfgrab_capture::writer::{FileSink, DEFAULT_CHUNK_BYTES};
use rfgrab_capture::{
    ByteQueue, CaptureSession, FtdiSyncFifo, IngestConfig, IngestValidator, PackingMode,
    SampleSource, SinkConfig, SinkWriterThread,
};
use rfgrab_app::is_clean_cli_exit;
use rfgrab_foundation::{parse_pid, parse_size, AppError, ShutdownFlag};

#[derive(Parser, Debug)]
#[command(name = "rfgrab")]
#[command(version)]
#[command(about = "Stream raw RF samples from the USB front-end to disk")]
#[command(
    long_about = "Streams raw samples from the RF front-end's synchronous FIFO to disk. \
The front-end must already be in FIFO mode (see the mode-setting tools). \
End the capture with Ctrl-C; queued samples are drained to disk before exit."
)]
struct Cli {
    /// File to save samples to; omit to validate the stream without saving
    filename: Option<PathBuf>,

    /// Number of samples to collect before exiting (suffix k, M or G)
    #[arg(short = 's', long, value_name = "N")]
    size: Option<String>,

    /// USB product id of the front-end, in hex
    #[arg(short = 'i', long, value_name = "PID")]
    id: Option<String>,

    /// Pack sign bits only: four raw bytes per output byte
    #[arg(short = '1', long)]
    onebit: bool,

    /// Rotate the output file every SECONDS seconds; bare -r means 3600,
    /// an explicit interval is given as -r=SECONDS
    #[arg(short = 'r', long, value_name = "SECONDS", num_args = 0..=1, require_equals = true, default_missing_value = "3600")]
    rotate: Option<u64>,

    /// Writer chunk size in bytes (suffix k, M or G)
    #[arg(short = 'c', long, value_name = "SIZE")]
    chunk: Option<String>,

    /// Print progress information while capturing
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
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
    init_logging(cli.verbose);
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
    install_interrupt_handler(shutdown.clone())?;

    // All setup happens before either pipeline thread starts, so setup
    // failures terminate here with a plain diagnostic.
    let session = Arc::new(CaptureSession::new(bytes_wanted));
    let mut source = FtdiSyncFifo::open(pid)?;

    let (producer, writer) = match &cli.filename {
        Some(path) => {
            let cfg = SinkConfig {
                path: path.clone(),
                chunk_bytes,
                rotate_secs: cli.rotate,
                packing: if cli.onebit {
                    PackingMode::OneBit
                } else {
                    PackingMode::Passthrough
                },
            };
            let (producer, consumer) = ByteQueue::with_capacity(None);
            let sink = FileSink::open(cfg, SystemTime::now())?;
            let writer = SinkWriterThread::spawn(sink, consumer, shutdown.clone())?;
            (Some(producer), Some(writer))
        }
        None => {
            tracing::warn!("no filename given, validating the stream without saving");
            (None, None)
        }
    };

    let mut validator = IngestValidator::new(
        Arc::clone(&session),
        producer,
        shutdown.clone(),
        IngestConfig {
            flush_bytes: DEFAULT_FLUSH_BYTES,
            verbose: cli.verbose,
        },
    );

    tracing::info!("capture started");
    let stream_result = source.stream(&mut |buf, progress| validator.on_chunk(buf, progress));

    // Dropping the validator drops the queue producer, which closes the
    // queue; the writer drains everything already accepted, then exits.
    drop(validator);
    drop(source);

    let writer_result = writer.map(SinkWriterThread::join);

    match stream_result {
        Ok(()) => {}
        // A transport error after shutdown was already requested is noise,
        // not a failure.
        Err(e) if shutdown.is_requested() => {
            tracing::warn!("transport error during shutdown: {e}")
        }
        Err(e) => return Err(e.into()),
    }

    if let Some(result) = writer_result {
        let stats = result?;
        tracing::info!(
            bytes_written = stats.bytes_written,
            files = stats.files_opened,
            "capture complete"
        );
    }

    tracing::info!(
        received = session.bytes_received(),
        accepted = session.bytes_accepted(),
        refused = session.bytes_refused(),
        "session totals"
    );
    if let Some(offset) = session.overflow_offset() {
        tracing::error!("{}", AppError::StreamIntegrity { offset });
        tracing::error!("output ends at a discontinuity; samples past that offset were lost upstream");
    }
    Ok(())
}

fn install_interrupt_handler(shutdown: ShutdownFlag) -> Result<(), AppError> {
    ctrlc::set_handler(move || {
        if shutdown.is_requested() {
            // Shutdown already in progress; repeat deliveries are ignored.
            return;
        }
        tracing::info!("interrupt received, stopping capture");
        shutdown.request();
    })
    .map_err(|e| AppError::Fatal(format!("failed to install signal handler: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_representative_invocation() {
        let cli = Cli::parse_from([
            "rfgrab", "-s", "16M", "-1", "-r", "-c", "512k", "-v", "samples.bin",
        ]);
        assert_eq!(cli.filename, Some(PathBuf::from("samples.bin")));
        assert_eq!(cli.size.as_deref(), Some("16M"));
        assert!(cli.onebit);
        assert_eq!(cli.rotate, Some(3600));
        assert_eq!(cli.chunk.as_deref(), Some("512k"));
        assert!(cli.verbose);
    }

    #[test]
    fn rotate_accepts_explicit_interval() {
        let cli = Cli::parse_from(["rfgrab", "--rotate=60", "samples.bin"]);
        assert_eq!(cli.rotate, Some(60));
        let cli = Cli::parse_from(["rfgrab", "-r=60", "samples.bin"]);
        assert_eq!(cli.rotate, Some(60));
        let cli = Cli::parse_from(["rfgrab", "samples.bin"]);
        assert_eq!(cli.rotate, None);
    }

    #[test]
    fn bare_rotate_does_not_swallow_the_filename() {
        let cli = Cli::parse_from(["rfgrab", "-r", "samples.bin"]);
        assert_eq!(cli.rotate, Some(3600));
        assert_eq!(cli.filename, Some(PathBuf::from("samples.bin")));
    }

    #[test]
    fn argument_errors_map_to_failure_exit() {
        let err = Cli::try_parse_from(["rfgrab", "--rotate=abc"]).unwrap_err();
        assert!(!is_clean_cli_exit(err.kind()));
        let err = Cli::try_parse_from(["rfgrab", "--no-such-flag"]).unwrap_err();
        assert!(!is_clean_cli_exit(err.kind()));
        let err = Cli::try_parse_from(["rfgrab", "--help"]).unwrap_err();
        assert!(is_clean_cli_exit(err.kind()));
    }
}
