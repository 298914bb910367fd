use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::SystemTime;

use chrono::{DateTime, Local};

use crate::packing::{pack_one_bit, PackingMode, PACK_RATIO};
use crate::queue::QueueConsumer;
use crate::rotation::{rotation_due, timestamped_path};
use rfgrab_foundation::{AppError, ShutdownFlag, StorageError};

/// Default writer chunk size in bytes.
pub const DEFAULT_CHUNK_BYTES: usize = 1_000_000;

#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Configured output path; rotation derives timestamped names from it.
    pub path: PathBuf,
    /// Raw bytes popped from the queue per write in passthrough mode.
    pub chunk_bytes: usize,
    /// Rotation interval in seconds; `None` disables rotation.
    pub rotate_secs: Option<u64>,
    pub packing: PackingMode,
}

impl SinkConfig {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            chunk_bytes: DEFAULT_CHUNK_BYTES,
            rotate_secs: None,
            packing: PackingMode::Passthrough,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WriterStats {
    /// Raw bytes handed to the sink (pre-packing).
    pub bytes_in: u64,
    /// Bytes actually written to disk (post-packing).
    pub bytes_written: u64,
    pub files_opened: u32,
}

/// Output file state: current handle, rotation bookkeeping and the one-bit
/// packing carry. Owned exclusively by the writer thread; the timestamp for
/// each write is injected so rotation is testable with synthetic clocks.
pub struct FileSink {
    cfg: SinkConfig,
    file: File,
    current_path: PathBuf,
    last_bucket: u64,
    carry: Vec<u8>,
    packed: Vec<u8>,
    stats: WriterStats,
}

impl FileSink {
    /// Open the initial output file. With rotation enabled every file in
    /// the session is timestamped, the first included, so all files share
    /// one naming scheme.
    pub fn open(cfg: SinkConfig, now: SystemTime) -> Result<Self, StorageError> {
        let (path, bucket) = match cfg.rotate_secs {
            Some(interval) => (
                timestamped_path(&cfg.path, DateTime::<Local>::from(now)),
                unix_secs(now) / interval.max(1),
            ),
            None => (cfg.path.clone(), 0),
        };
        let file = create_file(&path)?;
        tracing::info!("writing samples to {}", path.display());
        Ok(Self {
            cfg,
            file,
            current_path: path,
            last_bucket: bucket,
            carry: Vec::new(),
            packed: Vec::new(),
            stats: WriterStats {
                files_opened: 1,
                ..WriterStats::default()
            },
        })
    }

    pub fn current_path(&self) -> &Path {
        &self.current_path
    }

    pub fn stats(&self) -> WriterStats {
        self.stats
    }

    /// Write one popped chunk, rotating first if the time bucket changed.
    pub fn write(&mut self, raw: &[u8], now: SystemTime) -> Result<(), StorageError> {
        self.maybe_rotate(now)?;
        self.stats.bytes_in += raw.len() as u64;
        match self.cfg.packing {
            PackingMode::Passthrough => self.write_out_raw(raw),
            PackingMode::OneBit => {
                self.carry.extend_from_slice(raw);
                let whole = self.carry.len() / PACK_RATIO * PACK_RATIO;
                let mut packed = std::mem::take(&mut self.packed);
                packed.clear();
                pack_one_bit(&self.carry[..whole], &mut packed);
                self.carry.drain(..whole);
                let res = self.write_out_raw(&packed);
                self.packed = packed;
                res
            }
        }
    }

    fn write_out_raw(&mut self, bytes: &[u8]) -> Result<(), StorageError> {
        // A short write surfaces here as an error; silently truncated
        // output would corrupt the stream's self-consistency.
        self.file
            .write_all(bytes)
            .map_err(|source| StorageError::Write {
                offset: self.stats.bytes_written,
                source,
            })?;
        self.stats.bytes_written += bytes.len() as u64;
        Ok(())
    }

    fn maybe_rotate(&mut self, now: SystemTime) -> Result<(), StorageError> {
        let Some(interval) = self.cfg.rotate_secs else {
            return Ok(());
        };
        if let Some(bucket) = rotation_due(self.last_bucket, unix_secs(now), interval) {
            let path = timestamped_path(&self.cfg.path, DateTime::<Local>::from(now));
            tracing::info!("rotating output to {}", path.display());
            self.file = create_file(&path)?;
            self.current_path = path;
            self.last_bucket = bucket;
            self.stats.files_opened += 1;
        }
        Ok(())
    }

    /// Flush and close, returning the final statistics.
    pub fn finish(mut self) -> Result<WriterStats, StorageError> {
        if !self.carry.is_empty() {
            tracing::debug!(
                remainder = self.carry.len(),
                "discarding packing remainder shorter than one group"
            );
        }
        self.file.sync_all().map_err(|source| StorageError::Close {
            path: self.current_path.clone(),
            source,
        })?;
        Ok(self.stats)
    }
}

fn create_file(path: &Path) -> Result<File, StorageError> {
    File::create(path).map_err(|source| StorageError::Open {
        path: path.to_path_buf(),
        source,
    })
}

fn unix_secs(t: SystemTime) -> u64 {
    t.duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Handle to the dedicated writer thread.
pub struct SinkWriterThread {
    handle: JoinHandle<Result<WriterStats, StorageError>>,
}

impl SinkWriterThread {
    /// Spawn the writer loop. The sink is opened by the caller so setup
    /// failures are reported before any thread starts.
    pub fn spawn(
        sink: FileSink,
        consumer: QueueConsumer,
        shutdown: ShutdownFlag,
    ) -> Result<Self, AppError> {
        let handle = thread::Builder::new()
            .name("sink-writer".to_string())
            .spawn(move || run_writer(sink, consumer, shutdown))
            .map_err(|e| AppError::Fatal(format!("failed to spawn writer thread: {e}")))?;
        Ok(Self { handle })
    }

    pub fn join(self) -> Result<WriterStats, AppError> {
        let stats = self
            .handle
            .join()
            .map_err(|_| AppError::Fatal("writer thread panicked".into()))??;
        Ok(stats)
    }
}

fn run_writer(
    mut sink: FileSink,
    consumer: QueueConsumer,
    shutdown: ShutdownFlag,
) -> Result<WriterStats, StorageError> {
    tracing::info!("sink writer started");
    let pop_len = match sink.cfg.packing {
        PackingMode::OneBit => sink.cfg.chunk_bytes * PACK_RATIO,
        PackingMode::Passthrough => sink.cfg.chunk_bytes,
    };
    let mut buf = vec![0u8; pop_len.max(1)];

    // Popping until end-of-stream is the final drain: the capture side
    // closes the queue once its streaming call returns, and every byte
    // accepted before that is still popped and written here.
    loop {
        let n = consumer.pop(&mut buf);
        if n == 0 {
            break;
        }
        if let Err(e) = sink.write(&buf[..n], SystemTime::now()) {
            tracing::error!("sink writer: {e}");
            shutdown.request();
            return Err(e);
        }
    }

    let stats = sink.finish()?;
    tracing::info!(
        bytes_in = stats.bytes_in,
        bytes_written = stats.bytes_written,
        files = stats.files_opened,
        "sink writer stopped"
    );
    Ok(stats)
}
