use std::sync::atomic::{AtomicU64, Ordering};

/// Sentinel for "no overflow recorded".
const NO_OVERFLOW: u64 = u64::MAX;

/// Run-scoped capture state, shared between the capture and writer threads.
///
/// Mutated by the ingest validator only; read from both sides, so every
/// field is an atomic. `bytes_received` counts everything delivered by the
/// hardware including the warm-up run; `bytes_accepted` counts only bytes
/// forwarded into the handoff queue.
#[derive(Debug)]
pub struct CaptureSession {
    /// Byte budget for the session. 0 means unbounded.
    bytes_wanted: u64,
    bytes_received: AtomicU64,
    bytes_accepted: AtomicU64,
    /// Bytes refused by a saturated bounded queue (backpressure).
    bytes_refused: AtomicU64,
    /// Accepted-stream offset of the first detected hardware overflow.
    overflow_offset: AtomicU64,
}

impl CaptureSession {
    pub fn new(bytes_wanted: u64) -> Self {
        Self {
            bytes_wanted,
            bytes_received: AtomicU64::new(0),
            bytes_accepted: AtomicU64::new(0),
            bytes_refused: AtomicU64::new(0),
            overflow_offset: AtomicU64::new(NO_OVERFLOW),
        }
    }

    pub fn bytes_wanted(&self) -> u64 {
        self.bytes_wanted
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }

    pub fn bytes_accepted(&self) -> u64 {
        self.bytes_accepted.load(Ordering::Relaxed)
    }

    pub fn bytes_refused(&self) -> u64 {
        self.bytes_refused.load(Ordering::Relaxed)
    }

    /// Returns the previous total, like `fetch_add`.
    pub(crate) fn add_received(&self, n: u64) -> u64 {
        self.bytes_received.fetch_add(n, Ordering::Relaxed)
    }

    pub(crate) fn add_accepted(&self, n: u64) -> u64 {
        self.bytes_accepted.fetch_add(n, Ordering::Relaxed)
    }

    pub(crate) fn add_refused(&self, n: u64) {
        self.bytes_refused.fetch_add(n, Ordering::Relaxed);
    }

    /// Record the accepted-stream offset of a hardware overflow.
    /// First write wins; later detections are ignored.
    pub(crate) fn record_overflow(&self, offset: u64) {
        let _ = self.overflow_offset.compare_exchange(
            NO_OVERFLOW,
            offset,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    pub fn overflow_offset(&self) -> Option<u64> {
        match self.overflow_offset.load(Ordering::SeqCst) {
            NO_OVERFLOW => None,
            offset => Some(offset),
        }
    }

    /// True once the configured byte budget has been met.
    pub fn budget_reached(&self) -> bool {
        self.bytes_wanted != 0 && self.bytes_accepted() >= self.bytes_wanted
    }
}
