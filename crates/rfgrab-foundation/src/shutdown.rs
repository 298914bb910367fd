use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag shared by the capture and writer threads.
///
/// Set from the SIGINT handler, from the ingest validator (budget reached or
/// hardware overflow detected), or from the sink writer (I/O error). Nothing
/// blocks indefinitely once the flag is set: the capture callback returns
/// stop on its next invocation and the writer performs a bounded final drain.
#[derive(Clone, Debug, Default)]
pub struct ShutdownFlag {
    requested: Arc<AtomicBool>,
}

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        if !self.requested.swap(true, Ordering::SeqCst) {
            tracing::debug!("shutdown requested");
        }
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}
