use rfgrab_foundation::DeviceError;
use std::time::Duration;

/// Continue/stop indicator returned by the per-chunk callback. Returning
/// [`StreamControl::Stop`] is the only way the streaming call terminates
/// normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamControl {
    Continue,
    Stop,
}

/// Transfer statistics handed to the callback roughly once per second.
#[derive(Debug, Clone, Copy)]
pub struct StreamProgress {
    pub elapsed: Duration,
    pub total_bytes: u64,
    /// Rate over the last reporting window, bytes per second.
    pub current_rate: f64,
    /// Rate over the whole stream, bytes per second.
    pub total_rate: f64,
}

/// A source of raw sample chunks: the driver-owned side of the pipeline.
///
/// `stream` blocks, invoking the callback once per received chunk on the
/// calling thread, until the callback returns `Stop` or the transport
/// fails. The callback sits on the driver's hot path and must return
/// within bounded time.
pub trait SampleSource {
    fn stream(
        &mut self,
        on_chunk: &mut dyn FnMut(&[u8], Option<&StreamProgress>) -> StreamControl,
    ) -> Result<(), DeviceError>;
}
