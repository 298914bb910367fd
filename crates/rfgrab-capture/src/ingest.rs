use std::sync::Arc;

use crate::packing::fifo_overflow;
use crate::queue::QueueProducer;
use crate::session::CaptureSession;
use crate::source::{StreamControl, StreamProgress};
use rfgrab_foundation::ShutdownFlag;

/// Bytes discarded at the start of a capture while the upstream hardware
/// FIFOs drain transient garbage.
pub const DEFAULT_FLUSH_BYTES: u64 = 50_000;

#[derive(Debug, Clone, Copy)]
pub struct IngestConfig {
    pub flush_bytes: u64,
    pub verbose: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            flush_bytes: DEFAULT_FLUSH_BYTES,
            verbose: false,
        }
    }
}

/// The capture-thread callback: validates and forwards each chunk the
/// driver delivers.
///
/// Runs on the driver's hot path, so it never blocks on the consumer: a
/// saturated bounded queue results in a short push that is counted and
/// reported as backpressure. A cleared health bit is fatal for the whole
/// session; the clean prefix of that chunk is still forwarded, nothing at
/// or past the bad byte is.
pub struct IngestValidator {
    session: Arc<CaptureSession>,
    producer: Option<QueueProducer>,
    shutdown: ShutdownFlag,
    cfg: IngestConfig,
}

impl IngestValidator {
    pub fn new(
        session: Arc<CaptureSession>,
        producer: Option<QueueProducer>,
        shutdown: ShutdownFlag,
        cfg: IngestConfig,
    ) -> Self {
        Self {
            session,
            producer,
            shutdown,
            cfg,
        }
    }

    pub fn on_chunk(&mut self, buf: &[u8], progress: Option<&StreamProgress>) -> StreamControl {
        if self.shutdown.is_requested() {
            return StreamControl::Stop;
        }

        if !buf.is_empty() {
            let received_before = self.session.add_received(buf.len() as u64);
            let skip = self
                .cfg
                .flush_bytes
                .saturating_sub(received_before)
                .min(buf.len() as u64) as usize;
            self.accept(&buf[skip..]);
        }

        if self.cfg.verbose {
            if let Some(p) = progress {
                tracing::info!(
                    "{:8.2}s {:9.3} MiB captured {:7.1} kB/s curr {:7.1} kB/s total",
                    p.elapsed.as_secs_f64(),
                    p.total_bytes as f64 / (1024.0 * 1024.0),
                    p.current_rate / 1024.0,
                    p.total_rate / 1024.0,
                );
            }
        }

        if self.shutdown.is_requested() {
            StreamControl::Stop
        } else {
            StreamControl::Continue
        }
    }

    fn accept(&mut self, candidate: &[u8]) {
        if candidate.is_empty() {
            return;
        }

        let accepted_base = self.session.bytes_accepted();

        // Every byte carries the hardware's active-low overflow flag; a
        // cleared flag means the sample stream has a discontinuity.
        let clean = match candidate.iter().position(|&b| fifo_overflow(b)) {
            Some(i) => {
                let offset = accepted_base + i as u64;
                self.session.record_overflow(offset);
                tracing::error!(
                    "hardware FIFO overflow flag set at byte offset {offset}; stopping capture"
                );
                self.shutdown.request();
                &candidate[..i]
            }
            None => candidate,
        };

        let clean = match self.session.bytes_wanted() {
            0 => clean,
            wanted => {
                let remaining = wanted.saturating_sub(accepted_base) as usize;
                &clean[..clean.len().min(remaining)]
            }
        };

        if clean.is_empty() {
            // Budget already met or chunk began with the bad byte.
        } else if let Some(producer) = &self.producer {
            let pushed = producer.push(clean);
            self.session.add_accepted(pushed as u64);
            if pushed < clean.len() {
                let refused = (clean.len() - pushed) as u64;
                self.session.add_refused(refused);
                tracing::warn!(refused, "handoff queue saturated, bytes not forwarded");
            }
        } else {
            // No output file configured: validate and count only.
            self.session.add_accepted(clean.len() as u64);
        }

        if self.session.budget_reached() {
            tracing::info!(
                "sample budget reached after {} bytes",
                self.session.bytes_accepted()
            );
            self.shutdown.request();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::ByteQueue;

    fn validator(
        wanted: u64,
        flush: u64,
        capacity: Option<usize>,
    ) -> (IngestValidator, Arc<CaptureSession>, ShutdownFlag, crate::queue::QueueConsumer) {
        let session = Arc::new(CaptureSession::new(wanted));
        let shutdown = ShutdownFlag::new();
        let (tx, rx) = ByteQueue::with_capacity(capacity);
        let v = IngestValidator::new(
            Arc::clone(&session),
            Some(tx),
            shutdown.clone(),
            IngestConfig {
                flush_bytes: flush,
                verbose: false,
            },
        );
        (v, session, shutdown, rx)
    }

    fn drain(rx: &crate::queue::QueueConsumer) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0u8; 64];
        while !rx.is_empty() {
            let n = rx.pop(&mut buf);
            out.extend_from_slice(&buf[..n]);
        }
        out
    }

    #[test]
    fn warm_up_bytes_are_discarded() {
        let (mut v, session, _, rx) = validator(0, 4, None);
        assert_eq!(v.on_chunk(&[0x01; 3], None), StreamControl::Continue);
        assert_eq!(session.bytes_accepted(), 0);
        // One more flush byte to go; the rest of this chunk is accepted.
        assert_eq!(v.on_chunk(&[0x01, 0x03, 0x05], None), StreamControl::Continue);
        assert_eq!(session.bytes_received(), 6);
        assert_eq!(session.bytes_accepted(), 2);
        assert_eq!(drain(&rx), vec![0x03, 0x05]);
    }

    #[test]
    fn budget_terminates_exactly() {
        let (mut v, session, shutdown, rx) = validator(10, 0, None);
        assert_eq!(v.on_chunk(&[0x01; 6], None), StreamControl::Continue);
        assert!(!shutdown.is_requested());
        // Chunk crosses the budget; the accepted slice is cut at it.
        assert_eq!(v.on_chunk(&[0x01; 6], None), StreamControl::Stop);
        assert!(shutdown.is_requested());
        assert_eq!(session.bytes_accepted(), 10);
        assert_eq!(drain(&rx).len(), 10);
        // Later invocations stop immediately without forwarding.
        assert_eq!(v.on_chunk(&[0x01; 6], None), StreamControl::Stop);
        assert_eq!(session.bytes_accepted(), 10);
    }

    #[test]
    fn overflow_is_fatal_and_truncates() {
        let (mut v, session, shutdown, rx) = validator(0, 0, None);
        // Byte 2 has the active-low error flag cleared.
        let chunk = [0x01, 0x03, 0x04, 0x05, 0x07];
        assert_eq!(v.on_chunk(&chunk, None), StreamControl::Stop);
        assert!(shutdown.is_requested());
        assert_eq!(session.overflow_offset(), Some(2));
        // Clean prefix forwarded, nothing at or past the bad byte.
        assert_eq!(drain(&rx), vec![0x01, 0x03]);
        assert_eq!(session.bytes_accepted(), 2);
    }

    #[test]
    fn saturated_bounded_queue_is_counted() {
        let (mut v, session, shutdown, rx) = validator(0, 0, Some(4));
        assert_eq!(v.on_chunk(&[0x01; 6], None), StreamControl::Continue);
        assert!(!shutdown.is_requested());
        assert_eq!(session.bytes_accepted(), 4);
        assert_eq!(session.bytes_refused(), 2);
        assert_eq!(drain(&rx).len(), 4);
    }

    #[test]
    fn counts_without_forwarding_when_no_sink() {
        let session = Arc::new(CaptureSession::new(8));
        let shutdown = ShutdownFlag::new();
        let mut v = IngestValidator::new(
            Arc::clone(&session),
            None,
            shutdown.clone(),
            IngestConfig {
                flush_bytes: 0,
                verbose: false,
            },
        );
        assert_eq!(v.on_chunk(&[0x01; 8], None), StreamControl::Stop);
        assert_eq!(session.bytes_accepted(), 8);
        assert!(shutdown.is_requested());
    }
}
