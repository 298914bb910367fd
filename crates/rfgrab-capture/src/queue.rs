use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;

/// Single-producer/single-consumer byte queue decoupling the capture thread
/// from disk I/O latency.
///
/// The producer never blocks: a bounded queue that is full accepts a short
/// push and reports the accepted count back to the caller. The consumer
/// blocks until bytes are available or the queue is closed; after close it
/// drains the residue and then reports end-of-stream. Slices are never
/// reordered, so bytes come out in exactly the order they went in.
pub struct ByteQueue;

struct State {
    buf: VecDeque<u8>,
    closed: bool,
}

struct Shared {
    state: Mutex<State>,
    readable: Condvar,
}

impl ByteQueue {
    /// Create a queue and split it into its two thread-owned halves.
    /// `capacity` of `None` means unconstrained, trading memory growth for
    /// simplicity when disk throughput reliably exceeds the capture rate.
    pub fn with_capacity(capacity: Option<usize>) -> (QueueProducer, QueueConsumer) {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                buf: VecDeque::new(),
                closed: false,
            }),
            readable: Condvar::new(),
        });
        (
            QueueProducer {
                shared: Arc::clone(&shared),
                capacity,
            },
            QueueConsumer { shared },
        )
    }
}

/// Producer half, owned by the capture thread.
pub struct QueueProducer {
    shared: Arc<Shared>,
    capacity: Option<usize>,
}

impl QueueProducer {
    /// Push bytes into the queue without blocking. Returns the number of
    /// bytes accepted: short when a bounded queue is saturated, zero once
    /// the queue is closed.
    pub fn push(&self, bytes: &[u8]) -> usize {
        let n = {
            let mut state = self.shared.state.lock();
            if state.closed {
                return 0;
            }
            let n = match self.capacity {
                None => bytes.len(),
                Some(cap) => bytes.len().min(cap.saturating_sub(state.buf.len())),
            };
            state.buf.extend(&bytes[..n]);
            n
        };
        if n > 0 {
            self.shared.readable.notify_one();
        }
        n
    }

    /// Close the queue. The consumer drains whatever is resident and then
    /// sees end-of-stream.
    pub fn close(&self) {
        self.shared.state.lock().closed = true;
        self.shared.readable.notify_all();
    }
}

impl Drop for QueueProducer {
    fn drop(&mut self) {
        self.close();
    }
}

/// Consumer half, owned by the writer thread.
pub struct QueueConsumer {
    shared: Arc<Shared>,
}

impl QueueConsumer {
    /// Pop up to `out.len()` bytes, blocking until at least one byte is
    /// available or the queue is closed. Returns 0 only at end-of-stream
    /// (closed and fully drained).
    pub fn pop(&self, out: &mut [u8]) -> usize {
        let mut state = self.shared.state.lock();
        while state.buf.is_empty() && !state.closed {
            self.shared.readable.wait(&mut state);
        }
        let n = out.len().min(state.buf.len());
        for (dst, b) in out.iter_mut().zip(state.buf.drain(..n)) {
            *dst = b;
        }
        n
    }

    /// Bytes currently resident in the queue.
    pub fn len(&self) -> usize {
        self.shared.state.lock().buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for QueueConsumer {
    fn drop(&mut self) {
        // A dead consumer must not leave the producer accumulating bytes
        // nobody will ever pop.
        self.shared.state.lock().closed = true;
    }
}
