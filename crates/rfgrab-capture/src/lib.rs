pub mod device;
pub mod ingest;
pub mod packing;
pub mod queue;
pub mod rotation;
pub mod session;
pub mod source;
pub mod writer;

// Public API
pub use device::FtdiSyncFifo;
pub use ingest::{IngestConfig, IngestValidator};
pub use packing::PackingMode;
pub use queue::ByteQueue;
pub use session::CaptureSession;
pub use source::{SampleSource, StreamControl, StreamProgress};
pub use writer::{SinkConfig, SinkWriterThread, WriterStats};
