use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Stream integrity lost: hardware FIFO overflow at byte offset {offset}")]
    StreamIntegrity { offset: u64 },

    #[error("Fatal error, cannot recover: {0}")]
    Fatal(String),
}

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Device not found: {vid:04x}:{pid:04x}")]
    NotFound { vid: u16, pid: u16 },

    #[error("Failed to claim interface {interface}: {source}")]
    ClaimInterface { interface: u8, source: rusb::Error },

    #[error("Control transfer failed ({stage}): {source}")]
    Control { stage: &'static str, source: rusb::Error },

    #[error("Bulk transfer failed: {0}")]
    Transfer(rusb::Error),

    #[error("USB error: {0}")]
    Usb(#[from] rusb::Error),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Cannot open output file {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Write failed at byte offset {offset}: {source}")]
    Write {
        offset: u64,
        source: std::io::Error,
    },

    #[error("Failed to close output file {path}: {source}")]
    Close {
        path: PathBuf,
        source: std::io::Error,
    },
}
