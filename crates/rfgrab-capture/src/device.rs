//! FT232H synchronous-FIFO transport over rusb.
//!
//! The capture front-end exposes an FT232H whose channel A is switched into
//! synchronous FIFO mode by an external configuration tool before capture;
//! this module only performs the per-session setup (reset, latency timer,
//! bitmode, purge) and moves bytes.

use std::time::{Duration, Instant};

use rusb::{Context, DeviceHandle, UsbContext};

use crate::source::{SampleSource, StreamControl, StreamProgress};
use rfgrab_foundation::DeviceError;

pub const FTDI_VID: u16 = 0x0403;
/// Product id the front-end enumerates with.
pub const DEFAULT_PID: u16 = 0x8398;

// FTDI vendor requests, per the bridge chip's application notes.
const SIO_RESET_REQUEST: u8 = 0x00;
const SIO_SET_FLOW_CTRL_REQUEST: u8 = 0x02;
const SIO_SET_LATENCY_TIMER_REQUEST: u8 = 0x09;
const SIO_SET_BITMODE_REQUEST: u8 = 0x0B;

const SIO_RESET_SIO: u16 = 0;
const SIO_RESET_PURGE_RX: u16 = 1;
const SIO_RESET_PURGE_TX: u16 = 2;
const SIO_RTS_CTS_HS: u16 = 0x1 << 8;

const BITMODE_RESET: u8 = 0x00;
const BITMODE_SYNCFF: u8 = 0x40;

// Channel A: interface 0, wIndex 1, bulk endpoints 0x81 in / 0x02 out.
const INTERFACE_A: u8 = 0;
const INDEX_A: u16 = 1;
const EP_IN: u8 = 0x81;
const EP_OUT: u8 = 0x02;

// Vendor | Host-to-device | Device recipient.
const REQ_TYPE_OUT: u8 = 0x40;

/// A latency timer of 1 ms causes skipped blocks at full rate.
const LATENCY_MS: u16 = 2;

const MAX_PACKET: usize = 512;
/// Every high-speed bulk-in packet starts with two modem status bytes that
/// must be stripped from the sample stream.
const STATUS_BYTES: usize = 2;
const PACKETS_PER_TRANSFER: usize = 64;

const READ_TIMEOUT: Duration = Duration::from_millis(100);
const WRITE_TIMEOUT: Duration = Duration::from_secs(1);
const CONTROL_TIMEOUT: Duration = Duration::from_millis(500);

const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

pub struct FtdiSyncFifo {
    handle: DeviceHandle<Context>,
    read_buf: Vec<u8>,
    chunk: Vec<u8>,
}

impl FtdiSyncFifo {
    /// Open the front-end by product id and prepare channel A for
    /// synchronous-FIFO streaming.
    pub fn open(pid: Option<u16>) -> Result<Self, DeviceError> {
        let pid = pid.unwrap_or(DEFAULT_PID);
        let context = Context::new()?;
        let mut handle = context
            .open_device_with_vid_pid(FTDI_VID, pid)
            .ok_or(DeviceError::NotFound { vid: FTDI_VID, pid })?;

        match handle.set_auto_detach_kernel_driver(true) {
            Ok(()) | Err(rusb::Error::NotSupported) => {}
            Err(e) => return Err(DeviceError::Usb(e)),
        }
        handle
            .claim_interface(INTERFACE_A)
            .map_err(|source| DeviceError::ClaimInterface {
                interface: INTERFACE_A,
                source,
            })?;

        let dev = Self {
            handle,
            read_buf: vec![0u8; PACKETS_PER_TRANSFER * MAX_PACKET],
            chunk: Vec::with_capacity(PACKETS_PER_TRANSFER * (MAX_PACKET - STATUS_BYTES)),
        };
        dev.control("reset", SIO_RESET_REQUEST, SIO_RESET_SIO, INDEX_A)?;
        dev.control(
            "set latency timer",
            SIO_SET_LATENCY_TIMER_REQUEST,
            LATENCY_MS,
            INDEX_A,
        )?;
        dev.control(
            "set flow control",
            SIO_SET_FLOW_CTRL_REQUEST,
            0,
            SIO_RTS_CTS_HS | INDEX_A,
        )?;
        dev.control(
            "set synchronous fifo bitmode",
            SIO_SET_BITMODE_REQUEST,
            ((BITMODE_SYNCFF as u16) << 8) | 0xFF,
            INDEX_A,
        )?;
        dev.purge_rx()?;
        tracing::debug!("ftdi device {FTDI_VID:04x}:{pid:04x} opened in sync-FIFO mode");
        Ok(dev)
    }

    fn control(
        &self,
        stage: &'static str,
        request: u8,
        value: u16,
        index: u16,
    ) -> Result<(), DeviceError> {
        self.handle
            .write_control(REQ_TYPE_OUT, request, value, index, &[], CONTROL_TIMEOUT)
            .map(|_| ())
            .map_err(|source| DeviceError::Control { stage, source })
    }

    pub fn purge_rx(&self) -> Result<(), DeviceError> {
        self.control("purge rx", SIO_RESET_REQUEST, SIO_RESET_PURGE_RX, INDEX_A)
    }

    pub fn purge_tx(&self) -> Result<(), DeviceError> {
        self.control("purge tx", SIO_RESET_REQUEST, SIO_RESET_PURGE_TX, INDEX_A)
    }

    /// Bulk-write raw sample bytes to the rig (replay path).
    pub fn write_samples(&self, buf: &[u8]) -> Result<usize, DeviceError> {
        self.handle
            .write_bulk(EP_OUT, buf, WRITE_TIMEOUT)
            .map_err(DeviceError::Transfer)
    }
}

impl SampleSource for FtdiSyncFifo {
    fn stream(
        &mut self,
        on_chunk: &mut dyn FnMut(&[u8], Option<&StreamProgress>) -> StreamControl,
    ) -> Result<(), DeviceError> {
        let start = Instant::now();
        let mut total_bytes: u64 = 0;
        let mut window_start = start;
        let mut window_bytes: u64 = 0;

        loop {
            let n = match self.handle.read_bulk(EP_IN, &mut self.read_buf, READ_TIMEOUT) {
                Ok(n) => n,
                // The latency timer flushes on a cadence of its own; an
                // empty poll is not an error.
                Err(rusb::Error::Timeout) => 0,
                Err(e) => return Err(DeviceError::Transfer(e)),
            };

            self.chunk.clear();
            for packet in self.read_buf[..n].chunks(MAX_PACKET) {
                if packet.len() > STATUS_BYTES {
                    self.chunk.extend_from_slice(&packet[STATUS_BYTES..]);
                }
            }
            total_bytes += self.chunk.len() as u64;
            window_bytes += self.chunk.len() as u64;

            let progress = if window_start.elapsed() >= PROGRESS_INTERVAL {
                let elapsed = start.elapsed();
                let p = StreamProgress {
                    elapsed,
                    total_bytes,
                    current_rate: window_bytes as f64 / window_start.elapsed().as_secs_f64(),
                    total_rate: total_bytes as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
                };
                window_start = Instant::now();
                window_bytes = 0;
                Some(p)
            } else {
                None
            };

            if on_chunk(&self.chunk, progress.as_ref()) == StreamControl::Stop {
                return Ok(());
            }
        }
    }
}

impl Drop for FtdiSyncFifo {
    fn drop(&mut self) {
        // Leave the bridge in its reset bitmode so the UART side works
        // again after the session.
        let _ = self.handle.write_control(
            REQ_TYPE_OUT,
            SIO_SET_BITMODE_REQUEST,
            ((BITMODE_RESET as u16) << 8) | 0xFF,
            INDEX_A,
            &[],
            CONTROL_TIMEOUT,
        );
        let _ = self.handle.release_interface(INTERFACE_A);
    }
}
