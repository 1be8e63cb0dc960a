use crate::prelude::*;
use crate::axpert::protocol::TERMINATOR;

use {
    bytes::{BufMut, Bytes, BytesMut},
    std::io::{ErrorKind, Read, Write},
    std::sync::atomic::{AtomicBool, Ordering},
    std::sync::Arc,
};

pub const MAX_RETRIES: u32 = 10;
const CHUNK_SIZE: usize = 8;

/// Something nameable that can be opened into a duplex byte channel.
pub trait Device: Send + 'static {
    type Handle: Read + Write + Send + 'static;

    fn open(&self) -> std::io::Result<Self::Handle>;

    fn describe(&self) -> String;
}

// HidrawDevice {{{
#[derive(Clone, Debug)]
pub struct HidrawDevice {
    path: String,
}

impl HidrawDevice {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl Device for HidrawDevice {
    type Handle = std::fs::File;

    fn open(&self) -> std::io::Result<Self::Handle> {
        use std::os::unix::fs::OpenOptionsExt;

        std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(&self.path)
    }

    fn describe(&self) -> String {
        self.path.clone()
    }
} // }}}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Unconnected,
    Connected,
    Failed,
}

pub struct DeviceSession<D: Device> {
    device: D,
    handle: Option<D::Handle>,
    state: SessionState,
    timings: Timings,
    stop: Arc<AtomicBool>,
    opens: u32,
    resets: u32,
}

impl<D: Device> DeviceSession<D> {
    pub fn new(device: D, timings: Timings) -> Self {
        Self {
            device,
            handle: None,
            state: SessionState::Unconnected,
            timings,
            stop: Arc::new(AtomicBool::new(false)),
            opens: 0,
            resets: 0,
        }
    }

    /// Creates a session and opens it, failing if every attempt fails.
    pub fn connect(device: D, timings: Timings) -> Result<Self, DeviceError> {
        let mut session = Self::new(device, timings);
        session.open()?;
        Ok(session)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    pub fn opens(&self) -> u32 {
        self.opens
    }

    pub fn resets(&self) -> u32 {
        self.resets
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn open(&mut self) -> Result<(), DeviceError> {
        for attempt in 1..=MAX_RETRIES {
            self.release();

            match self.device.open() {
                Ok(handle) => {
                    self.handle = Some(handle);
                    self.state = SessionState::Connected;
                    self.opens += 1;
                    debug!("opened {} (attempt {})", self.device.describe(), attempt);
                    // device warm-up
                    std::thread::sleep(self.timings.warmup());
                    return Ok(());
                }
                Err(e) => {
                    self.state = SessionState::Failed;
                    warn!(
                        "failed to open {} (attempt {}/{}): {}",
                        self.device.describe(),
                        attempt,
                        MAX_RETRIES,
                        e
                    );
                    std::thread::sleep(self.timings.connect_delay());
                }
            }
        }

        error!("giving up on {} after {} attempts", self.device.describe(), MAX_RETRIES);
        Err(DeviceError::Connection(format!(
            "{} did not open after {} attempts",
            self.device.describe(),
            MAX_RETRIES
        )))
    }

    pub fn reset(&mut self) -> Result<(), DeviceError> {
        info!("resetting {}", self.device.describe());
        self.resets += 1;
        self.release();
        self.open()
    }

    /// Writes `command` and collects the reply, chunk by chunk, until a chunk
    /// comes back empty or carries the terminator.
    ///
    /// An empty reply is not an error; the device simply had nothing yet.
    pub fn send_and_receive(&mut self, command: &[u8]) -> Result<Bytes, DeviceError> {
        let settle = self.timings.settle();
        let handle = self
            .handle
            .as_mut()
            .ok_or_else(|| std::io::Error::from(ErrorKind::NotConnected))?;

        handle.write_all(command)?;
        std::thread::sleep(settle);

        let mut response = BytesMut::new();
        let mut chunk = [0u8; CHUNK_SIZE];
        loop {
            let len = match handle.read(&mut chunk) {
                Ok(len) => len,
                Err(e) if e.kind() == ErrorKind::WouldBlock => 0,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            if len == 0 {
                break;
            }

            let chunk = &chunk[..len];
            // the chunk carrying the terminator is dropped whole
            if chunk.contains(&TERMINATOR) {
                break;
            }
            response.put_slice(chunk);
        }

        trace!("received {} bytes from {}", response.len(), self.device.describe());
        Ok(response.freeze())
    }

    pub fn release(&mut self) {
        if self.handle.take().is_some() {
            debug!("released {}", self.device.describe());
            self.state = SessionState::Unconnected;
        }
    }

    pub fn close(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        // let a background poll notice the flag before the handle goes away
        std::thread::sleep(self.timings.settle());
        self.release();
        info!("closed {}", self.device.describe());
    }
}
