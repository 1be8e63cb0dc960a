#![allow(dead_code)]

use axpert_bridge::prelude::*;

use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::sync::{Arc, Mutex};

pub fn common_setup() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub struct Factory;
impl Factory {
    pub fn sample_payload() -> &'static str {
        "230.1 50.0 230.1 50.0 0410 0410 030 410 52.50 010 100 042 006 097.2 00.00 000 01000110 00 00 0720 00"
    }

    /// A full device reply laid out so the terminator starts its own chunk:
    /// marker, payload, space padding, five trailing bytes, then `\r`.
    pub fn response(payload: &str) -> Vec<u8> {
        let mut raw = b"(".to_vec();
        raw.extend_from_slice(payload.as_bytes());
        while (raw.len() + 5) % 8 != 0 {
            raw.push(b' ');
        }
        raw.extend_from_slice(b"\xb7\xa9\x00\x00\x00\r");
        raw
    }

    pub fn sample_response() -> Vec<u8> {
        Self::response(Self::sample_payload())
    }

    pub fn timings() -> Timings {
        Timings::zero()
    }

    // the async tests need the blocking waits to actually wait
    pub fn polling_timings() -> Timings {
        Timings {
            poll_interval_ms: 50,
            ..Timings::zero()
        }
    }
}

#[derive(Default)]
pub struct MockState {
    /// Replies handed out one per write, before falling back to `default_response`.
    pub responses: VecDeque<Vec<u8>>,
    pub default_response: Vec<u8>,
    pub fail_opens: u32,
    pub fail_io: bool,
    pub opens: u32,
    pub releases: u32,
    pub writes: usize,
    pub written: Vec<Vec<u8>>,
    /// Write count at the moment each successful open happened.
    pub opened_after_writes: Vec<usize>,
}

#[derive(Clone, Default)]
pub struct MockDevice {
    pub state: Arc<Mutex<MockState>>,
}

impl MockDevice {
    pub fn replying(response: Vec<u8>) -> Self {
        let device = Self::default();
        device.state().default_response = response;
        device
    }

    pub fn failing_io() -> Self {
        let device = Self::default();
        device.state().fail_io = true;
        device
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }
}

impl Device for MockDevice {
    type Handle = MockHandle;

    fn open(&self) -> io::Result<MockHandle> {
        let mut state = self.state();
        if state.fail_opens > 0 {
            state.fail_opens -= 1;
            return Err(io::Error::new(ErrorKind::NotFound, "no such device"));
        }
        state.opens += 1;
        let writes = state.writes;
        state.opened_after_writes.push(writes);

        Ok(MockHandle {
            state: self.state.clone(),
            pending: VecDeque::new(),
        })
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}

pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
    pending: VecDeque<u8>,
}

impl Write for MockHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock().unwrap();
        state.writes += 1;
        if state.fail_io {
            return Err(io::Error::new(ErrorKind::BrokenPipe, "device went away"));
        }
        state.written.push(buf.to_vec());
        let reply = match state.responses.pop_front() {
            Some(reply) => reply,
            None => state.default_response.clone(),
        };
        self.pending = reply.into();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for MockHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            return Err(io::Error::from(ErrorKind::WouldBlock));
        }
        let len = buf.len().min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..len)) {
            *slot = byte;
        }
        Ok(len)
    }
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.releases += 1;
        }
    }
}
