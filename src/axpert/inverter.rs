use crate::prelude::*;
use crate::axpert::protocol::{decode_report, encode_status_request, StatusReport};
use crate::axpert::session::MAX_RETRIES;

use {
    bytes::Bytes,
    serde::{Serialize, Serializer},
    std::sync::atomic::{AtomicBool, Ordering},
    std::sync::Arc,
    tokio::task::JoinHandle,
};

// attempts after which a stalled handle is forcibly reopened
const RESET_ATTEMPTS: [u32; 3] = [3, 6, 9];

/// One successful poll: decoded status, or the untouched reply in raw mode.
#[derive(Clone, Debug, PartialEq)]
pub enum Reading {
    Status(StatusReport),
    Raw(Bytes),
}

impl Reading {
    pub fn status(&self) -> Option<&StatusReport> {
        match self {
            Reading::Status(report) => Some(report),
            Reading::Raw(_) => None,
        }
    }

    pub fn render(&self, format: OutputFormat) -> Result<String> {
        format.render(self)
    }
}

impl Serialize for Reading {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Reading::Status(report) => report.serialize(serializer),
            Reading::Raw(bytes) => serializer.serialize_str(&String::from_utf8_lossy(bytes)),
        }
    }
}

/// Runs a single request/response cycle.
fn poll_once<D: Device>(session: &mut DeviceSession<D>, raw: bool) -> Result<Reading, DeviceError> {
    let response = session.send_and_receive(&encode_status_request())?;

    if raw {
        if response.is_empty() {
            return Err(DeviceError::Frame("no data this cycle".to_string()));
        }
        return Ok(Reading::Raw(response));
    }

    decode_report(&response)
        .map(Reading::Status)
        .ok_or_else(|| DeviceError::Frame(format!("could not decode {} bytes", response.len())))
}

fn join_error(e: tokio::task::JoinError) -> DeviceError {
    DeviceError::Connection(format!("device worker failed: {}", e))
}

// Inverter {{{
/// Synchronous access: every `get_stats` call performs a full cycle.
pub struct Inverter<D: Device> {
    session: DeviceSession<D>,
    raw: bool,
}

impl<D: Device> Inverter<D> {
    pub fn connect(device: D, timings: Timings, raw: bool) -> Result<Self, DeviceError> {
        Ok(Self {
            session: DeviceSession::connect(device, timings)?,
            raw,
        })
    }

    pub fn session(&self) -> &DeviceSession<D> {
        &self.session
    }

    /// Returns `Ok(None)` when every attempt came back empty or failed; the
    /// caller should simply try again later.
    pub fn get_stats(&mut self) -> Result<Option<Reading>, DeviceError> {
        for retry in 0..MAX_RETRIES {
            match poll_once(&mut self.session, self.raw) {
                Ok(reading) => return Ok(Some(reading)),
                Err(DeviceError::Frame(reason)) => {
                    debug!("attempt {}: {}", retry, reason);
                }
                Err(e) => {
                    warn!("attempt {}: {}", retry, e);
                    std::thread::sleep(self.session.timings().retry_pause());
                    if RESET_ATTEMPTS.contains(&retry) {
                        self.session.reset()?;
                    }
                }
            }
        }

        warn!("no status after {} attempts", MAX_RETRIES);
        Ok(None)
    }

    pub fn close(mut self) {
        self.session.close();
    }
} // }}}

// PollingInverter {{{
/// Background refresh: a blocking worker owns the session and keeps the
/// cache current until the stop flag is raised.
pub struct PollingInverter<D: Device> {
    cache: StatusCache,
    stop: Arc<AtomicBool>,
    timings: Timings,
    poller: Option<JoinHandle<DeviceSession<D>>>,
}

impl<D: Device> PollingInverter<D> {
    pub async fn connect(device: D, timings: Timings, raw: bool) -> Result<Self, DeviceError> {
        let session_timings = timings.clone();
        let session =
            tokio::task::spawn_blocking(move || DeviceSession::connect(device, session_timings))
                .await
                .map_err(join_error)??;

        let stop = session.stop_flag();
        let cache = StatusCache::new();
        let poller = tokio::task::spawn_blocking({
            let cache = cache.clone();
            move || Self::poll_loop(session, cache, raw)
        });

        info!("status poller started");

        Ok(Self {
            cache,
            stop,
            timings,
            poller: Some(poller),
        })
    }

    fn poll_loop(mut session: DeviceSession<D>, cache: StatusCache, raw: bool) -> DeviceSession<D> {
        while !session.is_stopped() {
            match poll_once(&mut session, raw) {
                Ok(reading) => cache.store(reading),
                Err(DeviceError::Io(e)) => {
                    debug!("poll failed: {}", e);
                    std::thread::sleep(session.timings().retry_pause());
                }
                Err(e) => debug!("poll failed: {}", e),
            }
        }

        debug!("status poller exiting");
        session
    }

    pub fn cache(&self) -> &StatusCache {
        &self.cache
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Latest cached reading.
    ///
    /// Without `block` an empty cache gives `Ok(None)`. With `block` the cache
    /// is polled up to `MAX_RETRIES` times; if it stays empty the poller is
    /// stopped and a connection error returned.
    pub async fn get_stats(&self, block: bool) -> Result<Option<Arc<Reading>>, DeviceError> {
        if let Some(reading) = self.cache.latest() {
            return Ok(Some(reading));
        }
        if !block {
            return Ok(None);
        }

        for _ in 0..MAX_RETRIES {
            tokio::time::sleep(self.timings.poll_interval()).await;
            if let Some(reading) = self.cache.latest() {
                return Ok(Some(reading));
            }
        }

        self.stop.store(true, Ordering::SeqCst);
        error!("no status received after {} polls, stopping poller", MAX_RETRIES);
        Err(DeviceError::Connection(format!(
            "no status received after {} polls",
            MAX_RETRIES
        )))
    }

    pub async fn close(mut self) -> Result<(), DeviceError> {
        self.stop.store(true, Ordering::SeqCst);
        tokio::time::sleep(self.timings.settle()).await;

        if let Some(poller) = self.poller.take() {
            let mut session = poller.await.map_err(join_error)?;
            session.release();
        }

        info!("status poller stopped");
        Ok(())
    }
}

impl<D: Device> Drop for PollingInverter<D> {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
} // }}}
