use thiserror::Error;

/// Failures raised while talking to the inverter.
///
/// `Frame` and `Io` are absorbed by the retry loops in `axpert::inverter`;
/// only `Connection` is expected to reach application code.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Absent, truncated or otherwise undecodable response.
    #[error("malformed response frame: {0}")]
    Frame(String),

    #[error("device i/o failure: {0}")]
    Io(#[from] std::io::Error),

    /// Session could not be (re)established, or a blocking wait ran dry.
    #[error("could not connect to device: {0}")]
    Connection(String),
}

impl DeviceError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, DeviceError::Connection(_))
    }
}
