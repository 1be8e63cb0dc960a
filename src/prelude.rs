pub use anyhow::{anyhow, bail, Error, Result};
pub use log::{debug, error, info, trace, warn};

pub use crate::axpert::inverter::{Inverter, PollingInverter, Reading};
pub use crate::axpert::protocol::{ChargeSource, DeviceStatusFlags, StatusRecord, StatusReport};
pub use crate::axpert::session::{Device, DeviceSession, HidrawDevice, SessionState};
pub use crate::config::{self, Config, Mode, OutputFormat, Timings};
pub use crate::error::DeviceError;
pub use crate::options::Options;
pub use crate::status_cache::StatusCache;
