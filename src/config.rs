use crate::prelude::*;

use serde::Deserialize;
use std::time::Duration;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub device: Device,

    #[serde(default)]
    pub mode: Mode,

    #[serde(default)]
    pub format: OutputFormat,

    #[serde(default = "Config::default_loglevel")]
    pub loglevel: String,

    #[serde(default = "Config::default_iterations")]
    pub iterations: u32,

    #[serde(default = "Config::default_print_interval_ms")]
    pub print_interval_ms: u64,

    #[serde(default)]
    pub timings: Timings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: Device::default(),
            mode: Mode::default(),
            format: OutputFormat::default(),
            loglevel: Self::default_loglevel(),
            iterations: Self::default_iterations(),
            print_interval_ms: Self::default_print_interval_ms(),
            timings: Timings::default(),
        }
    }
}

// Device {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Device {
    #[serde(default = "Config::default_device_path")]
    pub path: String,

    #[serde(default)]
    pub raw: bool,
}

impl Default for Device {
    fn default() -> Self {
        Self {
            path: Config::default_device_path(),
            raw: false,
        }
    }
}

impl Device {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn raw(&self) -> bool {
        self.raw
    }
} // }}}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Polling,
    Synchronous,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

// Timings {{{
/// Pauses around device I/O, in milliseconds.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Timings {
    #[serde(default = "Timings::default_settle_ms")]
    pub settle_ms: u64,
    #[serde(default = "Timings::default_warmup_ms")]
    pub warmup_ms: u64,
    #[serde(default = "Timings::default_retry_pause_ms")]
    pub retry_pause_ms: u64,
    #[serde(default = "Timings::default_connect_delay_ms")]
    pub connect_delay_ms: u64,
    #[serde(default = "Timings::default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            settle_ms: Self::default_settle_ms(),
            warmup_ms: Self::default_warmup_ms(),
            retry_pause_ms: Self::default_retry_pause_ms(),
            connect_delay_ms: Self::default_connect_delay_ms(),
            poll_interval_ms: Self::default_poll_interval_ms(),
        }
    }
}

impl Timings {
    /// No pauses at all; for tests and simulated devices.
    pub fn zero() -> Self {
        Self {
            settle_ms: 0,
            warmup_ms: 0,
            retry_pause_ms: 0,
            connect_delay_ms: 0,
            poll_interval_ms: 0,
        }
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_millis(self.warmup_ms)
    }

    pub fn retry_pause(&self) -> Duration {
        Duration::from_millis(self.retry_pause_ms)
    }

    pub fn connect_delay(&self) -> Duration {
        Duration::from_millis(self.connect_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    fn default_settle_ms() -> u64 {
        1000
    }
    fn default_warmup_ms() -> u64 {
        1000
    }
    fn default_retry_pause_ms() -> u64 {
        200
    }
    fn default_connect_delay_ms() -> u64 {
        1000
    }
    fn default_poll_interval_ms() -> u64 {
        1000
    }
} // }}}

impl Config {
    pub fn new(file: String) -> Result<Self> {
        info!("Reading configuration from {}", file);
        let content = std::fs::read_to_string(&file)
            .map_err(|err| anyhow!("config.rs:error reading {}: {}", file, err))?;

        let config = Self::from_yaml(&content)?;

        info!("Configuration loaded successfully:");
        info!("  Device: {}", config.device.path);
        info!("  Raw: {}", config.device.raw);
        info!("  Mode: {:?}", config.mode);
        info!("  Format: {:?}", config.format);
        info!("  Iterations: {}", config.iterations);
        info!("  Settle: {}ms", config.timings.settle_ms);
        info!("  Log Level: {}", config.loglevel);

        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Folds command line overrides into the loaded configuration.
    pub fn apply(mut self, options: &Options) -> Result<Self> {
        if options.base {
            self.mode = Mode::Synchronous;
        }
        if options.raw {
            self.device.raw = true;
        }
        if let Some(path) = &options.device {
            self.device.path = path.clone();
        }
        if let Some(iterations) = options.iterations {
            self.iterations = iterations;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if self.device.path.is_empty() {
            bail!("device.path cannot be empty");
        }
        if crate::parse_loglevel(&self.loglevel).is_none() {
            return Err(anyhow!("config.rs:invalid loglevel: {}", self.loglevel));
        }
        Ok(())
    }

    pub fn print_interval(&self) -> Duration {
        Duration::from_millis(self.print_interval_ms)
    }

    fn default_device_path() -> String {
        "/dev/hidraw0".to_string()
    }

    fn default_loglevel() -> String {
        "info".to_string()
    }

    fn default_iterations() -> u32 {
        300
    }

    fn default_print_interval_ms() -> u64 {
        200
    }
}
