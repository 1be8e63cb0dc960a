// Module declarations for the application's core components
pub mod axpert;       // Inverter protocol, device session and pollers
pub mod config;       // Configuration management
pub mod error;        // Error handling and types
pub mod options;      // Command line options parsing
pub mod prelude;      // Common imports and types
pub mod status_cache; // Latest-reading cache shared with the poller

// Get the package version from Cargo.toml
const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

use crate::prelude::*;
use std::io::Write;

/// Initializes env_logger at `info`; `RUST_LOG` wins over anything configured.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("trace"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                record.module_path().unwrap_or(""),
                record.args()
            )
        })
        .write_style(env_logger::WriteStyle::Never)
        .try_init();

    if std::env::var_os("RUST_LOG").is_none() {
        log::set_max_level(log::LevelFilter::Info);
    }
}

pub fn parse_loglevel(level: &str) -> Option<log::LevelFilter> {
    level.parse().ok()
}

/// Applies the configured level once the config is loaded.
pub fn apply_loglevel(level: &str) {
    if std::env::var_os("RUST_LOG").is_some() {
        return;
    }
    match parse_loglevel(level) {
        Some(filter) => log::set_max_level(filter),
        None => warn!("unknown loglevel {}, staying at info", level),
    }
}

/// Loads the config file (if any) and applies command line overrides.
pub fn load_config(options: &Options) -> Result<Config> {
    let config = match &options.config_file {
        Some(file) => Config::new(file.clone())?,
        None => Config::default(),
    };
    config.apply(options)
}

fn print_reading(config: &Config, reading: &Reading) -> Result<()> {
    println!("{}", reading.render(config.format)?);
    Ok(())
}

/// One synchronous query, printed once.
async fn run_synchronous(config: &Config) -> Result<()> {
    let device = HidrawDevice::new(config.device.path());
    let timings = config.timings.clone();
    let raw = config.device.raw();

    let reading = tokio::task::spawn_blocking(move || -> Result<Option<Reading>> {
        let mut inverter = Inverter::connect(device, timings, raw)?;
        let reading = inverter.get_stats()?;
        inverter.close();
        Ok(reading)
    })
    .await??;

    match reading {
        Some(reading) => print_reading(config, &reading),
        None => {
            warn!("inverter returned no data, try again later");
            Ok(())
        }
    }
}

/// Background poller; the first read blocks, the rest print whatever is cached.
async fn run_polling(config: &Config) -> Result<()> {
    let device = HidrawDevice::new(config.device.path());
    let inverter =
        PollingInverter::connect(device, config.timings.clone(), config.device.raw()).await?;

    if let Some(reading) = inverter.get_stats(true).await? {
        print_reading(config, &reading)?;
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    for _ in 0..config.iterations {
        if let Some(reading) = inverter.get_stats(false).await? {
            print_reading(config, &reading)?;
        }

        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Ctrl+C received, stopping");
                break;
            }
            _ = tokio::time::sleep(config.print_interval()) => {}
        }
    }

    inverter.close().await?;
    Ok(())
}

/// Main application entry point
pub async fn app(options: Options) -> Result<()> {
    init_logging();

    let config = load_config(&options)?;
    apply_loglevel(&config.loglevel);

    info!(
        "axpert-bridge {} starting on {} ({:?} mode)",
        CARGO_PKG_VERSION,
        config.device.path(),
        config.mode
    );

    match config.mode {
        Mode::Synchronous => run_synchronous(&config).await,
        Mode::Polling => run_polling(&config).await,
    }
}
