use clap::Parser;

/// Axpert Bridge - status reader for Axpert/Voltronic inverters
#[derive(Debug, Parser)]
#[clap(author, version)]
pub struct Options {
    /// Config file to read
    #[clap(short = 'c', long = "config")]
    pub config_file: Option<String>,

    /// Query synchronously instead of running the background poller
    #[clap(short = 'b', long = "base")]
    pub base: bool,

    /// Print undecoded responses
    #[clap(short = 'r', long = "raw")]
    pub raw: bool,

    /// Device path, e.g. /dev/hidraw0
    #[clap(short = 'd', long = "device")]
    pub device: Option<String>,

    /// Number of non-blocking reads to print in polling mode
    #[clap(short = 'n', long = "iterations")]
    pub iterations: Option<u32>,
}

impl Options {
    pub fn new() -> Self {
        Self::parse()
    }
}
