use anyhow::Result;
use log::error;

use axpert_bridge::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    let options = Options::new();

    if let Err(e) = axpert_bridge::app(options).await {
        error!("Application error: {:#}", e);
        eprintln!("axpert-bridge: {:#}", e);
        std::process::exit(255);
    }

    Ok(())
}
