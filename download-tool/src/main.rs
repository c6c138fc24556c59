//! Run the download tool standalone, configured from the environment.
use anyhow::{Context, Result};
use envconfig::Envconfig;
use tracing::info;

use download_tool::config::Config;
use download_tool::host;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::init_from_env().context("Invalid configuration")?;

    info!(
        tool_id = config.tool_id,
        input = ?config.input_path,
        dry_run = config.dry_run,
        "starting download tool"
    );

    host::run(&config)
}
