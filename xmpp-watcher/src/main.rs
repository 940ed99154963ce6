//! Binary for the XMPP room watcher.

use anyhow::Result;
use clap::Parser;
use xmpp_watcher::{run_watcher, Cli, RunOptions, SessionConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = SessionConfig::load(cli.overrides())?;

    run_watcher(
        config,
        RunOptions {
            log_only: cli.log_only,
            log_level: cli.log_level(),
        },
    )
    .await
}
