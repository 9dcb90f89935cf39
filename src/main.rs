use anyhow::Result;
use clap::Parser;
use skinsync::cli::{self, Cli};
use tokio::runtime::Runtime;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Routes all log::info!() etc. to the temp-dir debug log; mirrors to
    // stderr when RUST_LOG is set. --log-level wins over RUST_LOG.
    skinsync::debug::init_log_bridge(cli.log_level.map(cli::LogLevel::to_filter));
    log::info!("Starting skinsync {}", skinsync::HOST_VERSION);

    let runtime = Runtime::new()?;
    let result = runtime.block_on(cli::execute(cli));

    // Don't block forever on a sync still running in the blocking pool.
    log::info!("Shutting down runtime");
    runtime.shutdown_timeout(std::time::Duration::from_secs(2));

    match result {
        Ok(0) => Ok(()),
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("skinsync: error: {e:#}");
            Err(e)
        }
    }
}
