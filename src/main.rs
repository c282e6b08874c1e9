use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use log::info;

use markdup_se::utils::format_duration_verbose;
use markdup_se::{Args, run_markdup};

#[cfg(not(windows))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let start = Instant::now();

    info!("markdup-se: {} -> {}", args.input, args.output);
    let stats = run_markdup(&args)?;
    stats.log_summary();

    info!("done in {}", format_duration_verbose(start.elapsed()));
    Ok(())
}
