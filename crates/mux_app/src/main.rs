mod cli;
mod platform;

use clap::Parser;

fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();
    mux_logging::initialize(args.log.into());

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(platform::run(args.into_config()))
}
