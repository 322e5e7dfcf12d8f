// src/main.rs

use anyhow::Result;

fn main() -> Result<()> {
    let args = simdag::cli::parse();
    simdag::logging::init_logging(args.log_level)?;
    simdag::run(args)
}
