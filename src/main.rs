use anyhow::Result;
use clap::Parser;
use sbtext_js_core::cli::Args;
use std::process::ExitCode;
use tracing::Level;

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    if args.verbose {
        let _ = tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init();
    }
    let success = sbtext_js_core::run_cli(&args)?;
    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
