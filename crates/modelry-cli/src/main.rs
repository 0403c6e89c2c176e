//! modelry command-line client.

use clap::Parser;
use modelry_cli::Args;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("modelry=warn")))
        .init();

    let args = Args::parse();

    if let Err(e) = modelry_cli::run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
