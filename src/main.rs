mod app;
mod cli;

use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() {
    // Diagnostics go to stderr so progress output on stdout stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::Cli::parse();
    if let Err(err) = app::run(cli) {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
