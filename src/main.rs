//! Feedstock runner CLI.

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "feedstock-runner",
    version,
    about = "Resolve feedstock recipes and adapt storage targets across target-library versions"
)]
struct Cli {
    #[command(subcommand)]
    command: feedstock_runner::cli::Commands,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = feedstock_runner::cli::dispatch(cli.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
