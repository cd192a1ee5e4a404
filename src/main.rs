use clap::Parser;
use tracing_subscriber::EnvFilter;
use zentrack::cli::commands::Cli;
use zentrack::cli::handlers;

fn main() {
    let filter = EnvFilter::try_from_env("ZT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    if let Err(e) = handlers::dispatch(cli) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
