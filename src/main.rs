//! `parcelkeep` - front desk parcel custody

use clap::Parser;
use tokio_util::sync::CancellationToken;

use parcelkeep::cli::args::Cli;
use parcelkeep::cli::commands;
use parcelkeep::error::ExitCode;
use parcelkeep::observability::init_logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.log_format, cli.verbose, cli.quiet, cli.color);

    let cancel = CancellationToken::new();

    // First signal requests a graceful shutdown, the second forces exit
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        let Ok(mut sigterm) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        else {
            eprintln!("warning: failed to register SIGTERM handler");
            return;
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }

        eprintln!("\nShutting down gracefully... (press Ctrl+C again to force)");
        signal_cancel.cancel();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => std::process::exit(ExitCode::INTERRUPTED),
            _ = sigterm.recv() => std::process::exit(ExitCode::TERMINATED),
        }
    });

    let result = commands::dispatch(cli, cancel).await;

    match result {
        Ok(()) => std::process::exit(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}
