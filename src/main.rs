use actrun::cli;
use actrun::runner::Verbosity;
use colored::Colorize;
use std::process;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber for logging.
///
/// `-v` and `-s` take precedence over `RUST_LOG`; otherwise `RUST_LOG` is used
/// when set, falling back to info (warn with `-q`).
fn init_tracing(verbosity: Verbosity) {
    let filter = match verbosity {
        Verbosity::Silent => EnvFilter::new("off"),
        Verbosity::Verbose => EnvFilter::new("actrun=debug"),
        Verbosity::Quiet => {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("actrun=warn"))
        }
        Verbosity::Normal => {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("actrun=info"))
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() {
    let matches = cli::build_command().get_matches();
    init_tracing(cli::get_verbosity(&matches));

    if let Err(e) = cli::run_with(&matches) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }
}
