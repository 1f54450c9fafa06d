//! etag-cache CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use etag_cache::cli::{Cli, CommandDispatcher};
use etag_cache::ui::{OutputMode, TerminalUI, UserInterface};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber for logging.
///
/// Log level is controlled by:
/// 1. `--debug` flag sets level to DEBUG
/// 2. `RUST_LOG` environment variable (if set)
/// 3. Default is INFO
///
/// Logs go to stderr so they never mix with response bodies on stdout.
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("etag_cache=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("etag_cache=info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    tracing::debug!("etag-cache starting with args: {:?}", cli);

    let output_mode = if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };
    let mut ui = TerminalUI::new(output_mode);

    let result = cli
        .cache_config()
        .and_then(|config| CommandDispatcher::new(&config))
        .and_then(|dispatcher| dispatcher.dispatch(&cli, &mut ui));

    match result {
        Ok(result) => ExitCode::from(result.exit_code as u8),
        Err(e) => {
            ui.error(&format!("Error: {}", e));
            ExitCode::from(1)
        }
    }
}
