//! # Canvas Doc
//!
//! Command-line tool for canvas documents.

use std::process::ExitCode;

use canvas_cli::{run, CliArgs, CliConfig};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,canvas_document=debug"));

    // Logs go to stderr so stdout stays pure JSON.
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    // Use JSON format when RUST_LOG_FORMAT=json
    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

fn main() -> anyhow::Result<ExitCode> {
    init_tracing();

    let config = CliConfig::from(CliArgs::parse());
    tracing::debug!(command = ?config.command, "starting canvas-doc");

    let report = run(&config)?;
    print!("{}", report.output);

    Ok(if report.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
