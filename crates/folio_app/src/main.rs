//! `folio`: harvest the images of an article and bind them into a PDF.
mod app;
mod cli;
mod config;
mod effects;

use std::path::PathBuf;
use std::sync::mpsc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use engine_logging::engine_info;
use folio_core::Msg;

use cli::{Cli, Command, DEFAULT_DESTINATION};
use config::FolioConfig;
use effects::EffectRunner;

fn main() -> Result<()> {
    let cli = Cli::parse();
    engine_logging::initialize(&cli.log_destination(), cli.log_level());

    let config = FolioConfig::load(cli.config.as_deref())?;
    let runner =
        EffectRunner::new(config.engine_config()).context("failed to start the engine")?;

    let (interrupt_tx, interrupt_rx) = mpsc::channel();
    app::spawn_interrupt_listener(interrupt_tx).context("failed to install Ctrl-C handler")?;

    let request = request_for(cli.command);
    engine_info!("Starting {:?}", request);
    let report = app::run_session(&runner, request, &interrupt_rx);

    for outcome in &report.outcomes {
        app::print_outcome(outcome);
    }
    if report.has_fatal_error() {
        bail!("folio finished with errors");
    }
    Ok(())
}

fn request_for(command: Command) -> Msg {
    let destination = |dest: Option<PathBuf>| dest.unwrap_or_else(|| PathBuf::from(DEFAULT_DESTINATION));
    match command {
        Command::Harvest { source, dest } => Msg::HarvestRequested {
            source,
            destination: destination(dest),
        },
        Command::Assemble { folder, output } => Msg::AssembleRequested { folder, output },
        Command::Run {
            source,
            dest,
            output,
        } => Msg::PipelineRequested {
            source,
            destination: destination(dest),
            output,
        },
    }
}
