use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use engine_logging::{LogDestination, DEFAULT_LOG_FILE};
use log::LevelFilter;

/// Default harvest destination, relative to the working directory.
pub(crate) const DEFAULT_DESTINATION: &str = "./harvested_images";

/// Folio: save the images of an article, then bind them into a PDF.
#[derive(Debug, Parser)]
#[command(name = "folio", version, long_about = None)]
pub(crate) struct Cli {
    /// RON configuration file (defaults to ./folio.ron when present).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Where log output goes.
    #[arg(long, value_enum, default_value_t = LogTarget::Terminal, global = true)]
    pub log: LogTarget,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum LogTarget {
    Terminal,
    File,
    Both,
}

#[derive(Debug, Clone, Subcommand)]
pub(crate) enum Command {
    /// Download every image of an article into a folder as `{order}.{ext}`.
    Harvest {
        /// Article URL.
        source: String,

        /// Destination folder.
        #[arg(short, long)]
        dest: Option<PathBuf>,
    },
    /// Merge the images of a folder into one PDF, one image per page.
    Assemble {
        /// Folder holding the images.
        folder: PathBuf,

        /// Output file (defaults to <FOLDER>/<folder name>.pdf).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Harvest, then assemble the harvested folder.
    Run {
        /// Article URL.
        source: String,

        #[arg(short, long)]
        dest: Option<PathBuf>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl Cli {
    pub(crate) fn log_destination(&self) -> LogDestination {
        let file = PathBuf::from(DEFAULT_LOG_FILE);
        match self.log {
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::File => LogDestination::File(file),
            LogTarget::Both => LogDestination::Both(file),
        }
    }

    pub(crate) fn log_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    }
}
