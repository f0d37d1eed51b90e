//! Command-line interface for growthrecorder.
//!
//! This module provides the CLI structure for the `growrec` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ConfigCommand, HistoryCommand, MeasureCommand, OutputFormat, QrCommand, ShowCommand,
    StatusCommand,
};

/// growrec - Record child growth measurements
///
/// Collects a child's details, reads weight and height from the measuring
/// station, keeps a local history and produces a QR code for each record.
/// Without a command, shows the history if there is one and starts a new
/// measurement otherwise.
#[derive(Debug, Parser)]
#[command(name = "growrec")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Take a new measurement
    Measure(MeasureCommand),

    /// List saved measurements
    History(HistoryCommand),

    /// Show one saved measurement
    Show(ShowCommand),

    /// Render the QR code of a saved measurement
    Qr(QrCommand),

    /// Show store and remote sync status
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}
