//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::history::HistoryFormat;

/// Measure command arguments.
#[derive(Debug, Default, Args)]
pub struct MeasureCommand {
    /// Subject's name (prompted for if omitted)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Parent's name (prompted for if omitted)
    #[arg(short, long)]
    pub parent_name: Option<String>,

    /// Date of birth, YYYY-MM-DD (prompted for if omitted)
    #[arg(short, long, value_name = "YYYY-MM-DD")]
    pub dob: Option<String>,

    /// Confirm the first readings without prompting
    #[arg(short, long)]
    pub yes: bool,

    /// Save even when both readings are zero
    #[arg(long)]
    pub accept_zero: bool,

    /// Write the QR code of the saved record to this SVG file
    #[arg(long, value_name = "FILE")]
    pub qr_out: Option<PathBuf>,

    /// Do not mirror the record to the remote table
    #[arg(long)]
    pub no_remote: bool,
}

/// History command arguments.
#[derive(Debug, Args)]
pub struct HistoryCommand {
    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,

    /// Show only the N most recent measurements
    #[arg(short, long)]
    pub limit: Option<usize>,
}

/// Show command arguments.
#[derive(Debug, Args)]
pub struct ShowCommand {
    /// Identifier of the measurement
    pub id: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

/// QR command arguments.
#[derive(Debug, Args)]
pub struct QrCommand {
    /// Identifier of the measurement
    pub id: String,

    /// Write the SVG to this file instead of printing the code
    #[arg(short, long, value_name = "FILE")]
    pub out: Option<PathBuf>,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Plain,
    /// Formatted table
    Table,
    /// JSON output
    Json,
}

impl From<OutputFormat> for HistoryFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Plain => Self::Plain,
            OutputFormat::Table => Self::Table,
            OutputFormat::Json => Self::Json,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_conversion() {
        assert_eq!(HistoryFormat::from(OutputFormat::Plain), HistoryFormat::Plain);
        assert_eq!(HistoryFormat::from(OutputFormat::Table), HistoryFormat::Table);
        assert_eq!(HistoryFormat::from(OutputFormat::Json), HistoryFormat::Json);
    }

    #[test]
    fn test_output_format_default() {
        assert_eq!(OutputFormat::default(), OutputFormat::Plain);
    }

    #[test]
    fn test_measure_command_default() {
        let cmd = MeasureCommand::default();
        assert!(cmd.name.is_none());
        assert!(!cmd.yes);
        assert!(!cmd.accept_zero);
        assert!(!cmd.no_remote);
    }

    #[test]
    fn test_status_command_debug() {
        let cmd = StatusCommand { json: true };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("json"));
    }

    #[test]
    fn test_config_command_debug() {
        let cmd = ConfigCommand::Show { json: false };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Show"));
    }
}
