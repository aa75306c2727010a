//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for Sextant using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Sextant - time-windowed cohort extraction and annotation
#[derive(Parser, Debug)]
#[command(name = "sextant")]
#[command(version, about, long_about = None)]
#[command(author = "Sextant Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "sextant.toml", env = "SEXTANT_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "SEXTANT_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch, cache and annotate every patient in the cohort
    Run(commands::run::RunArgs),

    /// Resolve index events and write the cohort index table
    Index(commands::index::IndexArgs),

    /// Merge per-patient CSV files into one dataset
    Merge(commands::merge::MergeArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Show cache and annotation file counts
    Status(commands::status::StatusArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_run() {
        let cli = Cli::parse_from(["sextant", "run"]);
        assert_eq!(cli.config, "sextant.toml");
        assert!(matches!(cli.command, Commands::Run(_)));
    }

    #[test]
    fn test_cli_parse_with_config() {
        let cli = Cli::parse_from(["sextant", "--config", "custom.toml", "run"]);
        assert_eq!(cli.config, "custom.toml");
    }

    #[test]
    fn test_cli_parse_with_log_level() {
        let cli = Cli::parse_from(["sextant", "--log-level", "debug", "run"]);
        assert_eq!(cli.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_cli_parse_run_overrides() {
        let cli = Cli::parse_from(["sextant", "run", "--dry-run", "--force-overwrite", "--patient-id", "P1,P2"]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(args.dry_run);
        assert!(args.force_overwrite);
        assert_eq!(args.patient_id.as_deref(), Some("P1,P2"));
    }

    #[test]
    fn test_cli_parse_index() {
        let cli = Cli::parse_from(["sextant", "index", "--output", "idx.csv"]);
        assert!(matches!(cli.command, Commands::Index(_)));
    }

    #[test]
    fn test_cli_parse_merge() {
        let cli = Cli::parse_from(["sextant", "merge", "--sample-size", "10", "--parallel"]);
        let Commands::Merge(args) = cli.command else {
            panic!("expected merge");
        };
        assert_eq!(args.sample_size, Some(10));
        assert!(args.parallel);
    }

    #[test]
    fn test_cli_parse_validate_config() {
        let cli = Cli::parse_from(["sextant", "validate-config"]);
        assert!(matches!(cli.command, Commands::ValidateConfig(_)));
    }

    #[test]
    fn test_cli_parse_status() {
        let cli = Cli::parse_from(["sextant", "status"]);
        assert!(matches!(cli.command, Commands::Status(_)));
    }

    #[test]
    fn test_cli_parse_init() {
        let cli = Cli::parse_from(["sextant", "init"]);
        assert!(matches!(cli.command, Commands::Init(_)));
    }
}
