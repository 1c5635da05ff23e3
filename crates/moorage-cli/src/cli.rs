use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;

/// Log level options for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    Off,
    /// Error messages only
    Error,
    /// Warnings and errors (default)
    Warn,
    /// Informational messages
    Info,
    /// Debug messages
    Debug,
    /// Trace-level messages (most verbose)
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

#[derive(Parser)]
#[command(name = "moorage")]
#[command(about = "moorage - translate stage-three queries into native document-store requests")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Set log level (off, error, warn, info, debug, trace)
    /// If not specified, uses config file value or defaults to 'warn'
    #[arg(short = 'l', long, global = true, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Enable verbose logging (shortcut for --log-level=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path (.toml, .yaml, .yml or .json)
    #[arg(short = 'C', long, global = true, env = "MOORAGE_CONFIG")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Effective log level: flag, then `--verbose`, then the config value
    pub fn resolve_log_level(&self, configured: Option<&str>) -> LogLevel {
        if let Some(level) = self.log_level {
            return level;
        }
        if self.verbose {
            return LogLevel::Debug;
        }
        configured
            .and_then(|name| LogLevel::from_str(name, true).ok())
            .unwrap_or(LogLevel::Warn)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the native request a stage-three query translates to
    Translate {
        /// Stage-three query JSON file ('-' reads stdin)
        query: PathBuf,

        /// Model registry JSON file
        #[arg(short, long)]
        models: PathBuf,

        /// Pretty-print the output
        #[arg(long)]
        pretty: bool,
    },

    /// Run a stage-three query against an in-memory store seeded from a file
    Run {
        /// Stage-three query JSON file ('-' reads stdin)
        query: PathBuf,

        /// Model registry JSON file
        #[arg(short, long)]
        models: PathBuf,

        /// Seed records: JSON object mapping model identity to an array of records
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Pretty-print the output
        #[arg(long)]
        pretty: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_translate_args() {
        let cli = parse(&["moorage", "translate", "q.json", "--models", "m.json", "--pretty"]);
        match cli.command {
            Commands::Translate {
                query,
                models,
                pretty,
            } => {
                assert_eq!(query, PathBuf::from("q.json"));
                assert_eq!(models, PathBuf::from("m.json"));
                assert!(pretty);
            }
            _ => panic!("expected translate"),
        }
    }

    #[test]
    fn test_models_required() {
        assert!(Cli::try_parse_from(["moorage", "translate", "q.json"]).is_err());
    }

    #[test]
    fn test_log_level_precedence() {
        let cli = parse(&["moorage", "-l", "trace", "-v", "translate", "q", "-m", "m"]);
        assert_eq!(cli.resolve_log_level(Some("info")), LogLevel::Trace);

        let cli = parse(&["moorage", "--verbose", "translate", "q", "-m", "m"]);
        assert_eq!(cli.resolve_log_level(Some("info")), LogLevel::Debug);

        let cli = parse(&["moorage", "translate", "q", "-m", "m"]);
        assert_eq!(cli.resolve_log_level(Some("Info")), LogLevel::Info);
        assert_eq!(cli.resolve_log_level(Some("loud")), LogLevel::Warn);
        assert_eq!(cli.resolve_log_level(None), LogLevel::Warn);
    }
}
