use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hustler", about = "Intraday volatility signals with position and risk management")]
pub struct Cli {
    /// Path to a TOML config file (falls back to $HUSTLER_CONFIG, then defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Override the configured log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Poll the watch list until Ctrl-C
    Run,
    /// Run a single polling pass and print the report
    Tick,
    /// Classify a price series given as JSON ({"instrument", "prices", "volumes", "timestamps"?})
    Analyze {
        json: String,
    },
    /// List positions from the audit store
    Positions {
        /// Only open positions
        #[arg(long)]
        open: bool,
        #[arg(long)]
        instrument: Option<String>,
        /// Only positions opened at or after this RFC 3339 time
        #[arg(long)]
        since: Option<DateTime<Utc>>,
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// List recorded signals
    Signals {
        #[arg(long)]
        instrument: Option<String>,
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Validate the configuration and print it
    CheckConfig,
    /// Print a config file with every default filled in
    InitConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_positions_since_is_rfc3339() {
        let cli = Cli::try_parse_from(["hustler", "positions", "--open", "--since", "2024-01-08T15:00:00Z"]).unwrap();
        match cli.command {
            Commands::Positions { open, since, limit, .. } => {
                assert!(open);
                assert_eq!(since, Some(Utc.with_ymd_and_hms(2024, 1, 8, 15, 0, 0).unwrap()));
                assert_eq!(limit, 20);
            }
            _ => panic!("expected the positions command"),
        }
        assert!(Cli::try_parse_from(["hustler", "positions", "--since", "yesterday"]).is_err());
    }
}
