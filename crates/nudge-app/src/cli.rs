//! CLI argument definitions for the `nudge` binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Nudge: escalating reminders that get louder until you deal with them.
#[derive(Parser, Debug)]
#[command(name = "nudge", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Print the escalation ladder for a reminder due in N seconds.
    Plan {
        /// Seconds until the reminder is due. Negative means overdue.
        #[arg(long = "due-in", allow_hyphen_values = true)]
        due_in: i64,

        /// Seconds between escalation steps. Defaults to the configured value.
        #[arg(long)]
        interval: Option<i64>,
    },

    /// Schedule a reminder and print its alerts as they fire.
    Remind {
        #[arg(long)]
        title: String,

        /// Seconds until the reminder is due.
        #[arg(long = "due-in", allow_hyphen_values = true)]
        due_in: i64,
    },
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > NUDGE_CONFIG env var > ~/.nudge/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("NUDGE_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the log level. Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".nudge").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".nudge").join("config.toml");
    }
    PathBuf::from("config.toml")
}
