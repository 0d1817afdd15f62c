//! Command-line flags and their merge over loaded settings.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tether_client::ClientConfig;
use tether_core::logging::LogFormat;
use tether_settings::{ClientSettings, LogLevel, TetherSettings};

/// Interactive chat over a WebSocket session that reconnects on its own.
#[derive(Parser, Debug)]
#[command(name = "tether", version, about)]
pub struct Cli {
    /// WebSocket endpoint (`ws://` or `wss://`).
    #[arg(long)]
    pub url: Option<String>,

    /// Sender name stamped on outgoing messages.
    #[arg(long)]
    pub user: Option<String>,

    /// Settings file (defaults to `~/.tether/settings.json`).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error).
    #[arg(long, value_parser = parse_log_level)]
    pub log_level: Option<LogLevel>,

    /// Log output format (compact, json).
    #[arg(long, value_parser = parse_log_format)]
    pub log_format: Option<LogFormat>,

    /// Bound on each receive, in milliseconds.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub read_timeout_ms: Option<u64>,

    /// Bound on each send, in milliseconds.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub write_timeout_ms: Option<u64>,

    /// Bound on the liveness probe, in milliseconds.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub ping_timeout_ms: Option<u64>,

    /// Delay between reconnect attempts, in milliseconds.
    #[arg(long)]
    pub reconnect_cooldown_ms: Option<u64>,
}

fn parse_log_level(value: &str) -> std::result::Result<LogLevel, String> {
    LogLevel::parse(value).ok_or_else(|| format!("unknown log level '{value}'"))
}

fn parse_log_format(value: &str) -> std::result::Result<LogFormat, String> {
    LogFormat::parse(value).ok_or_else(|| format!("unknown log format '{value}'"))
}

impl Cli {
    /// Load settings (file and env layers), apply flags, and validate.
    pub fn resolve_settings(&self) -> Result<TetherSettings> {
        let path = self.config.clone().unwrap_or_else(tether_settings::settings_path);
        let mut settings = tether_settings::load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;
        self.apply(&mut settings);
        settings.validate().context("Invalid settings")?;
        Ok(settings)
    }

    /// Overwrite settings with every flag that was given.
    pub fn apply(&self, settings: &mut TetherSettings) {
        let client = &mut settings.client;
        if let Some(url) = &self.url {
            client.url.clone_from(url);
        }
        if let Some(user) = &self.user {
            client.user_name.clone_from(user);
        }
        if let Some(ms) = self.read_timeout_ms {
            client.read_timeout_ms = ms;
        }
        if let Some(ms) = self.write_timeout_ms {
            client.write_timeout_ms = ms;
        }
        if let Some(ms) = self.ping_timeout_ms {
            client.ping_timeout_ms = ms;
        }
        if let Some(ms) = self.reconnect_cooldown_ms {
            client.reconnect_cooldown_ms = ms;
        }
        if let Some(level) = self.log_level {
            settings.logging.level = level;
        }
        if let Some(format) = self.log_format {
            settings.logging.format = format;
        }
    }
}

/// Lifecycle timing for the client.
pub fn client_config(settings: &ClientSettings) -> ClientConfig {
    ClientConfig {
        read_timeout: settings.read_timeout(),
        write_timeout: settings.write_timeout(),
        ping_timeout: settings.ping_timeout(),
        reconnect_cooldown: settings.reconnect_cooldown(),
        outbound_high_water_mark: settings.outbound_high_water_mark,
    }
}

/// Bound on the graceful shutdown at exit.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(3);
