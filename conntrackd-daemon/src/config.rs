//! Configuration resolution for conntrackd.
//!
//! Three layers, later ones win: the TOML configuration file,
//! `CONNTRACKD_*` environment variables, and CLI flags. The resolved
//! [`ConntrackdConfig`] is validated before the daemon starts.

use std::path::Path;

use anyhow::{Context, Result};

use conntrackd_core::config::ConntrackdConfig;

use crate::cli::DaemonCli;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/conntrackd/conntrackd.toml";

/// Environment variable prefix for overrides.
const ENV_PREFIX: &str = "CONNTRACKD_";

/// Resolve the effective configuration from file, environment, and CLI.
pub fn load(cli: &DaemonCli) -> Result<ConntrackdConfig> {
    let mut config = match &cli.config {
        Some(path) => read_file(path)
            .with_context(|| format!("failed to load config file {}", path.display()))?,
        None => {
            let default = Path::new(DEFAULT_CONFIG_PATH);
            if default.is_file() {
                read_file(default).with_context(|| {
                    format!("failed to load config file {DEFAULT_CONFIG_PATH}")
                })?
            } else {
                ConntrackdConfig::default()
            }
        }
    };

    apply_env_overrides(&mut config);
    apply_cli_overrides(&mut config, cli);

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn read_file(path: &Path) -> Result<ConntrackdConfig> {
    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)?;
    Ok(config)
}

/// Apply `CONNTRACKD_*` environment overrides.
///
/// Dots in config keys map to underscores, e.g.
/// `sinks.syslog.address` becomes `CONNTRACKD_SINK_SYSLOG_ADDRESS`.
fn apply_env_overrides(config: &mut ConntrackdConfig) {
    if let Some(value) = env_var("LOG_LEVEL") {
        config.log_level = value;
    }
    if let Some(value) = env_var("LOG_FORMAT") {
        config.log_format = value;
    }
    if let Some(value) = env_var("GEOIP_DATABASE") {
        config.geoip_database = Some(value.into());
    }

    if let Some(value) = env_var("SINK_JOURNAL_ENABLE") {
        config.sinks.journal.enable = parse_bool(&value);
    }
    if let Some(value) = env_var("SINK_SYSLOG_ENABLE") {
        config.sinks.syslog.enable = parse_bool(&value);
    }
    if let Some(value) = env_var("SINK_SYSLOG_ADDRESS") {
        config.sinks.syslog.address = value;
    }
    if let Some(value) = env_var("SINK_LOKI_ENABLE") {
        config.sinks.loki.enable = parse_bool(&value);
    }
    if let Some(value) = env_var("SINK_LOKI_ADDRESS") {
        config.sinks.loki.address = value;
    }
    if let Some(value) = env_var("SINK_LOKI_LABELS") {
        config.sinks.loki.labels = value
            .split(',')
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect();
    }
    if let Some(value) = env_var("SINK_STREAM_ENABLE") {
        config.sinks.stream.enable = parse_bool(&value);
    }
    if let Some(value) = env_var("SINK_STREAM_WRITER") {
        config.sinks.stream.writer = value;
    }
}

/// Apply CLI flag overrides (highest precedence).
fn apply_cli_overrides(config: &mut ConntrackdConfig, cli: &DaemonCli) {
    if !cli.filter_rules.is_empty() {
        config.filter_rules = cli.filter_rules.clone();
    }
    if let Some(ref level) = cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.log_format = format.clone();
    }
    if let Some(ref path) = cli.geoip_database {
        config.geoip_database = Some(path.clone());
    }

    // Enable flags only switch on; disabling is done in the file or env.
    if cli.sink_journal_enable {
        config.sinks.journal.enable = true;
    }
    if cli.sink_syslog_enable {
        config.sinks.syslog.enable = true;
    }
    if let Some(ref address) = cli.sink_syslog_address {
        config.sinks.syslog.address = address.clone();
    }
    if cli.sink_loki_enable {
        config.sinks.loki.enable = true;
    }
    if let Some(ref address) = cli.sink_loki_address {
        config.sinks.loki.address = address.clone();
    }
    if !cli.sink_loki_labels.is_empty() {
        config.sinks.loki.labels = cli.sink_loki_labels.clone();
    }
    if cli.sink_stream_enable {
        config.sinks.stream.enable = true;
    }
    if let Some(ref writer) = cli.sink_stream_writer {
        config.sinks.stream.writer = writer.clone();
    }
}

fn env_var(suffix: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{suffix}")).ok()
}

fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}
