//! CLI argument definitions for conntrackd.
//!
//! Uses `clap` v4 derive macros. Flags mirror the configuration file
//! layout; every flag takes precedence over the file and the
//! `CONNTRACKD_*` environment variables.

use std::path::PathBuf;

use clap::Parser;

/// Connection tracking logging service.
///
/// Subscribes to kernel conntrack notifications, filters them through
/// a rule set, optionally enriches them with GeoIP data, and logs the
/// resulting records to the enabled sinks.
#[derive(Parser, Debug)]
#[command(name = "conntrackd")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to the conntrackd.toml configuration file.
    ///
    /// Defaults to /etc/conntrackd/conntrackd.toml; a missing default
    /// file is fine, a missing explicit file is an error.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Filter rules in DSL format (repeatable, first-match wins).
    #[arg(long = "filter", value_name = "RULE")]
    pub filter_rules: Vec<String>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Path to a GeoIP2 City database.
    #[arg(long = "geoip.database", value_name = "PATH")]
    pub geoip_database: Option<PathBuf>,

    /// Enable the systemd journal sink.
    #[arg(long = "sink.journal.enable")]
    pub sink_journal_enable: bool,

    /// Enable the syslog sink.
    #[arg(long = "sink.syslog.enable")]
    pub sink_syslog_enable: bool,

    /// Syslog address (udp, tcp, unix, unixgram, unixpacket scheme).
    #[arg(long = "sink.syslog.address", value_name = "URL")]
    pub sink_syslog_address: Option<String>,

    /// Enable the Grafana Loki sink.
    #[arg(long = "sink.loki.enable")]
    pub sink_loki_enable: bool,

    /// Loki address (http or https scheme).
    #[arg(long = "sink.loki.address", value_name = "URL")]
    pub sink_loki_address: Option<String>,

    /// Additional labels for the Loki sink in key=value format.
    #[arg(long = "sink.loki.labels", value_name = "LABELS", value_delimiter = ',')]
    pub sink_loki_labels: Vec<String>,

    /// Enable the stream sink.
    #[arg(long = "sink.stream.enable")]
    pub sink_stream_enable: bool,

    /// Stream writer (stdout, stderr, discard).
    #[arg(long = "sink.stream.writer", value_name = "WRITER")]
    pub sink_stream_writer: Option<String>,

    /// Validate the resolved configuration and exit.
    #[arg(long)]
    pub validate: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        DaemonCli::command().debug_assert();
    }

    #[test]
    fn repeatable_filter_flag() {
        let cli = DaemonCli::parse_from([
            "conntrackd",
            "--filter",
            "log any",
            "--filter",
            "drop protocol UDP",
        ]);
        assert_eq!(cli.filter_rules, vec!["log any", "drop protocol UDP"]);
    }

    #[test]
    fn sink_flags_parse() {
        let cli = DaemonCli::parse_from([
            "conntrackd",
            "--sink.stream.enable",
            "--sink.stream.writer",
            "stderr",
            "--sink.loki.labels",
            "env=prod,zone=eu",
        ]);
        assert!(cli.sink_stream_enable);
        assert_eq!(cli.sink_stream_writer.as_deref(), Some("stderr"));
        assert_eq!(cli.sink_loki_labels, vec!["env=prod", "zone=eu"]);
    }
}
