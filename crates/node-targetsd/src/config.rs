//! Configuration for node-targetsd

use clap::{Parser, ValueEnum};
use node_targets_client::config::validate_master;
use node_targets_client::ClientConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Log output format
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// node-targetsd - cluster node scrape target daemon
#[derive(Parser, Debug, Clone)]
#[command(name = "node-targetsd")]
#[command(author, version, about = "Keeps a scrape target file in sync with cluster nodes", long_about = None)]
pub struct Config {
    /// URL of the Kubernetes API server
    #[arg(
        long,
        env = "NODE_TARGETS_MASTER",
        default_value = "https://kubernetes.default.svc.cluster.local"
    )]
    pub master: String,

    /// API version to use
    #[arg(long, default_value = "v1")]
    pub api_version: String,

    /// Skip verification of the API server's certificate
    #[arg(long)]
    pub insecure: bool,

    /// File containing the bearer token (empty to send none)
    #[arg(
        long,
        default_value = "/var/run/secrets/kubernetes.io/serviceaccount/token"
    )]
    pub bearer_token_file: String,

    /// File containing the CA certificate (empty to use built-in roots)
    #[arg(
        long,
        default_value = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt"
    )]
    pub ca_cert_file: String,

    /// File to write the node targets to
    #[arg(long, default_value = "/etc/prometheus/config.d/nodes.yml")]
    pub nodes_file: PathBuf,

    /// Port that metrics can be retrieved from on the nodes
    #[arg(long, default_value = "10255")]
    pub node_read_only_port: u16,

    /// Server-side watch timeout in seconds (forces a periodic resync)
    #[arg(long)]
    pub watch_timeout_secs: Option<u64>,

    /// Abandon a watch that delivers nothing for this many seconds (0 waits forever)
    #[arg(long, default_value = "300")]
    pub watch_idle_timeout_secs: u64,

    /// Connect and list request timeout in seconds
    #[arg(long, default_value = "30")]
    pub request_timeout_secs: u64,

    /// First delay before retrying a failed resync (milliseconds)
    #[arg(long, default_value = "500")]
    pub resync_initial_backoff_ms: u64,

    /// Upper bound for the resync retry delay (seconds)
    #[arg(long, default_value = "30")]
    pub resync_max_backoff_secs: u64,

    /// Consecutive failed resyncs before exiting (unbounded when unset)
    #[arg(long)]
    pub max_resync_attempts: Option<u32>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Log format
    #[arg(long, value_enum, default_value = "pretty")]
    pub log_format: LogFormat,
}

impl Config {
    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.node_read_only_port == 0 {
            anyhow::bail!("Node read-only port cannot be 0");
        }
        if self.api_version.is_empty() {
            anyhow::bail!("API version cannot be empty");
        }
        validate_master(&self.master)?;
        if self.resync_initial_backoff_ms == 0 {
            anyhow::bail!("Resync backoff must be at least 1ms");
        }
        if self.max_resync_attempts == Some(0) {
            anyhow::bail!("Max resync attempts must be at least 1");
        }
        if self.nodes_file.file_name().is_none() {
            anyhow::bail!("Nodes file must name a file: {}", self.nodes_file.display());
        }
        Ok(())
    }

    /// Settings for the cluster API client
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            master: self.master.clone(),
            api_version: self.api_version.clone(),
            insecure: self.insecure,
            bearer_token_file: non_empty(&self.bearer_token_file),
            ca_cert_file: non_empty(&self.ca_cert_file),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            watch_timeout: self.watch_timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn watch_idle_timeout(&self) -> Option<Duration> {
        match self.watch_idle_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.resync_initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.resync_max_backoff_secs).max(self.initial_backoff())
    }
}

fn non_empty(path: &str) -> Option<PathBuf> {
    if path.is_empty() {
        None
    } else {
        Some(PathBuf::from(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        Config::parse_from(std::iter::once("node-targetsd").chain(args.iter().copied()))
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);
        assert_eq!(config.api_version, "v1");
        assert_eq!(config.node_read_only_port, 10255);
        assert_eq!(config.nodes_file, PathBuf::from("/etc/prometheus/config.d/nodes.yml"));
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.max_resync_attempts.is_none());
        assert!(config.validate().is_ok());

        let client = config.client_config();
        assert_eq!(
            client.bearer_token_file,
            Some(PathBuf::from("/var/run/secrets/kubernetes.io/serviceaccount/token"))
        );
        assert!(client.watch_timeout.is_none());
        assert_eq!(config.watch_idle_timeout(), Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_watch_idle_timeout_can_be_disabled() {
        assert!(parse(&["--watch-idle-timeout-secs", "0"]).watch_idle_timeout().is_none());
        assert_eq!(
            parse(&["--watch-idle-timeout-secs", "90"]).watch_idle_timeout(),
            Some(Duration::from_secs(90))
        );
    }

    #[test]
    fn test_empty_paths_disable_credentials() {
        let config = parse(&["--bearer-token-file", "", "--ca-cert-file", ""]);
        let client = config.client_config();
        assert!(client.bearer_token_file.is_none());
        assert!(client.ca_cert_file.is_none());
    }

    #[test]
    fn test_validate() {
        assert!(parse(&["--node-read-only-port", "0"]).validate().is_err());
        assert!(parse(&["--master", "ftp://example.com"]).validate().is_err());
        assert!(parse(&["--master", "::"]).validate().is_err());
        assert!(parse(&["--max-resync-attempts", "0"]).validate().is_err());
        assert!(parse(&["--resync-initial-backoff-ms", "0"]).validate().is_err());
        assert!(parse(&["--master", "http://127.0.0.1:8001", "--max-resync-attempts", "1"])
            .validate()
            .is_ok());
    }

    #[test]
    fn test_backoff_bounds() {
        let config = parse(&[
            "--resync-initial-backoff-ms",
            "5000",
            "--resync-max-backoff-secs",
            "1",
        ]);
        assert_eq!(config.initial_backoff(), Duration::from_secs(5));
        assert_eq!(config.max_backoff(), Duration::from_secs(5));
    }

    #[test]
    fn test_log_format_json() {
        let config = parse(&["--log-format", "json", "-v"]);
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.verbose);
    }
}
