// CLI module - Process entry point, configuration loading and signal handling

use crate::backoff::BackoffPolicy;
use crate::config::{ConfigOverrides, ForwarderConfig, SinkTarget};
use crate::container::{ContainerRuntime, DockerRuntime};
use crate::error::Result;
use crate::forwarder::Forwarder;
use crate::logging;
use crate::sink::{FileSinkProvider, SinkProvider, TcpSinkProvider};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

/// logfwd - forward container stdout/stderr to a log collector or files
#[derive(Parser, Debug)]
#[command(name = "logfwd")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (.toml or .json)
    #[arg(short, long, env = "LOGFWD_CONFIG")]
    config: Option<PathBuf>,

    /// Log collector host; per-container files are written when unset
    #[arg(long, env = "LOGFWD_SINK_HOST")]
    sink_host: Option<String>,

    /// Log collector port
    #[arg(long, env = "LOGFWD_SINK_PORT")]
    sink_port: Option<u16>,

    /// Comma-separated env keys a container must define to be forwarded
    #[arg(long, env = "LOGFWD_WHITELIST")]
    whitelist: Option<String>,

    /// Container env key naming an in-container log file to follow
    #[arg(long, env = "LOGFWD_LOG_PATH_KEY")]
    log_path_key: Option<String>,

    /// Container env key used to label containers
    #[arg(long, env = "LOGFWD_APP_ID_KEY")]
    app_id_key: Option<String>,

    /// Directory for per-container log files
    #[arg(long, env = "LOGFWD_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Log filter, e.g. `info` or `logfwd=debug` (overrides RUST_LOG)
    #[arg(long, env = "LOGFWD_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    /// Run the forwarder until SIGINT/SIGTERM
    pub async fn run() -> Result<()> {
        let cli = Cli::parse();
        logging::init(cli.log_level.as_deref());

        let config = cli.load_config()?;
        execute(config).await
    }

    /// File configuration (if any) with command line / env values on top
    pub fn load_config(&self) -> Result<ForwarderConfig> {
        let mut config = match &self.config {
            Some(path) => ForwarderConfig::load_file(path)?,
            None => ForwarderConfig::default(),
        };

        config.apply(self.overrides());
        config.validate()?;

        Ok(config)
    }

    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            sink_host: self.sink_host.clone(),
            sink_port: self.sink_port,
            whitelist: self.whitelist.clone(),
            log_path_key: self.log_path_key.clone(),
            app_id_key: self.app_id_key.clone(),
            log_dir: self.log_dir.clone(),
        }
    }
}

/// Sink provider for the configured destination
pub fn sink_provider(config: &ForwarderConfig) -> Arc<dyn SinkProvider> {
    let backoff = BackoffPolicy::from_config(&config.reconnect);

    match config.sink_target() {
        SinkTarget::Tcp { host, port } => Arc::new(TcpSinkProvider::new(host, port, backoff)),
        SinkTarget::Files { dir } => Arc::new(FileSinkProvider::new(dir, backoff)),
    }
}

async fn execute(config: ForwarderConfig) -> Result<()> {
    let runtime: Arc<dyn ContainerRuntime> = Arc::new(DockerRuntime::connect()?);
    let sinks = sink_provider(&config);

    match config.sink_target() {
        SinkTarget::Tcp { host, port } => info!("Forwarding to tcp://{}:{}", host, port),
        SinkTarget::Files { dir } => info!("Forwarding to files in {}", dir.display()),
    }
    if config.whitelist.is_empty() {
        info!("No whitelist configured, forwarding every container");
    } else {
        info!("Whitelist: {}", config.whitelist.join(", "));
    }

    let forwarder = Forwarder::new(runtime, sinks, &config);
    forwarder.run(shutdown_signal()).await
}

/// Resolves on SIGTERM or SIGINT
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                    _ = sigint.recv() => info!("Received SIGINT"),
                }
                return;
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!("Failed to install signal handlers: {}", e);
            }
        }
    }

    if let Err(e) = signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from([
            "logfwd",
            "--sink-host",
            "collector",
            "--sink-port",
            "5000",
            "--whitelist",
            "MARATHON_APP_ID,TEAM",
        ])
        .unwrap();

        let config = cli.load_config().unwrap();
        assert_eq!(config.sink_host.as_deref(), Some("collector"));
        assert_eq!(config.sink_port, Some(5000));
        assert_eq!(config.whitelist, vec!["MARATHON_APP_ID", "TEAM"]);
    }

    #[test]
    fn test_flags_override_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("logfwd.toml");
        fs::write(
            &path,
            r#"
            whitelist = ["MARATHON_APP_ID"]
            log_dir = "/srv/logs"
            "#,
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "logfwd",
            "--config",
            path.to_str().unwrap(),
            "--log-dir",
            "/tmp/override",
        ])
        .unwrap();

        let config = cli.load_config().unwrap();
        assert_eq!(config.whitelist, vec!["MARATHON_APP_ID"]);
        assert_eq!(config.log_dir, PathBuf::from("/tmp/override"));
    }

    #[test]
    fn test_file_host_with_flag_port() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("logfwd.toml");
        fs::write(&path, r#"sink_host = "collector""#).unwrap();

        let cli = Cli::try_parse_from([
            "logfwd",
            "--config",
            path.to_str().unwrap(),
            "--sink-port",
            "5000",
        ])
        .unwrap();

        let config = cli.load_config().unwrap();
        assert_eq!(
            config.sink_target(),
            SinkTarget::Tcp {
                host: "collector".to_string(),
                port: 5000
            }
        );
    }

    #[test]
    fn test_file_still_validated_after_overrides() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("logfwd.toml");
        fs::write(&path, r#"sink_host = "collector""#).unwrap();

        let cli = Cli::try_parse_from(["logfwd", "--config", path.to_str().unwrap()]).unwrap();
        assert!(matches!(
            cli.load_config(),
            Err(crate::error::ForwarderError::MissingConfigField(field)) if field == "sink_port"
        ));
    }

    #[test]
    fn test_invalid_combination_rejected() {
        let cli = Cli::try_parse_from(["logfwd", "--sink-port", "5000"]).unwrap();
        assert!(cli.load_config().is_err());
    }

    #[test]
    fn test_invalid_port_rejected_by_parser() {
        assert!(Cli::try_parse_from(["logfwd", "--sink-port", "70000"]).is_err());
    }
}
