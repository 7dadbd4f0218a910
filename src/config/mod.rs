use crate::backoff::BackoffConfig;
use crate::error::{ForwarderError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Forwarder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwarderConfig {
    /// Host of the network log collector; file sinks are used when unset
    #[serde(default)]
    pub sink_host: Option<String>,

    /// Port of the network log collector
    #[serde(default)]
    pub sink_port: Option<u16>,

    /// Environment keys a container must define (non-empty) to be forwarded
    #[serde(default)]
    pub whitelist: Vec<String>,

    /// Container env key naming an in-container log file to follow instead
    /// of attaching to stdout/stderr
    #[serde(default = "default_log_path_key")]
    pub log_path_key: String,

    /// Container env key used to label the container
    #[serde(default = "default_app_id_key")]
    pub app_id_key: String,

    /// Directory for per-container log files
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Sink reconnect delays
    #[serde(default)]
    pub reconnect: BackoffConfig,

    /// Optional delays between re-attachments; immediate when unset
    #[serde(default)]
    pub reattach: Option<BackoffConfig>,
}

// Default value functions for serde
fn default_log_path_key() -> String {
    "LOG_FILE_PATH".to_string()
}

fn default_app_id_key() -> String {
    "MARATHON_APP_ID".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            sink_host: None,
            sink_port: None,
            whitelist: Vec::new(),
            log_path_key: default_log_path_key(),
            app_id_key: default_app_id_key(),
            log_dir: default_log_dir(),
            reconnect: BackoffConfig::default(),
            reattach: None,
        }
    }
}

/// Where forwarded bytes go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkTarget {
    Tcp { host: String, port: u16 },
    Files { dir: PathBuf },
}

/// Values given on the command line or through environment variables
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub sink_host: Option<String>,
    pub sink_port: Option<u16>,
    pub whitelist: Option<String>,
    pub log_path_key: Option<String>,
    pub app_id_key: Option<String>,
    pub log_dir: Option<PathBuf>,
}

/// Split a comma-separated key list, dropping blanks
pub fn parse_whitelist(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect()
}

impl ForwarderConfig {
    /// Load and validate configuration from a file (supports TOML and JSON)
    pub fn from_file(path: &Path) -> Result<ForwarderConfig> {
        let config = Self::load_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a file without validating it
    ///
    /// Used when further overrides are applied on top; the caller validates
    /// the merged result.
    pub fn load_file(path: &Path) -> Result<ForwarderConfig> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ForwarderError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");

        let mut config = match extension {
            "toml" => Self::parse_toml(&contents)?,
            "json" => Self::parse_json(&contents)?,
            _ => {
                return Err(ForwarderError::InvalidConfig(format!(
                    "Unsupported file format: {}. Use .toml or .json",
                    extension
                )))
            }
        };

        config.expand_env_vars();

        Ok(config)
    }

    fn parse_toml(contents: &str) -> Result<ForwarderConfig> {
        toml::from_str(contents)
            .map_err(|e| ForwarderError::InvalidConfig(format!("Failed to parse TOML: {}", e)))
    }

    fn parse_json(contents: &str) -> Result<ForwarderConfig> {
        serde_json::from_str(contents)
            .map_err(|e| ForwarderError::InvalidConfig(format!("Failed to parse JSON: {}", e)))
    }

    /// Apply command line / environment values on top of this configuration
    pub fn apply(&mut self, overrides: ConfigOverrides) {
        if let Some(host) = overrides.sink_host {
            self.sink_host = Some(host);
        }
        if let Some(port) = overrides.sink_port {
            self.sink_port = Some(port);
        }
        if let Some(list) = overrides.whitelist {
            self.whitelist = parse_whitelist(&list);
        }
        if let Some(key) = overrides.log_path_key {
            self.log_path_key = key;
        }
        if let Some(key) = overrides.app_id_key {
            self.app_id_key = key;
        }
        if let Some(dir) = overrides.log_dir {
            self.log_dir = Self::expand_env_in_path(&dir);
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        match (&self.sink_host, self.sink_port) {
            (Some(host), _) if host.trim().is_empty() => {
                return Err(ForwarderError::ConfigValidationError(
                    "sink_host cannot be empty".to_string(),
                ));
            }
            (Some(_), None) => {
                return Err(ForwarderError::MissingConfigField("sink_port".to_string()));
            }
            (None, Some(_)) => {
                return Err(ForwarderError::MissingConfigField("sink_host".to_string()));
            }
            (_, Some(0)) => {
                return Err(ForwarderError::ConfigValidationError(
                    "sink_port must be between 1 and 65535".to_string(),
                ));
            }
            _ => {}
        }

        if self.whitelist.iter().any(|key| key.trim().is_empty()) {
            return Err(ForwarderError::ConfigValidationError(
                "whitelist cannot contain empty keys".to_string(),
            ));
        }

        if self.log_path_key.is_empty() {
            return Err(ForwarderError::MissingConfigField("log_path_key".to_string()));
        }

        if self.app_id_key.is_empty() {
            return Err(ForwarderError::MissingConfigField("app_id_key".to_string()));
        }

        if self.log_dir.as_os_str().is_empty() {
            return Err(ForwarderError::MissingConfigField("log_dir".to_string()));
        }

        Self::validate_backoff("reconnect", &self.reconnect)?;
        if let Some(reattach) = &self.reattach {
            Self::validate_backoff("reattach", reattach)?;
        }

        Ok(())
    }

    fn validate_backoff(name: &str, backoff: &BackoffConfig) -> Result<()> {
        if backoff.initial_delay_ms > backoff.max_delay_ms {
            return Err(ForwarderError::ConfigValidationError(format!(
                "{}.initial_delay_ms ({}) cannot exceed {}.max_delay_ms ({})",
                name, backoff.initial_delay_ms, name, backoff.max_delay_ms
            )));
        }
        Ok(())
    }

    /// Destination for forwarded bytes
    pub fn sink_target(&self) -> SinkTarget {
        match (&self.sink_host, self.sink_port) {
            (Some(host), Some(port)) => SinkTarget::Tcp {
                host: host.clone(),
                port,
            },
            _ => SinkTarget::Files {
                dir: self.log_dir.clone(),
            },
        }
    }

    /// Expand environment variables in path fields
    fn expand_env_vars(&mut self) {
        self.log_dir = Self::expand_env_in_path(&self.log_dir);
    }

    /// Expand `$VAR` and `${VAR}` in a string
    ///
    /// A bare `$VAR` takes the longest run of identifier characters. Unset
    /// variables and a `$` not followed by a name are left as written.
    fn expand_env_in_string(s: &str) -> String {
        let mut result = String::with_capacity(s.len());
        let mut rest = s;

        while let Some(pos) = rest.find('$') {
            result.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];

            let (name, token_len) = match after.strip_prefix('{') {
                Some(braced) => match braced.find('}') {
                    Some(end) => (&braced[..end], end + 2),
                    None => ("", 0),
                },
                None => {
                    let end = after
                        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                        .unwrap_or(after.len());
                    (&after[..end], end)
                }
            };

            let token = &rest[pos..pos + 1 + token_len];
            match std::env::var(name) {
                Ok(value) if !name.is_empty() => result.push_str(&value),
                _ => result.push_str(token),
            }
            rest = &rest[pos + 1 + token_len..];
        }

        result.push_str(rest);
        result
    }

    fn expand_env_in_path(path: &Path) -> PathBuf {
        let path_str = path.to_string_lossy();
        PathBuf::from(Self::expand_env_in_string(&path_str))
    }
}
