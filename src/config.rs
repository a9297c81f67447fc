//! Configuration
//!
//! Supports both command-line arguments and a TOML configuration file.
//! CLI arguments take precedence over config file values. Listening
//! address, certificate paths and TLS policy all live here; the core
//! connection code never reads configuration directly.

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

/// Command-line arguments for the echo server
#[derive(Parser, Debug)]
#[command(name = "tls-echo")]
#[command(version = "0.1.0")]
#[command(about = "A TLS-terminating TCP echo server", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to (e.g., 127.0.0.1:8443)
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Path to the server certificate (PEM)
    #[arg(long)]
    pub cert: Option<PathBuf>,

    /// Path to the server private key (PEM)
    #[arg(long)]
    pub key: Option<PathBuf>,

    /// Minimum accepted TLS version (1.0, 1.1, 1.2, 1.3)
    #[arg(long)]
    pub min_tls_version: Option<String>,

    /// OpenSSL cipher list for TLS <= 1.2
    #[arg(long)]
    pub ciphers: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub tls: TlsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

/// TLS-related configuration
#[derive(Debug, Deserialize)]
pub struct TlsConfig {
    /// Path to the server certificate (PEM)
    pub cert: Option<PathBuf>,
    /// Path to the server private key (PEM)
    pub key: Option<PathBuf>,
    /// Minimum accepted TLS version
    #[serde(default = "default_min_tls_version")]
    pub min_version: String,
    /// OpenSSL cipher list for TLS <= 1.2
    #[serde(default = "default_ciphers")]
    pub ciphers: String,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            cert: None,
            key: None,
            min_version: default_min_tls_version(),
            ciphers: default_ciphers(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_listen() -> String {
    "127.0.0.1:8443".to_string()
}

fn default_min_tls_version() -> String {
    "1.2".to_string()
}

fn default_ciphers() -> String {
    "HIGH:!aNULL:!MD5:!RC4".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: String,
    pub cert: Option<PathBuf>,
    pub key: Option<PathBuf>,
    pub min_tls_version: String,
    pub cipher_list: String,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        Self::resolve(CliArgs::parse())
    }

    fn resolve(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        let config = Config {
            listen: cli.listen.unwrap_or(toml_config.server.listen),
            cert: cli.cert.or(toml_config.tls.cert),
            key: cli.key.or(toml_config.tls.key),
            min_tls_version: cli
                .min_tls_version
                .unwrap_or(toml_config.tls.min_version),
            cipher_list: cli.ciphers.unwrap_or(toml_config.tls.ciphers),
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        };

        if config.cert.is_some() != config.key.is_some() {
            return Err(ConfigError::IncompleteTls);
        }

        Ok(config)
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {}", .0.display(), .1)]
    FileRead(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse config file '{}': {}", .0.display(), .1)]
    TomlParse(PathBuf, #[source] toml::de::Error),

    #[error("certificate and key must be configured together")]
    IncompleteTls,
}
