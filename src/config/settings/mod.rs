
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable overriding the listening port
pub const PORT_ENV: &str = "PORT";
/// Environment variable overriding the bind host
pub const HOST_ENV: &str = "HOST";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub widget: WidgetConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub transport: Transport,
    pub path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "todo-mcp".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8080,
            transport: Transport::Http,
            path: "/mcp".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WidgetConfig {
    pub path: PathBuf,
    pub uri: String,
    pub name: String,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("assets/todo-widget.html"),
            uri: "ui://widget/todo.html".to_string(),
            name: "todo-widget".to_string(),
        }
    }
}

/// How the server talks to its client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Http,
    Stdio,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found")]
    DirectoryError,
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid PORT value: {0:?}")]
    InvalidPortValue(String),
    #[error("Invalid host: {0:?}")]
    InvalidHost(String),
    #[error("Invalid endpoint path: {0:?} (must start with '/')")]
    InvalidPath(String),
    #[error("Invalid server name: {0:?} (cannot be empty)")]
    InvalidName(String),
    #[error("Invalid widget URI: {0:?} (must look like scheme://...)")]
    InvalidWidgetUri(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Load `path`, falling back to defaults when the file does not exist
    #[inline]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_path = path.as_ref();

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    /// Default location of the configuration file
    #[inline]
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let dir = dirs::config_dir().ok_or(ConfigError::DirectoryError)?;
        Ok(dir.join("todo-mcp").join("config.toml"))
    }

    /// Override settings from `PORT` and `HOST`
    #[inline]
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Override settings using `lookup` in place of the process environment
    #[inline]
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup(PORT_ENV) {
            let port = port
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPortValue(port.clone()))?;
            self.server.set_port(port)?;
        }

        if let Some(host) = lookup(HOST_ENV) {
            self.server.set_host(host)?;
        }

        Ok(())
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.widget.validate()?;
        Ok(())
    }

    #[inline]
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::InvalidName(self.name.clone()));
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        if self.host.trim().is_empty() || self.host.contains(char::is_whitespace) {
            return Err(ConfigError::InvalidHost(self.host.clone()));
        }

        if !self.path.starts_with('/') {
            return Err(ConfigError::InvalidPath(self.path.clone()));
        }

        Ok(())
    }

    /// Resolve `host:port` into the address to bind
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if let Ok(ip) = self.host.parse::<IpAddr>() {
            return Ok(SocketAddr::new(ip, self.port));
        }

        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|_| ConfigError::InvalidHost(self.host.clone()))?
            .next()
            .ok_or_else(|| ConfigError::InvalidHost(self.host.clone()))
    }

    pub fn set_port(&mut self, port: u16) -> Result<(), ConfigError> {
        if port == 0 {
            return Err(ConfigError::InvalidPort(port));
        }
        self.port = port;
        Ok(())
    }

    pub fn set_host(&mut self, host: String) -> Result<(), ConfigError> {
        let host = host.trim().to_string();
        if host.is_empty() || host.contains(char::is_whitespace) {
            return Err(ConfigError::InvalidHost(host));
        }
        self.host = host;
        Ok(())
    }
}

impl WidgetConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let has_scheme = self
            .uri
            .split_once("://")
            .is_some_and(|(scheme, rest)| !scheme.is_empty() && !rest.is_empty());
        if !has_scheme {
            return Err(ConfigError::InvalidWidgetUri(self.uri.clone()));
        }
        Ok(())
    }
}
