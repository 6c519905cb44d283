//! Configuration module for the asset service.
//!
//! Loads configuration from `config.toml` with environment variable overrides.

use config::{Config as ConfigLoader, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::AppError;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub assets: AssetsConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub flags: FlagsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Asset serving configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AssetsConfig {
    /// Storage root for the local backend.
    #[serde(default = "default_base_path")]
    pub base_path: PathBuf,
    #[serde(default = "default_cache_control")]
    pub cache_control: String,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
            cache_control: default_cache_control(),
        }
    }
}

fn default_base_path() -> PathBuf {
    PathBuf::from("./assets")
}

fn default_cache_control() -> String {
    "public, max-age=31536000".to_string()
}

/// Database configuration, used only by the readiness probe.
#[derive(Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `postgres://` or `jdbc:postgresql://` URL.
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_max_lifetime")]
    pub max_lifetime_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout_secs: u64,
}

// Custom Debug implementation to avoid exposing credentials
impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url.as_deref().map(crate::db::redact_dsn))
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .field("max_lifetime_secs", &self.max_lifetime_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("ping_timeout_secs", &self.ping_timeout_secs)
            .finish()
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            username: None,
            password: None,
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            max_lifetime_secs: default_max_lifetime(),
            connect_timeout_secs: default_connect_timeout(),
            ping_timeout_secs: default_ping_timeout(),
        }
    }
}

impl DatabaseConfig {
    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_timeout_secs)
    }
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    5
}

fn default_max_lifetime() -> u64 {
    30 * 60
}

fn default_connect_timeout() -> u64 {
    40
}

fn default_ping_timeout() -> u64 {
    2
}

/// Where flag snapshots come from.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FlagSourceKind {
    /// Run on built-in defaults.
    #[default]
    None,
    /// Poll a JSON document on disk.
    File,
    /// Poll a JSON document over HTTP.
    Http,
}

/// Dynamic flag configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FlagsConfig {
    #[serde(default)]
    pub source: FlagSourceKind,
    /// Flag document for the `file` source.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Flag endpoint for the `http` source.
    #[serde(default)]
    pub url: Option<String>,
    /// File holding the flag service environment key.
    #[serde(default = "default_key_file")]
    pub key_file: PathBuf,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_fetch_interval")]
    pub fetch_interval_secs: u64,
    #[serde(default = "default_init_timeout")]
    pub init_timeout_secs: u64,
}

impl Default for FlagsConfig {
    fn default() -> Self {
        Self {
            source: FlagSourceKind::None,
            path: None,
            url: None,
            key_file: default_key_file(),
            namespace: default_namespace(),
            fetch_interval_secs: default_fetch_interval(),
            init_timeout_secs: default_init_timeout(),
        }
    }
}

impl FlagsConfig {
    pub fn fetch_interval(&self) -> Duration {
        Duration::from_secs(self.fetch_interval_secs.max(1))
    }

    pub fn init_timeout(&self) -> Duration {
        Duration::from_secs(self.init_timeout_secs)
    }
}

fn default_key_file() -> PathBuf {
    PathBuf::from("/app/config/fm.json")
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_fetch_interval() -> u64 {
    60
}

fn default_init_timeout() -> u64 {
    20
}

/// Reads a deployment variable, treating an empty value as unset.
fn legacy_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Configuration is loaded in the following order (later sources override earlier):
    /// 1. Default values
    /// 2. `config.toml` in current directory (optional)
    /// 3. Environment variables with `CODLOCKER_` prefix
    /// 4. Deployment variables `ASSETS_BASE_PATH`, `AUTH_DB_URL`, `AUTH_DB_USER`,
    ///    `AUTH_DB_PASSWORD` and `FM_NAMESPACE`
    ///
    /// Environment variables use double underscore for nesting:
    /// - `CODLOCKER_SERVER__PORT=9000` sets `server.port`
    /// - `CODLOCKER_FLAGS__SOURCE=file` sets `flags.source`
    pub fn load() -> Result<Self, AppError> {
        Self::load_from("config.toml")
    }

    /// Load configuration from a specific file path.
    pub fn load_from(config_path: &str) -> Result<Self, AppError> {
        let config = ConfigLoader::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("assets.base_path", "./assets")?
            .set_default("assets.cache_control", "public, max-age=31536000")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 5)?
            .set_default("flags.source", "none")?
            .set_default("flags.fetch_interval_secs", 60)?
            .set_default("flags.init_timeout_secs", 20)?
            .add_source(File::with_name(config_path).required(false))
            // CODLOCKER_SERVER__PORT=9000 -> server.port = 9000
            .add_source(
                Environment::with_prefix("CODLOCKER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("assets.base_path", legacy_env("ASSETS_BASE_PATH"))?
            .set_override_option("database.url", legacy_env("AUTH_DB_URL"))?
            .set_override_option("database.username", legacy_env("AUTH_DB_USER"))?
            .set_override_option("database.password", legacy_env("AUTH_DB_PASSWORD"))?
            .set_override_option("flags.namespace", legacy_env("FM_NAMESPACE"))?
            .build()?;

        let config: Config = config.try_deserialize()?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration for required fields.
    fn validate(&self) -> Result<(), AppError> {
        match self.flags.source {
            FlagSourceKind::File if self.flags.path.is_none() => {
                return Err(AppError::BadConfig(
                    "flags.source = \"file\" requires flags.path".to_string(),
                ));
            }
            FlagSourceKind::Http if self.flags.url.is_none() => {
                return Err(AppError::BadConfig(
                    "flags.source = \"http\" requires flags.url".to_string(),
                ));
            }
            _ => {}
        }

        // The readiness probe cannot work without a database, but the URL is
        // checked when connecting so config stays loadable in tests.
        if self.database.url.is_none() {
            tracing::warn!("Database URL not configured - /ready will fail");
        }

        Ok(())
    }

    /// Get the server socket address
    pub fn server_addr(&self) -> std::net::SocketAddr {
        use std::net::{IpAddr, Ipv4Addr, SocketAddr};
        let ip: IpAddr = self.server.host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid host '{}', using 0.0.0.0", self.server.host);
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        });
        SocketAddr::new(ip, self.server.port)
    }
}
