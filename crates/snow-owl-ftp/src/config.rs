//! Configuration for the FTP server

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which role the binary plays on startup.
///
/// Mirrors the `HW1_MODE` dispatch of the reference implementation this
/// crate's protocol core descends from: `server` runs the FTP listener,
/// `self_test` hands off to an external conformance harness that drives the
/// server as a client. That harness is not part of this crate; the field
/// exists so configuration loaded from the original environment still
/// round-trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerMode {
    /// Run the FTP listener.
    Server,
    /// Delegate to an external self-test harness.
    SelfTest,
}

impl Default for ServerMode {
    fn default() -> Self {
        ServerMode::Server
    }
}

/// Log format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Plain text logging for human readability
    Text,
    /// JSON structured logging
    Json,
}

impl Default for LogFormat {
    fn default() -> Self {
        LogFormat::Text
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format
    pub format: LogFormat,
    /// Optional log file path (logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            file: None,
        }
    }
}

/// FTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Startup mode
    pub mode: ServerMode,

    /// Server bind address
    pub bind_address: String,

    /// Server port (RFC 959 default is 21)
    pub port: u16,

    /// Root directory exposed to clients; all paths are jailed within it
    pub root_dir: PathBuf,

    /// Tab-separated login/password database (first line is a header)
    pub users_file: Option<PathBuf>,

    /// Whether password authentication is required at all
    pub auth_enabled: bool,

    /// Selects a subset of the external self-test harness's scenarios
    pub test_selector: Option<String>,

    /// Suppress the external harness's progress output
    pub quiet: bool,

    /// Inactivity timeout on the control socket, in seconds
    pub control_timeout_secs: u64,

    /// Inactivity timeout on data-connection reads/accepts, in seconds
    pub data_timeout_secs: u64,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Path this config was loaded from, if any (kept for `reload`)
    #[serde(skip)]
    pub config_file_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: ServerMode::default(),
            bind_address: default_bind_address(),
            port: default_port(),
            root_dir: default_root_dir(),
            users_file: None,
            auth_enabled: true,
            test_selector: None,
            quiet: false,
            control_timeout_secs: default_timeout(),
            data_timeout_secs: default_timeout(),
            logging: LoggingConfig::default(),
            config_file_path: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("failed to read config file: {e}")))?;

        let mut config: Self = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("failed to parse config: {e}")))?;

        config.config_file_path = Some(PathBuf::from(path));
        Ok(config)
    }

    /// Build configuration from the `SNOW_OWL_FTP_*` environment variables.
    pub fn from_env() -> crate::Result<Self> {
        use std::env;

        let mut config = Self::default();

        if let Ok(mode) = env::var("SNOW_OWL_FTP_MODE") {
            config.mode = match mode.as_str() {
                "server" => ServerMode::Server,
                "tests" | "self_test" => ServerMode::SelfTest,
                other => {
                    return Err(crate::Error::Config(format!(
                        "unknown SNOW_OWL_FTP_MODE: {other}"
                    )));
                }
            };
        }
        if let Ok(host) = env::var("SNOW_OWL_FTP_HOST") {
            config.bind_address = host;
        }
        if let Ok(port) = env::var("SNOW_OWL_FTP_PORT") {
            config.port = port
                .parse()
                .map_err(|_| crate::Error::Config(format!("invalid SNOW_OWL_FTP_PORT: {port}")))?;
        }
        if let Ok(test) = env::var("SNOW_OWL_FTP_TEST") {
            config.test_selector = Some(test);
        }
        config.quiet = env::var("SNOW_OWL_FTP_QUIET").is_ok();

        let root_dir = env::var("SNOW_OWL_FTP_DIRECTORY")
            .map_err(|_| crate::Error::Config("SNOW_OWL_FTP_DIRECTORY not set".to_string()))?;
        config.root_dir = PathBuf::from(root_dir);

        if let Ok(users_file) = env::var("SNOW_OWL_FTP_USERS") {
            config.users_file = Some(PathBuf::from(users_file));
        }
        config.auth_enabled = env::var("SNOW_OWL_FTP_AUTH_DISABLED").is_err();

        Ok(config)
    }

    /// Reload configuration from the file it was originally loaded from.
    pub fn reload(&mut self) -> crate::Result<()> {
        let Some(path) = self.config_file_path.clone() else {
            return Err(crate::Error::Config(
                "no config file path available for reload".to_string(),
            ));
        };
        let path = path
            .to_str()
            .ok_or_else(|| crate::Error::Config("invalid config path".to_string()))?
            .to_string();
        *self = Self::from_file(&path)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> crate::Result<()> {
        if !self.root_dir.exists() {
            return Err(crate::Error::Config(format!(
                "root directory does not exist: {:?}",
                self.root_dir
            )));
        }
        if !self.root_dir.is_dir() {
            return Err(crate::Error::Config(format!(
                "root path is not a directory: {:?}",
                self.root_dir
            )));
        }
        if let Some(ref users_file) = self.users_file {
            if !users_file.is_file() {
                return Err(crate::Error::Config(format!(
                    "users file does not exist: {users_file:?}"
                )));
            }
        }
        Ok(())
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    21
}

fn default_root_dir() -> PathBuf {
    PathBuf::from("/tmp/ftp")
}

fn default_timeout() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_rfc_port() {
        let config = Config::default();
        assert_eq!(config.port, 21);
        assert_eq!(config.control_timeout_secs, 60);
        assert_eq!(config.data_timeout_secs, 60);
    }

    #[test]
    fn validate_rejects_missing_root() {
        let mut config = Config::default();
        config.root_dir = PathBuf::from("/nonexistent/snow-owl-ftp-root");
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_accepts_existing_root() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.root_dir = dir.path().to_path_buf();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn reload_without_a_config_file_path_fails() {
        let mut config = Config::default();
        assert!(config.reload().is_err());
    }

    #[test]
    fn reload_picks_up_changes_to_the_backing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snow-owl-ftp.toml");
        std::fs::write(&path, "port = 2121\n").unwrap();

        let mut config = Config::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.port, 2121);

        std::fs::write(&path, "port = 2222\n").unwrap();
        config.reload().unwrap();
        assert_eq!(config.port, 2222);
    }
}
