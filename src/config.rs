//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. the `--config` argument or `$PAPERWATCH_CONFIG`
//! 2. `~/.config/paperwatch/config.toml` (Linux/macOS)
//!    `%APPDATA%\paperwatch\config.toml` (Windows)
//! 3. Built-in defaults
//!
//! Account values can be overridden by `PAPERWATCH_SERVER`,
//! `PAPERWATCH_USERNAME` and `PAPERWATCH_PASSWORD`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WatchError};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Mail account and server.
    pub account: AccountConfig,
    /// Polling cadence and mailbox selection.
    pub poll: PollConfig,
    /// Where results are written.
    pub output: OutputConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override directory for the log file.
    pub log_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Mail account settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// IMAP server host name.
    pub server: String,
    /// IMAP port (implicit TLS).
    pub port: u16,
    /// Login name, usually the full email address.
    pub username: String,
    /// App-specific password or token.
    pub password: String,
}

/// Polling cadence and mailbox selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Mailbox to watch.
    pub mailbox: String,
    /// Seconds between polling cycles.
    pub interval_secs: u64,
    /// Seconds to wait before reconnecting after an error.
    pub backoff_secs: u64,
    /// Socket connect/read/write timeout in seconds (0 = none).
    pub timeout_secs: u64,
    /// Client name sent with the IMAP `ID` command.
    pub client_name: String,
    /// Client version sent with the IMAP `ID` command.
    pub client_version: String,
}

/// Output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for HTML dumps and link files.
    pub dir: PathBuf,
    /// Checkpoint file, relative to `dir` unless absolute.
    pub checkpoint_file: PathBuf,
    /// Abstract-links file name.
    pub abs_links_file: PathBuf,
    /// PDF-links file name.
    pub pdf_links_file: PathBuf,
    /// Base URL prepended to `/abs/<id>` and `/pdf/<id>`.
    pub link_base: String,
    /// Write each message's HTML body to `<subject>.html`.
    pub save_html: bool,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            log_level: "info".to_string(),
        }
    }
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            server: String::new(),
            port: 993,
            username: String::new(),
            password: String::new(),
        }
    }
}

impl std::fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountConfig")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            mailbox: "INBOX".to_string(),
            interval_secs: 60,
            backoff_secs: 5,
            timeout_secs: 30,
            client_name: env!("CARGO_PKG_NAME").to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            checkpoint_file: PathBuf::from("last_check.bin"),
            abs_links_file: PathBuf::from("arxiv_links.txt"),
            pdf_links_file: PathBuf::from("pdf_links.txt"),
            link_base: "https://arxiv.org".to_string(),
            save_html: true,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }

    /// Socket timeout, or `None` when disabled.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

impl OutputConfig {
    /// Resolve a configured file name against the output directory.
    pub fn resolve(&self, file: &Path) -> PathBuf {
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.dir.join(file)
        }
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.resolve(&self.checkpoint_file)
    }
}

impl Config {
    /// Apply `PAPERWATCH_*` environment overrides to the account section.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(server) = lookup("PAPERWATCH_SERVER") {
            self.account.server = server;
        }
        if let Some(username) = lookup("PAPERWATCH_USERNAME") {
            self.account.username = username;
        }
        if let Some(password) = lookup("PAPERWATCH_PASSWORD") {
            self.account.password = password;
        }
    }

    /// Check that the account can actually be used to log in.
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("account.server", self.account.server.trim()),
            ("account.username", self.account.username.trim()),
            ("account.password", self.account.password.as_str()),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| name)
        .collect();

        if !missing.is_empty() {
            return Err(WatchError::Config(format!(
                "missing {}",
                missing.join(", ")
            )));
        }
        if self.poll.mailbox.trim().is_empty() {
            return Err(WatchError::Config("poll.mailbox is empty".into()));
        }
        Ok(())
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration from `explicit` or the standard location.
///
/// Returns the default configuration if no file is found or on parse error.
/// Environment overrides are applied in every case.
pub fn load_config(explicit: Option<&Path>) -> Config {
    let mut config = explicit
        .map(Path::to_path_buf)
        .or_else(config_file_path)
        .and_then(|path| read_config_file(&path))
        .unwrap_or_default();
    config.apply_env_overrides();
    config
}

fn read_config_file(path: &Path) -> Option<Config> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No config file");
        return None;
    }
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str::<Config>(&contents) {
            Ok(cfg) => {
                tracing::info!(path = %path.display(), "Loaded config");
                Some(cfg)
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to parse config, using defaults"
                );
                None
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to read config file, using defaults"
            );
            None
        }
    }
}

/// Determine the default config file path.
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("paperwatch").join("config.toml"))
}

/// Return the directory for the log file.
pub fn log_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.log_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("paperwatch")
}
