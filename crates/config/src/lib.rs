//! Configuration for attach sessions
//!
//! Settings are read from a TOML file, by default
//! `<config dir>/lua-attach/config.toml`. Every field has a default so an
//! empty (or missing) file is a valid configuration.

use std::{
    io::Read,
    path::{Path, PathBuf},
    time::Duration,
};

use eyre::WrapErr;
use serde::{Deserialize, Serialize};

/// Default port the attached process listens on
pub const DEFAULT_PORT: u16 = 8172;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AttachConfig {
    pub connection: ConnectionConfig,
    pub sources: SourcesConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    /// How many times to try connecting before giving up
    pub connect_attempts: usize,
    /// First retry delay, doubled after every failed attempt
    pub retry_base_delay_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            connect_attempts: 5,
            retry_base_delay_ms: 200,
        }
    }
}

impl ConnectionConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

/// Where script names reported by the target are looked up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourcesConfig {
    pub roots: Vec<PathBuf>,
    /// Extensions tried when a script name has none, without the leading dot
    pub extensions: Vec<String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            extensions: vec!["lua".to_string()],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    pub unmatched_break: UnmatchedBreakPolicy,
}

/// What to do when the target breaks somewhere no breakpoint is registered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnmatchedBreakPolicy {
    /// Report the location to the front end
    #[default]
    Notify,
    /// Only log it
    Ignore,
}

/// The default location of the configuration file, if the platform has a config directory
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("lua-attach").join("config.toml"))
}

pub fn load(mut r: impl Read) -> eyre::Result<AttachConfig> {
    let mut contents = String::new();
    r.read_to_string(&mut contents)
        .wrap_err("reading configuration contents")?;
    from_str(&contents)
}

pub fn from_str(contents: &str) -> eyre::Result<AttachConfig> {
    toml::from_str(contents).wrap_err("parsing configuration")
}

pub fn load_from_path(path: impl AsRef<Path>) -> eyre::Result<AttachConfig> {
    let path = path.as_ref();
    let f = std::fs::File::open(path)
        .wrap_err_with(|| format!("opening configuration file {}", path.display()))?;
    load(f)
}

/// Load the configuration from `path`, falling back to [`default_path`]
///
/// A missing default file yields the default configuration; an explicitly
/// given path must exist.
pub fn load_or_default(path: Option<&Path>) -> eyre::Result<AttachConfig> {
    if let Some(path) = path {
        return load_from_path(path);
    }

    match default_path() {
        Some(path) if path.is_file() => {
            tracing::debug!(path = %path.display(), "loading configuration");
            load_from_path(path)
        }
        _ => {
            tracing::debug!("no configuration file found, using defaults");
            Ok(AttachConfig::default())
        }
    }
}
