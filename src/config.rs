use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::http::assembler::DEFAULT_MAX_BODY;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub static_files: StaticFilesConfig,
    pub session: SessionConfig,
    pub middleware: MiddlewareConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Largest request body accepted, whether declared by `Content-Length`
    /// or accumulated from chunks. Larger requests are dropped.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            max_body_bytes: DEFAULT_MAX_BODY,
        }
    }
}

/// Static file serving from `<root>/static`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StaticFilesConfig {
    pub root: PathBuf,
    /// File served for directory requests.
    pub index: String,
    pub cache_control: String,
    pub cache: CacheConfig,
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            index: "index.html".to_string(),
            cache_control: "public, max-age=31536000".to_string(),
            cache: CacheConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Unbounded when unset.
    pub max_entries: Option<usize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        })
    }
}

/// Session lifetime and cookie policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Cookie name, also the session family key.
    pub key: String,
    /// Sessions idle longer than this are removed by the sweep.
    pub expiry_secs: u64,
    pub sweep_interval_secs: u64,
    /// Offset of the cookie `Expires` attribute from now.
    pub cookie_ttl_secs: u64,
    pub same_site: SameSite,
    pub path: String,
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    /// Emit `Secure` / `HttpOnly` attributes when the policy sets them.
    pub emit_flags: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            key: "portico-session".to_string(),
            expiry_secs: 300,
            sweep_interval_secs: 60,
            cookie_ttl_secs: 30 * 60,
            same_site: SameSite::Lax,
            path: "/".to_string(),
            domain: None,
            secure: true,
            http_only: false,
            emit_flags: false,
        }
    }
}

/// How responses from several matching middleware are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MiddlewarePolicy {
    /// Every middleware runs; the last response whose prefix matches is kept.
    #[default]
    LastMatchWins,
    /// Only prefix-matching middleware run; the first response ends the chain.
    FirstMatch,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MiddlewareConfig {
    pub policy: MiddlewarePolicy,
    pub chains: Vec<ChainConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub prefix: String,
    pub middleware: Vec<String>,
}

impl Config {
    /// Loads the file named by `PORTICO_CONFIG` (defaults otherwise), then
    /// applies the `LISTEN` override.
    pub fn load() -> Result<Self, ConfigError> {
        let mut cfg = match std::env::var("PORTICO_CONFIG") {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };

        if let Ok(listen_addr) = std::env::var("LISTEN") {
            cfg.server.listen_addr = listen_addr;
        }

        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }
}
