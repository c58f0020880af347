//! Relay configuration: defaults, optional TOML file, environment overrides.
//!
//! Precedence from lowest to highest: compiled defaults, the TOML file,
//! `PROGRAM_RELAY_*` environment variables, then CLI flags (applied by the
//! binary).

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{RelayError, Result};

/// Command sent to every device to request its loaded program.
pub const DEFAULT_COMMAND: &str = "request_program\n";

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "PROGRAM_RELAY_CONFIG";

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// An environment override that was present but did not parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoredOverride {
    pub var: &'static str,
    pub value: String,
}

/// Top-level relay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Bind address for the HTTP listener.
    pub bind: String,
    /// HTTP listener port.
    pub port: u16,
    /// Seconds a successful result stays cached. Fractions allowed.
    pub cache_ttl_secs: f64,
    /// Seconds allowed to open the device socket.
    pub connect_timeout_secs: u64,
    /// Seconds allowed to read the full program.
    pub read_timeout_secs: u64,
    /// Largest program accepted from a device.
    pub max_response_bytes: usize,
    /// Command written to the device socket.
    pub command: String,
    /// Share one in-flight fetch between concurrent misses on the same key.
    pub coalesce_fetches: bool,
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 5000,
            cache_ttl_secs: 2.0,
            connect_timeout_secs: 5,
            read_timeout_secs: 10,
            max_response_bytes: 4 * 1024 * 1024,
            command: DEFAULT_COMMAND.to_string(),
            coalesce_fetches: false,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

impl RelayConfig {
    /// Load from an optional TOML file, then apply environment overrides
    /// and validate.
    ///
    /// Overrides that failed to parse are returned rather than logged, since
    /// logging is configured from the result.
    pub fn load(path: Option<&Path>) -> Result<(Self, Vec<IgnoredOverride>)> {
        let mut config = match path {
            Some(p) => Self::load_from_path(p)?,
            None => Self::default(),
        };
        let ignored = config.apply_env_overrides();
        config.validate()?;
        Ok((config, ignored))
    }

    /// Parse a TOML config file. Missing keys take their defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            RelayError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&raw)
            .map_err(|e| RelayError::Config(format!("failed to parse {}: {}", path.display(), e)))
    }

    /// Apply `PROGRAM_RELAY_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Vec<IgnoredOverride> {
        self.apply_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup. Values that do not
    /// parse leave the field unchanged and are returned.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Vec<IgnoredOverride>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut ignored = Vec::new();
        if let Some(bind) = lookup("PROGRAM_RELAY_BIND") {
            self.bind = bind;
        }
        override_parsed(&lookup, &mut ignored, "PROGRAM_RELAY_PORT", &mut self.port);
        override_parsed(&lookup, &mut ignored, "PROGRAM_RELAY_CACHE_TTL", &mut self.cache_ttl_secs);
        override_parsed(
            &lookup,
            &mut ignored,
            "PROGRAM_RELAY_CONNECT_TIMEOUT",
            &mut self.connect_timeout_secs,
        );
        override_parsed(
            &lookup,
            &mut ignored,
            "PROGRAM_RELAY_READ_TIMEOUT",
            &mut self.read_timeout_secs,
        );
        override_parsed(&lookup, &mut ignored, "PROGRAM_RELAY_COALESCE", &mut self.coalesce_fetches);
        ignored
    }

    /// Reject values the relay cannot run with.
    pub fn validate(&self) -> Result<()> {
        if Duration::try_from_secs_f64(self.cache_ttl_secs).is_err() {
            return Err(RelayError::Config(format!(
                "cache_ttl_secs must be a non-negative duration in range, got {}",
                self.cache_ttl_secs
            )));
        }
        if self.command.is_empty() {
            return Err(RelayError::Config("command must not be empty".into()));
        }
        if self.max_response_bytes == 0 {
            return Err(RelayError::Config(
                "max_response_bytes must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::try_from_secs_f64(self.cache_ttl_secs).unwrap_or(Duration::ZERO)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    /// `bind:port` string for the HTTP listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

fn override_parsed<F, T>(
    lookup: &F,
    ignored: &mut Vec<IgnoredOverride>,
    name: &'static str,
    target: &mut T,
) where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let Some(raw) = lookup(name) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => *target = value,
        Err(_) => ignored.push(IgnoredOverride {
            var: name,
            value: raw,
        }),
    }
}
