use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::session::SessionConfig;

const DEFAULT_CONFIG_PATH: &str = "/etc/arpwedge.conf";
const ENV_PREFIX: &str = "ARPWEDGE_";

/// Settings keys, shared by the config file and `ARPWEDGE_*` variables.
const KEYS: [&str; 7] = [
    "interface",
    "target",
    "gateway",
    "packet_count",
    "poison_interval",
    "resolve_attempts",
    "resolve_timeout",
];

/// Fully validated runtime configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub interface: String,
    pub session: SessionConfig,
    pub verbose: bool,
}

/// Partially specified settings from one source. Later sources win.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub interface: Option<String>,
    pub target: Option<Ipv4Addr>,
    pub gateway: Option<Ipv4Addr>,
    pub packet_count: Option<u64>,
    /// Seconds
    pub poison_interval: Option<f64>,
    pub resolve_attempts: Option<u32>,
    /// Seconds
    pub resolve_timeout: Option<f64>,
    pub verbose: bool,
}

impl Overrides {
    /// Set one setting from its textual form.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "interface" => self.interface = Some(value.to_string()),
            "target" => self.target = Some(parse(key_name(key), value)?),
            "gateway" => self.gateway = Some(parse(key_name(key), value)?),
            "packet_count" => self.packet_count = Some(parse(key_name(key), value)?),
            "poison_interval" => self.poison_interval = Some(parse(key_name(key), value)?),
            "resolve_attempts" => self.resolve_attempts = Some(parse(key_name(key), value)?),
            "resolve_timeout" => self.resolve_timeout = Some(parse(key_name(key), value)?),
            _ => {}
        }
        Ok(())
    }

    /// Overlay `other` on top of `self`.
    pub fn merge(self, other: Overrides) -> Overrides {
        Overrides {
            interface: other.interface.or(self.interface),
            target: other.target.or(self.target),
            gateway: other.gateway.or(self.gateway),
            packet_count: other.packet_count.or(self.packet_count),
            poison_interval: other.poison_interval.or(self.poison_interval),
            resolve_attempts: other.resolve_attempts.or(self.resolve_attempts),
            resolve_timeout: other.resolve_timeout.or(self.resolve_timeout),
            verbose: self.verbose || other.verbose,
        }
    }

    /// Read `key = value` lines. A missing file yields no settings.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let mut overrides = Overrides::default();
        if !path.exists() {
            return Ok(overrides);
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                overrides.apply(key.trim(), value.trim())?;
            }
        }

        Ok(overrides)
    }

    /// Read `ARPWEDGE_<KEY>` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut overrides = Overrides::default();
        for key in KEYS {
            let var = format!("{}{}", ENV_PREFIX, key.to_uppercase());
            if let Ok(value) = std::env::var(&var) {
                overrides.apply(key, value.trim())?;
            }
        }
        Ok(overrides)
    }
}

fn key_name(key: &str) -> &'static str {
    KEYS.iter().copied().find(|k| *k == key).unwrap_or("setting")
}

fn parse<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}

fn seconds(key: &'static str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value)
        .ok()
        .filter(|d| !d.is_zero())
        .ok_or_else(|| ConfigError::Invalid {
            key,
            value: value.to_string(),
        })
}

impl Config {
    /// Resolve the configuration from, lowest precedence first: defaults,
    /// the config file, `ARPWEDGE_*` environment variables, then `cli`.
    ///
    /// The config file is `config_path`, else `$ARPWEDGE_CONFIG`, else
    /// `/etc/arpwedge.conf`.
    pub fn load(config_path: Option<&Path>, cli: Overrides) -> Result<Self, ConfigError> {
        let path = config_path.map(Path::to_path_buf).unwrap_or_else(|| {
            std::env::var("ARPWEDGE_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
        });

        let merged = Overrides::from_file(&path)?
            .merge(Overrides::from_env()?)
            .merge(cli);

        Self::from_overrides(merged)
    }

    /// Validate a merged set of settings, filling in defaults.
    pub fn from_overrides(settings: Overrides) -> Result<Self, ConfigError> {
        let interface = settings
            .interface
            .filter(|i| !i.is_empty())
            .ok_or(ConfigError::Missing("interface"))?;
        let target = settings.target.ok_or(ConfigError::Missing("target"))?;
        let gateway = settings.gateway.ok_or(ConfigError::Missing("gateway"))?;

        if target == gateway {
            return Err(ConfigError::Invalid {
                key: "gateway",
                value: format!("{gateway} (same as target)"),
            });
        }

        let mut session = SessionConfig::new(target, gateway);

        if let Some(count) = settings.packet_count {
            if count == 0 {
                return Err(ConfigError::Invalid {
                    key: "packet_count",
                    value: count.to_string(),
                });
            }
            session.packet_count = count;
        }
        if let Some(interval) = settings.poison_interval {
            session.poison_interval = seconds("poison_interval", interval)?;
        }
        if let Some(attempts) = settings.resolve_attempts {
            if attempts == 0 {
                return Err(ConfigError::Invalid {
                    key: "resolve_attempts",
                    value: attempts.to_string(),
                });
            }
            session.resolve_attempts = attempts;
        }
        if let Some(timeout) = settings.resolve_timeout {
            session.resolve_timeout = seconds("resolve_timeout", timeout)?;
        }

        Ok(Config {
            interface,
            session,
            verbose: settings.verbose,
        })
    }
}
