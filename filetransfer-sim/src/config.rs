//! Harness configuration: defaults, then a TOML file, then environment overrides.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

const ENV_CONFIG: &str = "FT_SIM_CONFIG";
const ENV_LOG: &str = "FT_SIM_LOG";
const ENV_RUN_LIMIT: &str = "FT_SIM_RUN_LIMIT_MS";
const ENV_SEED: &str = "FT_SIM_SEED";
const LOCAL_FILE: &str = "filetransfer-sim.toml";

/// Simulation settings. File: `--config PATH`, `$FT_SIM_CONFIG`, or ./filetransfer-sim.toml.
/// Env overrides: FT_SIM_LOG, FT_SIM_RUN_LIMIT_MS, FT_SIM_SEED.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// `tracing` filter directives (default "info").
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    /// Simulated time after which the node is torn down (default 10 minutes).
    #[serde(default = "default_run_limit_ms")]
    pub run_limit_ms: u64,
    /// One-way network latency for simulated sockets (default 50 ms).
    #[serde(default = "default_latency_ms")]
    pub latency_ms: u64,
    /// Gap between simulated requests reaching a server (default 1 s).
    #[serde(default = "default_request_interval_ms")]
    pub request_interval_ms: u64,
    #[serde(default)]
    pub seed: u64,
    /// Name table for the simulated resolver.
    #[serde(default)]
    pub hosts: HashMap<String, Ipv4Addr>,
}

fn default_log_filter() -> String {
    "info".to_string()
}
fn default_run_limit_ms() -> u64 {
    600_000
}
fn default_latency_ms() -> u64 {
    50
}
fn default_request_interval_ms() -> u64 {
    1000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            run_limit_ms: default_run_limit_ms(),
            latency_ms: default_latency_ms(),
            request_interval_ms: default_request_interval_ms(),
            seed: 0,
            hosts: HashMap::new(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("{key} must be at least 1, got {value}")]
    InvalidValue { key: &'static str, value: u64 },
}

/// Load config: default, then the config file (if any), then env vars.
/// A file named explicitly must exist; the local default file is optional.
pub fn load(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    let named = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(ENV_CONFIG).map(PathBuf::from));
    let mut c = match named {
        Some(path) => load_file(&path)?,
        None if Path::new(LOCAL_FILE).exists() => load_file(Path::new(LOCAL_FILE))?,
        None => Config::default(),
    };
    apply_env(&mut c, |key| std::env::var(key).ok());
    validate(&c)?;
    Ok(c)
}

/// A zero delay would pin the simulated clock.
fn validate(c: &Config) -> Result<(), ConfigError> {
    for (key, value) in [
        ("latency_ms", c.latency_ms),
        ("request_interval_ms", c.request_interval_ms),
    ] {
        if value == 0 {
            return Err(ConfigError::InvalidValue { key, value });
        }
    }
    Ok(())
}

fn load_file(path: &Path) -> Result<Config, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Unparseable numeric overrides are ignored.
fn apply_env(c: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(s) = var(ENV_LOG) {
        c.log_filter = s;
    }
    if let Some(s) = var(ENV_RUN_LIMIT) {
        if let Ok(ms) = s.parse::<u64>() {
            c.run_limit_ms = ms;
        }
    }
    if let Some(s) = var(ENV_SEED) {
        if let Ok(seed) = s.parse::<u64>() {
            c.seed = seed;
        }
    }
}
