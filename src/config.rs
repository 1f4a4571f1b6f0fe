use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

mod defaults;
mod validation;

pub use defaults::{CMON_PORT, FT_FULL_PORT};

const DEFAULT_CONFIG_FILE: &str = "s9s-ft.toml";
const ENV_PREFIX: &str = "S9S_FT";

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub controller: ControllerSettings,
    pub ssh: SshSettings,
    pub lxd: LxdSettings,
    pub images: ImageSettings,
    pub log: LogSettings,
    pub poll: PollSettings,
    pub counters: CounterSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ControllerSettings {
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    pub ft_full: bool,
    pub user: String,
    pub password: String,
    pub s9s_bin: PathBuf,
    pub color: bool,
}

impl ControllerSettings {
    /// Port of the controller, derived from the target when not set explicitly.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
            .unwrap_or(if self.ft_full { FT_FULL_PORT } else { CMON_PORT })
    }

    #[must_use]
    pub fn url(&self) -> String {
        format!("https://{}:{}", self.host, self.port())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SshSettings {
    pub user: String,
    pub key_file: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LxdSettings {
    pub endpoint: String,
    #[serde(default)]
    pub client_cert: Option<PathBuf>,
    #[serde(default)]
    pub client_key: Option<PathBuf>,
    #[serde(default)]
    pub server_cert: Option<PathBuf>,
    pub verify_tls: bool,
    #[serde(default)]
    pub password: Option<String>,
    pub cert_dir: PathBuf,
    pub lxc_bin: PathBuf,
    pub operation_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImageSettings {
    pub ubuntu: String,
    pub centos: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    pub file: PathBuf,
    pub level: String,
    pub max_bytes: u64,
    pub backups: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollSettings {
    pub step_interval: String,
    pub attempts: u32,
    pub recovery_attempts: u32,
    pub stderr_threshold: usize,
}

impl PollSettings {
    /// Parses `step_interval` as a humantime duration (e.g. `5s`).
    ///
    /// # Errors
    /// Returns error if the interval is not a valid duration.
    pub fn step(&self) -> Result<Duration> {
        humantime::parse_duration(&self.step_interval)
            .with_context(|| format!("Invalid poll.step_interval: {}", self.step_interval))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CounterSettings {
    pub file: PathBuf,
}

/// Command-line values that take precedence over file and environment.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub log_file: Option<PathBuf>,
    pub counters_file: Option<PathBuf>,
    pub controller: Option<String>,
    pub s9s_bin: Option<PathBuf>,
    pub lxd_endpoint: Option<String>,
    pub ft_full: bool,
}

impl Settings {
    /// Creates a new `Settings` instance.
    ///
    /// # Errors
    /// Returns error if configuration parsing fails (e.g. invalid format).
    pub fn new(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut s = defaults::apply_defaults(Config::builder())?;

        let path = config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        s = s.add_source(File::from(path).required(false));

        // e.g. S9S_FT_CONTROLLER__HOST, S9S_FT_LXD__ENDPOINT
        s = s.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        );

        s.build()?.try_deserialize()
    }

    /// Merges CLI arguments into the settings, overriding values if present.
    pub fn merge_with_args(&mut self, overrides: &Overrides) {
        if let Some(log_file) = &overrides.log_file {
            log_file.clone_into(&mut self.log.file);
        }
        if let Some(counters_file) = &overrides.counters_file {
            counters_file.clone_into(&mut self.counters.file);
        }
        if let Some(controller) = &overrides.controller {
            controller.clone_into(&mut self.controller.host);
        }
        if let Some(s9s_bin) = &overrides.s9s_bin {
            s9s_bin.clone_into(&mut self.controller.s9s_bin);
        }
        if let Some(endpoint) = &overrides.lxd_endpoint {
            endpoint.clone_into(&mut self.lxd.endpoint);
        }
        if overrides.ft_full {
            self.controller.ft_full = true;
        }
    }

    /// Validates the settings every command relies on.
    ///
    /// # Errors
    /// Returns error if any setting is invalid or out of range.
    pub fn validate(&self) -> Result<()> {
        validation::validate_settings(self)
    }

    /// Validates the settings needed to reach the controller and LXD.
    ///
    /// # Errors
    /// Returns error if credentials or endpoints are missing.
    pub fn validate_infrastructure(&self) -> Result<()> {
        validation::validate_infrastructure(self)
    }
}
