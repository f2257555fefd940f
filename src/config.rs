//! Layered settings: optional TOML file, then `PROCMON_*` environment
//! variables, then command line overrides applied by `main`.
//!

use color_eyre::{Result, eyre::eyre};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

pub const DEFAULT_FILE: &str = "procmon.toml";
pub const DEFAULT_DISCOVERY: &str = "/usr/local/nutanix/cluster/bin/svmips";
const ENV_PREFIX: &str = "PROCMON";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    pub ssh_program: String,
    pub ssh_options: Vec<String>,
    /// Seconds one remote command may run before it counts as failed.
    pub command_timeout: u64,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            ssh_program: "ssh".to_string(),
            ssh_options: vec!["-o".to_string(), "BatchMode=yes".to_string()],
            command_timeout: 30,
        }
    }
}

impl TransportSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Seconds between poll cycles.
    pub interval: u64,
    pub discovery_command: String,
    /// Static node list; when non-empty discovery is skipped.
    pub nodes: Vec<String>,
    /// Remote calls allowed in flight at once within a cycle.
    pub fan_out: usize,
    pub output_dir: PathBuf,
    pub log_file: PathBuf,
    pub log_level: String,
    pub transport: TransportSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interval: 10,
            discovery_command: DEFAULT_DISCOVERY.to_string(),
            nodes: Vec::new(),
            fan_out: 1,
            output_dir: PathBuf::from("."),
            log_file: PathBuf::from("procmon.log"),
            log_level: "info".to_string(),
            transport: TransportSettings::default(),
        }
    }
}

impl Settings {
    pub fn load(file_path: &Path) -> Result<Settings> {
        let raw = config::Config::builder()
            .add_source(config::File::from(file_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(" ")
                    .with_list_parse_key("nodes")
                    .with_list_parse_key("transport.ssh_options"),
            )
            .build()?;
        Ok(raw.try_deserialize()?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval == 0 {
            return Err(eyre!("interval must be at least 1 second"));
        }
        if self.fan_out == 0 {
            return Err(eyre!("fan_out must be at least 1"));
        }
        if self.transport.ssh_program.trim().is_empty() {
            return Err(eyre!("transport.ssh_program must not be empty"));
        }
        if self.transport.command_timeout == 0 {
            return Err(eyre!("transport.command_timeout must be at least 1 second"));
        }
        if self.nodes.is_empty() && self.discovery_command.trim().is_empty() {
            return Err(eyre!("either nodes or discovery_command is required"));
        }
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// What one monitoring run needs, fixed at startup.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub processes: Vec<String>,
    pub interval: Duration,
    pub fan_out: usize,
    pub output_dir: PathBuf,
}

impl RunConfig {
    pub fn new(processes: Vec<String>, settings: &Settings) -> Result<RunConfig> {
        settings.validate()?;
        let mut unique: Vec<String> = Vec::with_capacity(processes.len());
        for name in processes {
            if name.is_empty() {
                return Err(eyre!("process names must not be empty"));
            }
            if !unique.contains(&name) {
                unique.push(name);
            }
        }
        if unique.is_empty() {
            return Err(eyre!("at least one process name is required"));
        }
        Ok(RunConfig {
            processes: unique,
            interval: Duration::from_secs(settings.interval),
            fan_out: settings.fan_out,
            output_dir: settings.output_dir.clone(),
        })
    }
}
