use crate::receiver::{MC_IP_ADDR, PORT};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unable to read config {}: {source}", path.display())]
    Io { path: PathBuf, source: std::io::Error },
    #[error("Unable to parse config {}: {source}", path.display())]
    Parse { path: PathBuf, source: serde_yml::Error },
}

fn receiver_address_default() -> Ipv4Addr { return MC_IP_ADDR }
fn receiver_port_default() -> u16 { return PORT }
fn receiver_interface_default() -> Ipv4Addr { return Ipv4Addr::UNSPECIFIED }
fn receiver_bufsize_default() -> usize { return 1024 }

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct ReceiverConfig {
    #[serde(default="receiver_address_default")]
    pub address: Ipv4Addr,
    #[serde(default="receiver_port_default")]
    pub port: u16,
    #[serde(default="receiver_interface_default")]
    pub interface: Ipv4Addr,   // Local interface used to join the group
    #[serde(default="receiver_bufsize_default")]
    pub bufsize: usize,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        ReceiverConfig {
            address: receiver_address_default(),
            port: receiver_port_default(),
            interface: receiver_interface_default(),
            bufsize: receiver_bufsize_default(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    Console,    // Scaled values, one block per datagram
    Summary,    // Deci-watt grid summary with phase sums
    Json,       // One JSON document per line
}

fn output_mode_default() -> OutputMode { return OutputMode::Console }

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct OutputConfig {
    #[serde(default="output_mode_default")]
    pub mode: OutputMode,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig { mode: output_mode_default() }
    }
}

fn mqtt_port_default() -> u16 { return 1883 }
fn mqtt_client_name_default() -> String { return "sma-emeter".to_string() }
fn mqtt_topic_prefix_default() -> String { return "sma-emeter".to_string() }

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct MqttConfig {
    pub host: String,
    #[serde(default="mqtt_port_default")]
    pub port: u16,
    pub user: Option<String>,
    pub pass: Option<String>,
    #[serde(default="mqtt_client_name_default")]
    pub client_name: String,
    #[serde(default="mqtt_topic_prefix_default")]
    pub topic_prefix: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub receiver: ReceiverConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub mqtt: Option<MqttConfig>,
}

impl Config {
    /// Loads the given file, or the first of `config/emeter.yaml` and
    /// `emeter.yaml` that exists. Without any file the defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(p) = path {
            return Config::from_file(p);
        }

        for candidate in ["config/emeter.yaml", "emeter.yaml"] {
            let p = Path::new(candidate);
            if p.exists() {
                return Config::from_file(p);
            }
        }

        debug!("No config file found, using defaults");
        Ok(Config::default())
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Config::from_yaml(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, serde_yml::Error> {
        /* An empty file is a valid config with all defaults */
        if contents.trim().is_empty() {
            return Ok(Config::default());
        }
        serde_yml::from_str(contents)
    }
}
