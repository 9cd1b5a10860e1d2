use crate::core::types::device_type;
use crate::error::{AdbError, Result};
use log::debug;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 15037;
pub const DEFAULT_VERSION: u32 = 0x20;

const CONFIG_FILE_NAME: &str = ".adbhost.toml";

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Protocol version answered to `host:version`
    pub version: u32,
    pub devices: Vec<DeviceConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            version: DEFAULT_VERSION,
            devices: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DeviceConfig {
    pub serial: String,
    #[serde(rename = "type", default = "default_device_type")]
    pub device_type: String,
    /// Canned shell output keyed by the exact command line
    #[serde(default)]
    pub shell: HashMap<String, String>,
}

fn default_device_type() -> String {
    device_type::DEVICE.to_string()
}

impl ServerConfig {
    /// Load from `path`, or from `~/.adbhost.toml` when no path is given.
    ///
    /// A missing default file yields the defaults; a missing explicit file is
    /// an error.
    pub fn load(path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) => {
                let expanded = shellexpand::tilde(path);
                Self::from_file(Path::new(expanded.as_ref()))
            }
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => {
                    debug!("No config file found, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading config from: {:?}", path);
        let content = fs::read_to_string(path)
            .map_err(|e| AdbError::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        debug!("Parsed config: {:?}", config);
        Ok(config)
    }

    fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(CONFIG_FILE_NAME))
    }

    fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for device in &self.devices {
            if device.serial.is_empty() {
                return Err(AdbError::Config("Device serial must not be empty".into()));
            }
            if !seen.insert(device.serial.as_str()) {
                return Err(AdbError::Config(format!(
                    "Duplicate device serial: {}",
                    device.serial
                )));
            }
        }
        Ok(())
    }
}
