use crate::domain::{config::BridgeConfig, error::{BridgeError, BridgeResult}};
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_HEADER: &str = "\
# RotBridge configuration
#
# [listen]  address rotctld clients connect to
# [serial]  rotator controller line; timeout_ms bounds each reply
# [global]  malformed_reply = \"silent\" | \"nak\"
";

/// Configuration manager
pub struct ConfigManager {
    user_config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Create new configuration manager
    pub fn new() -> Self {
        Self {
            user_config_path: Self::get_user_config_path(),
        }
    }

    /// Defaults, overlaid by the user file when one exists.
    pub fn load_config(&self) -> BridgeResult<BridgeConfig> {
        match &self.user_config_path {
            Some(path) if path.exists() => self.load_config_from_path(path),
            _ => Ok(BridgeConfig::default()),
        }
    }

    /// Load configuration from specific path
    pub fn load_config_from_path(&self, path: &Path) -> BridgeResult<BridgeConfig> {
        let content = fs::read_to_string(path).map_err(|e| BridgeError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        toml::from_str(&content).map_err(|e| BridgeError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })
    }

    /// Write a default configuration file; an existing file is never replaced.
    pub fn init_config(&self, path: &Path) -> BridgeResult<()> {
        if path.exists() {
            return Err(BridgeError::Config {
                message: format!("Configuration already exists at {}", path.display()),
            });
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| BridgeError::Config {
                message: format!("Failed to create config directory: {}", e),
            })?;
        }

        let body = render(&BridgeConfig::default())?;
        fs::write(path, format!("{}\n{}", DEFAULT_CONFIG_HEADER, body)).map_err(|e| {
            BridgeError::Config {
                message: format!("Failed to write config file {}: {}", path.display(), e),
            }
        })
    }

    /// Get the user config path, when a home directory is known
    pub fn user_config_path(&self) -> Option<&PathBuf> {
        self.user_config_path.as_ref()
    }

    fn get_user_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config").join("rotbridge").join("config.toml"))
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialize a configuration as TOML.
pub fn render(config: &BridgeConfig) -> BridgeResult<String> {
    toml::to_string_pretty(config).map_err(|e| BridgeError::Config {
        message: format!("Failed to serialize config: {}", e),
    })
}
