//! Configuration loading and data folder resolution

use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Data folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_data_folder(cli_arg: Option<&Path>, env_var_name: &str) -> Result<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Ok(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        return Ok(PathBuf::from(path));
    }

    // Priority 3: TOML config file
    if let Ok(config_path) = find_config_file() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(data_folder) = config.get("data_folder").and_then(|v| v.as_str()) {
                    return Ok(PathBuf::from(data_folder));
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    Ok(default_data_folder())
}

/// Path of the inventory database inside the data folder
pub fn database_path(data_folder: &Path) -> PathBuf {
    data_folder.join("spooltrack.db")
}

/// Default folder for backup snapshots inside the data folder
pub fn backup_folder(data_folder: &Path) -> PathBuf {
    data_folder.join("backups")
}

/// Get default configuration file path for the platform
fn find_config_file() -> Result<PathBuf> {
    let config_dir = if cfg!(target_os = "linux") {
        // Try ~/.config/spooltrack/config.toml first, then /etc/spooltrack/config.toml
        let user_config = dirs::config_dir().map(|d| d.join("spooltrack").join("config.toml"));
        let system_config = PathBuf::from("/etc/spooltrack/config.toml");

        if let Some(path) = user_config {
            if path.exists() {
                return Ok(path);
            }
        }
        if system_config.exists() {
            return Ok(system_config);
        }
        return Err(Error::Config("No config file found".to_string()));
    } else {
        dirs::config_dir()
            .map(|d| d.join("spooltrack").join("config.toml"))
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?
    };

    if config_dir.exists() {
        Ok(config_dir)
    } else {
        Err(Error::Config(format!(
            "Config file not found: {:?}",
            config_dir
        )))
    }
}

/// Get OS-dependent default data folder path
fn default_data_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("spooltrack"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/spooltrack"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("spooltrack"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/spooltrack"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("spooltrack"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\spooltrack"))
    } else {
        PathBuf::from("./spooltrack_data")
    }
}
