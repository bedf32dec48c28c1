//! Configuration file location and persistence.
//!
//! # Configuration File Format
//!
//! ```toml
//! [api]
//! token = "your-ads-token"
//! base_url = "https://api.adsabs.harvard.edu/v1"
//! timeout_secs = 30
//!
//! [retry]
//! max_retries = 3
//! base_delay_ms = 1000
//! jitter = true
//!
//! [pagination]
//! page_cap = 2000
//! page_delay_ms = 1000
//! sort = "date desc,bibcode desc"
//!
//! [batch]
//! batch_size = 50
//! batch_delay_ms = 1000
//! catalogue_delay_ms = 2000
//! checkpoint_every = 5
//!
//! [logging]
//! level = "info"
//! format = "text"
//! ```

use std::path::{Path, PathBuf};

use super::{Config, ConfigError};

/// File name looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "ads-harvest.toml";

/// `<config_dir>/ads-harvest/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("ads-harvest").join("config.toml"))
}

/// First existing config file: `./ads-harvest.toml`, then the user config dir
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }
    default_config_path().filter(|path| path.is_file())
}

/// Write `config` as TOML, creating parent directories
pub fn save_config(config: &Config, path: &Path) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config;
    use tempfile::tempdir;

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.api.token = Some("saved-token".to_string());
        config.batch.batch_size = 25;
        save_config(&config, &path).unwrap();

        let loaded = load_config(Some(&path)).unwrap();
        assert_eq!(loaded.api.token.as_deref(), Some("saved-token"));
        assert_eq!(loaded.batch.batch_size, 25);
    }

    #[test]
    fn test_saved_file_omits_missing_token() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        save_config(&Config::default(), &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();

        assert!(content.contains("[retry]"));
        assert!(content.contains("batch_size = 50"));
        assert!(!content.contains("token"));
    }

    #[test]
    fn test_invalid_toml_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("invalid.toml");
        std::fs::write(&path, "invalid = toml = content").unwrap();

        assert!(load_config(Some(&path)).is_err());
    }

    #[test]
    fn test_default_path_is_under_app_dir() {
        if let Some(path) = default_config_path() {
            assert!(path.ends_with("ads-harvest/config.toml"));
        }
    }
}
