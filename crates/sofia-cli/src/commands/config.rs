//! Config command implementations

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::output::{print_error, print_info, print_success, print_warning};
use sofia_core::config::{self, ConfigFile};

fn resolve(config_path: Option<&PathBuf>) -> PathBuf {
    config_path
        .cloned()
        .unwrap_or_else(config::default_config_path)
}

/// Load the configuration file
///
/// An explicit path must exist. Without one, the default location is used
/// when present and built-in defaults otherwise.
pub fn load_config_file(config_path: Option<&PathBuf>) -> Result<ConfigFile> {
    let file: ConfigFile = match config_path {
        Some(path) => config::load_config(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => {
            let default_path = config::default_config_path();
            if default_path.exists() {
                config::load_config(&default_path).unwrap_or_else(|e| {
                    tracing::warn!("Failed to load config from {:?}: {}", default_path, e);
                    ConfigFile::default()
                })
            } else {
                tracing::debug!("Using default configuration");
                ConfigFile::default()
            }
        }
    };

    file.validate().context("Invalid configuration")?;
    Ok(file)
}

/// Show current configuration
pub fn config_show(config_path: Option<&PathBuf>) -> Result<()> {
    let path = resolve(config_path);

    if !path.exists() {
        print_warning(&format!("No configuration file found at {:?}", path));
        print_info("Run 'sofia config init' to create one");
        return Ok(());
    }

    print_info(&format!("Configuration file: {:?}", path));
    println!();

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    println!("{}", content);

    Ok(())
}

/// Print where the configuration file lives
pub fn config_path(config_path: Option<&PathBuf>) -> Result<()> {
    println!("{}", resolve(config_path).display());
    Ok(())
}

/// Write a configuration file holding every default
pub fn config_init(config_path: Option<&PathBuf>, force: bool) -> Result<()> {
    let path = resolve(config_path);

    if path.exists() && !force {
        print_error(&format!("Config file already exists: {:?}", path));
        print_info("Use --force to overwrite");
        return Ok(());
    }

    write_defaults(&path)?;
    print_success(&format!("Created configuration file: {:?}", path));
    Ok(())
}

fn write_defaults(path: &Path) -> Result<()> {
    config::save_config(path, &ConfigFile::default())
        .with_context(|| format!("Failed to write config file: {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        config_init(Some(&path), false).unwrap();
        let loaded = load_config_file(Some(&path)).unwrap();

        assert_eq!(loaded.device.port, config::DEFAULT_PORT);
        assert_eq!(loaded.discovery.bind_address, "0.0.0.0:34569");
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(load_config_file(Some(&missing)).is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[device]\nmailbox_capacity = 0\n").unwrap();

        let err = load_config_file(Some(&path)).unwrap_err();
        assert!(format!("{:#}", err).contains("mailbox_capacity"));
    }
}
