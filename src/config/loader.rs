use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult, ConfigError};

use super::types::ConfigFile;

/// Default scenario filenames checked when `--config` is not given.
const DEFAULT_CONFIG_FILES: [&str; 2] = ["sortie.toml", "sortie.json"];

/// Whether one of the default scenario files exists in the working directory.
#[must_use]
pub fn has_default_config() -> bool {
    DEFAULT_CONFIG_FILES
        .iter()
        .any(|path| Path::new(path).exists())
}

/// Loads the scenario file from `path` or the default locations.
///
/// # Errors
///
/// Returns an error when no file is found, or it cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> AppResult<ConfigFile> {
    if let Some(path) = path {
        return load_config_file(Path::new(path));
    }

    for candidate in DEFAULT_CONFIG_FILES {
        let candidate = PathBuf::from(candidate);
        if candidate.exists() {
            tracing::debug!("Using scenario file {}", candidate.display());
            return load_config_file(&candidate);
        }
    }

    Err(AppError::config(ConfigError::MissingScenarioFile))
}

/// Parses one scenario file, choosing the format by extension.
///
/// # Errors
///
/// Returns an error when the file cannot be read, the extension is not
/// `.toml` / `.json`, or the content does not parse.
pub fn load_config_file(path: &Path) -> AppResult<ConfigFile> {
    let content = std::fs::read_to_string(path).map_err(|err| {
        AppError::config(ConfigError::ReadConfig {
            path: path.to_path_buf(),
            source: err,
        })
    })?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => toml::from_str(&content).map_err(|err| {
            AppError::config(ConfigError::ParseToml {
                path: path.to_path_buf(),
                source: err,
            })
        }),
        Some("json") => serde_json::from_str(&content).map_err(|err| {
            AppError::config(ConfigError::ParseJson {
                path: path.to_path_buf(),
                source: err,
            })
        }),
        Some(ext) => Err(AppError::config(ConfigError::UnsupportedExtension {
            ext: ext.to_owned(),
        })),
        None => Err(AppError::config(ConfigError::MissingExtension)),
    }
}
