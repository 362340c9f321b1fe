use std::path::{Path, PathBuf};

use serde::Deserialize;
use splice::format::{FormatError, FormatSettings, FormatSpec};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot read config `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid default format specifier: {0}")]
    Format(#[from] FormatError),
}

/// Expansion settings, usually loaded from a TOML file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Active target-format identifier, e.g. `html` or `latex`.
    pub target: String,
    /// Directory include paths are resolved against. Defaults to the cwd.
    pub base_dir: Option<PathBuf>,
    pub format: FormatConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FormatConfig {
    /// Process-wide default specifier, e.g. `".4g"`.
    pub default: Option<String>,
    pub float_digits: i32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            target: "html".to_string(),
            base_dir: None,
            format: FormatConfig::default(),
        }
    }
}

impl Default for FormatConfig {
    fn default() -> Self {
        FormatConfig {
            default: None,
            float_digits: FormatSettings::default().float_digits,
        }
    }
}

impl Settings {
    pub fn from_toml(text: &str) -> Result<Settings, SettingsError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Settings, SettingsError> {
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Settings::from_toml(&text)
    }

    pub fn format_settings(&self) -> Result<FormatSettings, SettingsError> {
        let default_spec = match &self.format.default {
            Some(text) => Some(FormatSpec::parse(text)?),
            None => None,
        };
        Ok(FormatSettings {
            default_spec,
            float_digits: self.format.float_digits,
        })
    }

    pub fn base_dir(&self) -> PathBuf {
        self.base_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}
