//! Configuration loading and management.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use litt_core::Dialect;
use serde::{Deserialize, Serialize};

use crate::output::OutputFormat;

/// Name of the settings file `tt config` writes inside the data directory.
pub const SETTINGS_FILE: &str = "config.json";

/// Application configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the ledger, settings and hooks.
    pub data_dir: PathBuf,
    /// Default output format.
    pub output_format: OutputFormat,
    /// How ambiguous dates such as `3/4` are read.
    pub date_dialect: Dialect,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: dirs_data_path().unwrap_or_else(|| PathBuf::from(".litt")),
            output_format: OutputFormat::default(),
            date_dialect: Dialect::default(),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    ///
    /// Precedence, lowest first: defaults, `config.toml` in the platform
    /// config directory, `config_path`, `config.json` in the data directory,
    /// `LITT_*` environment variables.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        // The settings file lives in the data directory, which the other
        // layers decide.
        let data_dir: PathBuf = file_layers(config_path)
            .merge(Env::prefixed("LITT_"))
            .extract_inner("data_dir")?;
        let settings = StoredSettings::read(&data_dir)
            .map_err(|err| figment::Error::from(format!("{err:#}")))?;

        let mut figment = file_layers(config_path);
        if let Some(format) = settings.output_format {
            figment = figment.merge(Serialized::default("output_format", format));
        }
        figment.merge(Env::prefixed("LITT_")).extract()
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join(SETTINGS_FILE)
    }

    /// Root of the per-event hook directories.
    pub fn hooks_dir(&self) -> PathBuf {
        self.data_dir.join("hooks")
    }
}

fn file_layers(config_path: Option<&Path>) -> Figment {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));

    if let Some(config_dir) = dirs_config_path() {
        figment = figment.merge(Toml::file(config_dir.join("config.toml")));
    }

    if let Some(path) = config_path {
        figment = figment.merge(Toml::file(path));
    }

    figment
}

/// Settings persisted by `tt config`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StoredSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_format: Option<OutputFormat>,
}

impl StoredSettings {
    /// Reads the settings file; a missing file means no settings.
    pub fn read(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(SETTINGS_FILE);
        match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text)
                .with_context(|| format!("invalid settings file {}", path.display())),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
        }
    }
}

/// Returns the platform-specific config directory for litt.
///
/// On Linux: `~/.config/litt`
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("litt"))
}

/// Returns the platform-specific data directory for litt.
///
/// On Linux: `~/.local/share/litt`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("litt"))
}
