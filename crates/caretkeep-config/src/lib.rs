use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },
}

/// Settings for the selection engine, loaded from `config.toml`.
///
/// Every section falls back to its defaults, so an empty file is valid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub capabilities: CapabilitiesConfig,
    pub bookmarks: BookmarkConfig,
    pub schema: SchemaConfig,
    pub extraction: ExtractionConfig,
}

/// Environment capability flags handed to the selection engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilitiesConfig {
    /// Merge the text runs on either side of a removed bookmark marker.
    pub text_merge: bool,
    /// The environment can flip anchor/focus to express a backwards selection.
    pub reverse_selection: bool,
}

impl Default for CapabilitiesConfig {
    fn default() -> Self {
        Self {
            text_merge: true,
            reverse_selection: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookmarkConfig {
    /// Prefix for generated marker identifiers
    pub marker_prefix: String,
    /// Default for path bookmarks: fold adjacent text siblings into one index
    pub normalized_paths: bool,
}

impl Default for BookmarkConfig {
    fn default() -> Self {
        Self {
            marker_prefix: "caretkeep_".to_string(),
            normalized_paths: false,
        }
    }
}

/// Additions to the built-in element classification table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    pub extra_block_elements: Vec<String>,
    pub extra_void_elements: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Class carried by table cells that are part of a cell block selection
    pub selected_cell_class: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            selected_cell_class: "cell-selected".to_string(),
        }
    }
}

impl Config {
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        Ok(Some(config))
    }

    pub fn load() -> Result<Option<Self>, ConfigError> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        self.save_to_path(&config_path)
    }

    pub fn config_path() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/caretkeep");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }
}
