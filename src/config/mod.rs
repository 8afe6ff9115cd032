//! Configuration module for dirview
//!
//! Runtime settings consumed when a session is created: default ordering and the
//! declared sort mode, page sizing, filter syntax, tag rules, the optional mutation
//! timeout and notification lifetime. Hosts either embed a TOML document or let the
//! crate manage `<config_dir>/dirview/config.toml`.

use crate::coordinator::MutationSettings;
use crate::sort::{SortDirection, SortKey, SortMode, SortState};
use config::{Config, ConfigError, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// `[sort]` section
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(default)]
pub struct SortConfig {
    pub key: SortKey,
    pub direction: SortDirection,
    /// Where re-sorting happens; fixed for the lifetime of a session
    pub mode: SortMode,
}

impl SortConfig {
    #[must_use]
    pub const fn state(&self) -> SortState {
        SortState::new(self.key, self.direction)
    }
}

/// `[paging]` section
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct PagingConfig {
    /// Height of one row, in the same unit hosts report viewport heights in
    pub row_height: u32,
    /// Smallest page ever revealed
    pub min_page_size: usize,
    /// Page size used until the host reports a viewport height
    pub page_size: usize,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            row_height: 50,
            min_page_size: 1,
            page_size: 20,
        }
    }
}

/// `[filter]` section
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct FilterConfig {
    /// Prefix that turns a query into a tag query
    pub tag_marker: char,
    /// Queries shorter than this match everything
    pub min_query_len: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            tag_marker: '#',
            min_query_len: 0,
        }
    }
}

/// `[tags]` section
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct TagsConfig {
    pub min_len: usize,
}

impl Default for TagsConfig {
    fn default() -> Self {
        Self { min_len: 3 }
    }
}

/// `[mutations]` section
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(default)]
pub struct MutationsConfig {
    /// Give up on a mutation after this many seconds; unset waits for the transport
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// `[notifications]` section
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct NotificationsConfig {
    pub dismiss_after_secs: u64,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            dismiss_after_secs: 10,
        }
    }
}

/// Session configuration
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirviewConfig {
    #[serde(default)]
    pub sort: SortConfig,
    #[serde(default)]
    pub paging: PagingConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub tags: TagsConfig,
    #[serde(default)]
    pub mutations: MutationsConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

impl DirviewConfig {
    /// Get the path to the config file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the system config directory cannot be determined.
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ConfigError::Message("Could not determine config directory".to_string()))?;

        Ok(config_dir.join("dirview").join("config.toml"))
    }

    /// Load configuration from the user's config directory, creating a default file
    /// if it doesn't exist
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the config file cannot be read, parsed, or created.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, creating a default file if it doesn't exist
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read, parsed, or created.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let default_config = Self::default();
            default_config.save_to(path)?;
            return Ok(default_config);
        }

        let settings = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml))
            .build()?;

        settings.try_deserialize()
    }

    /// Parse configuration from a TOML document
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the document is not valid TOML or has invalid values.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    /// Save configuration to the user's config directory
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be written.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to `path`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the parent directory cannot be created, the
    /// configuration cannot be serialized to TOML, or the file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ConfigError::Message(format!("Failed to create config directory: {e}")))?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Message(format!("Failed to serialize config: {e}")))?;

        fs::write(path, toml_string)
            .map_err(|e| ConfigError::Message(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Settings handed to the mutation coordinator
    #[must_use]
    pub fn mutation_settings(&self) -> MutationSettings {
        MutationSettings {
            tag_min_len: self.tags.min_len,
            timeout: self.mutations.timeout_secs.map(Duration::from_secs),
            notification_ttl: Duration::from_secs(self.notifications.dismiss_after_secs),
        }
    }
}
