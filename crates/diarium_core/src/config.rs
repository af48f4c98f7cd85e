//! Synchronization settings.
//!
//! # Responsibility
//! - Load `SyncConfig` from YAML, falling back to defaults for absent keys.
//! - Resolve the alias table path relative to the config file.
//!
//! # Invariants
//! - A missing config file is not an error; a malformed one is.
//! - Render thresholds are validated at load time.

use crate::header::render::RenderOptions;
use crate::model::document::UpdateMode;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration load error.
#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "cannot read `{}`: {source}", path.display()),
            Self::Yaml { path, source } => {
                write!(f, "malformed YAML in `{}`: {source}", path.display())
            }
            Self::Invalid(message) => write!(f, "invalid configuration: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Yaml { source, .. } => Some(source),
            Self::Invalid(_) => None,
        }
    }
}

/// Settings for import, export and batch runs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    pub default_mode: UpdateMode,
    /// Extension of document files, without the dot.
    pub document_extension: String,
    pub inline_max_items: usize,
    pub inline_max_width: usize,
    /// Alias table path; relative paths resolve against the config file.
    pub alias_file: Option<PathBuf>,
    pub log_level: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        let render = RenderOptions::default();
        Self {
            default_mode: UpdateMode::FullReplace,
            document_extension: "md".to_string(),
            inline_max_items: render.inline_max_items,
            inline_max_width: render.inline_max_width,
            alias_file: None,
            log_level: crate::logging::default_log_level().to_string(),
        }
    }
}

impl SyncConfig {
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            inline_max_items: self.inline_max_items,
            inline_max_width: self.inline_max_width,
        }
    }

    pub fn from_yaml_str(text: &str, origin: &Path) -> ConfigResult<Self> {
        let config: Self = if text.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(text).map_err(|source| ConfigError::Yaml {
                path: origin.to_path_buf(),
                source,
            })?
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.inline_max_items == 0 {
            return Err(ConfigError::Invalid(
                "inline_max_items must be at least 1".to_string(),
            ));
        }
        if self.inline_max_width < 8 {
            return Err(ConfigError::Invalid(
                "inline_max_width must be at least 8".to_string(),
            ));
        }
        let extension = self.document_extension.trim_start_matches('.');
        if extension.is_empty() || extension.contains(['/', '\\']) {
            return Err(ConfigError::Invalid(format!(
                "document_extension `{}` is not a file extension",
                self.document_extension
            )));
        }
        Ok(())
    }

    /// Extension without a leading dot.
    pub fn extension(&self) -> &str {
        self.document_extension.trim_start_matches('.')
    }
}

/// Loads settings from `path`; a missing file yields defaults.
pub fn load_config(path: &Path) -> ConfigResult<SyncConfig> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(SyncConfig::default());
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let mut config = SyncConfig::from_yaml_str(&text, path)?;
    if let (Some(alias_file), Some(parent)) = (config.alias_file.as_ref(), path.parent()) {
        if alias_file.is_relative() {
            config.alias_file = Some(parent.join(alias_file));
        }
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::{load_config, ConfigError, SyncConfig};
    use crate::model::document::UpdateMode;
    use std::path::Path;

    #[test]
    fn empty_config_uses_defaults() {
        let config = SyncConfig::from_yaml_str("", Path::new("sync.yaml")).unwrap();
        assert_eq!(config, SyncConfig::default());
        assert_eq!(config.default_mode, UpdateMode::FullReplace);
        assert_eq!(config.extension(), "md");
    }

    #[test]
    fn partial_config_overrides_named_keys() {
        let config = SyncConfig::from_yaml_str(
            "default_mode: incremental\ndocument_extension: .txt\ninline_max_items: 2\n",
            Path::new("sync.yaml"),
        )
        .unwrap();
        assert_eq!(config.default_mode, UpdateMode::Incremental);
        assert_eq!(config.extension(), "txt");
        assert_eq!(config.render_options().inline_max_items, 2);
    }

    #[test]
    fn unknown_keys_and_bad_thresholds_are_rejected() {
        assert!(matches!(
            SyncConfig::from_yaml_str("mode: fast\n", Path::new("sync.yaml")),
            Err(ConfigError::Yaml { .. })
        ));
        assert!(matches!(
            SyncConfig::from_yaml_str("inline_max_items: 0\n", Path::new("sync.yaml")),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn missing_file_yields_defaults_and_alias_path_is_relative_to_config() {
        let dir = tempfile::tempdir().unwrap();
        let missing = load_config(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(missing, SyncConfig::default());

        let path = dir.path().join("sync.yaml");
        std::fs::write(&path, "alias_file: aliases.yaml\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.alias_file, Some(dir.path().join("aliases.yaml")));
    }
}
