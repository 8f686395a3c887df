//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. Request handling never reads process-wide environment variables.

use crate::constants::{DEFAULT_STORAGE_DIR, DEFAULT_URL_PREFIX};
use crate::{CoreError, CoreResult};
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    storage_dir: PathBuf,
    url_prefix: String,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// `url_prefix` is normalised to start with `/` and to have no trailing `/`; `"/"` and `""`
    /// both mount the routes at the root.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if the storage directory is empty or the prefix
    /// contains whitespace, `?` or `#`.
    pub fn new(storage_dir: PathBuf, url_prefix: &str) -> CoreResult<Self> {
        if storage_dir.as_os_str().is_empty() {
            return Err(CoreError::InvalidConfig(
                "storage directory cannot be empty".into(),
            ));
        }

        let trimmed = url_prefix.trim().trim_matches('/');
        if trimmed
            .chars()
            .any(|c| c.is_whitespace() || c == '?' || c == '#')
        {
            return Err(CoreError::InvalidConfig(format!(
                "invalid url prefix: '{}'",
                url_prefix
            )));
        }
        let url_prefix = if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{}", trimmed)
        };

        Ok(Self {
            storage_dir,
            url_prefix,
        })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Mount prefix without a trailing slash; empty when mounted at the root.
    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    /// Create the storage directory if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StorageDirCreation`] if the directory cannot be created.
    pub fn ensure_storage_dir(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.storage_dir).map_err(CoreError::StorageDirCreation)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse the storage directory from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns the default `uploads` directory.
pub fn storage_dir_from_env_value(value: Option<String>) -> PathBuf {
    non_blank(value)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_DIR))
}

/// Parse the URL prefix from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns the default `/media` prefix.
pub fn url_prefix_from_env_value(value: Option<String>) -> String {
    non_blank(value).unwrap_or_else(|| DEFAULT_URL_PREFIX.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_is_normalised() {
        let cfg = CoreConfig::new(PathBuf::from("uploads"), "media/").unwrap();
        assert_eq!(cfg.url_prefix(), "/media");

        let cfg = CoreConfig::new(PathBuf::from("uploads"), "/").unwrap();
        assert_eq!(cfg.url_prefix(), "");

        let cfg = CoreConfig::new(PathBuf::from("uploads"), "/api/media").unwrap();
        assert_eq!(cfg.url_prefix(), "/api/media");
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(CoreConfig::new(PathBuf::new(), "/media").is_err());
        assert!(CoreConfig::new(PathBuf::from("uploads"), "/me dia").is_err());
        assert!(CoreConfig::new(PathBuf::from("uploads"), "/media?x=1").is_err());
    }

    #[test]
    fn env_values_fall_back_to_defaults() {
        assert_eq!(storage_dir_from_env_value(None), PathBuf::from("uploads"));
        assert_eq!(
            storage_dir_from_env_value(Some("  ".into())),
            PathBuf::from("uploads")
        );
        assert_eq!(
            storage_dir_from_env_value(Some(" /srv/media ".into())),
            PathBuf::from("/srv/media")
        );

        assert_eq!(url_prefix_from_env_value(None), "/media");
        assert_eq!(url_prefix_from_env_value(Some("".into())), "/media");
        assert_eq!(url_prefix_from_env_value(Some("/files".into())), "/files");
    }

    #[test]
    fn ensure_storage_dir_creates_missing_root() {
        let temp = tempfile::TempDir::new().unwrap();
        let root = temp.path().join("nested").join("uploads");
        let cfg = CoreConfig::new(root.clone(), "/media").unwrap();

        cfg.ensure_storage_dir().unwrap();
        cfg.ensure_storage_dir().unwrap();
        assert!(root.is_dir());
    }
}
