//! Loads [`AppConfig`] from files and environment variables.

use crate::core::AppConfig;
use crate::error::{ConfigError, Result};
use config::{Environment, File};
use std::path::PathBuf;

/// Default prefix for environment overrides (`APOLLO_APP_ID`, `APOLLO_IP`, ...).
pub const DEFAULT_ENV_PREFIX: &str = "APOLLO";

/// Layers configuration files and environment variables into an [`AppConfig`].
///
/// Files are merged in the order they were added; environment variables
/// override every file.
///
/// # Examples
///
/// ```rust,no_run
/// use apollo_client::core::AppConfigLoader;
///
/// # fn example() -> apollo_client::error::Result<()> {
/// // APOLLO_APP_ID=order-service APOLLO_IP=http://config:8080
/// let config = AppConfigLoader::new()
///     .with_file("config/apollo.yaml")
///     .with_env_overrides("APOLLO", "__")
///     .load()?;
/// # Ok(())
/// # }
/// ```
pub struct AppConfigLoader {
    file_paths: Vec<PathBuf>,
    env_prefix: Option<String>,
    env_separator: String,
}

impl AppConfigLoader {
    /// Create a loader with no sources.
    pub fn new() -> Self {
        Self {
            file_paths: Vec::new(),
            env_prefix: None,
            env_separator: "__".to_string(),
        }
    }

    /// Add a YAML, TOML or JSON file, detected by extension.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_paths.push(path.into());
        self
    }

    /// Read overrides from environment variables named `{prefix}_{FIELD}`.
    pub fn with_env_overrides(mut self, prefix: &str, separator: &str) -> Self {
        self.env_prefix = Some(prefix.to_string());
        self.env_separator = separator.to_string();
        self
    }

    /// Merge all sources and validate the result.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] if no source was added, a file cannot be
    /// read, or the merged values are incomplete.
    pub fn load(&self) -> Result<AppConfig> {
        if self.file_paths.is_empty() && self.env_prefix.is_none() {
            return Err(ConfigError::Load(
                "No configuration sources specified".to_string(),
            ));
        }

        let mut builder = config::Config::builder();
        for path in &self.file_paths {
            validate_extension(path)?;
            builder = builder.add_source(File::from(path.as_path()).required(true));
        }
        if let Some(prefix) = &self.env_prefix {
            builder = builder.add_source(
                Environment::with_prefix(prefix)
                    .prefix_separator("_")
                    .separator(&self.env_separator)
                    .try_parsing(true),
            );
        }

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for AppConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_extension(path: &std::path::Path) -> Result<()> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .ok_or_else(|| {
            ConfigError::Load(format!(
                "Unable to determine file format for: {}",
                path.display()
            ))
        })?;

    match extension {
        "yaml" | "yml" | "toml" | "json" => Ok(()),
        _ => Err(ConfigError::Load(format!(
            "Unsupported file extension: {}. Supported: .yaml, .yml, .toml, .json",
            extension
        ))),
    }
}

#[cfg(test)]
#[allow(unsafe_code)] // For env var manipulation in tests
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn write_file(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_no_sources() {
        assert!(AppConfigLoader::new().load().is_err());
    }

    #[test]
    fn test_yaml_file_with_defaults() {
        let file = write_file(
            ".yaml",
            "app_id: order-service\nip: http://config:8080\nnamespace_name: application,db.yaml\n",
        );

        let config = AppConfigLoader::new().with_file(file.path()).load().unwrap();
        assert_eq!(config.app_id, "order-service");
        assert_eq!(config.cluster, "default");
        assert_eq!(config.namespaces(), vec!["application", "db.yaml"]);
        assert!(config.is_backup_config);
    }

    #[test]
    fn test_json_file() {
        let file = write_file(
            ".json",
            r#"{"app_id": "svc", "ip": "http://h", "must_start": true, "sync_server_timeout": 3}"#,
        );

        let config = AppConfigLoader::new().with_file(file.path()).load().unwrap();
        assert!(config.must_start);
        assert_eq!(config.sync_timeout(), Some(std::time::Duration::from_secs(3)));
    }

    #[test]
    fn test_missing_required_field() {
        let file = write_file(".toml", "app_id = \"svc\"\n");
        assert!(AppConfigLoader::new().with_file(file.path()).load().is_err());
    }

    #[test]
    fn test_unsupported_extension() {
        let file = write_file(".ini", "app_id=svc");
        let err = AppConfigLoader::new().with_file(file.path()).load().unwrap_err();
        assert!(err.to_string().contains("Unsupported file extension"));
    }

    #[test]
    fn test_env_overrides_file() {
        let file = write_file(".yaml", "app_id: from-file\nip: http://h\n");

        unsafe {
            std::env::set_var("APOLLOTEST_CLUSTER", "gray");
            std::env::set_var("APOLLOTEST_IS_BACKUP_CONFIG", "false");
        }

        let config = AppConfigLoader::new()
            .with_file(file.path())
            .with_env_overrides("APOLLOTEST", "__")
            .load()
            .unwrap();

        unsafe {
            std::env::remove_var("APOLLOTEST_CLUSTER");
            std::env::remove_var("APOLLOTEST_IS_BACKUP_CONFIG");
        }

        assert_eq!(config.app_id, "from-file");
        assert_eq!(config.cluster, "gray");
        assert!(!config.is_backup_config);
    }
}
