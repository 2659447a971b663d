use std::path::Path;

use serde::{Deserialize, Serialize};

/// Prefix for environment overrides, e.g. `APP_MODEL_NAME`
pub const ENV_PREFIX: &str = "APP";

const DEFAULT_APP_NAME: &str = "Product Similarity API";
/// Default embedding model (sentence-transformers MiniLM, 384 dims)
const DEFAULT_MODEL_NAME: &str = "all-MiniLM-L6-v2";
const DEFAULT_API_VERSION: &str = "v1";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;
/// Where fastembed keeps downloaded model files
const DEFAULT_CACHE_DIR: &str = ".fastembed_cache";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("configuration error: {0}")]
    Source(#[from] config::ConfigError),

    #[error("invalid setting {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Process-wide settings, loaded once at startup and passed down.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Embedding model identifier (e.g. "all-MiniLM-L6-v2", "bge-small-en-v1.5")
    #[serde(default = "default_model_name")]
    pub model_name: String,

    #[serde(default)]
    pub debug: bool,

    /// Version segment of the API prefix: `/api/{api_version}`
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Allowed CORS origins. `*` allows any origin.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            model_name: default_model_name(),
            debug: false,
            api_version: default_api_version(),
            cors_origins: default_cors_origins(),
            host: default_host(),
            port: default_port(),
            cache_dir: default_cache_dir(),
        }
    }
}

fn default_app_name() -> String {
    DEFAULT_APP_NAME.to_string()
}

fn default_model_name() -> String {
    DEFAULT_MODEL_NAME.to_string()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_cache_dir() -> String {
    DEFAULT_CACHE_DIR.to_string()
}

impl Settings {
    /// Load settings from an optional YAML file and `APP_*` environment variables.
    ///
    /// Environment overrides the file, the file overrides defaults.
    pub fn load(config_file: Option<&Path>) -> Result<Self, SettingsError> {
        Self::load_with(config_file, None)
    }

    /// Same as [`Settings::load`], but reads variables from `env` instead of the
    /// process environment when given.
    pub fn load_with(
        config_file: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self, SettingsError> {
        let mut builder = config::Config::builder();

        if let Some(path) = config_file {
            builder = builder.add_source(config::File::from(path).format(config::FileFormat::Yaml));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("cors_origins")
                .ignore_empty(true)
                .source(env),
        );

        let settings: Self = builder.build()?.try_deserialize()?;
        settings.validate()?;

        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.model_name.trim().is_empty() {
            return Err(SettingsError::Invalid {
                key: "model_name",
                message: "must not be empty".to_string(),
            });
        }

        let version = self.api_version.trim();
        if version.is_empty() || version.contains('/') {
            return Err(SettingsError::Invalid {
                key: "api_version",
                message: format!("expected a single path segment, got {:?}", self.api_version),
            });
        }

        if self.cors_origins.iter().any(|origin| origin.trim().is_empty()) {
            return Err(SettingsError::Invalid {
                key: "cors_origins",
                message: "origins must not be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Route prefix shared by every API endpoint.
    pub fn api_prefix(&self) -> String {
        format!("/api/{}", self.api_version.trim())
    }

    /// Default log filter when `RUST_LOG` is not set.
    pub fn log_filter(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(vars: &[(&str, &str)]) -> Option<config::Map<String, String>> {
        Some(
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::load_with(None, env(&[])).unwrap();

        assert_eq!(settings, Settings::default());
        assert_eq!(settings.app_name, "Product Similarity API");
        assert!(!settings.debug);
        assert_eq!(settings.api_version, "v1");
        assert_eq!(settings.cors_origins, vec!["*".to_string()]);
        assert_eq!(settings.api_prefix(), "/api/v1");
    }

    #[test]
    fn test_environment_override() {
        let settings = Settings::load_with(
            None,
            env(&[
                ("APP_APP_NAME", "Test API"),
                ("APP_DEBUG", "true"),
                ("APP_API_VERSION", "v2"),
                ("APP_MODEL_NAME", "bge-small-en-v1.5"),
                ("APP_PORT", "9100"),
                ("APP_CORS_ORIGINS", "https://a.example,https://b.example"),
            ]),
        )
        .unwrap();

        assert_eq!(settings.app_name, "Test API");
        assert!(settings.debug);
        assert_eq!(settings.api_version, "v2");
        assert_eq!(settings.api_prefix(), "/api/v2");
        assert_eq!(settings.model_name, "bge-small-en-v1.5");
        assert_eq!(settings.port, 9100);
        assert_eq!(
            settings.cors_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
        assert_eq!(settings.log_filter(), "debug");
    }

    #[test]
    fn test_unrelated_variables_ignored() {
        let settings = Settings::load_with(
            None,
            env(&[("OTHER_DEBUG", "true"), ("MODEL_NAME", "bge-large-en-v1.5")]),
        )
        .unwrap();

        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_yaml_file_then_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        std::fs::write(
            &path,
            "app_name: From File\nport: 7000\ncors_origins:\n  - https://shop.example\n",
        )
        .unwrap();

        let settings =
            Settings::load_with(Some(path.as_path()), env(&[("APP_PORT", "7001")])).unwrap();

        assert_eq!(settings.app_name, "From File");
        assert_eq!(settings.port, 7001);
        assert_eq!(settings.cors_origins, vec!["https://shop.example".to_string()]);
    }

    #[test]
    fn test_invalid_port_rejected() {
        let result = Settings::load_with(None, env(&[("APP_PORT", "not-a-port")]));
        assert!(matches!(result, Err(SettingsError::Source(_))));
    }

    #[test]
    fn test_invalid_api_version_rejected() {
        let result = Settings::load_with(None, env(&[("APP_API_VERSION", "v1/extra")]));
        assert!(matches!(
            result,
            Err(SettingsError::Invalid { key: "api_version", .. })
        ));
    }
}
