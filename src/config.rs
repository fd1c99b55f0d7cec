use std::{fs, path::Path};

use serde::Deserialize;

use crate::{IvrFlowError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// backend config
    #[serde(default)]
    pub backend: BackendConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendConfig {
    /// backend type
    #[serde(default)]
    pub backend_type: BackendType,
    /// http backend config
    pub http: Option<HttpConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq, strum::AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BackendType {
    #[default]
    Mem,
    Http,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// console api base url
    pub base_url: String,
    /// request timeout in milliseconds, defaults to 30000
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

fn default_timeout() -> u64 {
    30_000
}

impl Config {
    pub fn create<T: AsRef<Path>>(path: T) -> Result<Self> {
        let data = fs::read_to_string(path.as_ref()).map_err(|e| IvrFlowError::Config(format!("failed to load config file {:?}: {}", path.as_ref(), e)))?;

        Self::load_from_str(data.as_str())
    }

    pub fn load_from_str(toml_str: &str) -> Result<Self> {
        let config = toml::from_str::<Config>(toml_str)?;
        if config.backend.backend_type == BackendType::Http && config.backend.http.is_none() {
            return Err(IvrFlowError::Config("backend_type 'http' requires a [backend.http] section".to_string()));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod test {
    use crate::{BackendType, Config, IvrFlowError};

    #[test]
    fn test_config_deserialize() {
        let toml_str = r#"
        [backend]
        backend_type = "http"

        [backend.http]
        base_url = "http://localhost:5000/api"
        timeout = 5000
        "#;
        let config = Config::load_from_str(toml_str).unwrap();
        assert_eq!(config.backend.backend_type, BackendType::Http);
        let http = config.backend.http.unwrap();
        assert_eq!(http.base_url, "http://localhost:5000/api");
        assert_eq!(http.timeout, 5000);
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::load_from_str("").unwrap();
        assert_eq!(config.backend.backend_type, BackendType::Mem);
        assert!(config.backend.http.is_none());

        let config = Config::load_from_str("[backend.http]\nbase_url = \"http://console\"").unwrap();
        assert_eq!(config.backend.http.unwrap().timeout, 30_000);
    }

    #[test]
    fn test_config_errors() {
        let err = Config::load_from_str("[backend]\nbackend_type = \"http\"").unwrap_err();
        assert!(matches!(err, IvrFlowError::Config(_)));

        let err = Config::load_from_str("[backend]\nbackend_type = \"ftp\"").unwrap_err();
        assert!(matches!(err, IvrFlowError::Config(_)));

        assert!(Config::create("/nonexistent/ivrflow.toml").is_err());
    }
}
