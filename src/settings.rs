//! Server settings
//!
//! Loaded once at startup from an optional TOML file. Every key is optional:
//!
//! ```toml
//! listen_address = "0.0.0.0"
//! listen_port = 25500
//! template_path = "base.yaml"
//! cache_dir = "cache"
//! cache_ttl = 3600
//! public_url = "https://sub.example.com"
//! domestic_markers = ["HK", "香港"]
//! placeholder_markers = ["剩余流量"]
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::generator::region::DEFAULT_DOMESTIC_MARKERS;
use crate::parser::DEFAULT_PLACEHOLDER_MARKERS;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Failed to parse template {path}: {source}")]
    Template {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid domestic marker list: {0}")]
    Markers(#[from] regex::Error),
}

fn default_listen_address() -> String {
    "127.0.0.1".to_string()
}

fn default_listen_port() -> u16 {
    25500
}

fn default_template_path() -> PathBuf {
    PathBuf::from("base.yaml")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache")
}

fn default_cache_ttl() -> u64 {
    3600
}

fn default_domestic_markers() -> Vec<String> {
    DEFAULT_DOMESTIC_MARKERS.iter().map(|m| m.to_string()).collect()
}

fn default_placeholder_markers() -> Vec<String> {
    DEFAULT_PLACEHOLDER_MARKERS
        .iter()
        .map(|m| m.to_string())
        .collect()
}

/// Settings structure to hold server configuration
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Settings {
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    /// Base Clash template every output is merged into
    #[serde(default = "default_template_path")]
    pub template_path: PathBuf,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Upstream cache time-to-live in seconds
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl: u64,
    /// Externally reachable base URL of this server, used to route
    /// rule-provider downloads through the cache endpoint
    #[serde(default)]
    pub public_url: Option<String>,
    #[serde(default = "default_domestic_markers")]
    pub domestic_markers: Vec<String>,
    #[serde(default = "default_placeholder_markers")]
    pub placeholder_markers: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            listen_port: default_listen_port(),
            template_path: default_template_path(),
            cache_dir: default_cache_dir(),
            cache_ttl: default_cache_ttl(),
            public_url: None,
            domestic_markers: default_domestic_markers(),
            placeholder_markers: default_placeholder_markers(),
        }
    }
}

impl Settings {
    pub fn load_from_content(content: &str) -> Result<Self, SettingsError> {
        let mut settings: Settings = toml::from_str(content)?;
        if settings.listen_address.trim().is_empty() {
            settings.listen_address = default_listen_address();
        }
        Ok(settings)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::load_from_content(&content)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl)
    }

    /// `address:port` to bind; an address that already carries a port is used as is
    pub fn listen_target(&self) -> String {
        if self.listen_address.contains(':') {
            self.listen_address.clone()
        } else {
            format!("{}:{}", self.listen_address, self.listen_port)
        }
    }

    /// Read and decode the base template
    pub fn load_template(&self) -> Result<serde_yaml::Value, SettingsError> {
        let content =
            std::fs::read_to_string(&self.template_path).map_err(|source| SettingsError::Io {
                path: self.template_path.clone(),
                source,
            })?;
        serde_yaml::from_str(&content).map_err(|source| SettingsError::Template {
            path: self.template_path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_from_empty_file() {
        let settings = Settings::load_from_content("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.listen_target(), "127.0.0.1:25500");
        assert_eq!(settings.cache_ttl(), Duration::from_secs(3600));
        assert!(settings.domestic_markers.iter().any(|m| m == "HK"));
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::load_from_content(
            r#"
listen_address = "0.0.0.0:8080"
cache_ttl = 60
public_url = "https://sub.example.com"
domestic_markers = ["JP"]
"#,
        )
        .unwrap();
        assert_eq!(settings.listen_target(), "0.0.0.0:8080");
        assert_eq!(settings.cache_ttl, 60);
        assert_eq!(settings.public_url.as_deref(), Some("https://sub.example.com"));
        assert_eq!(settings.domestic_markers, vec!["JP"]);
        assert_eq!(settings.template_path, PathBuf::from("base.yaml"));
    }

    #[test]
    fn test_blank_listen_address_falls_back() {
        let settings = Settings::load_from_content("listen_address = \"  \"").unwrap();
        assert_eq!(settings.listen_address, "127.0.0.1");
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            Settings::load_from_content("listen_port = \"nope\""),
            Err(SettingsError::Toml(_))
        ));
    }

    #[test]
    fn test_load_template() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "mode: rule\nproxies: []").unwrap();
        let settings = Settings {
            template_path: file.path().to_path_buf(),
            ..Settings::default()
        };
        let template = settings.load_template().unwrap();
        assert!(template.is_mapping());

        let missing = Settings {
            template_path: PathBuf::from("/nonexistent/base.yaml"),
            ..Settings::default()
        };
        assert!(matches!(missing.load_template(), Err(SettingsError::Io { .. })));
    }
}
