//! Service configuration: an optional TOML file with environment overrides.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Path of the TOML file to load, if any.
pub const CONFIG_PATH_ENV: &str = "WORKER_SAFETY_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
    #[error("invalid url for {key}: {source}")]
    InvalidUrl {
        key: &'static str,
        #[source]
        source: url::ParseError,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub pdf: PdfConfig,
    pub auth: AuthConfig,
    pub tenant: TenantDefaults,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub graphql_url: String,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            graphql_url: "http://localhost:8001/graphql".to_string(),
            timeout_secs: 30,
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Settings for the headless-browser PDF service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    pub service_url: String,
    pub timeout_secs: u64,
    pub format: String,
    pub landscape: bool,
    pub margin_top: String,
    pub margin_right: String,
    pub margin_bottom: String,
    pub margin_left: String,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            service_url: "http://localhost:3100/pdf".to_string(),
            timeout_secs: 60,
            format: "Letter".to_string(),
            landscape: false,
            margin_top: "0.9in".to_string(),
            margin_right: "0.5in".to_string(),
            margin_bottom: "0.7in".to_string(),
            margin_left: "0.5in".to_string(),
        }
    }
}

impl PdfConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Bearer token verification. Exactly one of `secret` (HS256) or
/// `public_key_path` (RS256, PEM) should be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub secret: Option<String>,
    pub public_key_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TenantDefaults {
    /// Tenant used when a token carries no tenant claim.
    pub default_tenant: String,
}

impl Default for TenantDefaults {
    fn default() -> Self {
        Self {
            default_tenant: "default".to_string(),
        }
    }
}

impl Config {
    /// Load from `WORKER_SAFETY_CONFIG` (if set), then apply environment
    /// overrides and validate.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded config file");
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Override fields from variables returned by `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| ConfigError::InvalidValue { key: "PORT", value: port })?;
        }
        if let Some(url) = lookup("GRAPHQL_URL") {
            self.backend.graphql_url = url;
        }
        if let Some(url) = lookup("PDF_SERVICE_URL") {
            self.pdf.service_url = url;
        }
        if let Some(issuer) = lookup("AUTH_ISSUER") {
            self.auth.issuer = Some(issuer);
        }
        if let Some(audience) = lookup("AUTH_AUDIENCE") {
            self.auth.audience = Some(audience);
        }
        if let Some(secret) = lookup("AUTH_SECRET") {
            self.auth.secret = Some(secret);
        }
        if let Some(path) = lookup("AUTH_PUBLIC_KEY_PATH") {
            self.auth.public_key_path = Some(PathBuf::from(path));
        }
        if let Some(tenant) = lookup("DEFAULT_TENANT") {
            self.tenant.default_tenant = tenant;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.backend.graphql_url).map_err(|source| ConfigError::InvalidUrl {
            key: "backend.graphql_url",
            source,
        })?;
        Url::parse(&self.pdf.service_url).map_err(|source| ConfigError::InvalidUrl {
            key: "pdf.service_url",
            source,
        })?;
        if self.tenant.default_tenant.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "tenant.default_tenant",
                value: self.tenant.default_tenant.clone(),
            });
        }
        Ok(())
    }
}
