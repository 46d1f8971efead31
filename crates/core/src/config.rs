use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `OFFERWALL__` (nested keys separated by `__`).
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_uri")]
    pub uri: String,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default functions
fn default_store_uri() -> String {
    "mongodb://localhost:27017".to_string()
}
fn default_database() -> String {
    "offerwall".to_string()
}
fn default_collection() -> String {
    "offers".to_string()
}
fn default_connect_timeout_ms() -> u64 {
    5000
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_metrics_port() -> u16 {
    9091
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: default_store_uri(),
            database: default_database(),
            collection: default_collection(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: default_metrics_port(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("OFFERWALL")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load configuration, falling back to defaults when the environment
    /// cannot be deserialized.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to load config, using defaults");
            Self::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.store.uri, "mongodb://localhost:27017");
        assert_eq!(config.store.database, "offerwall");
        assert_eq!(config.store.collection, "offers");
        assert_eq!(config.api.http_port, 8080);
        assert_eq!(config.metrics.port, 9091);
    }

    #[test]
    fn test_partial_store_section_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"store": {"database": "staging"}}"#).unwrap();
        assert_eq!(config.store.database, "staging");
        assert_eq!(config.store.collection, "offers");
        assert_eq!(config.store.connect_timeout_ms, 5000);
    }
}
