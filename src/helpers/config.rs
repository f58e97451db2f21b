use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use config::{Config, ConfigError, Environment, Map};
use serde::Deserialize;

/// Handler settings, read from the variables the Functions host sets.
///
/// The environment source lower-cases keys, so each field is renamed to the
/// lower-cased variable name.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct HandlerConfig {
    /// FUNCTIONS_CUSTOMHANDLER_PORT
    #[serde(rename = "functions_customhandler_port", default = "default_port")]
    pub port: u16,

    /// AZURE_FUNCTIONS_ENVIRONMENT
    #[serde(rename = "azure_functions_environment", default = "default_environment")]
    pub environment: String,

    /// FUNCTION_APP_NAME
    #[serde(rename = "function_app_name", default = "default_function_app")]
    pub function_app: String,

    #[serde(skip, default = "default_version")]
    pub version: String,

    /// LOG_LEVEL (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_port() -> u16 {
    3000
}

fn default_environment() -> String {
    "Development".to_string()
}

fn default_function_app() -> String {
    "BlobEventProcessor".to_string()
}

fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl HandlerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_environment(Environment::default())
    }

    /// Reads the settings from `vars` instead of the process environment.
    pub fn from_vars(vars: Map<String, String>) -> Result<Self, ConfigError> {
        Self::from_environment(Environment::default().source(Some(vars)))
    }

    fn from_environment(environment: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(environment)
            .build()?
            .try_deserialize()
    }

    /// The host only ever talks to the handler over loopback.
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), self.port)
    }
}

impl Default for HandlerConfig {
    fn default() -> Self {
        HandlerConfig {
            port: default_port(),
            environment: default_environment(),
            function_app: default_function_app(),
            version: default_version(),
            log_level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Map<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_without_environment() {
        let config = HandlerConfig::from_vars(vars(&[])).unwrap();

        assert_eq!(config, HandlerConfig::default());
        assert_eq!(config.addr().to_string(), "127.0.0.1:3000");
        assert_eq!(config.version, "1.0.0");
    }

    #[test]
    fn reads_handler_settings() {
        let config = HandlerConfig::from_vars(vars(&[
            ("FUNCTIONS_CUSTOMHANDLER_PORT", "7071"),
            ("AZURE_FUNCTIONS_ENVIRONMENT", "Production"),
            ("FUNCTION_APP_NAME", "blob-relay"),
            ("LOG_LEVEL", "debug"),
            ("PATH", "/usr/bin"),
        ]))
        .unwrap();

        assert_eq!(config.port, 7071);
        assert_eq!(config.environment, "Production");
        assert_eq!(config.function_app, "blob-relay");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.version, "1.0.0");
    }

    #[test]
    fn rejects_non_numeric_port() {
        let result = HandlerConfig::from_vars(vars(&[("FUNCTIONS_CUSTOMHANDLER_PORT", "http")]));
        assert!(result.is_err());
    }
}
