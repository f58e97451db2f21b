use chrono::{DateTime, Utc};

use serde::Serialize;

use super::config::HandlerConfig;

pub const PONG: &str = "pong";

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus<'a> {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub function_app: &'a str,
    pub version: &'a str,
    pub environment: &'a str,
}

impl<'a> HealthStatus<'a> {
    pub fn healthy(config: &'a HandlerConfig, timestamp: DateTime<Utc>) -> Self {
        HealthStatus {
            status: "healthy",
            timestamp,
            function_app: &config.function_app,
            version: &config.version,
            environment: &config.environment,
        }
    }
}
