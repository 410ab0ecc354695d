//! Environment-driven configuration.
//!
//! Every setting has a usable default so the gateway starts without any
//! environment at all; overrides come from the variables named below.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::upstream::Coordinate;

/// Runtime configuration assembled once at startup and handed to the
/// components explicitly.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// HTTP port for the REST/SOAP front-ends (`PORT`)
    pub port: u16,
    /// Port for the gRPC front-end (`GRPC_PORT`)
    pub grpc_port: u16,
    /// Forecast endpoint of the upstream provider (`OPEN_METEO_API_URL`)
    pub upstream_url: String,
    /// Coordinate used when a caller omits lat/lon (`DEFAULT_LAT`/`DEFAULT_LON`)
    pub default_coordinate: Coordinate,
    /// Per-call timeout for upstream fetches (`REST_TIMEOUT_MS`)
    pub upstream_timeout: Duration,
    /// Core API observation batch endpoint (`CORE_OBS_BATCH_URL`)
    pub core_obs_batch_url: String,
    /// Core API operational log endpoint (`CORE_LOG_BATCH_URL`)
    pub core_log_batch_url: String,
    /// Directory holding the date-partitioned request logs (`LOG_DIR`)
    pub log_dir: PathBuf,
    /// URL the SOAP client posts envelopes to (`SOAP_URL`)
    pub soap_url: String,
    /// Endpoint the gRPC fallback client connects to (`GRPC_ADDR`)
    pub grpc_endpoint: String,
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        let port = env_parsed("PORT", 3000);
        let grpc_port = env_parsed("GRPC_PORT", 50051);

        Self {
            port,
            grpc_port,
            upstream_url: env_string(
                "OPEN_METEO_API_URL",
                "https://api.open-meteo.com/v1/forecast",
            ),
            default_coordinate: Coordinate {
                latitude: env_parsed("DEFAULT_LAT", 38.4127),
                longitude: env_parsed("DEFAULT_LON", 27.1384),
            },
            upstream_timeout: Duration::from_millis(env_parsed("REST_TIMEOUT_MS", 30_000)),
            core_obs_batch_url: env_string(
                "CORE_OBS_BATCH_URL",
                "https://localhost:7031/api/ingest/observations/batch",
            ),
            core_log_batch_url: env_string(
                "CORE_LOG_BATCH_URL",
                "https://localhost:7031/api/api-log/batch",
            ),
            log_dir: PathBuf::from(env_string("LOG_DIR", "logs/requests")),
            soap_url: env_string("SOAP_URL", &default_soap_url(port)),
            grpc_endpoint: env_string("GRPC_ADDR", &default_grpc_endpoint(grpc_port)),
        }
    }
}

fn default_soap_url(port: u16) -> String {
    format!("http://localhost:{port}/soap")
}

fn default_grpc_endpoint(grpc_port: u16) -> String {
    format!("http://localhost:{grpc_port}")
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Reads an env var and parses it, falling back to `default` when the
/// variable is absent or unparseable.
fn env_parsed<T: FromStr + Copy>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_endpoint_defaults() {
        assert_eq!(default_soap_url(3000), "http://localhost:3000/soap");
        assert_eq!(default_grpc_endpoint(50051), "http://localhost:50051");
    }

    #[test]
    fn test_env_parsed_falls_back_for_missing_var() {
        let port: u16 = env_parsed("METEOGATE_TEST_UNSET_VAR", 3000);
        assert_eq!(port, 3000);
    }

    #[test]
    fn test_from_env_defaults() {
        let config = GatewayConfig::from_env();
        assert!(config.upstream_url.contains("open-meteo.com"));
        assert_eq!(config.default_coordinate.latitude, 38.4127);
        assert_eq!(config.default_coordinate.longitude, 27.1384);
        assert_eq!(config.upstream_timeout, Duration::from_secs(30));
        assert_eq!(config.log_dir, PathBuf::from("logs/requests"));
    }
}
