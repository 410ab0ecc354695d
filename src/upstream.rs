//! Client for the single upstream weather provider (Open-Meteo).

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};

/// Hourly series requested on every fetch. The field list is fixed; callers
/// cannot alter the upstream query.
const HOURLY_FIELDS: &str = "temperature_2m,relative_humidity_2m,cloud_cover,wind_speed_10m,precipitation,sunshine_duration,direct_radiation,pressure_msl";

/// Current-snapshot fields requested on every fetch.
const CURRENT_FIELDS: &str =
    "temperature_2m,relative_humidity_2m,wind_speed_10m,precipitation,cloud_cover,pressure_msl";

const PAST_DAYS: u32 = 3;
const FORECAST_DAYS: u32 = 0;

/// A latitude/longitude pair. The two are only ever meaningful together.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

/// Provider response carried verbatim through the gateway.
///
/// The raw JSON value is what REST and gRPC hand back to their callers;
/// [`WeatherPayload::document`] decodes the typed view on demand.
#[derive(Debug, Clone)]
pub struct WeatherPayload {
    value: Value,
}

impl WeatherPayload {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let value = serde_json::from_str(raw)
            .map_err(|e| GatewayError::decode(format!("invalid provider JSON: {e}")))?;
        Ok(Self { value })
    }

    pub fn as_value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    pub fn to_json_string(&self) -> String {
        self.value.to_string()
    }

    /// Number of top-level fields, used in request-log response summaries.
    pub fn field_count(&self) -> usize {
        self.value.as_object().map(|o| o.len()).unwrap_or(0)
    }

    /// Decodes the typed view of the provider document.
    pub fn document(&self) -> Result<ForecastDocument> {
        serde_json::from_value(self.value.clone())
            .map_err(|e| GatewayError::decode(format!("unexpected provider document shape: {e}")))
    }
}

/// Typed projection of the provider response used by the normalizer and the
/// SOAP front-end. Unknown provider fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ForecastDocument {
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
    pub elevation: Option<f64>,
    pub current: Option<CurrentBlock>,
    pub hourly: Option<HourlyBlock>,
}

/// Single current-conditions snapshot.
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentBlock {
    pub time: Option<String>,
    pub temperature_2m: Option<f64>,
    pub relative_humidity_2m: Option<f64>,
    pub wind_speed_10m: Option<f64>,
    pub precipitation: Option<f64>,
    pub cloud_cover: Option<f64>,
    pub pressure_msl: Option<f64>,
}

/// Parallel hourly arrays sharing the `time` index. Any absent array is
/// treated as all-null; individual positions may also be null.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HourlyBlock {
    #[serde(default)]
    pub time: Vec<String>,
    #[serde(default)]
    pub temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    pub relative_humidity_2m: Vec<Option<f64>>,
    #[serde(default)]
    pub cloud_cover: Vec<Option<f64>>,
    #[serde(default)]
    pub wind_speed_10m: Vec<Option<f64>>,
    #[serde(default)]
    pub precipitation: Vec<Option<f64>>,
    #[serde(default)]
    pub sunshine_duration: Vec<Option<f64>>,
    #[serde(default)]
    pub direct_radiation: Vec<Option<f64>>,
    #[serde(default)]
    pub pressure_msl: Vec<Option<f64>>,
}

/// HTTP client for the provider's forecast endpoint. Every call re-fetches;
/// there is no local caching.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: Client,
    base_url: String,
    default_coordinate: Coordinate,
}

impl UpstreamClient {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        Self::with_base_url(
            config.upstream_url.clone(),
            config.default_coordinate,
            config.upstream_timeout,
        )
    }

    pub fn with_base_url(
        base_url: String,
        default_coordinate: Coordinate,
        timeout: std::time::Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::upstream(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url,
            default_coordinate,
        })
    }

    /// Fetches the current + hourly blocks for `coordinate`, falling back to
    /// the configured default coordinate when none is given.
    pub async fn fetch(&self, coordinate: Option<Coordinate>) -> Result<WeatherPayload> {
        let coordinate = coordinate.unwrap_or(self.default_coordinate);

        tracing::debug!(
            latitude = coordinate.latitude,
            longitude = coordinate.longitude,
            "fetching upstream forecast"
        );

        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("latitude", coordinate.latitude.to_string()),
                ("longitude", coordinate.longitude.to_string()),
                ("hourly", HOURLY_FIELDS.to_string()),
                ("current", CURRENT_FIELDS.to_string()),
                ("timezone", "auto".to_string()),
                ("past_days", PAST_DAYS.to_string()),
                ("forecast_days", FORECAST_DAYS.to_string()),
            ])
            .send()
            .await
            .map_err(|e| GatewayError::upstream(format!("weather fetch failed: {e}")))?;

        if !response.status().is_success() {
            return Err(GatewayError::upstream(format!(
                "weather provider returned {}",
                response.status()
            )));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| GatewayError::upstream(format!("invalid provider response: {e}")))?;

        Ok(WeatherPayload::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_roundtrips_verbatim() {
        let value = json!({"latitude": 38.4, "custom_vendor_field": [1, 2, 3]});
        let payload = WeatherPayload::new(value.clone());
        assert_eq!(payload.as_value(), &value);
        assert_eq!(payload.field_count(), 2);

        let reparsed = WeatherPayload::from_json_str(&payload.to_json_string()).unwrap();
        assert_eq!(reparsed.into_value(), value);
    }

    #[test]
    fn test_document_decodes_hourly_block() {
        let payload = WeatherPayload::new(json!({
            "latitude": 38.4127,
            "longitude": 27.1384,
            "timezone": "Europe/Istanbul",
            "elevation": 114.0,
            "hourly": {
                "time": ["2025-12-13T00:00", "2025-12-13T01:00"],
                "temperature_2m": [7.3, null]
            }
        }));

        let document = payload.document().unwrap();
        assert_eq!(document.timezone, "Europe/Istanbul");
        let hourly = document.hourly.unwrap();
        assert_eq!(hourly.time.len(), 2);
        assert_eq!(hourly.temperature_2m, vec![Some(7.3), None]);
        // Absent arrays decode as empty, not as an error
        assert!(hourly.wind_speed_10m.is_empty());
    }

    #[test]
    fn test_document_rejects_garbage() {
        let payload = WeatherPayload::new(json!({"unexpected": true}));
        assert!(matches!(
            payload.document().unwrap_err(),
            GatewayError::Decode(_)
        ));
    }

    #[test]
    fn test_from_json_str_rejects_invalid_json() {
        let err = WeatherPayload::from_json_str("not json").unwrap_err();
        assert!(matches!(err, GatewayError::Decode(_)));
    }
}
