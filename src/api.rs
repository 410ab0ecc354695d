//! HTTP front-ends: the REST endpoint, the SOAP proxy endpoint, and the
//! log/health query routes.

use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use chrono::{NaiveDate, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::GatewayError;
use crate::request_log::{ErrorDetail, Protocol, RequestLogger};
use crate::soap::{self, SoapClient};
use crate::upstream::{Coordinate, UpstreamClient};

/// Shared handler dependencies, constructed once at startup.
pub struct AppState {
    pub upstream: UpstreamClient,
    pub soap: SoapClient,
    pub request_log: RequestLogger,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/fetchWeatherJson", get(fetch_weather_json))
        .route("/fetchWeather", get(fetch_weather_proxy))
        .route("/soap", post(soap::handle_soap))
        .route("/logs", get(query_logs))
        .route("/logs/files", get(list_log_files))
        .route("/health", get(health))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct WeatherQuery {
    lat: Option<f64>,
    lon: Option<f64>,
}

impl WeatherQuery {
    fn coordinate(&self) -> Option<Coordinate> {
        Some(Coordinate {
            latitude: self.lat?,
            longitude: self.lon?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ProxyQuery {
    lat: Option<f64>,
    lon: Option<f64>,
    /// Logged only; the upstream query window is fixed
    #[serde(rename = "startDate")]
    start_date: Option<String>,
    /// Logged only; the upstream query window is fixed
    #[serde(rename = "numDays")]
    num_days: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct LogsQuery {
    protocol: Option<String>,
    count: Option<usize>,
    date: Option<NaiveDate>,
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn missing_parameters(
    request_log: &RequestLogger,
    protocol: Protocol,
    query: Value,
) -> Response {
    request_log.record(
        protocol,
        json!({"query": query}),
        None,
        Some(ErrorDetail::new("Missing parameters")),
    );
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"error": "lat and lon query parameters are required"})),
    )
        .into_response()
}

fn upstream_failure(
    request_log: &RequestLogger,
    protocol: Protocol,
    query: Value,
    error: &GatewayError,
) -> Response {
    tracing::error!(protocol = %protocol, error = %error, "weather fetch failed");
    request_log.record(
        protocol,
        json!({"query": query}),
        None,
        Some(ErrorDetail::from(error)),
    );
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": "Weather data could not be fetched",
            "message": error.to_string(),
        })),
    )
        .into_response()
}

/// `GET /fetchWeatherJson?lat&lon`: the provider payload, verbatim.
async fn fetch_weather_json(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WeatherQuery>,
) -> Response {
    let query_json = json!({"lat": query.lat, "lon": query.lon});
    let Some(coordinate) = query.coordinate() else {
        return missing_parameters(&state.request_log, Protocol::Rest, query_json);
    };

    match state.upstream.fetch(Some(coordinate)).await {
        Ok(payload) => {
            state.request_log.record(
                Protocol::Rest,
                json!({"query": query_json}),
                Some(json!({"status": 200, "type": "JSON", "dataPoints": payload.field_count()})),
                None,
            );
            Json(payload.into_value()).into_response()
        }
        Err(error) => upstream_failure(&state.request_log, Protocol::Rest, query_json, &error),
    }
}

/// `GET /fetchWeather?lat&lon&startDate&numDays`: the SOAP round trip,
/// unwrapped back into JSON.
async fn fetch_weather_proxy(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProxyQuery>,
) -> Response {
    let start_date = query
        .start_date
        .clone()
        .unwrap_or_else(|| Utc::now().date_naive().to_string());
    let num_days = query.num_days.unwrap_or(3);
    let query_json = json!({
        "lat": query.lat,
        "lon": query.lon,
        "startDate": start_date,
        "numDays": num_days,
    });

    let coordinate = match (query.lat, query.lon) {
        (Some(latitude), Some(longitude)) => Coordinate {
            latitude,
            longitude,
        },
        _ => return missing_parameters(&state.request_log, Protocol::Soap, query_json),
    };

    match state.soap.fetch(coordinate).await {
        Ok(weather) => {
            state.request_log.record(
                Protocol::Soap,
                json!({"query": query_json}),
                Some(json!({
                    "status": 200,
                    "type": "JSON",
                    "observations": weather.observations.len(),
                })),
                None,
            );
            Json(weather).into_response()
        }
        Err(error) => upstream_failure(&state.request_log, Protocol::Soap, query_json, &error),
    }
}

/// `GET /logs?protocol&count&date`: filtered or tailed view of one day's
/// partition.
async fn query_logs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LogsQuery>,
) -> Response {
    let count = query.count.unwrap_or(10);

    let entries = match query.protocol.as_deref() {
        Some(tag) => match Protocol::parse(tag) {
            Some(protocol) => state.request_log.filter_by_protocol(protocol, query.date),
            // Unknown protocol filters match nothing
            None => Ok(Vec::new()),
        },
        None => state.request_log.tail(count, query.date),
    };

    match entries {
        Ok(entries) => {
            let total = entries.len();
            let skip = total.saturating_sub(count);
            let logs: Vec<_> = entries.into_iter().skip(skip).collect();
            Json(json!({
                "timestamp": now_iso(),
                "filter": {
                    "protocol": query.protocol,
                    "count": count,
                    "date": query.date,
                },
                "total": total,
                "logs": logs,
            }))
            .into_response()
        }
        Err(error) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": error.to_string()})),
        )
            .into_response(),
    }
}

/// `GET /logs/files`: partition file listing.
async fn list_log_files(State(state): State<Arc<AppState>>) -> Response {
    match state.request_log.list_partition_files() {
        Ok(files) => Json(json!({
            "timestamp": now_iso(),
            "logDirectory": state.request_log.dir().display().to_string(),
            "files": files,
        }))
        .into_response(),
        Err(error) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": error.to_string()})),
        )
            .into_response(),
    }
}

async fn health() -> Json<Value> {
    Json(json!({"status": "OK", "timestamp": now_iso()}))
}
