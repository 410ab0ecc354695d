//! gRPC binding: `WeatherService.GetWeather` server and the client helper
//! used by the fallback chain.

use std::net::SocketAddr;

use serde_json::json;
use tonic::transport::Server;
use tonic::{Request, Response, Status};

use crate::error::{GatewayError, Result};
use crate::request_log::{ErrorDetail, Protocol, RequestLogger};
use crate::upstream::{Coordinate, UpstreamClient, WeatherPayload};

pub mod proto {
    tonic::include_proto!("weather");
}

use proto::weather_service_client::WeatherServiceClient;
use proto::weather_service_server::{WeatherService, WeatherServiceServer};
use proto::{WeatherRequest, WeatherResponse};

/// Serves the provider document as an opaque JSON string field.
#[derive(Debug)]
pub struct WeatherGrpc {
    upstream: UpstreamClient,
    request_log: RequestLogger,
}

impl WeatherGrpc {
    pub fn new(upstream: UpstreamClient, request_log: RequestLogger) -> Self {
        Self {
            upstream,
            request_log,
        }
    }
}

#[tonic::async_trait]
impl WeatherService for WeatherGrpc {
    async fn get_weather(
        &self,
        request: Request<WeatherRequest>,
    ) -> std::result::Result<Response<WeatherResponse>, Status> {
        let request = request.into_inner();
        let coordinate = Coordinate {
            latitude: request.lat,
            longitude: request.lon,
        };
        let request_json = json!({
            "method": "GetWeather",
            "parameters": {"lat": request.lat, "lon": request.lon},
        });

        match self.upstream.fetch(Some(coordinate)).await {
            Ok(payload) => {
                let body = payload.to_json_string();
                self.request_log.record(
                    Protocol::Grpc,
                    request_json,
                    Some(json!({"status": "OK", "type": "JSON", "dataSize": body.len()})),
                    None,
                );
                Ok(Response::new(WeatherResponse { json: body }))
            }
            Err(error) => {
                self.request_log.record(
                    Protocol::Grpc,
                    request_json,
                    None,
                    Some(ErrorDetail::from(&error)),
                );
                Err(Status::internal(format!("Weather fetch failed: {error}")))
            }
        }
    }
}

pub async fn serve(addr: SocketAddr, service: WeatherGrpc) -> anyhow::Result<()> {
    tracing::info!("gRPC server listening on {addr}");
    Server::builder()
        .add_service(WeatherServiceServer::new(service))
        .serve(addr)
        .await?;
    Ok(())
}

/// One-shot client call used by the fallback chain.
pub async fn fetch_via_grpc(endpoint: &str, coordinate: Coordinate) -> Result<WeatherPayload> {
    let mut client = WeatherServiceClient::connect(endpoint.to_string())
        .await
        .map_err(|e| GatewayError::upstream(format!("gRPC connect failed: {e}")))?;

    let response = client
        .get_weather(WeatherRequest {
            lat: coordinate.latitude,
            lon: coordinate.longitude,
        })
        .await
        .map_err(|status| {
            GatewayError::upstream(format!("gRPC GetWeather failed: {}", status.message()))
        })?;

    WeatherPayload::from_json_str(&response.into_inner().json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request_log::RequestLogger;
    use crate::upstream::UpstreamClient;
    use axum::Router;
    use axum::routing::get;
    use std::time::Duration;
    use tempfile::tempdir;

    const PROVIDER_BODY: &str = r#"{
        "latitude": 38.4127,
        "longitude": 27.1384,
        "timezone": "Europe/Istanbul",
        "hourly": {"time": ["2025-12-13T00:00"], "temperature_2m": [7.3]}
    }"#;

    async fn spawn_provider_stub() -> String {
        let app = Router::new().route(
            "/forecast",
            get(|| async {
                (
                    [("content-type", "application/json")],
                    PROVIDER_BODY.to_string(),
                )
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/forecast")
    }

    fn service_with_upstream(url: String) -> (tempfile::TempDir, WeatherGrpc, RequestLogger) {
        let dir = tempdir().unwrap();
        let request_log = RequestLogger::new(dir.path().to_path_buf());
        let upstream = UpstreamClient::with_base_url(
            url,
            Coordinate {
                latitude: 38.4127,
                longitude: 27.1384,
            },
            Duration::from_secs(2),
        )
        .unwrap();
        let service = WeatherGrpc::new(upstream, request_log.clone());
        (dir, service, request_log)
    }

    #[tokio::test]
    async fn test_get_weather_returns_provider_json() {
        let url = spawn_provider_stub().await;
        let (_dir, service, request_log) = service_with_upstream(url);

        let response = service
            .get_weather(Request::new(WeatherRequest {
                lat: 38.4127,
                lon: 27.1384,
            }))
            .await
            .unwrap();

        let payload = WeatherPayload::from_json_str(&response.into_inner().json).unwrap();
        assert_eq!(payload.as_value()["timezone"], "Europe/Istanbul");

        let entries = request_log.read_all(None).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].protocol, Protocol::Grpc);
        assert!(entries[0].error.is_none());
    }

    #[tokio::test]
    async fn test_get_weather_maps_upstream_failure_to_internal() {
        // Nothing listens on port 1
        let (_dir, service, request_log) =
            service_with_upstream("http://127.0.0.1:1/forecast".to_string());

        let status = service
            .get_weather(Request::new(WeatherRequest { lat: 0.0, lon: 0.0 }))
            .await
            .unwrap_err();

        assert_eq!(status.code(), tonic::Code::Internal);
        assert!(status.message().contains("Weather fetch failed"));

        let entries = request_log.read_all(None).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].error.is_some());
    }
}
