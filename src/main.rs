use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use meteogate::api::AppState;
use meteogate::config::GatewayConfig;
use meteogate::core_api::{self, CorePublisher};
use meteogate::fallback::FallbackChain;
use meteogate::grpc::{self, WeatherGrpc};
use meteogate::request_log::RequestLogger;
use meteogate::soap::SoapClient;
use meteogate::upstream::UpstreamClient;
use meteogate::web;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = GatewayConfig::from_env();
    tracing::info!(
        port = config.port,
        grpc_port = config.grpc_port,
        "starting meteogate"
    );

    let upstream = UpstreamClient::new(&config)?;
    let request_log = RequestLogger::new(config.log_dir.clone());
    let soap = SoapClient::new(config.soap_url.clone());

    let state = Arc::new(AppState {
        upstream: upstream.clone(),
        soap: soap.clone(),
        request_log: request_log.clone(),
    });

    let grpc_addr: SocketAddr = ([0, 0, 0, 0], config.grpc_port).into();
    let grpc_service = WeatherGrpc::new(upstream.clone(), request_log);
    tokio::spawn(async move {
        if let Err(error) = grpc::serve(grpc_addr, grpc_service).await {
            tracing::error!(error = %error, "gRPC server failed");
        }
    });

    // One-shot publish job; cadence beyond startup is an external decision.
    let chain = FallbackChain::standard(soap, config.grpc_endpoint.clone(), upstream);
    let publisher = CorePublisher::new(&config)?;
    let coordinate = config.default_coordinate;
    tokio::spawn(async move {
        if let Err(error) = core_api::run_publish_job(&chain, &publisher, coordinate).await {
            tracing::error!(error = %error, "publish job failed");
        }
    });

    web::run(config.port, state).await
}
