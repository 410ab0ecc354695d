//! Ordered fallback across the transport paths to the same logical fetch.
//!
//! The chain is a fixed data-driven list of strategies, tried strictly in
//! sequence: the first success wins, a step failure is a warning, and only
//! exhaustion of every step is terminal. Ordering never adapts at runtime.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::{GatewayError, Result};
use crate::grpc;
use crate::soap::SoapClient;
use crate::upstream::{Coordinate, UpstreamClient, WeatherPayload};

/// One way of obtaining the provider document for a coordinate.
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    /// Tag identifying this path in logs and in `FallbackOutcome::source`.
    fn name(&self) -> &'static str;

    async fn attempt(&self, coordinate: Coordinate) -> Result<WeatherPayload>;
}

/// Successful chain result, tagged with the path that produced it.
#[derive(Debug)]
pub struct FallbackOutcome {
    pub payload: WeatherPayload,
    pub source: &'static str,
}

pub struct SoapStrategy {
    client: SoapClient,
}

impl SoapStrategy {
    pub fn new(client: SoapClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FetchStrategy for SoapStrategy {
    fn name(&self) -> &'static str {
        "SOAP->JSON"
    }

    async fn attempt(&self, coordinate: Coordinate) -> Result<WeatherPayload> {
        let weather = self.client.fetch(coordinate).await?;
        let json = weather
            .json
            .ok_or_else(|| GatewayError::upstream("SOAP response carried no Json payload"))?;
        Ok(WeatherPayload::new(json))
    }
}

pub struct GrpcStrategy {
    endpoint: String,
}

impl GrpcStrategy {
    pub fn new(endpoint: String) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl FetchStrategy for GrpcStrategy {
    fn name(&self) -> &'static str {
        "gRPC"
    }

    async fn attempt(&self, coordinate: Coordinate) -> Result<WeatherPayload> {
        grpc::fetch_via_grpc(&self.endpoint, coordinate).await
    }
}

/// Last resort: fetch the upstream provider directly.
pub struct RestStrategy {
    upstream: UpstreamClient,
}

impl RestStrategy {
    pub fn new(upstream: UpstreamClient) -> Self {
        Self { upstream }
    }
}

#[async_trait]
impl FetchStrategy for RestStrategy {
    fn name(&self) -> &'static str {
        "REST"
    }

    async fn attempt(&self, coordinate: Coordinate) -> Result<WeatherPayload> {
        self.upstream.fetch(Some(coordinate)).await
    }
}

pub struct FallbackChain {
    strategies: Vec<Box<dyn FetchStrategy>>,
}

impl FallbackChain {
    pub fn new(strategies: Vec<Box<dyn FetchStrategy>>) -> Self {
        Self { strategies }
    }

    /// The production ordering: SOAP, then gRPC, then direct REST.
    pub fn standard(soap: SoapClient, grpc_endpoint: String, upstream: UpstreamClient) -> Self {
        Self::new(vec![
            Box::new(SoapStrategy::new(soap)),
            Box::new(GrpcStrategy::new(grpc_endpoint)),
            Box::new(RestStrategy::new(upstream)),
        ])
    }

    /// Tries each strategy to completion before moving on; no parallel
    /// racing. Returns the first success or `AllSourcesFailed`.
    pub async fn fetch(&self, coordinate: Coordinate) -> Result<FallbackOutcome> {
        for strategy in &self.strategies {
            match strategy.attempt(coordinate).await {
                Ok(payload) => {
                    info!(source = strategy.name(), "weather fetched");
                    return Ok(FallbackOutcome {
                        payload,
                        source: strategy.name(),
                    });
                }
                Err(error) => {
                    warn!(source = strategy.name(), error = %error, "fetch attempt failed");
                }
            }
        }

        let attempted = self
            .strategies
            .iter()
            .map(|s| s.name())
            .collect::<Vec<_>>()
            .join(", ");
        Err(GatewayError::AllSourcesFailed { attempted })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct ScriptedStrategy {
        name: &'static str,
        succeeds: bool,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedStrategy {
        fn new(name: &'static str, succeeds: bool) -> (Box<dyn FetchStrategy>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let strategy = Box::new(Self {
                name,
                succeeds,
                calls: calls.clone(),
            });
            (strategy, calls)
        }
    }

    #[async_trait]
    impl FetchStrategy for ScriptedStrategy {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn attempt(&self, _coordinate: Coordinate) -> Result<WeatherPayload> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.succeeds {
                Ok(WeatherPayload::new(json!({"via": self.name})))
            } else {
                Err(GatewayError::upstream("scripted failure"))
            }
        }
    }

    fn coordinate() -> Coordinate {
        Coordinate {
            latitude: 38.4127,
            longitude: 27.1384,
        }
    }

    #[tokio::test]
    async fn test_first_success_stops_the_chain() {
        let (first, first_calls) = ScriptedStrategy::new("SOAP->JSON", true);
        let (second, second_calls) = ScriptedStrategy::new("gRPC", true);
        let (third, third_calls) = ScriptedStrategy::new("REST", true);
        let chain = FallbackChain::new(vec![first, second, third]);

        let outcome = chain.fetch(coordinate()).await.unwrap();
        assert_eq!(outcome.source, "SOAP->JSON");
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
        assert_eq!(third_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_chain_falls_through_to_last_strategy() {
        let (first, _) = ScriptedStrategy::new("SOAP->JSON", false);
        let (second, _) = ScriptedStrategy::new("gRPC", false);
        let (third, third_calls) = ScriptedStrategy::new("REST", true);
        let chain = FallbackChain::new(vec![first, second, third]);

        let outcome = chain.fetch(coordinate()).await.unwrap();
        assert_eq!(outcome.source, "REST");
        assert_eq!(outcome.payload.as_value()["via"], "REST");
        assert_eq!(third_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_chain_is_terminal() {
        let (first, _) = ScriptedStrategy::new("SOAP->JSON", false);
        let (second, _) = ScriptedStrategy::new("gRPC", false);
        let (third, _) = ScriptedStrategy::new("REST", false);
        let chain = FallbackChain::new(vec![first, second, third]);

        let error = chain.fetch(coordinate()).await.unwrap_err();
        match error {
            GatewayError::AllSourcesFailed { attempted } => {
                assert_eq!(attempted, "SOAP->JSON, gRPC, REST");
            }
            other => panic!("expected AllSourcesFailed, got {other}"),
        }
    }
}
