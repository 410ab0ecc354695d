//! Publishing normalized observations to the downstream core API, plus the
//! one-shot background job driving the fallback chain.

use std::time::{Duration, Instant};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::fallback::FallbackChain;
use crate::observation::{ObservationRecord, normalize};
use crate::upstream::Coordinate;

const OBS_BATCH_ENDPOINT: &str = "/api/ingest/observations/batch";
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(60);
const LOG_TIMEOUT: Duration = Duration::from_secs(20);

/// One operational log line in the core API's api-log batch shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiLogRecord {
    pub user_id: Option<String>,
    pub endpoint: String,
    pub method: String,
    pub request_ts: String,
    /// 0 when no response was received at all
    pub status_code: u16,
    pub response_ms: u64,
    pub client_ip: Option<String>,
    pub error_message: String,
}

/// Client for the core ingestion API.
#[derive(Debug, Clone)]
pub struct CorePublisher {
    http: reqwest::Client,
    obs_batch_url: String,
    log_batch_url: String,
}

impl CorePublisher {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        Self::with_urls(
            config.core_obs_batch_url.clone(),
            config.core_log_batch_url.clone(),
        )
    }

    pub fn with_urls(obs_batch_url: String, log_batch_url: String) -> Result<Self> {
        // The core API terminates TLS with a development certificate when
        // running on localhost.
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| GatewayError::core_api(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            obs_batch_url,
            log_batch_url,
        })
    }

    /// Posts the whole batch in one request (no chunking) and reports the
    /// outcome through the api-log side channel. A publish failure is
    /// returned to the caller after the side channel fires; a side-channel
    /// failure is only ever a warning.
    pub async fn publish(&self, records: &[ObservationRecord], source: &str) -> Result<u16> {
        let started = Instant::now();
        let result = self
            .http
            .post(&self.obs_batch_url)
            .timeout(PUBLISH_TIMEOUT)
            .json(records)
            .send()
            .await;
        let response_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(response) if response.status().is_success() => {
                let status_code = response.status().as_u16();
                self.send_api_log(self.outcome(
                    status_code,
                    response_ms,
                    format!("OK (source={source}, count={})", records.len()),
                ))
                .await;
                Ok(status_code)
            }
            Ok(response) => {
                let status_code = response.status().as_u16();
                let message = format!("core API returned {}", response.status());
                self.send_api_log(self.outcome(
                    status_code,
                    response_ms,
                    format!(
                        "FAIL (source={source}, count={}) :: {message}",
                        records.len()
                    ),
                ))
                .await;
                Err(GatewayError::core_api(message))
            }
            Err(error) => {
                self.send_api_log(self.outcome(
                    0,
                    response_ms,
                    format!("FAIL (source={source}, count={}) :: {error}", records.len()),
                ))
                .await;
                Err(GatewayError::core_api(error.to_string()))
            }
        }
    }

    fn outcome(&self, status_code: u16, response_ms: u64, error_message: String) -> ApiLogRecord {
        ApiLogRecord {
            user_id: None,
            endpoint: OBS_BATCH_ENDPOINT.to_string(),
            method: "POST".to_string(),
            request_ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            status_code,
            response_ms,
            client_ip: None,
            error_message,
        }
    }

    /// Best-effort api-log delivery; never propagates.
    async fn send_api_log(&self, record: ApiLogRecord) {
        let result = self
            .http
            .post(&self.log_batch_url)
            .timeout(LOG_TIMEOUT)
            .json(&[record])
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                warn!(status = %response.status(), "api-log delivery rejected");
            }
            Err(error) => {
                warn!(error = %error, "api-log delivery failed");
            }
        }
    }
}

/// One run of the publish pipeline: fallback fetch, decode, normalize, push.
pub async fn run_publish_job(
    chain: &FallbackChain,
    publisher: &CorePublisher,
    coordinate: Coordinate,
) -> Result<()> {
    let outcome = chain.fetch(coordinate).await?;
    let document = outcome.payload.document()?;
    let records = normalize(&document);

    info!(
        count = records.len(),
        source = outcome.source,
        "publishing observation batch"
    );

    let status = publisher.publish(&records, outcome.source).await?;
    info!(status, "core API accepted batch");
    Ok(())
}
