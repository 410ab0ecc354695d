//! `meteogate` - multi-protocol weather gateway
//!
//! Exposes a single upstream weather provider over three wire protocols
//! (REST, SOAP, gRPC), normalizes hourly series into canonical observation
//! records, and pushes them to the downstream core API with an ordered
//! transport fallback chain.

pub mod api;
pub mod config;
pub mod core_api;
pub mod error;
pub mod fallback;
pub mod grpc;
pub mod observation;
pub mod request_log;
pub mod soap;
pub mod upstream;
pub mod web;

// Re-export core types for public API
pub use api::AppState;
pub use config::GatewayConfig;
pub use core_api::{ApiLogRecord, CorePublisher};
pub use error::{GatewayError, Result};
pub use fallback::{FallbackChain, FallbackOutcome, FetchStrategy};
pub use observation::{ObservationRecord, normalize, to_iso_no_zone};
pub use request_log::{LogEntry, Protocol, RequestLogger};
pub use soap::SoapClient;
pub use upstream::{Coordinate, UpstreamClient, WeatherPayload};
