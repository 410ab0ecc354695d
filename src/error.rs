//! Error taxonomy for the gateway.

use thiserror::Error;

/// Failure modes shared by every protocol front-end and the publish job.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Caller supplied an incomplete or malformed request
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Weather provider could not be reached or answered with an error
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Core ingestion API rejected or never received a batch
    #[error("Core API error: {0}")]
    CoreApi(String),

    /// Every strategy in the fallback chain failed
    #[error("All sources failed (tried {attempted})")]
    AllSourcesFailed { attempted: String },

    /// A persisted request-log line is not valid JSON
    #[error("Log parse error: {0}")]
    LogParse(String),

    /// A payload could not be decoded into its typed form
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl GatewayError {
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    pub fn upstream<S: Into<String>>(message: S) -> Self {
        Self::Upstream(message.into())
    }

    pub fn core_api<S: Into<String>>(message: S) -> Self {
        Self::CoreApi(message.into())
    }

    pub fn log_parse<S: Into<String>>(message: S) -> Self {
        Self::LogParse(message.into())
    }

    pub fn decode<S: Into<String>>(message: S) -> Self {
        Self::Decode(message.into())
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let validation_err = GatewayError::validation("lat and lon are required");
        assert!(matches!(validation_err, GatewayError::Validation(_)));

        let upstream_err = GatewayError::upstream("connection refused");
        assert!(matches!(upstream_err, GatewayError::Upstream(_)));
    }

    #[test]
    fn test_all_sources_failed_message() {
        let err = GatewayError::AllSourcesFailed {
            attempted: "SOAP->JSON, gRPC, REST".to_string(),
        };
        assert!(err.to_string().contains("SOAP->JSON, gRPC, REST"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let gateway_err: GatewayError = io_err.into();
        assert!(matches!(gateway_err, GatewayError::Io { .. }));
    }
}
