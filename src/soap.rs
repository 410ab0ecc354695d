//! SOAP binding for the `GetWeather` operation.
//!
//! The envelope is encoded and decoded explicitly with `quick-xml`: the
//! server side lives on a plain HTTP POST route, the client side wraps the
//! round trip back into REST-shaped JSON for the proxy front-end and the
//! fallback chain.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use quick_xml::Reader;
use quick_xml::events::Event;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::AppState;
use crate::error::{GatewayError, Result};
use crate::observation::{ObservationRecord, normalize};
use crate::upstream::{Coordinate, WeatherPayload};

const TEXT_XML: &str = "text/xml; charset=utf-8";
const SOAP_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

// ---------------------------------------------------------------------------
// Envelope models
// ---------------------------------------------------------------------------

/// `GetWeather` response body: the raw provider JSON plus the normalized
/// observation list and the current snapshot scalars.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct GetWeatherResponse {
    #[serde(rename = "Json")]
    pub json: String,
    #[serde(rename = "Observations")]
    pub observations: Observations,
    #[serde(rename = "Temperature")]
    pub temperature: f64,
    #[serde(rename = "Humidity")]
    pub humidity: f64,
    #[serde(rename = "Status")]
    pub status: String,
}

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Observations {
    #[serde(rename = "Observation", default)]
    pub items: Vec<ObservationRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename = "soap:Envelope")]
struct ResponseEnvelope {
    #[serde(rename = "@xmlns:soap")]
    xmlns_soap: String,
    #[serde(rename = "soap:Body", alias = "Body")]
    body: ResponseBody,
}

#[derive(Debug, Serialize, Deserialize)]
struct ResponseBody {
    #[serde(rename = "GetWeatherResponse")]
    response: GetWeatherResponse,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename = "soap:Envelope")]
struct FaultEnvelope {
    #[serde(rename = "@xmlns:soap")]
    xmlns_soap: String,
    #[serde(rename = "soap:Body", alias = "Body")]
    body: FaultBody,
}

#[derive(Debug, Serialize, Deserialize)]
struct FaultBody {
    #[serde(rename = "soap:Fault", alias = "Fault")]
    fault: Fault,
}

#[derive(Debug, Serialize, Deserialize)]
struct Fault {
    #[serde(rename = "faultcode")]
    code: String,
    #[serde(rename = "faultstring")]
    message: String,
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Builds the request envelope sent by the client side.
pub fn encode_get_weather_request(coordinate: Coordinate) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?><soap:Envelope xmlns:soap="{SOAP_ENVELOPE_NS}"><soap:Body><GetWeather><Latitude>{}</Latitude><Longitude>{}</Longitude></GetWeather></soap:Body></soap:Envelope>"#,
        coordinate.latitude, coordinate.longitude
    )
}

/// Extracts the coordinate from a `GetWeather` request envelope. Matches on
/// local element names so any namespace prefix is accepted.
pub fn decode_get_weather_request(body: &str) -> Result<Coordinate> {
    enum Capture {
        Nothing,
        Latitude,
        Longitude,
    }

    let mut reader = Reader::from_str(body);
    let mut capture = Capture::Nothing;
    let mut latitude: Option<f64> = None;
    let mut longitude: Option<f64> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| GatewayError::validation(format!("malformed SOAP request: {e}")))?;
        match event {
            Event::Start(e) => {
                capture = match e.local_name().as_ref() {
                    b"Latitude" => Capture::Latitude,
                    b"Longitude" => Capture::Longitude,
                    _ => Capture::Nothing,
                };
            }
            Event::Text(text) => {
                let raw = text
                    .unescape()
                    .map_err(|e| GatewayError::validation(format!("malformed SOAP request: {e}")))?;
                let raw = raw.trim();
                if raw.is_empty() {
                    continue;
                }
                match capture {
                    Capture::Latitude => {
                        latitude = Some(raw.parse().map_err(|_| {
                            GatewayError::validation(format!("invalid Latitude: {raw}"))
                        })?);
                    }
                    Capture::Longitude => {
                        longitude = Some(raw.parse().map_err(|_| {
                            GatewayError::validation(format!("invalid Longitude: {raw}"))
                        })?);
                    }
                    Capture::Nothing => {}
                }
            }
            Event::End(_) => capture = Capture::Nothing,
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(Coordinate {
        latitude: latitude
            .ok_or_else(|| GatewayError::validation("GetWeather request is missing Latitude"))?,
        longitude: longitude
            .ok_or_else(|| GatewayError::validation("GetWeather request is missing Longitude"))?,
    })
}

pub fn encode_get_weather_response(response: GetWeatherResponse) -> Result<String> {
    let envelope = ResponseEnvelope {
        xmlns_soap: SOAP_ENVELOPE_NS.to_string(),
        body: ResponseBody { response },
    };
    let xml = quick_xml::se::to_string(&envelope)
        .map_err(|e| GatewayError::decode(format!("failed to encode SOAP response: {e}")))?;
    Ok(format!(r#"<?xml version="1.0" encoding="utf-8"?>{xml}"#))
}

pub fn decode_get_weather_response(body: &str) -> Result<GetWeatherResponse> {
    let envelope: ResponseEnvelope = quick_xml::de::from_str(body)
        .map_err(|e| GatewayError::decode(format!("unexpected SOAP response: {e}")))?;
    Ok(envelope.body.response)
}

fn encode_fault(error: &GatewayError) -> String {
    let envelope = FaultEnvelope {
        xmlns_soap: SOAP_ENVELOPE_NS.to_string(),
        body: FaultBody {
            fault: Fault {
                code: "soap:Server".to_string(),
                message: error.to_string(),
            },
        },
    };
    quick_xml::se::to_string(&envelope).unwrap_or_else(|_| {
        format!(
            r#"<soap:Envelope xmlns:soap="{SOAP_ENVELOPE_NS}"><soap:Body><soap:Fault><faultcode>soap:Server</faultcode><faultstring>internal error</faultstring></soap:Fault></soap:Body></soap:Envelope>"#
        )
    })
}

fn decode_fault_message(body: &str) -> Option<String> {
    quick_xml::de::from_str::<FaultEnvelope>(body)
        .ok()
        .map(|envelope| envelope.body.fault.message)
}

// ---------------------------------------------------------------------------
// Server side
// ---------------------------------------------------------------------------

/// Native SOAP endpoint: `POST /soap`. Faults are reported the SOAP way,
/// as a fault envelope with a 500 status.
pub async fn handle_soap(State(state): State<Arc<AppState>>, body: String) -> Response {
    match get_weather_operation(&state, &body).await {
        Ok(xml) => ([(header::CONTENT_TYPE, TEXT_XML)], xml).into_response(),
        Err(error) => {
            tracing::warn!(error = %error, "SOAP GetWeather failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, TEXT_XML)],
                encode_fault(&error),
            )
                .into_response()
        }
    }
}

async fn get_weather_operation(state: &AppState, body: &str) -> Result<String> {
    let coordinate = decode_get_weather_request(body)?;
    let payload = state.upstream.fetch(Some(coordinate)).await?;
    let document = payload.document()?;
    let observations = normalize(&document);

    let current = document.current.as_ref();
    let response = GetWeatherResponse {
        json: payload.to_json_string(),
        observations: Observations {
            items: observations,
        },
        temperature: current.and_then(|c| c.temperature_2m).unwrap_or(0.0),
        humidity: current.and_then(|c| c.relative_humidity_2m).unwrap_or(0.0),
        status: "OK".to_string(),
    };

    encode_get_weather_response(response)
}

// ---------------------------------------------------------------------------
// Client side
// ---------------------------------------------------------------------------

/// `GetWeather` result unwrapped back into REST-shaped JSON.
#[derive(Debug, Serialize)]
pub struct SoapWeather {
    pub observations: Vec<ObservationRecord>,
    pub json: Option<Value>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub status: String,
}

/// Client for the gateway's own SOAP endpoint.
#[derive(Debug, Clone)]
pub struct SoapClient {
    http: reqwest::Client,
    endpoint: String,
}

impl SoapClient {
    pub fn new(endpoint: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
        }
    }

    pub async fn fetch(&self, coordinate: Coordinate) -> Result<SoapWeather> {
        let envelope = encode_get_weather_request(coordinate);
        let response = self
            .http
            .post(&self.endpoint)
            .header("content-type", TEXT_XML)
            .body(envelope)
            .send()
            .await
            .map_err(|e| GatewayError::upstream(format!("SOAP call failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::upstream(format!("SOAP response unreadable: {e}")))?;

        if !status.is_success() {
            let message = decode_fault_message(&body)
                .unwrap_or_else(|| format!("SOAP endpoint returned {status}"));
            return Err(GatewayError::upstream(format!("SOAP fault: {message}")));
        }

        let decoded = decode_get_weather_response(&body)?;
        let json = WeatherPayload::from_json_str(&decoded.json)?.into_value();

        Ok(SoapWeather {
            observations: decoded.observations.items,
            json: Some(json),
            temperature: Some(decoded.temperature),
            humidity: Some(decoded.humidity),
            status: decoded.status,
        })
    }
}
