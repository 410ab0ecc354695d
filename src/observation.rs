//! Normalization of provider time-series into canonical observation records.

use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::upstream::ForecastDocument;

// Location metadata is fixed for the deployment; it is not derived from the
// coordinate.
const LOCATION_NAME: &str = "Izmir";
const LOCATION_CITY: &str = "Izmir";
const LOCATION_COUNTRY_CODE: &str = "TR";

/// One normalized weather measurement per hourly timestamp.
///
/// Records are constructed fresh on every fetch and immediately serialized
/// for transport; nothing is persisted locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    pub lat: f64,
    pub lon: f64,
    pub name: String,
    pub city: String,
    pub country_code: String,
    pub timezone: String,
    /// ISO-8601 local timestamp, always seconds precision
    pub observed_at: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub temperature_c: Option<f64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub humidity_pct: Option<f64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub wind_speed_kmh: Option<f64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub precip_mm: Option<f64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub cloud_cover_pct: Option<f64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub sunshine_min: Option<i64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub shortwave_w_m2: Option<f64>,
    /// Not supplied by any requested provider field
    #[serde(default, deserialize_with = "empty_as_none")]
    pub wind_dir_deg: Option<f64>,
}

/// quick-xml writes `None` as an empty element (`<temperature_c/>`) but its
/// deserializer hands that back as an empty string, which a plain
/// `Option<f64>` rejects. This decoder maps empty text to `None` so records
/// survive the SOAP envelope round trip.
fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    struct NumericText<T>(PhantomData<T>);

    impl<'de, T> serde::de::Visitor<'de> for NumericText<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        type Value = Option<T>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a number, empty text or null")
        }

        fn visit_str<E: serde::de::Error>(self, value: &str) -> Result<Self::Value, E> {
            let value = value.trim();
            if value.is_empty() {
                Ok(None)
            } else {
                value.parse().map(Some).map_err(E::custom)
            }
        }

        fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_none<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D2: serde::Deserializer<'de>>(
            self,
            deserializer: D2,
        ) -> Result<Self::Value, D2::Error> {
            deserializer.deserialize_str(self)
        }

        fn visit_f64<E: serde::de::Error>(self, value: f64) -> Result<Self::Value, E> {
            self.visit_str(&value.to_string())
        }

        fn visit_i64<E: serde::de::Error>(self, value: i64) -> Result<Self::Value, E> {
            self.visit_str(&value.to_string())
        }

        fn visit_u64<E: serde::de::Error>(self, value: u64) -> Result<Self::Value, E> {
            self.visit_str(&value.to_string())
        }
    }

    deserializer.deserialize_str(NumericText(PhantomData))
}

/// Extends a minute-precision provider timestamp (`YYYY-MM-DDTHH:MM`) to
/// seconds precision. Longer strings pass through unchanged, so the function
/// is idempotent.
pub fn to_iso_no_zone(timestamp: &str) -> String {
    if timestamp.len() == 16 {
        format!("{timestamp}:00")
    } else {
        timestamp.to_string()
    }
}

/// Projects the hourly block of a provider document into one record per
/// timestamp. Absent or short field arrays fill with `None`; a document
/// without an hourly block yields no records.
pub fn normalize(document: &ForecastDocument) -> Vec<ObservationRecord> {
    let Some(hourly) = &document.hourly else {
        return Vec::new();
    };

    hourly
        .time
        .iter()
        .enumerate()
        .map(|(i, time)| ObservationRecord {
            lat: document.latitude,
            lon: document.longitude,
            name: LOCATION_NAME.to_string(),
            city: LOCATION_CITY.to_string(),
            country_code: LOCATION_COUNTRY_CODE.to_string(),
            timezone: document.timezone.clone(),
            observed_at: to_iso_no_zone(time),
            temperature_c: value_at(&hourly.temperature_2m, i),
            humidity_pct: value_at(&hourly.relative_humidity_2m, i),
            wind_speed_kmh: value_at(&hourly.wind_speed_10m, i),
            precip_mm: value_at(&hourly.precipitation, i),
            cloud_cover_pct: value_at(&hourly.cloud_cover, i),
            sunshine_min: value_at(&hourly.sunshine_duration, i)
                .map(|seconds| (seconds / 60.0).round() as i64),
            shortwave_w_m2: value_at(&hourly.direct_radiation, i),
            wind_dir_deg: None,
        })
        .collect()
}

fn value_at(values: &[Option<f64>], index: usize) -> Option<f64> {
    values.get(index).copied().flatten()
}
