use derive_more::{Display, From};
use serde::Serialize;

use super::registry::MetricId;
use super::stream::RawValue;

/// Offset subtracted from raw temperature readings, in °C.
pub const TEMPERATURE_OFFSET: i64 = 50;

/// Calibrated metric value as published to the platform.
#[derive(Debug, Clone, Eq, PartialEq, Display, From, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(i64),
    Text(String),
}

impl MetricValue {
    /// Returns the numeric value, if this is a number.
    #[must_use]
    pub fn as_number(&self) -> Option<i64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Text(_) => None,
        }
    }

    /// Returns the text value, if this is a string.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Number(_) => None,
            Self::Text(text) => Some(text),
        }
    }
}

/// Applies the per-id calibration to a raw record value.
///
/// ```
/// use fbglink::{MetricId, MetricValue, RawValue, transform_value};
///
/// let temperature = transform_value(MetricId::TemperatureAvg, RawValue::Unsigned(75));
/// assert_eq!(MetricValue::Number(25), temperature);
///
/// let tension = transform_value(MetricId::TensionAvg, RawValue::Unsigned(120));
/// assert_eq!(MetricValue::Number(120), tension);
/// ```
#[must_use]
pub fn transform_value(id: MetricId, raw: RawValue) -> MetricValue {
    match raw {
        RawValue::Ascii(text) => MetricValue::Text(text),
        RawValue::Unsigned(value) => {
            let value = i64::from(value);
            match id {
                MetricId::TemperatureAvg | MetricId::TemperatureMax | MetricId::TemperatureMin => {
                    MetricValue::Number(value - TEMPERATURE_OFFSET)
                }
                _ => MetricValue::Number(value),
            }
        }
    }
}
