use std::collections::BTreeMap;

use serde::Serialize;
use time::OffsetDateTime;
use tracing::{debug, instrument, trace, warn};

use super::header::{FrameHeader, HeaderDecodeError, PositionContext};
use super::registry::metric_descriptor;
use super::stream::{MetricStream, StreamError};
use super::transform::{MetricValue, transform_value};
use crate::protocol::RawFrame;

const QUALITY_VALID: u8 = 1;
const QUALITY_INVALID: u8 = 0;

/// Outcome of decoding one uplink frame.
///
/// Decoding never fails: problems are reported as `warnings` (frame still
/// usable) or `errors` (frame partially or wholly unusable).
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct DecodeResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    position: Option<PositionContext>,
    metrics: BTreeMap<String, MetricValue>,
    warnings: Vec<String>,
    errors: Vec<String>,
    quality: u8,
}

impl DecodeResult {
    fn empty() -> Self {
        Self {
            position: None,
            metrics: BTreeMap::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
            quality: QUALITY_INVALID,
        }
    }

    /// Position decoded from the header, when the header was valid.
    #[must_use]
    pub fn position(&self) -> Option<PositionContext> {
        self.position
    }

    /// Metrics keyed by platform name.
    #[must_use]
    pub fn metrics(&self) -> &BTreeMap<String, MetricValue> {
        &self.metrics
    }

    /// Looks up one metric by its platform name.
    #[must_use]
    pub fn metric(&self, name: &str) -> Option<&MetricValue> {
        self.metrics.get(name)
    }

    /// Non-fatal anomalies, in the order they were met.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Errors, in the order they were met.
    #[must_use]
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Quality code: `1` when the whole frame was walked, `0` otherwise.
    #[must_use]
    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Returns whether the frame was walked without a structural error.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.quality == QUALITY_VALID
    }

    /// Wraps the result in the payload-formatter envelope, stamped with the
    /// given decode time.
    #[must_use]
    pub fn to_envelope(&self, decoded_at: OffsetDateTime) -> FormatterEnvelope {
        let data = if !self.is_valid() && self.metrics.is_empty() {
            EnvelopeData::default()
        } else {
            EnvelopeData {
                metrics: Some(self.metrics.clone()),
                quality: Some(self.quality),
                timestamp: Some(decoded_at.unix_timestamp()),
            }
        };

        FormatterEnvelope {
            data,
            warnings: self.warnings.clone(),
            errors: self.errors.clone(),
        }
    }
}

/// Payload-formatter response shape expected by the network server.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct FormatterEnvelope {
    data: EnvelopeData,
    warnings: Vec<String>,
    errors: Vec<String>,
}

impl FormatterEnvelope {
    /// Returns the data section.
    #[must_use]
    pub fn data(&self) -> &EnvelopeData {
        &self.data
    }
}

/// `data` member of the formatter envelope; empty when nothing was decoded.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize)]
pub struct EnvelopeData {
    #[serde(skip_serializing_if = "Option::is_none")]
    metrics: Option<BTreeMap<String, MetricValue>>,
    #[serde(rename = "QC", skip_serializing_if = "Option::is_none")]
    quality: Option<u8>,
    #[serde(rename = "TIMESTAMP", skip_serializing_if = "Option::is_none")]
    timestamp: Option<i64>,
}

impl EnvelopeData {
    /// Returns whether the data section carries no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.metrics.is_none() && self.quality.is_none() && self.timestamp.is_none()
    }
}

/// Stateless decoder for telemetry uplink frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct UplinkDecoder;

impl UplinkDecoder {
    /// Decodes one received frame.
    ///
    /// ```
    /// use fbglink::{RawFrame, UplinkDecoder};
    ///
    /// let result = UplinkDecoder::decode(&RawFrame::uplink(vec![0x80, 0x04, 120]));
    /// assert_eq!(Some(120), result.metric("SENS_FBG_TC_F4A_L1.avg").and_then(|v| v.as_number()));
    /// assert_eq!(1, result.quality());
    /// ```
    #[instrument(skip(frame), level = "debug", fields(port = frame.port(), len = frame.payload().len()))]
    #[must_use]
    pub fn decode(frame: &RawFrame) -> DecodeResult {
        Self::decode_bytes(frame.payload())
    }

    /// Decodes a bare payload.
    #[must_use]
    pub fn decode_bytes(bytes: &[u8]) -> DecodeResult {
        let mut result = DecodeResult::empty();

        let Some((&header_byte, records)) = bytes.split_first() else {
            result.warnings.push("empty payload".to_string());
            return result;
        };

        match walk(header_byte, records, &mut result) {
            Ok(()) => result.quality = QUALITY_VALID,
            Err(error) => {
                warn!(%error, "uplink frame is structurally invalid");
                result.metrics.clear();
                result.warnings.clear();
                result.errors = vec![format!("decode error: {error}")];
                result.quality = QUALITY_INVALID;
            }
        }

        debug!(
            metrics = result.metrics.len(),
            warnings = result.warnings.len(),
            errors = result.errors.len(),
            quality = result.quality,
            "decoded uplink frame"
        );
        result
    }
}

fn walk(
    header_byte: u8,
    records: &[u8],
    result: &mut DecodeResult,
) -> Result<(), HeaderDecodeError> {
    let header = FrameHeader::decode(header_byte)?;
    if !header.start_flag() {
        result.warnings.push("invalid start bit".to_string());
    }
    let position = header.position();
    result.position = Some(position);

    for record in MetricStream::new(records) {
        let record = match record {
            Ok(record) => record,
            Err(StreamError::InsufficientData {
                metric_id,
                needed,
                remaining,
            }) => {
                trace!(metric_id, needed, remaining, "record truncated");
                result
                    .errors
                    .push(format!("insufficient data for metric id {metric_id}"));
                break;
            }
        };

        let Some(descriptor) = metric_descriptor(record.id()) else {
            result
                .warnings
                .push(format!("unknown metric id {}", record.id()));
            continue;
        };

        let key = descriptor.template().resolve(position).to_string();
        let value = transform_value(descriptor.id(), record.into_value());
        trace!(%key, %value, "resolved metric");
        result.metrics.insert(key, value);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn number(result: &DecodeResult, name: &str) -> Option<i64> {
        result.metric(name).and_then(MetricValue::as_number)
    }

    #[test]
    fn empty_payload_warns_without_errors() {
        let result = UplinkDecoder::decode_bytes(&[]);
        assert!(result.metrics().is_empty());
        assert_eq!(vec!["empty payload".to_string()], result.warnings());
        assert!(result.errors().is_empty());
        assert_eq!(0, result.quality());
    }

    #[rstest]
    #[case(&[0x80, 0x04, 120], "SENS_FBG_TC_F4A_L1.avg", 120)]
    #[case(&[0x80, 0x10, 75], "SENS_FBG_Temp_F4A_L1.avg", 25)]
    #[case(&[0x80, 0x05, 0x01, 0x90], "SENS_FBG_TC_F4A_L1.avg", 400)]
    #[case(&[0xC0, 0x80, 0x01], "ALG_FBG_Alm_Tiro_Bassa_F12A_L1.calc", 1)]
    #[case(&[0xAA, 0x1C, 85], "ALG_FBG_Liv_Batteria.calc", 85)]
    fn decodes_single_metric(#[case] bytes: &[u8], #[case] name: &str, #[case] expected: i64) {
        let result = UplinkDecoder::decode_bytes(bytes);
        assert_eq!(Some(expected), number(&result, name));
        assert!(result.errors().is_empty());
        assert_eq!(1, result.quality());
    }

    #[test]
    fn truncated_record_keeps_earlier_metrics() {
        let result = UplinkDecoder::decode_bytes(&[0x80, 0x04, 120, 0x05]);
        assert_eq!(Some(120), number(&result, "SENS_FBG_TC_F4A_L1.avg"));
        assert_eq!(
            vec!["insufficient data for metric id 1".to_string()],
            result.errors()
        );
        assert_eq!(1, result.quality());
    }

    #[test]
    fn unknown_ids_warn_and_are_skipped() {
        let result = UplinkDecoder::decode_bytes(&[0x80, 0x2C, 0x07, 0x04, 50]);
        assert_eq!(vec!["unknown metric id 11".to_string()], result.warnings());
        assert_eq!(1, result.metrics().len());
        assert_eq!(Some(50), number(&result, "SENS_FBG_TC_F4A_L1.avg"));
    }

    #[test]
    fn cleared_start_flag_warns_but_decodes() {
        let result = UplinkDecoder::decode_bytes(&[0x00, 0x04, 9]);
        assert_eq!(vec!["invalid start bit".to_string()], result.warnings());
        assert_eq!(Some(9), number(&result, "SENS_FBG_TC_F4A_L1.avg"));
    }

    #[test]
    fn invalid_phase_is_structural() {
        let result = UplinkDecoder::decode_bytes(&[0xE0, 0x04, 9]);
        assert_eq!(1, result.errors().len());
        assert!(result.errors()[0].starts_with("decode error: "));
        assert!(result.metrics().is_empty());
        assert_eq!(None, result.position());
        assert_eq!(0, result.quality());
    }

    #[test]
    fn repeated_ids_keep_last_value() {
        let result = UplinkDecoder::decode_bytes(&[0x80, 0x04, 1, 0x04, 2]);
        assert_eq!(Some(2), number(&result, "SENS_FBG_TC_F4A_L1.avg"));
    }

    #[test]
    fn envelope_wraps_metrics_with_quality_and_timestamp() -> anyhow::Result<()> {
        let decoded_at = OffsetDateTime::from_unix_timestamp(1_700_000_000)?;
        let envelope = UplinkDecoder::decode_bytes(&[0x80, 0x10, 75]).to_envelope(decoded_at);
        insta::assert_snapshot!(serde_json::to_string(&envelope)?, @r#"{"data":{"metrics":{"SENS_FBG_Temp_F4A_L1.avg":25},"QC":1,"TIMESTAMP":1700000000},"warnings":[],"errors":[]}"#);
        Ok(())
    }

    #[test]
    fn envelope_for_empty_payload_has_empty_data() -> anyhow::Result<()> {
        let envelope = UplinkDecoder::decode_bytes(&[]).to_envelope(OffsetDateTime::UNIX_EPOCH);
        assert!(envelope.data().is_empty());
        insta::assert_snapshot!(serde_json::to_string(&envelope)?, @r#"{"data":{},"warnings":["empty payload"],"errors":[]}"#);
        Ok(())
    }
}
