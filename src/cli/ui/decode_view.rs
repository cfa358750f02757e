use std::fmt::{self, Display, Formatter};

use crate::uplink::{DecodeResult, FixedMetric, MetricKey, parse_boot_timestamp};

use super::painter::Painter;
use super::table::Table;
use super::value::{HexBytes, NoneOr};

/// Renders one decoded uplink frame.
pub(crate) struct DecodeView<'a> {
    payload: &'a [u8],
    result: &'a DecodeResult,
    painter: &'a Painter,
}

impl<'a> DecodeView<'a> {
    pub(crate) fn new(payload: &'a [u8], result: &'a DecodeResult, painter: &'a Painter) -> Self {
        Self {
            payload,
            result,
            painter,
        }
    }
}

impl DecodeView<'_> {
    fn boot_time(&self) -> Option<String> {
        let key = MetricKey::Fixed(FixedMetric::StartUpDevice).to_string();
        let text = self.result.metric(&key)?.as_text()?;
        parse_boot_timestamp(text)
            .map(|stamp| stamp.to_string())
            .ok()
    }
}

impl Display for DecodeView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let quality = if self.result.is_valid() {
            self.painter.success(self.result.quality().to_string())
        } else {
            self.painter.warning(self.result.quality().to_string())
        };
        let mut rows = vec![
            ("payload", self.painter.value(HexBytes(self.payload).to_string())),
            (
                "position",
                self.painter
                    .value(NoneOr(self.result.position()).to_string()),
            ),
            ("quality", quality),
        ];
        if let Some(boot_time) = self.boot_time() {
            rows.push(("boot_time", self.painter.value(boot_time)));
        }
        let frame = Table::key_value(self.painter, rows);

        write!(f, "{}", self.painter.heading("Uplink frame:"))?;
        write!(f, "\n{frame}")?;

        if !self.result.metrics().is_empty() {
            let rows = self
                .result
                .metrics()
                .iter()
                .map(|(name, value)| vec![name.clone(), self.painter.value(value.to_string())])
                .collect();
            write!(f, "\n\n{}", self.painter.heading("Metrics:"))?;
            write!(f, "\n{}", Table::grid(["metric", "value"], rows))?;
        }
        for warning in self.result.warnings() {
            write!(f, "\n{} {warning}", self.painter.warning("warning:"))?;
        }
        for error in self.result.errors() {
            write!(f, "\n{} {error}", self.painter.warning("error:"))?;
        }
        Ok(())
    }
}
