use super::header::{FrameHeader, PositionContext};
use super::registry::MetricId;
use super::stream::{BOOT_EVENT_LEN, BOOT_EVENT_METRIC_ID};
use crate::protocol::RawFrame;

/// Assembles uplink frames the way the sensor firmware emits them.
///
/// The decoder is its inverse.
///
/// ```
/// use fbglink::{Line, MetricId, Phase, PositionContext, Side, UplinkFrameBuilder};
///
/// let frame = UplinkFrameBuilder::new(PositionContext::new(Phase::Eight, Side::A, Line::One))
///     .metric(MetricId::TensionAvg, 150)
///     .metric(MetricId::TemperatureAvg, 75)
///     .build();
/// assert_eq!(&[0xA0, 0x04, 150, 0x10, 75], frame.payload());
/// ```
#[derive(Debug, Clone)]
pub struct UplinkFrameBuilder {
    header: FrameHeader,
    records: Vec<u8>,
}

impl UplinkFrameBuilder {
    /// Starts a frame for one sensor position.
    #[must_use]
    pub fn new(position: PositionContext) -> Self {
        Self {
            header: FrameHeader::new(position),
            records: Vec::new(),
        }
    }

    /// Overrides the header start flag.
    #[must_use]
    pub fn with_start_flag(mut self, start_flag: bool) -> Self {
        self.header = self.header.with_start_flag(start_flag);
        self
    }

    /// Appends a numeric record using the narrowest length code that fits.
    #[must_use]
    pub fn metric(self, id: MetricId, value: u32) -> Self {
        let width = minimal_width(value);
        let bytes = value.to_be_bytes();
        self.raw_record(id.code(), (width - 1) as u8, &bytes[4 - width..])
    }

    /// Appends the boot-event record carrying `text` as Latin-1 bytes.
    ///
    /// Characters outside Latin-1 are written as `?`. Text past the
    /// seventeen-character field is dropped.
    #[must_use]
    pub fn boot_event(self, text: &str) -> Self {
        let bytes: Vec<u8> = text
            .chars()
            .take(BOOT_EVENT_LEN)
            .map(|c| u8::try_from(c).unwrap_or(b'?'))
            .collect();
        self.raw_record(BOOT_EVENT_METRIC_ID, 0, &bytes)
    }

    /// Appends an arbitrary opcode and value bytes.
    ///
    /// The value bytes are not checked against the length code.
    ///
    /// # Panics
    ///
    /// In debug builds, panics when `id` does not fit the six-bit id field.
    #[must_use]
    pub fn raw_record(mut self, id: u8, length_code: u8, value: &[u8]) -> Self {
        debug_assert!(id < 64, "metric id {id} does not fit in six bits");
        self.records.push((id << 2) | (length_code & 0b11));
        self.records.extend_from_slice(value);
        self
    }

    /// Finishes the frame on the telemetry port.
    #[must_use]
    pub fn build(self) -> RawFrame {
        let mut payload = Vec::with_capacity(self.records.len() + 1);
        payload.push(self.header.encode());
        payload.extend(self.records);
        RawFrame::uplink(payload)
    }
}

fn minimal_width(value: u32) -> usize {
    let significant_bits = u32::BITS - value.leading_zeros();
    (significant_bits.div_ceil(8) as usize).max(1)
}
