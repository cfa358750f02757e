use thiserror::Error;

/// Metric id that carries the device boot timestamp as literal ASCII.
pub const BOOT_EVENT_METRIC_ID: u8 = 40;

/// Maximum number of bytes read for the boot-event record.
pub const BOOT_EVENT_LEN: usize = 17;

const LENGTH_CODE_MASK: u8 = 0b11;
const ID_SHIFT: u8 = 2;

/// Errors raised while walking the record stream.
#[derive(Debug, Error, Clone, Copy, Eq, PartialEq)]
pub enum StreamError {
    /// A record declared more value bytes than the frame still holds.
    #[error("insufficient data for metric id {metric_id}: need {needed} bytes, {remaining} left")]
    InsufficientData {
        metric_id: u8,
        needed: usize,
        remaining: usize,
    },
}

/// Raw, untransformed record value.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum RawValue {
    /// Big-endian unsigned integer of 1 to 4 bytes.
    Unsigned(u32),
    /// Literal characters of a boot-event record.
    Ascii(String),
}

/// One opcode + value record.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MetricRecord {
    id: u8,
    length_code: u8,
    value: RawValue,
}

impl MetricRecord {
    /// Returns the 6-bit metric id.
    #[must_use]
    pub fn id(&self) -> u8 {
        self.id
    }

    /// Returns the declared 2-bit length code.
    #[must_use]
    pub fn length_code(&self) -> u8 {
        self.length_code
    }

    /// Returns the raw value.
    #[must_use]
    pub fn value(&self) -> &RawValue {
        &self.value
    }

    /// Consumes the record, returning its raw value.
    #[must_use]
    pub fn into_value(self) -> RawValue {
        self.value
    }
}

/// Returns the value width in bytes for a 2-bit length code.
///
/// ```
/// use fbglink::value_len_for_code;
///
/// assert_eq!(1, value_len_for_code(0));
/// assert_eq!(4, value_len_for_code(3));
/// ```
#[must_use]
pub const fn value_len_for_code(length_code: u8) -> usize {
    (length_code & LENGTH_CODE_MASK) as usize + 1
}

/// Splits an opcode byte into metric id and length code.
#[must_use]
pub const fn split_opcode(opcode: u8) -> (u8, u8) {
    (opcode >> ID_SHIFT, opcode & LENGTH_CODE_MASK)
}

/// Iterator over the records that follow the header byte.
///
/// Yields at most one error, after which the stream is exhausted.
#[derive(Debug, Clone)]
pub struct MetricStream<'a> {
    bytes: &'a [u8],
    offset: usize,
    halted: bool,
}

impl<'a> MetricStream<'a> {
    /// Creates a stream over the bytes following the header.
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            offset: 0,
            halted: false,
        }
    }

    /// Returns how many bytes have been consumed so far.
    #[must_use]
    pub fn consumed(&self) -> usize {
        self.offset
    }

    fn remaining(&self) -> &'a [u8] {
        &self.bytes[self.offset..]
    }

    fn take(&mut self, len: usize) -> &'a [u8] {
        let taken = &self.bytes[self.offset..self.offset + len];
        self.offset += len;
        taken
    }
}

impl Iterator for MetricStream<'_> {
    type Item = Result<MetricRecord, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.halted || self.remaining().is_empty() {
            return None;
        }

        let (id, length_code) = split_opcode(self.take(1)[0]);

        if id == BOOT_EVENT_METRIC_ID {
            let len = usize::min(BOOT_EVENT_LEN, self.remaining().len());
            let text = self.take(len).iter().copied().map(char::from).collect();
            return Some(Ok(MetricRecord {
                id,
                length_code,
                value: RawValue::Ascii(text),
            }));
        }

        let needed = value_len_for_code(length_code);
        let remaining = self.remaining().len();
        if needed > remaining {
            self.halted = true;
            return Some(Err(StreamError::InsufficientData {
                metric_id: id,
                needed,
                remaining,
            }));
        }

        let value = self
            .take(needed)
            .iter()
            .fold(0u32, |acc, byte| (acc << 8) | u32::from(*byte));
        Some(Ok(MetricRecord {
            id,
            length_code,
            value: RawValue::Unsigned(value),
        }))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn unsigned(record: &MetricRecord) -> u32 {
        match record.value() {
            RawValue::Unsigned(value) => *value,
            RawValue::Ascii(text) => panic!("expected unsigned value, got `{text}`"),
        }
    }

    #[rstest]
    #[case(&[0x04, 0x78], 1, 120)]
    #[case(&[0x05, 0x01, 0x90], 1, 400)]
    #[case(&[0x1E, 0x01, 0x02, 0x03], 7, 0x0001_0203)]
    #[case(&[0x1F, 0xFF, 0xFF, 0xFF, 0xFF], 7, u32::MAX)]
    fn decodes_big_endian_values(#[case] bytes: &[u8], #[case] id: u8, #[case] expected: u32) {
        let records: Vec<_> = MetricStream::new(bytes)
            .collect::<Result<_, _>>()
            .expect("well-formed stream should decode");
        assert_eq!(1, records.len());
        assert_eq!(id, records[0].id());
        assert_eq!(expected, unsigned(&records[0]));
    }

    #[test]
    fn boot_event_ignores_length_code() {
        let mut bytes = vec![0xA3];
        bytes.extend_from_slice(b"20240115103045123");
        bytes.extend_from_slice(&[0x04, 0x10]);

        let records: Vec<_> = MetricStream::new(&bytes)
            .collect::<Result<_, _>>()
            .expect("boot record followed by tension should decode");

        assert_eq!(2, records.len());
        assert_eq!(3, records[0].length_code());
        assert_eq!(
            &RawValue::Ascii("20240115103045123".to_string()),
            records[0].value()
        );
        assert_eq!(16, unsigned(&records[1]));
    }

    #[test]
    fn boot_event_takes_what_is_left() {
        let records: Vec<_> = MetricStream::new(&[0xA0, b'2', b'0'])
            .collect::<Result<_, _>>()
            .expect("short boot record is not an error");
        assert_eq!(&RawValue::Ascii("20".to_string()), records[0].value());
    }

    #[test]
    fn insufficient_data_halts_after_one_error() {
        let mut stream = MetricStream::new(&[0x04, 0x10, 0x05, 0x01]);

        assert_matches!(stream.next(), Some(Ok(record)) if record.id() == 1);
        assert_matches!(
            stream.next(),
            Some(Err(StreamError::InsufficientData {
                metric_id: 1,
                needed: 2,
                remaining: 1,
            }))
        );
        assert_matches!(stream.next(), None);
    }

    #[test]
    fn consumed_tracks_offset() {
        let mut stream = MetricStream::new(&[0x04, 0x10, 0x08, 0x01]);
        let _ = stream.next();
        assert_eq!(2, stream.consumed());
    }
}
