use thiserror::Error;
use time::{Date, Month, PrimitiveDateTime, Time};

use super::stream::BOOT_EVENT_LEN;

/// Errors returned when a boot-event string is not a `YYYYMMDDHHMMSSmmm` stamp.
#[derive(Debug, Error)]
pub enum BootTimestampError {
    #[error("boot timestamp must be {BOOT_EVENT_LEN} digits, got {len} characters")]
    InvalidLength { len: usize },
    #[error("boot timestamp contains non-digit character `{character}`")]
    NonDigit { character: char },
    #[error("boot timestamp is not a valid calendar date-time")]
    OutOfRange(#[from] time::error::ComponentRange),
}

/// Interprets the boot-event text as a device-local calendar timestamp.
///
/// The decoded metric keeps the literal string; this is an optional view over it.
///
/// # Errors
///
/// Returns an error when the text is not exactly seventeen digits or does not
/// name a real date and time.
///
/// ```
/// use fbglink::parse_boot_timestamp;
///
/// let stamp = parse_boot_timestamp("20240115103045123")?;
/// assert_eq!(2024, stamp.year());
/// assert_eq!(45, stamp.second());
/// assert_eq!(123, stamp.millisecond());
/// # Ok::<(), fbglink::BootTimestampError>(())
/// ```
pub fn parse_boot_timestamp(text: &str) -> Result<PrimitiveDateTime, BootTimestampError> {
    let len = text.chars().count();
    if len != BOOT_EVENT_LEN {
        return Err(BootTimestampError::InvalidLength { len });
    }
    if let Some(character) = text.chars().find(|c| !c.is_ascii_digit()) {
        return Err(BootTimestampError::NonDigit { character });
    }

    let year = digits(text, 0..4);
    let month = Month::try_from(digits(text, 4..6) as u8)?;
    let day = digits(text, 6..8) as u8;
    let hour = digits(text, 8..10) as u8;
    let minute = digits(text, 10..12) as u8;
    let second = digits(text, 12..14) as u8;
    let millisecond = digits(text, 14..17) as u16;

    let date = Date::from_calendar_date(year as i32, month, day)?;
    let time = Time::from_hms_milli(hour, minute, second, millisecond)?;
    Ok(PrimitiveDateTime::new(date, time))
}

// Callers have already checked that `text` is ASCII digits only.
fn digits(text: &str, range: std::ops::Range<usize>) -> u32 {
    text.as_bytes()[range]
        .iter()
        .fold(0, |acc, byte| acc * 10 + u32::from(byte - b'0'))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[test]
    fn parses_well_formed_stamp() -> anyhow::Result<()> {
        let stamp = parse_boot_timestamp("20231231235959999")?;
        assert_eq!(Month::December, stamp.month());
        assert_eq!(31, stamp.day());
        assert_eq!(23, stamp.hour());
        assert_eq!(999, stamp.millisecond());
        Ok(())
    }

    #[rstest]
    #[case("2024011510304512")]
    #[case("")]
    fn rejects_wrong_length(#[case] text: &str) {
        assert_matches!(
            parse_boot_timestamp(text),
            Err(BootTimestampError::InvalidLength { .. })
        );
    }

    #[test]
    fn rejects_non_digits() {
        assert_matches!(
            parse_boot_timestamp("2024-1-15T1030451"),
            Err(BootTimestampError::NonDigit { character: '-' })
        );
    }

    #[rstest]
    #[case("20241315103045123")]
    #[case("20240230103045123")]
    #[case("20240115253045123")]
    fn rejects_impossible_calendar_values(#[case] text: &str) {
        assert_matches!(
            parse_boot_timestamp(text),
            Err(BootTimestampError::OutOfRange(_))
        );
    }
}
