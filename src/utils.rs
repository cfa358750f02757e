use crate::error::CliConfigError;

/// Formats bytes as uppercase hexadecimal pairs separated by spaces.
pub(crate) fn format_hex(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return "<empty>".to_string();
    }

    bytes
        .iter()
        .map(|byte| hex::encode_upper([*byte]))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parses a hex payload, ignoring whitespace, `:` separators and a `0x` prefix.
pub(crate) fn parse_hex_payload(value: &str) -> Result<Vec<u8>, CliConfigError> {
    let trimmed = value.trim();
    let digits: String = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed)
        .chars()
        .filter(|character| !character.is_whitespace() && *character != ':')
        .collect();
    hex::decode(&digits).map_err(|source| CliConfigError::InvalidHexPayload {
        value: value.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[test]
    fn format_hex_handles_empty_payload() {
        assert_eq!("<empty>", format_hex(&[]));
    }

    #[test]
    fn format_hex_formats_uppercase_pairs() {
        assert_eq!("81 28 0B B8", format_hex(&[0x81, 0x28, 0x0B, 0xB8]));
    }

    #[rstest]
    #[case("81280bb8")]
    #[case("0x81280BB8")]
    #[case("81 28 0b b8")]
    #[case("81:28:0B:B8")]
    fn parse_hex_payload_accepts_common_spellings(#[case] input: &str) {
        assert_eq!(
            vec![0x81, 0x28, 0x0B, 0xB8],
            parse_hex_payload(input).expect("payload should parse")
        );
    }

    #[rstest]
    #[case("812")]
    #[case("zz")]
    fn parse_hex_payload_rejects_malformed_input(#[case] input: &str) {
        assert_matches!(
            parse_hex_payload(input),
            Err(CliConfigError::InvalidHexPayload { .. })
        );
    }
}
