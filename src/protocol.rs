use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

/// LoRaWAN application port carrying periodic telemetry and alarms.
pub const UPLINK_PORT: u8 = 1;

/// LoRaWAN application port reserved for the firmware-update agent.
pub const UPDATE_PORT: u8 = 200;

/// Downlink command codes understood by the sensor's update agent.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, EnumIter, Display)]
pub enum CommandCode {
    /// Announces a new image: chunk count and sha256 digest.
    #[strum(to_string = "start")]
    Start,
    /// Carries one indexed slice of the image.
    #[strum(to_string = "chunk")]
    Chunk,
    /// Asks the device to report its update progress.
    #[strum(to_string = "status")]
    Status,
    /// Tells the device to discard the update in progress.
    #[strum(to_string = "abort")]
    Abort,
}

impl CommandCode {
    /// Returns the leading command byte.
    ///
    /// ```
    /// use fbglink::CommandCode;
    ///
    /// assert_eq!(0x01, CommandCode::Start.as_byte());
    /// assert_eq!(0x04, CommandCode::Abort.as_byte());
    /// ```
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Start => 0x01,
            Self::Chunk => 0x02,
            Self::Status => 0x03,
            Self::Abort => 0x04,
        }
    }

    /// Resolves a command byte, if it is known.
    #[must_use]
    pub fn from_byte(value: u8) -> Option<Self> {
        Self::iter().find(|code| code.as_byte() == value)
    }

    /// Returns whether the network server should deliver this command as a
    /// confirmed, highest-priority downlink.
    #[must_use]
    pub const fn is_confirmed(self) -> bool {
        !matches!(self, Self::Chunk)
    }
}

/// One self-contained frame exchanged with the device on an application port.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RawFrame {
    port: u8,
    payload: Vec<u8>,
}

impl RawFrame {
    /// Creates a frame from a port and its payload bytes.
    ///
    /// ```
    /// use fbglink::RawFrame;
    ///
    /// let frame = RawFrame::new(1, vec![0x80, 0x04, 0x78]);
    /// assert_eq!(1, frame.port());
    /// assert_eq!(3, frame.payload().len());
    /// ```
    #[must_use]
    pub fn new(port: u8, payload: Vec<u8>) -> Self {
        Self { port, payload }
    }

    /// Creates an uplink frame on the telemetry port.
    #[must_use]
    pub fn uplink(payload: Vec<u8>) -> Self {
        Self::new(UPLINK_PORT, payload)
    }

    /// Returns the application port.
    #[must_use]
    pub fn port(&self) -> u8 {
        self.port
    }

    /// Returns the payload bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Consumes the frame, returning its payload.
    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0x01, Some(CommandCode::Start))]
    #[case(0x02, Some(CommandCode::Chunk))]
    #[case(0x03, Some(CommandCode::Status))]
    #[case(0x04, Some(CommandCode::Abort))]
    #[case(0x00, None)]
    #[case(0x05, None)]
    fn from_byte_resolves_known_codes(#[case] value: u8, #[case] expected: Option<CommandCode>) {
        assert_eq!(expected, CommandCode::from_byte(value));
    }

    #[test]
    fn only_chunk_commands_are_unconfirmed() {
        let unconfirmed: Vec<CommandCode> = CommandCode::iter()
            .filter(|code| !code.is_confirmed())
            .collect();
        assert_eq!(vec![CommandCode::Chunk], unconfirmed);
    }
}
