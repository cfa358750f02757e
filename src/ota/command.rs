use thiserror::Error;

use crate::downlink::DownlinkFrame;
use crate::protocol::{CommandCode, UPDATE_PORT};

/// Length of a sha256 digest carried by START.
pub const DIGEST_LEN: usize = 32;

/// Encoded START frame length: code, u16 chunk count, digest.
pub const START_FRAME_LEN: usize = 1 + 2 + DIGEST_LEN;

const CHUNK_HEADER_LEN: usize = 1 + 2;

/// Errors returned when a downlink payload is not a well-formed command.
#[derive(Debug, Error, Clone, Copy, Eq, PartialEq)]
pub enum CommandDecodeError {
    #[error("downlink payload is empty")]
    Empty,
    #[error("unknown downlink command code 0x{code:02X}")]
    UnknownCode { code: u8 },
    #[error("{command} frame must be {expected} bytes, got {actual}")]
    InvalidLength {
        command: CommandCode,
        expected: usize,
        actual: usize,
    },
    #[error("{command} frame needs at least {minimum} bytes, got {actual}")]
    Truncated {
        command: CommandCode,
        minimum: usize,
        actual: usize,
    },
}

/// Commands sent to the sensor's update agent on the update port.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum DownlinkCommand<'a> {
    /// Announces an image of `chunk_count` chunks with the given digest.
    Start {
        chunk_count: u16,
        digest: [u8; DIGEST_LEN],
    },
    /// One slice of the image.
    Chunk { index: u16, bytes: &'a [u8] },
    /// Progress query.
    Status,
    /// Cancels the update on the device.
    Abort,
}

impl<'a> DownlinkCommand<'a> {
    /// Returns the command code.
    #[must_use]
    pub const fn code(&self) -> CommandCode {
        match self {
            Self::Start { .. } => CommandCode::Start,
            Self::Chunk { .. } => CommandCode::Chunk,
            Self::Status => CommandCode::Status,
            Self::Abort => CommandCode::Abort,
        }
    }

    /// Encodes the command payload.
    ///
    /// ```
    /// use fbglink::DownlinkCommand;
    ///
    /// let start = DownlinkCommand::Start { chunk_count: 0x0102, digest: [0xAB; 32] }.encode();
    /// assert_eq!(35, start.len());
    /// assert_eq!(&[0x01, 0x01, 0x02], &start[..3]);
    ///
    /// let chunk = DownlinkCommand::Chunk { index: 7, bytes: b"hi" }.encode();
    /// assert_eq!(vec![0x02, 0x00, 0x07, b'h', b'i'], chunk);
    /// ```
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let code = self.code().as_byte();
        match self {
            Self::Start {
                chunk_count,
                digest,
            } => {
                let mut payload = Vec::with_capacity(START_FRAME_LEN);
                payload.push(code);
                payload.extend_from_slice(&chunk_count.to_be_bytes());
                payload.extend_from_slice(digest);
                payload
            }
            Self::Chunk { index, bytes } => {
                let mut payload = Vec::with_capacity(CHUNK_HEADER_LEN + bytes.len());
                payload.push(code);
                payload.extend_from_slice(&index.to_be_bytes());
                payload.extend_from_slice(bytes);
                payload
            }
            Self::Status | Self::Abort => vec![code],
        }
    }

    /// Wraps the encoded command in a frame for the update port.
    ///
    /// START, STATUS and ABORT are confirmed; CHUNK is not.
    #[must_use]
    pub fn to_frame(&self) -> DownlinkFrame {
        DownlinkFrame::new(UPDATE_PORT, self.encode(), self.code().is_confirmed())
    }

    /// Parses a command payload.
    ///
    /// # Errors
    ///
    /// Returns an error when the payload is empty, names an unknown command, or
    /// has the wrong length for its command.
    ///
    /// ```
    /// use fbglink::DownlinkCommand;
    ///
    /// let command = DownlinkCommand::decode(&[0x02, 0x00, 0x03, 0xAA])?;
    /// assert_eq!(DownlinkCommand::Chunk { index: 3, bytes: &[0xAA] }, command);
    /// # Ok::<(), fbglink::CommandDecodeError>(())
    /// ```
    pub fn decode(payload: &'a [u8]) -> Result<Self, CommandDecodeError> {
        let Some((&code, body)) = payload.split_first() else {
            return Err(CommandDecodeError::Empty);
        };
        let command =
            CommandCode::from_byte(code).ok_or(CommandDecodeError::UnknownCode { code })?;

        match command {
            CommandCode::Start => {
                let (count, digest) = body
                    .split_first_chunk::<2>()
                    .filter(|(_, digest)| digest.len() == DIGEST_LEN)
                    .ok_or(CommandDecodeError::InvalidLength {
                        command,
                        expected: START_FRAME_LEN,
                        actual: payload.len(),
                    })?;
                let mut digest_bytes = [0u8; DIGEST_LEN];
                digest_bytes.copy_from_slice(digest);
                Ok(Self::Start {
                    chunk_count: u16::from_be_bytes(*count),
                    digest: digest_bytes,
                })
            }
            CommandCode::Chunk => {
                let (index, bytes) = body
                    .split_first_chunk::<2>()
                    .filter(|(_, bytes)| !bytes.is_empty())
                    .ok_or(CommandDecodeError::Truncated {
                        command,
                        minimum: CHUNK_HEADER_LEN + 1,
                        actual: payload.len(),
                    })?;
                Ok(Self::Chunk {
                    index: u16::from_be_bytes(*index),
                    bytes,
                })
            }
            CommandCode::Status | CommandCode::Abort => {
                if !body.is_empty() {
                    return Err(CommandDecodeError::InvalidLength {
                        command,
                        expected: 1,
                        actual: payload.len(),
                    });
                }
                Ok(if command == CommandCode::Status {
                    Self::Status
                } else {
                    Self::Abort
                })
            }
        }
    }
}
