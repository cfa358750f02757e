use serde_with::SerializeDisplay;
use strum_macros::{Display, EnumIter};
use thiserror::Error;

const START_FLAG_MASK: u8 = 0b1000_0000;
const PHASE_SHIFT: u8 = 5;
const SIDE_SHIFT: u8 = 3;
const LINE_SHIFT: u8 = 1;
const TWO_BIT_MASK: u8 = 0b11;

/// Errors returned when the header byte cannot name a device position.
#[derive(Debug, Error, Clone, Copy, Eq, PartialEq)]
pub enum HeaderDecodeError {
    #[error("invalid phase code {code}; supported codes are 0, 1, 2")]
    InvalidPhaseCode { code: u8 },
    #[error("invalid side code {code}; supported codes are 0, 1")]
    InvalidSideCode { code: u8 },
    #[error("invalid line code {code}; supported codes are 0, 1")]
    InvalidLineCode { code: u8 },
}

/// Power-line phase the sensor is mounted on.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, EnumIter, Display)]
pub enum Phase {
    #[strum(to_string = "4")]
    Four,
    #[strum(to_string = "8")]
    Eight,
    #[strum(to_string = "12")]
    Twelve,
}

impl Phase {
    /// Returns the phase number used in metric names.
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Self::Four => 4,
            Self::Eight => 8,
            Self::Twelve => 12,
        }
    }

    const fn code(self) -> u8 {
        match self {
            Self::Four => 0,
            Self::Eight => 1,
            Self::Twelve => 2,
        }
    }
}

impl TryFrom<u8> for Phase {
    type Error = HeaderDecodeError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Four),
            1 => Ok(Self::Eight),
            2 => Ok(Self::Twelve),
            _ => Err(HeaderDecodeError::InvalidPhaseCode { code }),
        }
    }
}

/// Tower side of the monitored conductor.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, EnumIter, Display)]
pub enum Side {
    #[strum(to_string = "A")]
    A,
    #[strum(to_string = "B")]
    B,
}

impl Side {
    const fn code(self) -> u8 {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }
}

impl TryFrom<u8> for Side {
    type Error = HeaderDecodeError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::A),
            1 => Ok(Self::B),
            _ => Err(HeaderDecodeError::InvalidSideCode { code }),
        }
    }
}

/// Circuit line carrying the conductor.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, EnumIter, Display)]
pub enum Line {
    #[strum(to_string = "1")]
    One,
    #[strum(to_string = "2")]
    Two,
}

impl Line {
    /// Returns the line number used in metric names.
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }

    const fn code(self) -> u8 {
        match self {
            Self::One => 0,
            Self::Two => 1,
        }
    }
}

impl TryFrom<u8> for Line {
    type Error = HeaderDecodeError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::One),
            1 => Ok(Self::Two),
            _ => Err(HeaderDecodeError::InvalidLineCode { code }),
        }
    }
}

/// Mounting position of the sensor, rendered as `F<phase><side>_L<line>`.
#[derive(
    Debug, Clone, Copy, Eq, PartialEq, Hash, derive_more::Display, SerializeDisplay,
)]
#[display("F{phase}{side}_L{line}")]
pub struct PositionContext {
    phase: Phase,
    side: Side,
    line: Line,
}

impl PositionContext {
    /// Creates a position.
    ///
    /// ```
    /// use fbglink::{Line, Phase, PositionContext, Side};
    ///
    /// let position = PositionContext::new(Phase::Eight, Side::B, Line::Two);
    /// assert_eq!("F8B_L2", position.to_string());
    /// ```
    #[must_use]
    pub const fn new(phase: Phase, side: Side, line: Line) -> Self {
        Self { phase, side, line }
    }

    /// Returns the phase.
    #[must_use]
    pub const fn phase(self) -> Phase {
        self.phase
    }

    /// Returns the side.
    #[must_use]
    pub const fn side(self) -> Side {
        self.side
    }

    /// Returns the line.
    #[must_use]
    pub const fn line(self) -> Line {
        self.line
    }
}

/// Decoded first byte of an uplink frame.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct FrameHeader {
    start_flag: bool,
    position: PositionContext,
}

impl FrameHeader {
    /// Creates a header with the start flag set.
    #[must_use]
    pub const fn new(position: PositionContext) -> Self {
        Self {
            start_flag: true,
            position,
        }
    }

    /// Overrides the start flag.
    #[must_use]
    pub const fn with_start_flag(mut self, start_flag: bool) -> Self {
        self.start_flag = start_flag;
        self
    }

    /// Decodes a header byte.
    ///
    /// The start flag is reported rather than enforced; callers decide how to
    /// surface a cleared flag.
    ///
    /// # Errors
    ///
    /// Returns an error when the phase, side, or line code has no table entry.
    ///
    /// ```
    /// use fbglink::{FrameHeader, Line, Phase, Side};
    ///
    /// let header = FrameHeader::decode(0xAA)?;
    /// assert!(header.start_flag());
    /// assert_eq!(Phase::Eight, header.position().phase());
    /// assert_eq!(Side::B, header.position().side());
    /// assert_eq!(Line::Two, header.position().line());
    /// # Ok::<(), fbglink::HeaderDecodeError>(())
    /// ```
    pub fn decode(byte: u8) -> Result<Self, HeaderDecodeError> {
        let start_flag = byte & START_FLAG_MASK != 0;
        let phase = Phase::try_from((byte >> PHASE_SHIFT) & TWO_BIT_MASK)?;
        let side = Side::try_from((byte >> SIDE_SHIFT) & TWO_BIT_MASK)?;
        let line = Line::try_from((byte >> LINE_SHIFT) & TWO_BIT_MASK)?;

        Ok(Self {
            start_flag,
            position: PositionContext::new(phase, side, line),
        })
    }

    /// Encodes the header byte; the reserved bit is always zero.
    ///
    /// ```
    /// use fbglink::{FrameHeader, Line, Phase, PositionContext, Side};
    ///
    /// let header = FrameHeader::new(PositionContext::new(Phase::Four, Side::A, Line::One));
    /// assert_eq!(0x80, header.encode());
    /// ```
    #[must_use]
    pub const fn encode(self) -> u8 {
        let start = if self.start_flag { START_FLAG_MASK } else { 0 };
        start
            | (self.position.phase.code() << PHASE_SHIFT)
            | (self.position.side.code() << SIDE_SHIFT)
            | (self.position.line.code() << LINE_SHIFT)
    }

    /// Returns whether the start flag was set.
    #[must_use]
    pub const fn start_flag(self) -> bool {
        self.start_flag
    }

    /// Returns the decoded position.
    #[must_use]
    pub const fn position(self) -> PositionContext {
        self.position
    }
}
