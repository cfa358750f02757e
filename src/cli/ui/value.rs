use std::fmt::{self, Display, Formatter};

use crate::utils::format_hex;

/// Formats a boolean as `yes` / `no`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) struct YesNo(pub(crate) bool);

impl Display for YesNo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(if self.0 { "yes" } else { "no" })
    }
}

/// Formats a byte count as `<n> bytes`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) struct Bytes(pub(crate) usize);

impl Display for Bytes {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} bytes", self.0)
    }
}

/// Formats optional values as `<none>` when absent.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) struct NoneOr<T>(pub(crate) Option<T>);

impl<T: Display> Display for NoneOr<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(value) => write!(f, "{value}"),
            None => f.write_str("<none>"),
        }
    }
}

/// Formats bytes as uppercase hexadecimal pairs.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) struct HexBytes<'a>(pub(crate) &'a [u8]);

impl Display for HexBytes<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&format_hex(self.0))
    }
}

/// Formats a digest as one lowercase hex string.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) struct Digest<'a>(pub(crate) &'a [u8]);

impl Display for Digest<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}
