use std::ops::Range;
use std::path::Path;

use bon::Builder;
use clap::ValueEnum;
use serde::Serialize;
use strum_macros::{Display, EnumIter};
use thiserror::Error;

/// Largest accepted firmware image, in bytes.
pub const MAX_FIRMWARE_SIZE: usize = 5 * 1024 * 1024;

/// Chunk size used when the operator does not pick one.
pub const DEFAULT_CHUNK_SIZE: usize = 50;

/// File extensions accepted for named uploads.
pub const DEFAULT_ALLOWED_EXTENSIONS: [&str; 3] = ["py", "txt", "json"];

/// Largest chunk count addressable by the 16-bit chunk index.
pub const MAX_CHUNK_COUNT: usize = u16::MAX as usize;

/// Errors returned when an uploaded file cannot become an update session.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum IngestError {
    #[error("firmware file is empty")]
    Empty,
    #[error("firmware file is {size} bytes; the limit is {max} bytes")]
    TooLarge { size: usize, max: usize },
    #[error("file `{name}` has an unsupported extension; allowed: {allowed}")]
    UnsupportedExtension { name: String, allowed: String },
    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,
    #[error(
        "{size} bytes at {chunk_size} bytes per chunk needs {count} chunks; at most {MAX_CHUNK_COUNT} are addressable"
    )]
    TooManyChunks {
        size: usize,
        chunk_size: usize,
        count: usize,
    },
}

/// Validation rules applied when a file is ingested.
#[derive(Debug, Clone, Builder)]
pub struct IngestLimits {
    #[builder(default = MAX_FIRMWARE_SIZE)]
    max_file_size: usize,
    #[builder(default = DEFAULT_ALLOWED_EXTENSIONS.iter().map(ToString::to_string).collect())]
    allowed_extensions: Vec<String>,
}

impl Default for IngestLimits {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl IngestLimits {
    /// Largest accepted file size.
    #[must_use]
    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    /// Checks a file against the size and extension rules.
    ///
    /// # Errors
    ///
    /// Returns an error when the file is empty, too large, or has a name whose
    /// extension is not allowed.
    pub fn check(&self, file: &FirmwareFile) -> Result<(), IngestError> {
        if file.bytes.is_empty() {
            return Err(IngestError::Empty);
        }
        if file.bytes.len() > self.max_file_size {
            return Err(IngestError::TooLarge {
                size: file.bytes.len(),
                max: self.max_file_size,
            });
        }
        if let Some(name) = &file.name {
            let extension = Path::new(name)
                .extension()
                .and_then(|extension| extension.to_str())
                .map(str::to_ascii_lowercase);
            let allowed = extension.is_some_and(|extension| {
                self.allowed_extensions
                    .iter()
                    .any(|candidate| candidate.eq_ignore_ascii_case(&extension))
            });
            if !allowed {
                return Err(IngestError::UnsupportedExtension {
                    name: name.clone(),
                    allowed: self.allowed_extensions.join(", "),
                });
            }
        }
        Ok(())
    }
}

/// A firmware image as handed over by the file-ingestion collaborator.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FirmwareFile {
    name: Option<String>,
    bytes: Vec<u8>,
}

impl FirmwareFile {
    /// Wraps anonymous file bytes.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { name: None, bytes }
    }

    /// Wraps file bytes with their original file name.
    #[must_use]
    pub fn named(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: Some(name.into()),
            bytes,
        }
    }

    /// Original file name, if known.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// File contents.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn into_parts(self) -> (Option<String>, Vec<u8>) {
        (self.name, self.bytes)
    }
}

/// Splits `len` bytes into consecutive ranges of at most `chunk_size` bytes.
///
/// # Errors
///
/// Returns an error when `chunk_size` is zero or the partition would need more
/// chunks than the 16-bit index can address.
///
/// ```
/// use fbglink::partition;
///
/// let ranges = partition(120, 50)?;
/// assert_eq!(vec![0..50, 50..100, 100..120], ranges);
/// # Ok::<(), fbglink::IngestError>(())
/// ```
pub fn partition(len: usize, chunk_size: usize) -> Result<Vec<Range<usize>>, IngestError> {
    if chunk_size == 0 {
        return Err(IngestError::ZeroChunkSize);
    }
    let count = len.div_ceil(chunk_size);
    if count > MAX_CHUNK_COUNT {
        return Err(IngestError::TooManyChunks {
            size: len,
            chunk_size,
            count,
        });
    }
    Ok((0..count)
        .map(|index| {
            let start = index * chunk_size;
            start..usize::min(start + chunk_size, len)
        })
        .collect())
}

/// LoRa spreading factor, used to pick a chunk size that fits one downlink.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, EnumIter, Display, ValueEnum, Serialize)]
pub enum SpreadingFactor {
    #[strum(to_string = "SF7")]
    #[value(name = "sf7")]
    Sf7,
    #[strum(to_string = "SF8")]
    #[value(name = "sf8")]
    Sf8,
    #[strum(to_string = "SF9")]
    #[value(name = "sf9")]
    Sf9,
    #[strum(to_string = "SF10")]
    #[value(name = "sf10")]
    Sf10,
}

impl SpreadingFactor {
    /// Recommended chunk size for this spreading factor.
    ///
    /// ```
    /// use fbglink::SpreadingFactor;
    ///
    /// assert_eq!(200, SpreadingFactor::Sf7.recommended_chunk_size());
    /// assert_eq!(25, SpreadingFactor::Sf10.recommended_chunk_size());
    /// ```
    #[must_use]
    pub const fn recommended_chunk_size(self) -> usize {
        match self {
            Self::Sf7 => 200,
            Self::Sf8 => 100,
            Self::Sf9 => 50,
            Self::Sf10 => 25,
        }
    }
}
