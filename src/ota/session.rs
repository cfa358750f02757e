use std::ops::Range;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde_with::{SerializeDisplay, hex::Hex, serde_as};
use sha2::{Digest, Sha256};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::command::DIGEST_LEN;
use super::ingest::{FirmwareFile, IngestError, IngestLimits, partition};

/// Identifier of one update session.
#[derive(
    Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, derive_more::Display, derive_more::From,
    SerializeDisplay,
)]
pub struct SessionId(String);

impl SessionId {
    /// Wraps an existing identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Lifecycle state of an update session.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, EnumIter, Display, SerializeDisplay)]
#[repr(u8)]
pub enum OtaState {
    #[strum(to_string = "uploaded")]
    Uploaded,
    #[strum(to_string = "ready")]
    Ready,
    #[strum(to_string = "started")]
    Started,
    #[strum(to_string = "sending")]
    Sending,
    #[strum(to_string = "completed")]
    Completed,
    #[strum(to_string = "aborted")]
    Aborted,
    #[strum(to_string = "error")]
    Error,
}

impl OtaState {
    const fn as_u8(self) -> u8 {
        self as u8
    }

    fn from_u8(value: u8) -> Self {
        Self::iter()
            .find(|state| state.as_u8() == value)
            .unwrap_or(Self::Error)
    }

    /// Returns whether no further transfer activity follows this state without
    /// an operator restart.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted | Self::Error)
    }
}

#[derive(Debug)]
struct SessionDetails {
    device_id: Option<String>,
    uploaded_at: OffsetDateTime,
    started_at: Option<OffsetDateTime>,
    completed_at: Option<OffsetDateTime>,
    failed_chunk: Option<u16>,
    last_error: Option<String>,
}

/// One firmware image prepared for delivery to a device.
///
/// The file bytes, digest, and chunk partition are fixed at ingestion. Only
/// the lifecycle state and bookkeeping change afterwards.
#[derive(Debug)]
pub struct OtaSession {
    id: SessionId,
    name: Option<String>,
    firmware: Vec<u8>,
    digest: [u8; DIGEST_LEN],
    chunk_size: usize,
    chunks: Vec<Range<usize>>,
    state: AtomicU8,
    details: Mutex<SessionDetails>,
    cancellation: Mutex<CancellationToken>,
}

impl OtaSession {
    /// Validates a file, hashes it, and partitions it into chunks.
    ///
    /// The returned session is `ready`.
    ///
    /// # Errors
    ///
    /// Returns an error when the file breaks the ingest limits or cannot be
    /// partitioned with `chunk_size`.
    ///
    /// ```
    /// use fbglink::{FirmwareFile, IngestLimits, OtaSession, OtaState};
    ///
    /// let file = FirmwareFile::named("main.py", b"print('hello')\n".to_vec());
    /// let session = OtaSession::ingest("session-1".into(), file, 4, &IngestLimits::default())?;
    /// assert_eq!(OtaState::Ready, session.state());
    /// assert_eq!(4, session.chunk_count());
    /// # Ok::<(), fbglink::IngestError>(())
    /// ```
    pub fn ingest(
        id: SessionId,
        file: FirmwareFile,
        chunk_size: usize,
        limits: &IngestLimits,
    ) -> Result<Self, IngestError> {
        limits.check(&file)?;
        let chunks = partition(file.bytes().len(), chunk_size)?;
        let (name, firmware) = file.into_parts();
        let mut digest = [0u8; DIGEST_LEN];
        digest.copy_from_slice(&Sha256::digest(&firmware));

        let session = Self {
            id,
            name,
            firmware,
            digest,
            chunk_size,
            chunks,
            state: AtomicU8::new(OtaState::Uploaded.as_u8()),
            details: Mutex::new(SessionDetails {
                device_id: None,
                uploaded_at: OffsetDateTime::now_utc(),
                started_at: None,
                completed_at: None,
                failed_chunk: None,
                last_error: None,
            }),
            cancellation: Mutex::new(CancellationToken::new()),
        };
        session.state.store(OtaState::Ready.as_u8(), Ordering::Release);
        info!(
            session_id = %session.id,
            size = session.firmware.len(),
            chunks = session.chunks.len(),
            sha256 = %session.digest_hex(),
            "firmware ingested"
        );

        Ok(session)
    }

    /// Session identifier.
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Original file name, if known.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Complete firmware image.
    #[must_use]
    pub fn firmware(&self) -> &[u8] {
        &self.firmware
    }

    /// sha256 over the complete image.
    #[must_use]
    pub fn digest(&self) -> [u8; DIGEST_LEN] {
        self.digest
    }

    /// Lowercase hex rendering of [`Self::digest`].
    #[must_use]
    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest)
    }

    /// Configured chunk size.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of chunks; ingestion guarantees it fits the 16-bit index.
    #[must_use]
    pub fn chunk_count(&self) -> u16 {
        u16::try_from(self.chunks.len()).unwrap_or(u16::MAX)
    }

    /// Returns one chunk by index.
    #[must_use]
    pub fn chunk(&self, index: u16) -> Option<&[u8]> {
        self.chunks
            .get(usize::from(index))
            .map(|range| &self.firmware[range.clone()])
    }

    /// Iterates chunks in index order.
    pub fn chunks(&self) -> impl Iterator<Item = (u16, &[u8])> + '_ {
        (0..self.chunk_count()).zip(self.chunks.iter().map(|range| &self.firmware[range.clone()]))
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> OtaState {
        OtaState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Device the session was last started against.
    #[must_use]
    pub fn device_id(&self) -> Option<String> {
        self.details().device_id.clone()
    }

    /// Index of the chunk whose push failed, if the last run failed.
    #[must_use]
    pub fn failed_chunk(&self) -> Option<u16> {
        self.details().failed_chunk
    }

    /// Moves to `to` if the current state is one of `from`.
    ///
    /// Returns the previous state on success and the observed state otherwise.
    pub(crate) fn transition(&self, from: &[OtaState], to: OtaState) -> Result<OtaState, OtaState> {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            let observed = OtaState::from_u8(current);
            if !from.contains(&observed) {
                return Err(observed);
            }
            match self.state.compare_exchange_weak(
                current,
                to.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    debug!(session_id = %self.id, from = %observed, %to, "session state changed");
                    return Ok(observed);
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Unconditionally sets the state, returning the previous one.
    pub(crate) fn replace_state(&self, to: OtaState) -> OtaState {
        let previous = OtaState::from_u8(self.state.swap(to.as_u8(), Ordering::AcqRel));
        debug!(session_id = %self.id, from = %previous, %to, "session state replaced");
        previous
    }

    pub(crate) fn record_started(&self, device_id: &str) {
        let mut details = self.details();
        details.device_id = Some(device_id.to_string());
        details.started_at = Some(OffsetDateTime::now_utc());
        details.completed_at = None;
        details.failed_chunk = None;
        details.last_error = None;
    }

    pub(crate) fn record_sending(&self) {
        let mut details = self.details();
        details.failed_chunk = None;
        details.last_error = None;
    }

    pub(crate) fn record_completed(&self) {
        self.details().completed_at = Some(OffsetDateTime::now_utc());
    }

    pub(crate) fn record_failure(&self, index: u16, error: &str) {
        let mut details = self.details();
        details.failed_chunk = Some(index);
        details.last_error = Some(error.to_string());
    }

    /// Installs a fresh cancellation token for a new send run.
    pub(crate) fn arm_cancellation(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self
            .cancellation
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = token.clone();
        token
    }

    /// Cancels the active send run, if any.
    pub(crate) fn cancel(&self) {
        self.cancellation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
    }

    /// Point-in-time view for listings and status output.
    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        let details = self.details();
        SessionSummary {
            session_id: self.id.clone(),
            name: self.name.clone(),
            size: self.firmware.len(),
            chunk_size: self.chunk_size,
            total_chunks: self.chunk_count(),
            sha256: self.digest,
            status: self.state(),
            device_id: details.device_id.clone(),
            uploaded_at: format_timestamp(details.uploaded_at),
            started_at: details.started_at.and_then(format_timestamp),
            completed_at: details.completed_at.and_then(format_timestamp),
            failed_chunk: details.failed_chunk,
            last_error: details.last_error.clone(),
        }
    }

    fn details(&self) -> MutexGuard<'_, SessionDetails> {
        self.details.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn format_timestamp(timestamp: OffsetDateTime) -> Option<String> {
    timestamp.format(&Rfc3339).ok()
}

/// Serializable snapshot of a session.
#[serde_as]
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    session_id: SessionId,
    name: Option<String>,
    size: usize,
    chunk_size: usize,
    total_chunks: u16,
    #[serde_as(as = "Hex")]
    sha256: [u8; DIGEST_LEN],
    status: OtaState,
    device_id: Option<String>,
    uploaded_at: Option<String>,
    started_at: Option<String>,
    completed_at: Option<String>,
    failed_chunk: Option<u16>,
    last_error: Option<String>,
}

impl SessionSummary {
    /// Session identifier.
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Original file name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Image size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Configured chunk size.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of chunks.
    #[must_use]
    pub fn total_chunks(&self) -> u16 {
        self.total_chunks
    }

    /// Image digest.
    #[must_use]
    pub fn sha256(&self) -> [u8; DIGEST_LEN] {
        self.sha256
    }

    /// Lifecycle state when the snapshot was taken.
    #[must_use]
    pub fn status(&self) -> OtaState {
        self.status
    }

    /// Device the session was started against.
    #[must_use]
    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    /// RFC 3339 upload time.
    #[must_use]
    pub fn uploaded_at(&self) -> Option<&str> {
        self.uploaded_at.as_deref()
    }

    /// RFC 3339 start time.
    #[must_use]
    pub fn started_at(&self) -> Option<&str> {
        self.started_at.as_deref()
    }

    /// RFC 3339 completion time.
    #[must_use]
    pub fn completed_at(&self) -> Option<&str> {
        self.completed_at.as_deref()
    }

    /// Index of the failed chunk.
    #[must_use]
    pub fn failed_chunk(&self) -> Option<u16> {
        self.failed_chunk
    }

    /// Error text recorded with the failure.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::*;

    fn session(bytes: &[u8], chunk_size: usize) -> OtaSession {
        OtaSession::ingest(
            SessionId::new("session-test"),
            FirmwareFile::new(bytes.to_vec()),
            chunk_size,
            &IngestLimits::default(),
        )
        .expect("fixture should ingest")
    }

    #[test]
    fn chunks_concatenate_to_the_original_file() {
        let firmware: Vec<u8> = (0..=255).cycle().take(1234).collect();
        let session = session(&firmware, 50);

        assert_eq!(25, session.chunk_count());
        assert_eq!(Some(34), session.chunk(24).map(<[u8]>::len));
        assert_eq!(None, session.chunk(25));
        let rebuilt: Vec<u8> = session.chunks().flat_map(|(_, bytes)| bytes.to_vec()).collect();
        assert_eq!(firmware, rebuilt);
    }

    #[test]
    fn digest_is_sha256_of_the_file() {
        let session = session(b"abc", 2);
        assert_eq!(
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad",
            session.digest_hex()
        );
    }

    #[test]
    fn transition_only_moves_from_allowed_states() {
        let session = session(b"abc", 1);

        assert_eq!(
            Ok(OtaState::Ready),
            session.transition(&[OtaState::Ready, OtaState::Started], OtaState::Sending)
        );
        assert_eq!(
            Err(OtaState::Sending),
            session.transition(&[OtaState::Ready, OtaState::Started], OtaState::Sending)
        );
        assert_eq!(OtaState::Sending, session.state());
    }

    #[test]
    fn replace_state_reports_previous() {
        let session = session(b"abc", 1);
        assert_eq!(OtaState::Ready, session.replace_state(OtaState::Aborted));
        assert_eq!(OtaState::Aborted, session.state());
    }

    #[test]
    fn cancel_reaches_the_armed_token() {
        let session = session(b"abc", 1);
        let token = session.arm_cancellation();
        session.cancel();
        assert!(token.is_cancelled());

        let fresh = session.arm_cancellation();
        assert!(!fresh.is_cancelled());
    }

    #[test]
    fn summary_reports_failure_bookkeeping() {
        let session = session(b"abcdef", 2);
        session.record_started("dev-7");
        session.record_failure(1, "boom");
        session.replace_state(OtaState::Error);

        let summary = session.summary();
        assert_eq!(OtaState::Error, summary.status());
        assert_eq!(Some("dev-7"), summary.device_id());
        assert_eq!(Some(1), summary.failed_chunk());
        assert_eq!(3, summary.total_chunks());
        assert_matches!(summary.started_at(), Some(_));
        assert_eq!(None, summary.completed_at());
    }

    #[test]
    fn summary_serialises_with_camel_case_and_hex_digest() -> anyhow::Result<()> {
        let json = serde_json::to_value(session(b"abc", 2).summary())?;
        assert_eq!("ready", json["status"]);
        assert_eq!(2, json["totalChunks"]);
        assert_eq!(
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad",
            json["sha256"]
        );
        Ok(())
    }
}
