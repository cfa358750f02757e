use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bon::Builder;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use super::command::DownlinkCommand;
use super::ingest::{DEFAULT_CHUNK_SIZE, FirmwareFile, IngestLimits};
use super::session::{OtaSession, OtaState, SessionId, SessionSummary};
use super::store::{InMemorySessionStore, SessionStore};
use super::transmitter::{ChunkTransmitter, DEFAULT_CHUNK_DELAY, TransmitError, TransmitOutcome};
use crate::downlink::DownlinkPush;
use crate::error::OtaError;

const START_FROM: [OtaState; 4] = [
    OtaState::Ready,
    OtaState::Started,
    OtaState::Error,
    OtaState::Aborted,
];
const SEND_FROM: [OtaState; 2] = [OtaState::Ready, OtaState::Started];

/// Tunables for an [`OtaService`].
#[derive(Debug, Clone, Builder)]
pub struct OtaConfig {
    /// Chunk size used when an upload does not name one.
    #[builder(default = DEFAULT_CHUNK_SIZE)]
    default_chunk_size: usize,
    /// Pause between CHUNK pushes.
    #[builder(default = DEFAULT_CHUNK_DELAY)]
    chunk_delay: Duration,
    #[builder(default)]
    limits: IngestLimits,
}

impl Default for OtaConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl OtaConfig {
    /// Chunk size used when an upload does not name one.
    #[must_use]
    pub fn default_chunk_size(&self) -> usize {
        self.default_chunk_size
    }

    /// Pause between CHUNK pushes.
    #[must_use]
    pub fn chunk_delay(&self) -> Duration {
        self.chunk_delay
    }
}

/// Liveness report for the operator surface.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    status: &'static str,
    timestamp: Option<String>,
    active_sessions: usize,
}

impl HealthReport {
    /// Number of sessions held by the service.
    #[must_use]
    pub fn active_sessions(&self) -> usize {
        self.active_sessions
    }
}

/// Operator-facing firmware update service.
///
/// Owns the session store and drives the push primitive. Cloning is cheap and
/// clones share state.
#[derive(Clone)]
pub struct OtaService {
    store: Arc<dyn SessionStore>,
    downlink: Arc<dyn DownlinkPush>,
    config: OtaConfig,
    sequence: Arc<AtomicU64>,
}

impl OtaService {
    /// Creates a service with an in-memory session store.
    #[must_use]
    pub fn new(downlink: Arc<dyn DownlinkPush>, config: OtaConfig) -> Self {
        Self::with_store(Arc::new(InMemorySessionStore::default()), downlink, config)
    }

    /// Creates a service over an explicit session store.
    #[must_use]
    pub fn with_store(
        store: Arc<dyn SessionStore>,
        downlink: Arc<dyn DownlinkPush>,
        config: OtaConfig,
    ) -> Self {
        Self {
            store,
            downlink,
            config,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Service configuration.
    #[must_use]
    pub fn config(&self) -> &OtaConfig {
        &self.config
    }

    /// Ingests a firmware file into a new `ready` session.
    ///
    /// # Errors
    ///
    /// Returns an error when the file violates the ingest limits or cannot be
    /// partitioned.
    #[instrument(
        skip(self, file),
        level = "info",
        fields(name = file.name().unwrap_or("<unnamed>"), size = file.bytes().len())
    )]
    pub fn upload(
        &self,
        file: FirmwareFile,
        chunk_size: Option<usize>,
    ) -> Result<Arc<OtaSession>, OtaError> {
        let chunk_size = chunk_size.unwrap_or(self.config.default_chunk_size);
        let session = OtaSession::ingest(self.next_id(), file, chunk_size, &self.config.limits)?;
        Ok(self.store.insert(session))
    }

    /// Returns a stored session.
    ///
    /// # Errors
    ///
    /// Returns [`OtaError::SessionNotFound`] for unknown ids.
    pub fn session(&self, id: &SessionId) -> Result<Arc<OtaSession>, OtaError> {
        self.store
            .get(id)
            .ok_or_else(|| OtaError::SessionNotFound { id: id.clone() })
    }

    /// Snapshots one session.
    ///
    /// # Errors
    ///
    /// Returns [`OtaError::SessionNotFound`] for unknown ids.
    pub fn summary(&self, id: &SessionId) -> Result<SessionSummary, OtaError> {
        self.session(id).map(|session| session.summary())
    }

    /// Pushes START for a session and marks it `started`.
    ///
    /// A failed push leaves the session state unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error when the session is unknown, is sending or completed,
    /// or the push fails.
    #[instrument(skip(self), level = "info", fields(session_id = %id))]
    pub async fn start(&self, id: &SessionId, device_id: &str) -> Result<SessionSummary, OtaError> {
        let session = self.session(id)?;
        let state = session.state();
        if !START_FROM.contains(&state) {
            return Err(invalid_state(&session, "start", state, &START_FROM));
        }

        let frame = DownlinkCommand::Start {
            chunk_count: session.chunk_count(),
            digest: session.digest(),
        }
        .to_frame();
        self.downlink
            .push(device_id, &frame)
            .await
            .map_err(|source| OtaError::StartRejected {
                id: id.clone(),
                source,
            })?;

        session
            .transition(&START_FROM, OtaState::Started)
            .map_err(|observed| invalid_state(&session, "start", observed, &START_FROM))?;
        session.record_started(device_id);
        info!(chunks = session.chunk_count(), sha256 = %session.digest_hex(), "update started");

        Ok(session.summary())
    }

    /// Sends every chunk of a `ready` or `started` session, pacing pushes by
    /// the configured delay.
    ///
    /// Only one send run can hold a session at a time; every run starts from
    /// chunk 0.
    ///
    /// # Errors
    ///
    /// Returns an error when the session is unknown, is not `ready` or
    /// `started`, or a chunk push fails. On a push failure the session moves
    /// to `error` and records the failing index.
    #[instrument(skip(self), level = "info", fields(session_id = %id))]
    pub async fn send_chunks(
        &self,
        id: &SessionId,
        device_id: &str,
    ) -> Result<TransmitOutcome, OtaError> {
        let session = self.session(id)?;
        session
            .transition(&SEND_FROM, OtaState::Sending)
            .map_err(|observed| invalid_state(&session, "send chunks", observed, &SEND_FROM))?;

        let cancel = session.arm_cancellation();
        if session.state() != OtaState::Sending {
            return Ok(TransmitOutcome::Cancelled { chunks_sent: 0 });
        }
        session.record_sending();

        let transmitter =
            ChunkTransmitter::new(self.downlink.as_ref()).with_delay(self.config.chunk_delay);
        match transmitter.transmit(&session, device_id, &cancel).await {
            Ok(outcome @ TransmitOutcome::Completed { chunks_sent }) => {
                match session.transition(&[OtaState::Sending], OtaState::Completed) {
                    Ok(_) => {
                        session.record_completed();
                        info!(chunks_sent, "all chunks queued");
                    }
                    Err(observed) => {
                        warn!(%observed, "session left sending before completion was recorded");
                    }
                }
                Ok(outcome)
            }
            Ok(outcome @ TransmitOutcome::Cancelled { chunks_sent }) => {
                info!(chunks_sent, state = %session.state(), "send run cancelled");
                Ok(outcome)
            }
            Err(TransmitError::ChunkPush { index, source }) => {
                match session.transition(&[OtaState::Sending], OtaState::Error) {
                    Ok(_) => session.record_failure(index, &source.to_string()),
                    Err(observed) => {
                        warn!(%observed, "session left sending before the failure was recorded");
                    }
                }
                warn!(index, error = %source, "chunk push failed");
                Err(OtaError::ChunkTransmission {
                    id: id.clone(),
                    index,
                    source,
                })
            }
        }
    }

    /// Runs [`Self::send_chunks`] on a background task.
    pub fn spawn_send_chunks(
        &self,
        id: SessionId,
        device_id: String,
    ) -> JoinHandle<Result<TransmitOutcome, OtaError>> {
        let service = self.clone();
        tokio::spawn(async move { service.send_chunks(&id, &device_id).await })
    }

    /// Pushes a STATUS query. Session state is not touched.
    ///
    /// # Errors
    ///
    /// Returns an error when the push fails.
    #[instrument(skip(self), level = "info")]
    pub async fn request_status(&self, device_id: &str) -> Result<(), OtaError> {
        self.downlink
            .push(device_id, &DownlinkCommand::Status.to_frame())
            .await?;
        Ok(())
    }

    /// Aborts the update on a device.
    ///
    /// When a session is named it moves to `aborted` and any send run on it
    /// stops before its next chunk, whether or not the ABORT push succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error when the named session is unknown or the push fails.
    #[instrument(skip(self), level = "info", fields(session_id = ?id))]
    pub async fn abort(
        &self,
        device_id: &str,
        id: Option<&SessionId>,
    ) -> Result<Option<SessionSummary>, OtaError> {
        let session = id.map(|id| self.session(id)).transpose()?;
        if let Some(session) = &session {
            let previous = session.replace_state(OtaState::Aborted);
            session.cancel();
            info!(%previous, "session aborted");
        }

        self.downlink
            .push(device_id, &DownlinkCommand::Abort.to_frame())
            .await?;
        Ok(session.map(|session| session.summary()))
    }

    /// Snapshots every session.
    #[must_use]
    pub fn list(&self) -> Vec<SessionSummary> {
        self.store
            .list()
            .iter()
            .map(|session| session.summary())
            .collect()
    }

    /// Removes a session, stopping any send run on it.
    ///
    /// # Errors
    ///
    /// Returns [`OtaError::SessionNotFound`] for unknown ids.
    #[instrument(skip(self), level = "info", fields(session_id = %id))]
    pub fn delete(&self, id: &SessionId) -> Result<SessionSummary, OtaError> {
        let session = self
            .store
            .remove(id)
            .ok_or_else(|| OtaError::SessionNotFound { id: id.clone() })?;
        if session.state() == OtaState::Sending {
            session.replace_state(OtaState::Aborted);
        }
        session.cancel();
        Ok(session.summary())
    }

    /// Reports service liveness.
    #[must_use]
    pub fn health(&self) -> HealthReport {
        HealthReport {
            status: "ok",
            timestamp: OffsetDateTime::now_utc().format(&Rfc3339).ok(),
            active_sessions: self.store.len(),
        }
    }

    fn next_id(&self) -> SessionId {
        let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        SessionId::new(format!("session-{millis}-{sequence}"))
    }
}

fn invalid_state(
    session: &OtaSession,
    operation: &'static str,
    state: OtaState,
    allowed: &[OtaState],
) -> OtaError {
    OtaError::InvalidState {
        id: session.id().clone(),
        operation,
        state,
        allowed: allowed
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", "),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use std::sync::OnceLock;

    use async_trait::async_trait;

    use super::*;
    use crate::downlink::{DownlinkError, DownlinkFrame, RecordingDownlink};

    fn service(downlink: &Arc<RecordingDownlink>) -> OtaService {
        let config = OtaConfig::builder().chunk_delay(Duration::ZERO).build();
        OtaService::new(Arc::clone(downlink) as Arc<dyn DownlinkPush>, config)
    }

    #[test]
    fn upload_uses_default_chunk_size() -> anyhow::Result<()> {
        let service = service(&Arc::new(RecordingDownlink::default()));
        let session = service.upload(FirmwareFile::new(vec![0; 120]), None)?;
        assert_eq!(50, session.chunk_size());
        assert_eq!(3, session.chunk_count());
        assert!(session.id().as_str().starts_with("session-"));
        Ok(())
    }

    #[test]
    fn upload_ids_are_unique() -> anyhow::Result<()> {
        let service = service(&Arc::new(RecordingDownlink::default()));
        let first = service.upload(FirmwareFile::new(vec![1]), None)?;
        let second = service.upload(FirmwareFile::new(vec![1]), None)?;
        assert_ne!(first.id(), second.id());
        assert_eq!(2, service.health().active_sessions());
        Ok(())
    }

    #[tokio::test]
    async fn failed_start_keeps_state() -> anyhow::Result<()> {
        let downlink = Arc::new(RecordingDownlink::builder().fail_at_push(0).build());
        let service = service(&downlink);
        let session = service.upload(FirmwareFile::new(vec![1, 2, 3]), Some(1))?;

        let result = service.start(session.id(), "dev").await;

        assert_matches!(result, Err(OtaError::StartRejected { .. }));
        assert_eq!(OtaState::Ready, session.state());
        Ok(())
    }

    #[tokio::test]
    async fn send_outside_ready_or_started_is_refused() -> anyhow::Result<()> {
        let downlink = Arc::new(RecordingDownlink::default());
        let service = service(&downlink);
        let session = service.upload(FirmwareFile::new(vec![1, 2, 3]), Some(1))?;
        let digest = session.digest();
        service.send_chunks(session.id(), "dev").await?;

        let result = service.send_chunks(session.id(), "dev").await;

        assert_matches!(
            result,
            Err(OtaError::InvalidState {
                state: OtaState::Completed,
                ..
            })
        );
        assert_eq!(digest, session.digest());
        assert_eq!(3, session.chunk_count());
        assert_eq!(3, downlink.chunk_indices().len());
        Ok(())
    }

    #[tokio::test]
    async fn start_is_refused_while_completed() -> anyhow::Result<()> {
        let downlink = Arc::new(RecordingDownlink::default());
        let service = service(&downlink);
        let session = service.upload(FirmwareFile::new(vec![1]), None)?;
        service.send_chunks(session.id(), "dev").await?;

        assert_matches!(
            service.start(session.id(), "dev").await,
            Err(OtaError::InvalidState { .. })
        );
        Ok(())
    }

    #[tokio::test]
    async fn abort_applies_locally_when_push_fails() -> anyhow::Result<()> {
        let downlink = Arc::new(RecordingDownlink::builder().fail_at_push(0).build());
        let service = service(&downlink);
        let session = service.upload(FirmwareFile::new(vec![1]), None)?;

        let result = service.abort("dev", Some(session.id())).await;

        assert_matches!(result, Err(OtaError::Downlink(_)));
        assert_eq!(OtaState::Aborted, session.state());
        Ok(())
    }

    #[tokio::test]
    async fn status_leaves_sessions_alone() -> anyhow::Result<()> {
        let downlink = Arc::new(RecordingDownlink::default());
        let service = service(&downlink);
        let session = service.upload(FirmwareFile::new(vec![1]), None)?;

        service.request_status("dev").await?;

        assert_eq!(OtaState::Ready, session.state());
        assert_eq!(1, downlink.pushes().len());
        Ok(())
    }

    /// Aborts the session from inside the CHUNK push, then fails that push.
    #[derive(Default)]
    struct AbortDuringChunk {
        session: OnceLock<Arc<OtaSession>>,
    }

    #[async_trait]
    impl DownlinkPush for AbortDuringChunk {
        async fn push(&self, device_id: &str, frame: &DownlinkFrame) -> Result<(), DownlinkError> {
            if let Some(session) = self.session.get() {
                session.replace_state(OtaState::Aborted);
                session.cancel();
            }
            Err(DownlinkError::Rejected {
                device_id: device_id.to_string(),
                reason: format!("{} bytes dropped", frame.payload().len()),
            })
        }
    }

    #[tokio::test]
    async fn chunk_failure_after_abort_keeps_aborted_state() -> anyhow::Result<()> {
        let downlink = Arc::new(AbortDuringChunk::default());
        let service = OtaService::new(
            Arc::clone(&downlink) as Arc<dyn DownlinkPush>,
            OtaConfig::builder().chunk_delay(Duration::ZERO).build(),
        );
        let session = service.upload(FirmwareFile::new(vec![1, 2, 3]), Some(1))?;
        assert!(downlink.session.set(Arc::clone(&session)).is_ok());

        let result = service.send_chunks(session.id(), "dev").await;

        assert_matches!(result, Err(OtaError::ChunkTransmission { index: 0, .. }));
        let summary = session.summary();
        assert_eq!(OtaState::Aborted, summary.status());
        assert_eq!(None, summary.failed_chunk());
        assert_eq!(None, summary.last_error());
        Ok(())
    }

    #[test]
    fn delete_unknown_session_is_not_found() {
        let service = service(&Arc::new(RecordingDownlink::default()));
        assert_matches!(
            service.delete(&SessionId::new("session-missing")),
            Err(OtaError::SessionNotFound { .. })
        );
    }
}
