use std::path::PathBuf;

use thiserror::Error;

use crate::downlink::DownlinkError;
use crate::ota::{IngestError, OtaState, SessionId};

/// Errors returned by update session operations.
#[derive(Debug, Error)]
pub enum OtaError {
    #[error("update session `{id}` was not found")]
    SessionNotFound { id: SessionId },
    #[error("cannot {operation} session `{id}` while it is {state}; allowed from: {allowed}")]
    InvalidState {
        id: SessionId,
        operation: &'static str,
        state: OtaState,
        allowed: String,
    },
    #[error("START for session `{id}` was not accepted")]
    StartRejected {
        id: SessionId,
        #[source]
        source: DownlinkError,
    },
    #[error("session `{id}` stopped at chunk {index}")]
    ChunkTransmission {
        id: SessionId,
        index: u16,
        #[source]
        source: DownlinkError,
    },
    #[error(transparent)]
    Downlink(#[from] DownlinkError),
    #[error(transparent)]
    Ingest(#[from] IngestError),
}

/// Errors returned when command-line input cannot be used.
#[derive(Debug, Error)]
pub(crate) enum CliConfigError {
    #[error("`{value}` is not a hex payload")]
    InvalidHexPayload {
        value: String,
        #[source]
        source: hex::FromHexError,
    },
    #[error("failed to read firmware file `{}`", path.display())]
    ReadFirmware {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed while waiting for Ctrl+C")]
    CtrlC { source: std::io::Error },
}

/// Errors returned by telemetry initialisation.
#[derive(Debug, Error)]
pub(crate) enum TelemetryError {
    #[error("failed to install tracing subscriber")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}
