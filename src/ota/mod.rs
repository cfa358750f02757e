mod command;
mod ingest;
mod service;
mod session;
mod store;
mod transmitter;

pub use command::{CommandDecodeError, DIGEST_LEN, DownlinkCommand, START_FRAME_LEN};
pub use ingest::{
    DEFAULT_ALLOWED_EXTENSIONS, DEFAULT_CHUNK_SIZE, FirmwareFile, IngestError, IngestLimits,
    MAX_CHUNK_COUNT, MAX_FIRMWARE_SIZE, SpreadingFactor, partition,
};
pub use service::{HealthReport, OtaConfig, OtaService};
pub use session::{OtaSession, OtaState, SessionId, SessionSummary};
pub use store::{InMemorySessionStore, SessionStore};
pub use transmitter::{ChunkTransmitter, DEFAULT_CHUNK_DELAY, TransmitError, TransmitOutcome};
