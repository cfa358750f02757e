mod app;
mod cli;
mod downlink;
mod error;
mod ota;
mod protocol;
mod telemetry;
mod terminal;
mod uplink;
mod utils;

pub use app::{run, run_with_clients};
pub use cli::{
    Args, ChunkSizing, Command, DecodeArgs, LogLevel, OtaCommand, OtaPlanArgs, OtaRunArgs,
    OutputFormat,
};
pub use downlink::{
    DownlinkError, DownlinkFrame, DownlinkPriority, DownlinkPush, RecordedPush, RecordingDownlink,
};
pub use error::OtaError;
pub use ota::{
    ChunkTransmitter, CommandDecodeError, DEFAULT_ALLOWED_EXTENSIONS, DEFAULT_CHUNK_DELAY,
    DEFAULT_CHUNK_SIZE, DIGEST_LEN, DownlinkCommand, FirmwareFile, HealthReport,
    InMemorySessionStore, IngestError, IngestLimits, MAX_CHUNK_COUNT, MAX_FIRMWARE_SIZE,
    OtaConfig, OtaService, OtaSession, OtaState, START_FRAME_LEN, SessionId, SessionStore,
    SessionSummary, SpreadingFactor, TransmitError, TransmitOutcome, partition,
};
pub use protocol::{CommandCode, RawFrame, UPDATE_PORT, UPLINK_PORT};
pub use terminal::{SystemTerminalClient, TerminalClient};
pub use uplink::{
    BOOT_EVENT_LEN, BOOT_EVENT_METRIC_ID, BootTimestampError, DecodeResult, EnvelopeData,
    FixedMetric, FormatterEnvelope, FrameHeader, HeaderDecodeError, Line, MetricDescriptor,
    MetricId, MetricKey, MetricRecord, MetricStream, MetricValue, NameTemplate, Phase,
    PositionContext, Quantity, RawValue, Side, Statistic, StreamError, TEMPERATURE_OFFSET,
    UplinkDecoder, UplinkFrameBuilder, ValueCategory, metric_descriptor, parse_boot_timestamp,
    split_opcode, transform_value, value_len_for_code,
};
