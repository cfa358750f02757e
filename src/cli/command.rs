use std::path::PathBuf;
use std::time::Duration;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use tracing_subscriber::filter::LevelFilter;

use crate::ota::{DEFAULT_CHUNK_DELAY, DEFAULT_CHUNK_SIZE, SpreadingFactor};
use crate::protocol::UPLINK_PORT;

/// Command-line options for the FBG sensor link tool.
#[derive(Debug, Parser)]
#[command(
    name = "fbglink",
    about = "Decode FBG sensor uplinks and rehearse firmware updates."
)]
pub struct Args {
    /// Log verbosity; overrides `RUST_LOG`.
    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevel>,
    /// Output format. Defaults to `pretty` on a terminal and `json` otherwise.
    #[arg(long, global = true, value_enum)]
    output: Option<OutputFormat>,
    #[command(subcommand)]
    command: Command,
}

impl Args {
    /// Creates argument values directly without CLI parsing.
    ///
    /// ```
    /// use fbglink::{Args, Command, DecodeArgs};
    ///
    /// let args = Args::new(Command::Decode(DecodeArgs::new(["800478"])));
    /// let _ = args;
    /// ```
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self {
            log_level: None,
            output: None,
            command,
        }
    }

    /// Overrides the output format.
    #[must_use]
    pub fn with_output(mut self, output: OutputFormat) -> Self {
        self.output = Some(output);
        self
    }

    /// Requested log level, if any.
    #[must_use]
    pub fn log_level(&self) -> Option<LogLevel> {
        self.log_level
    }

    /// Requested output format, if any.
    #[must_use]
    pub fn output_format(&self) -> Option<OutputFormat> {
        self.output
    }

    /// Consumes the arguments, returning the selected command.
    #[must_use]
    pub fn into_command(self) -> Command {
        self.command
    }
}

/// Log verbosity accepted by `--log-level`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Maps the CLI level to a subscriber filter.
    #[must_use]
    pub fn as_level_filter(self) -> LevelFilter {
        match self {
            Self::Off => LevelFilter::OFF,
            Self::Error => LevelFilter::ERROR,
            Self::Warn => LevelFilter::WARN,
            Self::Info => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }
}

/// How command results are written to stdout.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Pretty,
    Json,
}

/// Supported CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Decode one or more hex-encoded uplink payloads.
    Decode(DecodeArgs),
    /// Plan or rehearse a firmware update.
    #[command(subcommand)]
    Ota(OtaCommand),
}

/// Arguments for the `decode` command.
#[derive(Debug, ClapArgs)]
pub struct DecodeArgs {
    /// Hex payloads, e.g. `800478` or `80 04 78`.
    #[arg(required = true)]
    payloads: Vec<String>,
    /// Application port the payloads were received on.
    #[arg(long, default_value_t = UPLINK_PORT)]
    port: u8,
    /// Decode time as unix seconds; defaults to now.
    #[arg(long)]
    timestamp: Option<i64>,
}

impl DecodeArgs {
    /// Creates decode arguments for the given hex payloads.
    #[must_use]
    pub fn new<I, S>(payloads: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            payloads: payloads.into_iter().map(Into::into).collect(),
            port: UPLINK_PORT,
            timestamp: None,
        }
    }

    /// Pins the decode time used for envelope timestamps.
    #[must_use]
    pub fn with_timestamp(mut self, unix_seconds: i64) -> Self {
        self.timestamp = Some(unix_seconds);
        self
    }

    pub(crate) fn payloads(&self) -> &[String] {
        &self.payloads
    }

    pub(crate) fn port(&self) -> u8 {
        self.port
    }

    pub(crate) fn timestamp(&self) -> Option<i64> {
        self.timestamp
    }
}

/// Firmware update subcommands.
#[derive(Debug, Subcommand)]
pub enum OtaCommand {
    /// Ingest a firmware file and print its session summary and START frame.
    Plan(OtaPlanArgs),
    /// Run a full update against a recording downlink and print every push.
    Run(OtaRunArgs),
}

/// Chunk sizing shared by the `ota` subcommands.
#[derive(Debug, Clone, Copy, Default, ClapArgs)]
pub struct ChunkSizing {
    /// Bytes per chunk.
    #[arg(long, conflicts_with = "spreading_factor")]
    chunk_size: Option<usize>,
    /// Pick the chunk size recommended for this spreading factor.
    #[arg(long, value_enum)]
    spreading_factor: Option<SpreadingFactor>,
}

impl ChunkSizing {
    /// Uses an explicit chunk size.
    #[must_use]
    pub fn fixed(chunk_size: usize) -> Self {
        Self {
            chunk_size: Some(chunk_size),
            spreading_factor: None,
        }
    }

    /// Resolves the chunk size, falling back to the default.
    #[must_use]
    pub fn resolve(self) -> usize {
        self.chunk_size
            .or_else(|| self.spreading_factor.map(SpreadingFactor::recommended_chunk_size))
            .unwrap_or(DEFAULT_CHUNK_SIZE)
    }
}

/// Arguments for `ota plan`.
#[derive(Debug, ClapArgs)]
pub struct OtaPlanArgs {
    /// Firmware file to ingest.
    file: PathBuf,
    #[command(flatten)]
    sizing: ChunkSizing,
}

impl OtaPlanArgs {
    /// Creates plan arguments.
    #[must_use]
    pub fn new(file: impl Into<PathBuf>, sizing: ChunkSizing) -> Self {
        Self {
            file: file.into(),
            sizing,
        }
    }

    pub(crate) fn file(&self) -> &PathBuf {
        &self.file
    }

    pub(crate) fn chunk_size(&self) -> usize {
        self.sizing.resolve()
    }
}

/// Arguments for `ota run`.
#[derive(Debug, ClapArgs)]
pub struct OtaRunArgs {
    /// Firmware file to send.
    file: PathBuf,
    /// Target device identifier.
    #[arg(long)]
    device_id: String,
    #[command(flatten)]
    sizing: ChunkSizing,
    /// Pause between chunks (e.g. `2s`, `500ms`).
    #[arg(long, value_parser = parse_duration, default_value = "2s")]
    delay: Duration,
    /// Make the recording downlink reject this chunk index.
    #[arg(long)]
    fail_at_chunk: Option<u16>,
}

impl OtaRunArgs {
    /// Creates run arguments with the default pacing delay.
    #[must_use]
    pub fn new(file: impl Into<PathBuf>, device_id: impl Into<String>, sizing: ChunkSizing) -> Self {
        Self {
            file: file.into(),
            device_id: device_id.into(),
            sizing,
            delay: DEFAULT_CHUNK_DELAY,
            fail_at_chunk: None,
        }
    }

    /// Overrides the pause between chunks.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Injects a push failure at a chunk index.
    #[must_use]
    pub fn with_fail_at_chunk(mut self, index: u16) -> Self {
        self.fail_at_chunk = Some(index);
        self
    }

    pub(crate) fn file(&self) -> &PathBuf {
        &self.file
    }

    pub(crate) fn device_id(&self) -> &str {
        &self.device_id
    }

    pub(crate) fn chunk_size(&self) -> usize {
        self.sizing.resolve()
    }

    pub(crate) fn delay(&self) -> Duration {
        self.delay
    }

    pub(crate) fn fail_at_chunk(&self) -> Option<u16> {
        self.fail_at_chunk
    }
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime::parse_duration(value).map_err(|error| error.to_string())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use clap::error::ErrorKind;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[test]
    fn decode_requires_a_payload() {
        let error = Args::try_parse_from(["fbglink", "decode"])
            .expect_err("decode without payloads should fail");
        assert_eq!(ErrorKind::MissingRequiredArgument, error.kind());
    }

    #[test]
    fn global_flags_parse_after_the_subcommand() {
        let args = Args::try_parse_from([
            "fbglink", "decode", "800478", "--output", "json", "--log-level", "debug",
        ])
        .expect("valid arguments should parse");

        assert_eq!(Some(OutputFormat::Json), args.output_format());
        assert_eq!(Some(LogLevel::Debug), args.log_level());
        assert_matches!(args.into_command(), Command::Decode(decode) if decode.port() == 1);
    }

    #[rstest]
    #[case(&["fbglink", "ota", "plan", "main.py"], 50)]
    #[case(&["fbglink", "ota", "plan", "main.py", "--chunk-size", "64"], 64)]
    #[case(&["fbglink", "ota", "plan", "main.py", "--spreading-factor", "sf7"], 200)]
    fn plan_resolves_chunk_size(#[case] argv: &[&str], #[case] expected: usize) {
        let args = Args::try_parse_from(argv).expect("valid arguments should parse");
        assert_matches!(
            args.into_command(),
            Command::Ota(OtaCommand::Plan(plan)) if plan.chunk_size() == expected
        );
    }

    #[test]
    fn chunk_size_conflicts_with_spreading_factor() {
        let error = Args::try_parse_from([
            "fbglink",
            "ota",
            "plan",
            "main.py",
            "--chunk-size",
            "10",
            "--spreading-factor",
            "sf9",
        ])
        .expect_err("conflicting sizing flags should fail");
        assert_eq!(ErrorKind::ArgumentConflict, error.kind());
    }

    #[test]
    fn run_parses_humantime_delay() {
        let args = Args::try_parse_from([
            "fbglink",
            "ota",
            "run",
            "main.py",
            "--device-id",
            "dev-1",
            "--delay",
            "250ms",
            "--fail-at-chunk",
            "3",
        ])
        .expect("valid arguments should parse");

        let Command::Ota(OtaCommand::Run(run)) = args.into_command() else {
            panic!("expected ota run");
        };
        assert_eq!(Duration::from_millis(250), run.delay());
        assert_eq!(Some(3), run.fail_at_chunk());
        assert_eq!("dev-1", run.device_id());
    }

    #[test]
    fn log_levels_map_to_filters() {
        assert_eq!(LevelFilter::OFF, LogLevel::Off.as_level_filter());
        assert_eq!(LevelFilter::TRACE, LogLevel::Trace.as_level_filter());
    }
}
