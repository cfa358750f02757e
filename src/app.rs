use std::io;

use anyhow::Result;
use tracing::instrument;

use crate::cli::{Command, LogLevel, OtaCommand, OutputFormat};
use crate::telemetry;
use crate::terminal::{SystemTerminalClient, TerminalClient};

const SERVICE_NAME: &str = "fbglink";

/// Runs a CLI command against the real terminal.
///
/// ```
/// # async fn run() -> anyhow::Result<()> {
/// use clap::Parser;
///
/// let args = fbglink::Args::try_parse_from(["fbglink", "decode", "800478"])?;
/// let log_level = args.log_level();
/// let mut out = Vec::new();
/// fbglink::run(args.into_command(), &mut out, log_level, fbglink::OutputFormat::Json).await?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, the command fails, or
/// output writing fails.
pub async fn run<W>(
    command: Command,
    out: &mut W,
    log_level: Option<LogLevel>,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    run_with_clients(command, out, &SystemTerminalClient, log_level, output_format).await
}

/// Runs a CLI command with an injected terminal client.
///
/// ```
/// # async fn run() -> anyhow::Result<()> {
/// struct Pipe;
/// impl fbglink::TerminalClient for Pipe {
///     fn stdout_is_terminal(&self) -> bool { false }
///     fn stderr_is_terminal(&self) -> bool { false }
/// }
///
/// let command = fbglink::Command::Decode(fbglink::DecodeArgs::new(["801003"]));
/// let mut out = Vec::new();
/// fbglink::run_with_clients(command, &mut out, &Pipe, None, fbglink::OutputFormat::Pretty).await?;
/// assert!(String::from_utf8(out)?.contains("SENS_FBG_Temp_F4A_L1.avg"));
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, the command fails, or
/// output writing fails.
#[instrument(
    skip(command, out, terminal_client),
    level = "info",
    fields(command = command_name(&command), ?log_level, ?output_format)
)]
pub async fn run_with_clients<W>(
    command: Command,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    log_level: Option<LogLevel>,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    telemetry::initialise_tracing(
        SERVICE_NAME,
        terminal_client.stderr_is_terminal(),
        log_level.map(LogLevel::as_level_filter),
    )?;

    match &command {
        Command::Decode(args) => crate::cli::decode::run(args, out, terminal_client, output_format),
        Command::Ota(ota) => crate::cli::ota::run(ota, out, terminal_client, output_format).await,
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Decode(_args) => "decode",
        Command::Ota(OtaCommand::Plan(_args)) => "ota plan",
        Command::Ota(OtaCommand::Run(_args)) => "ota run",
    }
}
