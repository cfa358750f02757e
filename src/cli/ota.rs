use std::io;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, instrument};

use crate::cli::{OtaCommand, OtaPlanArgs, OtaRunArgs, OutputFormat, write_json_line};
use crate::downlink::{
    DownlinkFrame, DownlinkPriority, DownlinkPush, RecordedPush, RecordingDownlink,
};
use crate::error::{CliConfigError, OtaError};
use crate::ota::{DownlinkCommand, FirmwareFile, OtaConfig, OtaService, SessionSummary, TransmitOutcome};
use crate::terminal::TerminalClient;

use super::ui::{ChunkPlanView, Painter, PushLogView, SessionView};

/// JSON result emitted by the `ota` commands.
#[derive(Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum OtaResult<'a> {
    Plan {
        session: SessionSummary,
        start_frame: String,
    },
    Run {
        session: SessionSummary,
        outcome: RunOutcome,
        #[serde(skip_serializing_if = "Option::is_none")]
        chunks_sent: Option<u16>,
        #[serde(skip_serializing_if = "Option::is_none")]
        failed_index: Option<u16>,
        pushes: Vec<PushRecord<'a>>,
    },
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
enum RunOutcome {
    Completed,
    Cancelled,
    Failed,
}

#[derive(Serialize)]
struct PushRecord<'a> {
    offset_ms: u128,
    device_id: &'a str,
    frame: &'a DownlinkFrame,
    priority: DownlinkPriority,
    delivered: bool,
}

/// Executes an `ota` subcommand.
pub(crate) async fn run<W>(
    command: &OtaCommand,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    let painter = Painter::new(terminal_client.stdout_is_terminal());
    match command {
        OtaCommand::Plan(args) => plan(args, out, &painter, output_format),
        OtaCommand::Run(args) => rehearse(args, out, &painter, output_format).await,
    }
}

#[instrument(skip(args, out, painter), level = "info", fields(file = %args.file().display(), ?output_format))]
fn plan<W>(
    args: &OtaPlanArgs,
    out: &mut W,
    painter: &Painter,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    let service = OtaService::new(Arc::new(RecordingDownlink::default()), OtaConfig::default());
    let session = service.upload(read_firmware(args.file())?, Some(args.chunk_size()))?;

    match output_format {
        OutputFormat::Pretty => {
            writeln!(out, "{}", painter.heading("Session:"))?;
            writeln!(out, "{}", SessionView::new(&session.summary(), painter))?;
            writeln!(out)?;
            writeln!(out, "{}", ChunkPlanView::new(&session, painter))?;
        }
        OutputFormat::Json => {
            let start_frame = DownlinkCommand::Start {
                chunk_count: session.chunk_count(),
                digest: session.digest(),
            }
            .encode();
            write_json_line(
                out,
                &OtaResult::Plan {
                    session: session.summary(),
                    start_frame: hex::encode(start_frame),
                },
            )?;
        }
    }
    Ok(())
}

/// Drives upload, START and the paced chunk run against a recording
/// downlink. Ctrl+C aborts the session.
#[instrument(
    skip(args, out, painter),
    level = "info",
    fields(file = %args.file().display(), device_id = args.device_id(), ?output_format)
)]
async fn rehearse<W>(
    args: &OtaRunArgs,
    out: &mut W,
    painter: &Painter,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    let downlink = Arc::new(
        RecordingDownlink::builder()
            .maybe_fail_at_chunk(args.fail_at_chunk())
            .build(),
    );
    let config = OtaConfig::builder().chunk_delay(args.delay()).build();
    let service = OtaService::new(Arc::clone(&downlink) as Arc<dyn DownlinkPush>, config);
    let device_id = args.device_id();
    let started = Instant::now();

    let session = service.upload(read_firmware(args.file())?, Some(args.chunk_size()))?;
    let id = session.id().clone();
    service.start(&id, device_id).await?;

    let mut send = service.spawn_send_chunks(id.clone(), device_id.to_string());
    let sent = tokio::select! {
        joined = &mut send => joined?,
        signal = tokio::signal::ctrl_c() => {
            signal.map_err(|source| CliConfigError::CtrlC { source })?;
            info!("interrupted; aborting update");
            service.abort(device_id, Some(&id)).await?;
            send.await?
        }
    };

    let (outcome, chunks_sent, failed_index, failure) = match sent {
        Ok(TransmitOutcome::Completed { chunks_sent }) => {
            (RunOutcome::Completed, Some(chunks_sent), None, None)
        }
        Ok(TransmitOutcome::Cancelled { chunks_sent }) => {
            (RunOutcome::Cancelled, Some(chunks_sent), None, None)
        }
        Err(error @ OtaError::ChunkTransmission { index, .. }) => {
            (RunOutcome::Failed, None, Some(index), Some(error))
        }
        Err(error) => return Err(error.into()),
    };

    let summary = session.summary();
    let pushes = downlink.pushes();
    match output_format {
        OutputFormat::Pretty => {
            writeln!(out, "{}", painter.heading("Session:"))?;
            writeln!(out, "{}", SessionView::new(&summary, painter))?;
            writeln!(out)?;
            writeln!(out, "{}", painter.heading("Downlink pushes:"))?;
            writeln!(out, "{}", PushLogView::new(&pushes, started, painter))?;
            let total = summary.total_chunks();
            let sent = chunks_sent.unwrap_or_default();
            let line = match (outcome, failed_index) {
                (RunOutcome::Failed, Some(index)) => {
                    painter.warning(format!("Failed at chunk {index}"))
                }
                (RunOutcome::Cancelled, _) => {
                    painter.warning(format!("Cancelled after {sent}/{total} chunks"))
                }
                _ => painter.success(format!("Sent {sent}/{total} chunks")),
            };
            writeln!(out, "{line}")?;
        }
        OutputFormat::Json => {
            let pushes = pushes.iter().map(|push| push_record(push, started)).collect();
            write_json_line(
                out,
                &OtaResult::Run {
                    session: summary,
                    outcome,
                    chunks_sent,
                    failed_index,
                    pushes,
                },
            )?;
        }
    }

    match failure {
        Some(error) => Err(error.into()),
        None => Ok(()),
    }
}

fn push_record(push: &RecordedPush, started: Instant) -> PushRecord<'_> {
    PushRecord {
        offset_ms: push.at().saturating_duration_since(started).as_millis(),
        device_id: push.device_id(),
        frame: push.frame(),
        priority: push.priority(),
        delivered: push.delivered(),
    }
}

fn read_firmware(path: &Path) -> Result<FirmwareFile, CliConfigError> {
    let bytes = std::fs::read(path).map_err(|source| CliConfigError::ReadFirmware {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(match path.file_name().and_then(|name| name.to_str()) {
        Some(name) => FirmwareFile::named(name, bytes),
        None => FirmwareFile::new(bytes),
    })
}
