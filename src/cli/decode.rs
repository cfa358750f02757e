use std::io;

use anyhow::{Context, Result};
use time::OffsetDateTime;
use tracing::instrument;

use crate::cli::{DecodeArgs, OutputFormat, write_json_line};
use crate::protocol::{RawFrame, UPLINK_PORT};
use crate::terminal::TerminalClient;
use crate::uplink::UplinkDecoder;
use crate::utils::parse_hex_payload;

use super::ui::{DecodeView, Painter};

/// Executes the `decode` command.
///
/// Pretty output renders each frame as tables; JSON output emits the
/// formatter envelope for each frame.
#[instrument(skip(args, out, terminal_client), level = "info", fields(frames = args.payloads().len(), ?output_format))]
pub(crate) fn run<W>(
    args: &DecodeArgs,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    let decoded_at = match args.timestamp() {
        Some(seconds) => OffsetDateTime::from_unix_timestamp(seconds)
            .with_context(|| format!("`{seconds}` is not a valid unix timestamp"))?,
        None => OffsetDateTime::now_utc(),
    };
    if args.port() != UPLINK_PORT {
        tracing::warn!(port = args.port(), "payloads were not received on the telemetry port");
    }

    let painter = Painter::new(terminal_client.stdout_is_terminal());
    for (index, payload) in args.payloads().iter().enumerate() {
        let frame = RawFrame::new(args.port(), parse_hex_payload(payload)?);
        let result = UplinkDecoder::decode(&frame);
        match output_format {
            OutputFormat::Pretty => {
                if index > 0 {
                    writeln!(out)?;
                }
                writeln!(out, "{}", DecodeView::new(frame.payload(), &result, &painter))?;
            }
            OutputFormat::Json => write_json_line(out, &result.to_envelope(decoded_at))?,
        }
    }
    Ok(())
}
