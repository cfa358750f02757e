use std::io;

use serde::Serialize;

pub(crate) mod command;
pub(crate) mod decode;
pub(crate) mod ota;
pub(crate) mod ui;

pub use self::command::{
    Args, ChunkSizing, Command, DecodeArgs, LogLevel, OtaCommand, OtaPlanArgs, OtaRunArgs,
    OutputFormat,
};

pub(crate) fn write_json_line(out: &mut impl io::Write, value: &impl Serialize) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}
