use std::fmt::{self, Display, Formatter};

use tokio::time::Instant;

use crate::downlink::RecordedPush;
use crate::ota::{DownlinkCommand, OtaSession, OtaState, SessionSummary};

use super::painter::Painter;
use super::table::Table;
use super::value::{Bytes, Digest, HexBytes, NoneOr, YesNo};

const PLAN_PREVIEW_ROWS: usize = 8;

/// Renders a session summary as a key-value table.
pub(crate) struct SessionView<'a> {
    summary: &'a SessionSummary,
    painter: &'a Painter,
}

impl<'a> SessionView<'a> {
    pub(crate) fn new(summary: &'a SessionSummary, painter: &'a Painter) -> Self {
        Self { summary, painter }
    }

    fn status(&self) -> String {
        let status = self.summary.status().to_string();
        match self.summary.status() {
            OtaState::Completed => self.painter.success(status),
            OtaState::Error | OtaState::Aborted => self.painter.warning(status),
            _ => self.painter.value(status),
        }
    }
}

impl Display for SessionView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let summary = self.summary;
        let mut rows = vec![
            ("session", self.painter.value(summary.session_id().as_str())),
            ("name", NoneOr(summary.name()).to_string()),
            ("size", Bytes(summary.size()).to_string()),
            ("chunk_size", Bytes(summary.chunk_size()).to_string()),
            ("chunks", summary.total_chunks().to_string()),
            ("sha256", Digest(&summary.sha256()).to_string()),
            ("status", self.status()),
        ];
        if let Some(device_id) = summary.device_id() {
            rows.push(("device", device_id.to_string()));
        }
        if let Some(index) = summary.failed_chunk() {
            rows.push(("failed_chunk", self.painter.warning(index.to_string())));
        }
        if let Some(error) = summary.last_error() {
            rows.push(("last_error", self.painter.warning(error)));
        }
        write!(f, "{}", Table::key_value(self.painter, rows))
    }
}

/// Renders the chunk partition and START frame of a freshly ingested session.
pub(crate) struct ChunkPlanView<'a> {
    session: &'a OtaSession,
    painter: &'a Painter,
}

impl<'a> ChunkPlanView<'a> {
    pub(crate) fn new(session: &'a OtaSession, painter: &'a Painter) -> Self {
        Self { session, painter }
    }
}

impl Display for ChunkPlanView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let start = DownlinkCommand::Start {
            chunk_count: self.session.chunk_count(),
            digest: self.session.digest(),
        }
        .encode();

        let mut offset = 0usize;
        let mut rows = Vec::new();
        for (index, bytes) in self.session.chunks() {
            if rows.len() < PLAN_PREVIEW_ROWS {
                rows.push(vec![
                    index.to_string(),
                    offset.to_string(),
                    bytes.len().to_string(),
                ]);
            }
            offset += bytes.len();
        }

        write!(f, "{}", self.painter.heading("START frame:"))?;
        write!(f, "\n{}", HexBytes(&start))?;
        write!(f, "\n\n{}", self.painter.heading("Chunks:"))?;
        write!(f, "\n{}", Table::grid(["index", "offset", "bytes"], rows))?;
        let hidden = usize::from(self.session.chunk_count()).saturating_sub(PLAN_PREVIEW_ROWS);
        if hidden > 0 {
            write!(f, "\n{}", self.painter.muted(format!("... {hidden} more")))?;
        }
        Ok(())
    }
}

/// Renders the downlink pushes recorded during a run.
pub(crate) struct PushLogView<'a> {
    pushes: &'a [RecordedPush],
    started: Instant,
    painter: &'a Painter,
}

impl<'a> PushLogView<'a> {
    pub(crate) fn new(pushes: &'a [RecordedPush], started: Instant, painter: &'a Painter) -> Self {
        Self {
            pushes,
            started,
            painter,
        }
    }
}

impl Display for PushLogView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let rows = self
            .pushes
            .iter()
            .map(|push| {
                let delivered = if push.delivered() {
                    YesNo(true).to_string()
                } else {
                    self.painter.warning(YesNo(false).to_string())
                };
                vec![
                    humantime::format_duration(push.at().saturating_duration_since(self.started))
                        .to_string(),
                    command_label(push),
                    push.frame().port().to_string(),
                    YesNo(push.frame().confirmed()).to_string(),
                    push.priority().to_string(),
                    push.frame().payload().len().to_string(),
                    delivered,
                ]
            })
            .collect();
        write!(
            f,
            "{}",
            Table::grid(
                ["at", "command", "port", "confirmed", "priority", "bytes", "delivered"],
                rows
            )
        )
    }
}

fn command_label(push: &RecordedPush) -> String {
    match push.command() {
        Some(DownlinkCommand::Chunk { index, .. }) => format!("chunk {index}"),
        Some(command) => command.code().to_string(),
        None => "<malformed>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use super::*;
    use crate::ota::{FirmwareFile, IngestLimits, SessionId};

    fn session() -> OtaSession {
        OtaSession::ingest(
            SessionId::new("session-1-0"),
            FirmwareFile::named("main.py", b"hello".to_vec()),
            2,
            &IngestLimits::default(),
        )
        .expect("fixture should ingest")
    }

    #[test]
    fn plan_lists_chunk_offsets() {
        let session = session();
        let painter = Painter::new(false);

        let rendered = ChunkPlanView::new(&session, &painter).to_string();

        assert_snapshot!(rendered.split_once("Chunks:\n").map(|(_, table)| table).unwrap_or_default(), @r"
        ╭───────┬────────┬───────╮
        │ index │ offset │ bytes │
        ├───────┼────────┼───────┤
        │ 0     │ 0      │ 2     │
        │ 1     │ 2      │ 2     │
        │ 2     │ 4      │ 1     │
        ╰───────┴────────┴───────╯
        ");
        assert!(rendered.starts_with("START frame:\n01 00 03 2C F2 4D BA"));
    }

    #[test]
    fn session_view_shows_ready_session() {
        let session = session();
        let summary = session.summary();
        let painter = Painter::new(false);

        let rendered = SessionView::new(&summary, &painter).to_string();

        assert!(rendered.contains("│ status     │ ready"));
        assert!(rendered.contains("│ name       │ main.py"));
        assert!(!rendered.contains("failed_chunk"));
    }
}
