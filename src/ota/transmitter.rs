use std::time::Duration;

use thiserror::Error;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{Span, instrument, trace};
use tracing_indicatif::span_ext::IndicatifSpanExt;

use super::command::DownlinkCommand;
use super::session::OtaSession;
use crate::downlink::{DownlinkError, DownlinkPush};

/// Pause between consecutive CHUNK pushes when none is configured.
pub const DEFAULT_CHUNK_DELAY: Duration = Duration::from_millis(2000);

/// Errors returned while draining a session's chunks.
#[derive(Debug, Error)]
pub enum TransmitError {
    #[error("push of chunk {index} failed")]
    ChunkPush {
        index: u16,
        #[source]
        source: DownlinkError,
    },
}

impl TransmitError {
    /// Index of the chunk that failed.
    #[must_use]
    pub fn index(&self) -> u16 {
        match self {
            Self::ChunkPush { index, .. } => *index,
        }
    }
}

/// How a transmit run ended without a push failure.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum TransmitOutcome {
    /// Every chunk was handed to the push primitive.
    Completed { chunks_sent: u16 },
    /// The run stopped early because its cancellation token fired.
    Cancelled { chunks_sent: u16 },
}

impl TransmitOutcome {
    /// Number of chunks pushed successfully.
    #[must_use]
    pub fn chunks_sent(self) -> u16 {
        match self {
            Self::Completed { chunks_sent } | Self::Cancelled { chunks_sent } => chunks_sent,
        }
    }
}

/// Sends a session's chunks in index order, one at a time, with a fixed
/// pause between sends.
///
/// The first failed push stops the run. There is no retry and no resume: a
/// later run starts again from chunk 0.
#[derive(Clone, Copy)]
pub struct ChunkTransmitter<'a> {
    downlink: &'a dyn DownlinkPush,
    delay: Duration,
}

impl<'a> ChunkTransmitter<'a> {
    /// Creates a transmitter over a push primitive.
    #[must_use]
    pub fn new(downlink: &'a dyn DownlinkPush) -> Self {
        Self {
            downlink,
            delay: DEFAULT_CHUNK_DELAY,
        }
    }

    /// Overrides the pause between chunks.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Pushes every chunk of `session` to `device_id`.
    ///
    /// `cancel` is checked before each chunk and raced against each pause.
    ///
    /// # Errors
    ///
    /// Returns the index and cause of the first failed push.
    #[instrument(
        skip(self, session, cancel),
        level = "info",
        fields(
            session_id = %session.id(),
            chunks = session.chunk_count(),
            delay_ms = self.delay.as_millis(),
            progress = true
        )
    )]
    pub async fn transmit(
        &self,
        session: &OtaSession,
        device_id: &str,
        cancel: &CancellationToken,
    ) -> Result<TransmitOutcome, TransmitError> {
        let span = Span::current();
        let total = session.chunk_count();
        span.pb_set_length(u64::from(total));
        span.pb_set_message(&format!("Sending {total} chunks to {device_id}"));

        let mut chunks_sent = 0u16;
        for (index, bytes) in session.chunks() {
            if cancel.is_cancelled() {
                return Ok(self.cancelled(chunks_sent));
            }

            let frame = DownlinkCommand::Chunk { index, bytes }.to_frame();
            if let Err(source) = self.downlink.push(device_id, &frame).await {
                span.pb_set_finish_message(&format!("Chunk {index} failed"));
                return Err(TransmitError::ChunkPush { index, source });
            }
            chunks_sent += 1;
            span.pb_inc(1);
            trace!(index, len = bytes.len(), chunks_sent, total, "chunk queued");

            let is_last = chunks_sent == total;
            if !is_last && !self.pause(cancel).await {
                return Ok(self.cancelled(chunks_sent));
            }
        }

        span.pb_set_finish_message(&format!("Sent {chunks_sent} chunks"));
        Ok(TransmitOutcome::Completed { chunks_sent })
    }

    // Returns `false` when cancelled during the pause.
    async fn pause(&self, cancel: &CancellationToken) -> bool {
        if self.delay.is_zero() {
            return !cancel.is_cancelled();
        }
        tokio::select! {
            () = cancel.cancelled() => false,
            () = sleep(self.delay) => true,
        }
    }

    fn cancelled(&self, chunks_sent: u16) -> TransmitOutcome {
        Span::current().pb_set_finish_message(&format!("Cancelled after {chunks_sent} chunks"));
        trace!(chunks_sent, "transmit cancelled");
        TransmitOutcome::Cancelled { chunks_sent }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use tokio::time::Instant;

    use super::*;
    use crate::downlink::RecordingDownlink;
    use crate::ota::{FirmwareFile, IngestLimits, SessionId};

    fn session(len: usize, chunk_size: usize) -> OtaSession {
        OtaSession::ingest(
            SessionId::new("session-transmit"),
            FirmwareFile::new(vec![0xA5; len]),
            chunk_size,
            &IngestLimits::default(),
        )
        .expect("fixture should ingest")
    }

    #[tokio::test(start_paused = true)]
    async fn pushes_every_chunk_with_pauses_between() -> anyhow::Result<()> {
        let downlink = RecordingDownlink::default();
        let session = session(10, 4);
        let started = Instant::now();

        let outcome = ChunkTransmitter::new(&downlink)
            .transmit(&session, "dev", &CancellationToken::new())
            .await?;

        assert_eq!(TransmitOutcome::Completed { chunks_sent: 3 }, outcome);
        assert_eq!(vec![0, 1, 2], downlink.chunk_indices());
        let offsets: Vec<Duration> = downlink
            .pushes()
            .iter()
            .map(|push| push.at() - started)
            .collect();
        assert_eq!(
            vec![
                Duration::ZERO,
                DEFAULT_CHUNK_DELAY,
                DEFAULT_CHUNK_DELAY * 2
            ],
            offsets
        );
        assert_eq!(DEFAULT_CHUNK_DELAY * 2, started.elapsed());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn first_failure_stops_the_run() {
        let downlink = RecordingDownlink::builder().fail_at_chunk(1).build();
        let session = session(12, 3);

        let result = ChunkTransmitter::new(&downlink)
            .with_delay(Duration::from_millis(10))
            .transmit(&session, "dev", &CancellationToken::new())
            .await;

        assert_matches!(result, Err(ref error) if error.index() == 1);
        assert_eq!(vec![0, 1], downlink.chunk_indices());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_the_pause() -> anyhow::Result<()> {
        let downlink = RecordingDownlink::default();
        let session = session(8, 2);
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(500)).await;
            canceller.cancel();
        });

        let outcome = ChunkTransmitter::new(&downlink)
            .transmit(&session, "dev", &cancel)
            .await?;

        assert_eq!(TransmitOutcome::Cancelled { chunks_sent: 1 }, outcome);
        assert_eq!(vec![0], downlink.chunk_indices());
        Ok(())
    }

    #[tokio::test]
    async fn pre_cancelled_token_sends_nothing() -> anyhow::Result<()> {
        let downlink = RecordingDownlink::default();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = ChunkTransmitter::new(&downlink)
            .with_delay(Duration::ZERO)
            .transmit(&session(4, 1), "dev", &cancel)
            .await?;

        assert_eq!(0, outcome.chunks_sent());
        assert!(downlink.pushes().is_empty());
        Ok(())
    }
}
