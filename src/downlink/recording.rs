use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bon::Builder;
use tokio::time::{Instant, sleep};
use tracing::{debug, instrument};

use super::push::{DownlinkError, DownlinkFrame, DownlinkPriority, DownlinkPush};
use crate::ota::DownlinkCommand;
use crate::protocol::CommandCode;

/// One push attempt observed by [`RecordingDownlink`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RecordedPush {
    device_id: String,
    frame: DownlinkFrame,
    priority: DownlinkPriority,
    at: Instant,
    delivered: bool,
}

impl RecordedPush {
    /// Target device.
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Frame handed to the push primitive.
    #[must_use]
    pub fn frame(&self) -> &DownlinkFrame {
        &self.frame
    }

    /// Priority the frame was queued with.
    #[must_use]
    pub fn priority(&self) -> DownlinkPriority {
        self.priority
    }

    /// When the attempt reached the push primitive.
    #[must_use]
    pub fn at(&self) -> Instant {
        self.at
    }

    /// Whether the attempt succeeded.
    #[must_use]
    pub fn delivered(&self) -> bool {
        self.delivered
    }

    /// Decoded command, when the payload is a well-formed update command.
    #[must_use]
    pub fn command(&self) -> Option<DownlinkCommand<'_>> {
        DownlinkCommand::decode(self.frame.payload()).ok()
    }
}

/// In-process push primitive that records every attempt.
///
/// Stands in for the network server in tests and CLI dry runs. Failures can be
/// injected at a given attempt or at a given chunk index.
#[derive(Debug, Default, Builder)]
pub struct RecordingDownlink {
    /// Simulated network latency per push.
    #[builder(default)]
    latency: Duration,
    /// Zero-based attempt number that fails.
    fail_at_push: Option<usize>,
    /// Chunk index whose CHUNK push fails.
    fail_at_chunk: Option<u16>,
    #[builder(skip)]
    pushes: Mutex<Vec<RecordedPush>>,
}

impl RecordingDownlink {
    /// Returns every recorded attempt, in order.
    #[must_use]
    pub fn pushes(&self) -> Vec<RecordedPush> {
        self.lock().clone()
    }

    /// Returns the command codes of all attempts.
    #[must_use]
    pub fn command_codes(&self) -> Vec<CommandCode> {
        self.lock()
            .iter()
            .filter_map(|push| push.command().map(|command| command.code()))
            .collect()
    }

    /// Returns the indices of all attempted CHUNK pushes.
    #[must_use]
    pub fn chunk_indices(&self) -> Vec<u16> {
        self.lock()
            .iter()
            .filter_map(|push| match push.command() {
                Some(DownlinkCommand::Chunk { index, .. }) => Some(index),
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RecordedPush>> {
        self.pushes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn should_fail(&self, attempt: usize, frame: &DownlinkFrame) -> bool {
        if self.fail_at_push == Some(attempt) {
            return true;
        }
        match (self.fail_at_chunk, DownlinkCommand::decode(frame.payload())) {
            (Some(target), Ok(DownlinkCommand::Chunk { index, .. })) => index == target,
            _ => false,
        }
    }
}

#[async_trait]
impl DownlinkPush for RecordingDownlink {
    #[instrument(skip(self, frame), level = "trace", fields(port = frame.port(), len = frame.payload().len()))]
    async fn push(&self, device_id: &str, frame: &DownlinkFrame) -> Result<(), DownlinkError> {
        if !self.latency.is_zero() {
            sleep(self.latency).await;
        }

        let attempt = {
            let mut pushes = self.lock();
            let attempt = pushes.len();
            let delivered = !self.should_fail(attempt, frame);
            pushes.push(RecordedPush {
                device_id: device_id.to_string(),
                frame: frame.clone(),
                priority: frame.priority(),
                at: Instant::now(),
                delivered,
            });
            if delivered {
                return Ok(());
            }
            attempt
        };

        debug!(attempt, "injected downlink failure");
        Err(DownlinkError::Rejected {
            device_id: device_id.to_string(),
            reason: format!("injected failure at push {attempt}"),
        })
    }
}
