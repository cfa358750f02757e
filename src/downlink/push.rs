use async_trait::async_trait;
use serde::Serialize;
use serde_with::{hex::Hex, serde_as};
use strum_macros::Display;
use thiserror::Error;

/// Errors reported by the network-server push primitive.
#[derive(Debug, Error)]
pub enum DownlinkError {
    #[error("network server rejected downlink for `{device_id}`: {reason}")]
    Rejected { device_id: String, reason: String },
    #[error("downlink push for `{device_id}` failed")]
    Transport {
        device_id: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Scheduling priority requested from the network server.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Display, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DownlinkPriority {
    #[strum(to_string = "HIGHEST")]
    Highest,
    #[strum(to_string = "NORMAL")]
    Normal,
}

/// One frame queued for delivery to a device.
#[serde_as]
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct DownlinkFrame {
    port: u8,
    #[serde_as(as = "Hex")]
    payload: Vec<u8>,
    confirmed: bool,
}

impl DownlinkFrame {
    /// Creates a frame.
    #[must_use]
    pub fn new(port: u8, payload: Vec<u8>, confirmed: bool) -> Self {
        Self {
            port,
            payload,
            confirmed,
        }
    }

    /// Application port.
    #[must_use]
    pub fn port(&self) -> u8 {
        self.port
    }

    /// Encoded command bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Whether the device must acknowledge the frame.
    #[must_use]
    pub fn confirmed(&self) -> bool {
        self.confirmed
    }

    /// Confirmed frames jump the queue; everything else goes out at normal priority.
    #[must_use]
    pub fn priority(&self) -> DownlinkPriority {
        if self.confirmed {
            DownlinkPriority::Highest
        } else {
            DownlinkPriority::Normal
        }
    }
}

/// Push primitive of the network server, as seen by the update service.
///
/// Implementations apply no timeout and no retry; one call is one attempt.
#[async_trait]
pub trait DownlinkPush: Send + Sync {
    /// Queues `frame` for delivery to `device_id`.
    async fn push(&self, device_id: &str, frame: &DownlinkFrame) -> Result<(), DownlinkError>;
}
