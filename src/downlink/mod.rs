mod push;
mod recording;

pub use self::push::{DownlinkError, DownlinkFrame, DownlinkPriority, DownlinkPush};
pub use self::recording::{RecordedPush, RecordingDownlink};
