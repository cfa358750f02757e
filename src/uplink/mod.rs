mod boot_event;
mod builder;
mod decoder;
mod header;
mod metric_key;
mod registry;
mod stream;
mod transform;

pub use self::boot_event::{BootTimestampError, parse_boot_timestamp};
pub use self::builder::UplinkFrameBuilder;
pub use self::decoder::{DecodeResult, EnvelopeData, FormatterEnvelope, UplinkDecoder};
pub use self::header::{FrameHeader, HeaderDecodeError, Line, Phase, PositionContext, Side};
pub use self::metric_key::{FixedMetric, MetricKey, Quantity, Statistic};
pub use self::registry::{MetricDescriptor, MetricId, NameTemplate, ValueCategory, metric_descriptor};
pub use self::stream::{
    BOOT_EVENT_LEN, BOOT_EVENT_METRIC_ID, MetricRecord, MetricStream, RawValue, StreamError,
    split_opcode, value_len_for_code,
};
pub use self::transform::{MetricValue, TEMPERATURE_OFFSET, transform_value};
