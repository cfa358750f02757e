use std::collections::HashMap;
use std::sync::LazyLock;

use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

use super::header::PositionContext;
use super::metric_key::{FixedMetric, MetricKey, Quantity, Statistic};

/// Metric ids assigned in the uplink record table.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, EnumIter, Display)]
pub enum MetricId {
    #[strum(to_string = "tension_avg")]
    TensionAvg,
    #[strum(to_string = "tension_max")]
    TensionMax,
    #[strum(to_string = "tension_min")]
    TensionMin,
    #[strum(to_string = "temperature_avg")]
    TemperatureAvg,
    #[strum(to_string = "temperature_max")]
    TemperatureMax,
    #[strum(to_string = "temperature_min")]
    TemperatureMin,
    #[strum(to_string = "battery_level")]
    BatteryLevel,
    #[strum(to_string = "uart_channel_state")]
    UartChannelState,
    #[strum(to_string = "lora_channel_state")]
    LoraChannelState,
    #[strum(to_string = "nbiot_channel_state")]
    NbIotChannelState,
    #[strum(to_string = "tension_alarm_low")]
    TensionAlarmLow,
    #[strum(to_string = "tension_alarm_high")]
    TensionAlarmHigh,
    #[strum(to_string = "tension_warning_low")]
    TensionWarningLow,
    #[strum(to_string = "tension_warning_high")]
    TensionWarningHigh,
    #[strum(to_string = "low_battery_alarm")]
    LowBatteryAlarm,
    #[strum(to_string = "uart_channel_off")]
    UartChannelOff,
    #[strum(to_string = "lora_channel_off")]
    LoraChannelOff,
    #[strum(to_string = "nbiot_channel_off")]
    NbIotChannelOff,
    #[strum(to_string = "boot_event")]
    BootEvent,
}

impl MetricId {
    /// Returns the 6-bit wire id.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::TensionAvg => 1,
            Self::TensionMax => 2,
            Self::TensionMin => 3,
            Self::TemperatureAvg => 4,
            Self::TemperatureMax => 5,
            Self::TemperatureMin => 6,
            Self::BatteryLevel => 7,
            Self::UartChannelState => 8,
            Self::LoraChannelState => 9,
            Self::NbIotChannelState => 10,
            Self::TensionAlarmLow => 32,
            Self::TensionAlarmHigh => 33,
            Self::TensionWarningLow => 34,
            Self::TensionWarningHigh => 35,
            Self::LowBatteryAlarm => 36,
            Self::UartChannelOff => 37,
            Self::LoraChannelOff => 38,
            Self::NbIotChannelOff => 39,
            Self::BootEvent => 40,
        }
    }

    /// Resolves a wire id, if it is assigned.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        METRICS_BY_CODE.get(&code).map(MetricDescriptor::id)
    }
}

/// How a metric's raw value is interpreted.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Display)]
pub enum ValueCategory {
    #[strum(to_string = "numeric")]
    Numeric,
    #[strum(to_string = "text")]
    Text,
}

/// Name template for one metric id.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum NameTemplate {
    /// Name is built from the frame position.
    Positional {
        quantity: Quantity,
        statistic: Statistic,
    },
    /// Name is independent of position.
    Fixed(FixedMetric),
}

impl NameTemplate {
    /// Resolves the template against a frame position.
    #[must_use]
    pub const fn resolve(self, position: PositionContext) -> MetricKey {
        match self {
            Self::Positional {
                quantity,
                statistic,
            } => MetricKey::positional(position, quantity, statistic),
            Self::Fixed(metric) => MetricKey::Fixed(metric),
        }
    }
}

/// Registry entry for one assigned metric id.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct MetricDescriptor {
    id: MetricId,
    template: NameTemplate,
    category: ValueCategory,
}

impl MetricDescriptor {
    /// Typed metric id.
    #[must_use]
    pub const fn id(&self) -> MetricId {
        self.id
    }

    /// Name template.
    #[must_use]
    pub const fn template(&self) -> NameTemplate {
        self.template
    }

    /// Value category.
    #[must_use]
    pub const fn category(&self) -> ValueCategory {
        self.category
    }
}

static METRICS_BY_CODE: LazyLock<HashMap<u8, MetricDescriptor>> = LazyLock::new(|| {
    MetricId::iter()
        .map(|id| (id.code(), descriptor_for(id)))
        .collect()
});

/// Looks up the registry entry for a wire id.
///
/// ```
/// use fbglink::{MetricId, ValueCategory, metric_descriptor};
///
/// let boot = metric_descriptor(40).expect("id 40 is assigned");
/// assert_eq!(MetricId::BootEvent, boot.id());
/// assert_eq!(ValueCategory::Text, boot.category());
/// assert!(metric_descriptor(11).is_none());
/// ```
#[must_use]
pub fn metric_descriptor(code: u8) -> Option<MetricDescriptor> {
    METRICS_BY_CODE.get(&code).copied()
}

const fn positional(id: MetricId, quantity: Quantity, statistic: Statistic) -> MetricDescriptor {
    MetricDescriptor {
        id,
        template: NameTemplate::Positional {
            quantity,
            statistic,
        },
        category: ValueCategory::Numeric,
    }
}

const fn fixed(id: MetricId, metric: FixedMetric, category: ValueCategory) -> MetricDescriptor {
    MetricDescriptor {
        id,
        template: NameTemplate::Fixed(metric),
        category,
    }
}

fn descriptor_for(id: MetricId) -> MetricDescriptor {
    use ValueCategory::{Numeric, Text};

    match id {
        MetricId::TensionAvg => positional(id, Quantity::Tension, Statistic::Avg),
        MetricId::TensionMax => positional(id, Quantity::Tension, Statistic::Max),
        MetricId::TensionMin => positional(id, Quantity::Tension, Statistic::Min),
        MetricId::TemperatureAvg => positional(id, Quantity::Temperature, Statistic::Avg),
        MetricId::TemperatureMax => positional(id, Quantity::Temperature, Statistic::Max),
        MetricId::TemperatureMin => positional(id, Quantity::Temperature, Statistic::Min),
        MetricId::BatteryLevel => fixed(id, FixedMetric::BatteryLevel, Numeric),
        MetricId::UartChannelState => fixed(id, FixedMetric::UartChannelState, Numeric),
        MetricId::LoraChannelState => fixed(id, FixedMetric::LoraChannelState, Numeric),
        MetricId::NbIotChannelState => fixed(id, FixedMetric::NbIotChannelState, Numeric),
        MetricId::TensionAlarmLow => positional(id, Quantity::TensionAlarm, Statistic::Min),
        MetricId::TensionAlarmHigh => positional(id, Quantity::TensionAlarm, Statistic::Max),
        MetricId::TensionWarningLow => positional(id, Quantity::TensionWarning, Statistic::Min),
        MetricId::TensionWarningHigh => positional(id, Quantity::TensionWarning, Statistic::Max),
        MetricId::LowBatteryAlarm => fixed(id, FixedMetric::LowBatteryAlarm, Numeric),
        MetricId::UartChannelOff => fixed(id, FixedMetric::UartChannelOff, Numeric),
        MetricId::LoraChannelOff => fixed(id, FixedMetric::LoraChannelOff, Numeric),
        MetricId::NbIotChannelOff => fixed(id, FixedMetric::NbIotChannelOff, Numeric),
        MetricId::BootEvent => fixed(id, FixedMetric::StartUpDevice, Text),
    }
}
