use std::fmt::{self, Display, Formatter};

use serde_with::SerializeDisplay;
use strum_macros::{Display, EnumIter};

use super::header::PositionContext;

/// Quantity measured at one sensor position.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, EnumIter, Display)]
pub enum Quantity {
    /// Cable tension, in kN.
    #[strum(to_string = "tension")]
    Tension,
    /// Conductor temperature, in °C.
    #[strum(to_string = "temperature")]
    Temperature,
    /// Tension alarm flag raised by the device.
    #[strum(to_string = "tension_alarm")]
    TensionAlarm,
    /// Tension warning flag raised by the device.
    #[strum(to_string = "tension_warning")]
    TensionWarning,
}

/// Aggregate reported over one sampling window.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, EnumIter, Display)]
pub enum Statistic {
    #[strum(to_string = "avg")]
    Avg,
    #[strum(to_string = "max")]
    Max,
    #[strum(to_string = "min")]
    Min,
}

/// Device-wide metrics whose names do not depend on position.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, EnumIter, Display)]
pub enum FixedMetric {
    #[strum(to_string = "ALG_FBG_Liv_Batteria")]
    BatteryLevel,
    #[strum(to_string = "ALG_FBG_Stato_Canale_UART")]
    UartChannelState,
    #[strum(to_string = "ALG_FBG_Stato_Canale_Lora")]
    LoraChannelState,
    #[strum(to_string = "ALG_FBG_Stato_Canale_NBIoT")]
    NbIotChannelState,
    #[strum(to_string = "ALG_FBG_Alm_Batteria_Bassa")]
    LowBatteryAlarm,
    #[strum(to_string = "ALG_FBG_Canale_UART_OFF")]
    UartChannelOff,
    #[strum(to_string = "ALG_FBG_Canale_Lora_OFF")]
    LoraChannelOff,
    #[strum(to_string = "ALG_FBG_Canale_NBIoT_OFF")]
    NbIotChannelOff,
    #[strum(to_string = "ALG_FBG_Start_Up_Device")]
    StartUpDevice,
}

const CALC_SUFFIX: &str = "calc";

/// Typed metric name, rendered to the platform's string key via `Display`.
///
/// ```
/// use fbglink::{FixedMetric, Line, MetricKey, Phase, PositionContext, Quantity, Side, Statistic};
///
/// let position = PositionContext::new(Phase::Twelve, Side::A, Line::One);
/// let alarm = MetricKey::positional(position, Quantity::TensionAlarm, Statistic::Min);
/// assert_eq!("ALG_FBG_Alm_Tiro_Bassa_F12A_L1.calc", alarm.to_string());
///
/// let battery = MetricKey::Fixed(FixedMetric::BatteryLevel);
/// assert_eq!("ALG_FBG_Liv_Batteria.calc", battery.to_string());
/// ```
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, SerializeDisplay)]
pub enum MetricKey {
    /// Metric scoped to the frame's mounting position.
    Positional {
        position: PositionContext,
        quantity: Quantity,
        statistic: Statistic,
    },
    /// Device-wide metric.
    Fixed(FixedMetric),
}

impl MetricKey {
    /// Creates a position-scoped key.
    #[must_use]
    pub const fn positional(
        position: PositionContext,
        quantity: Quantity,
        statistic: Statistic,
    ) -> Self {
        Self::Positional {
            position,
            quantity,
            statistic,
        }
    }
}

impl Display for MetricKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Fixed(metric) => write!(f, "{metric}.{CALC_SUFFIX}"),
            Self::Positional {
                position,
                quantity,
                statistic,
            } => match quantity {
                Quantity::Tension => write!(f, "SENS_FBG_TC_{position}.{statistic}"),
                Quantity::Temperature => write!(f, "SENS_FBG_Temp_{position}.{statistic}"),
                Quantity::TensionAlarm => {
                    let level = if statistic == Statistic::Min {
                        "Bassa"
                    } else {
                        "Alta"
                    };
                    write!(f, "ALG_FBG_Alm_Tiro_{level}_{position}.{CALC_SUFFIX}")
                }
                Quantity::TensionWarning => {
                    let level = if statistic == Statistic::Min {
                        "Min"
                    } else {
                        "Max"
                    };
                    write!(f, "ALG_FBG_Warn_Tiro_{level}_{position}.{CALC_SUFFIX}")
                }
            },
        }
    }
}
