use super::structs::{ChannelRecord, ValueType};
use super::SmaError;

/// Named momentary values served by [`lookup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Measurement {
    AllActPowerFromGrid,
    AllActPowerToGrid,
    Phase1ActPowerFromGrid,
    Phase1ActPowerToGrid,
    Phase1Current,
    Phase1Voltage,
    Phase2ActPowerFromGrid,
    Phase2ActPowerToGrid,
    Phase2Current,
    Phase2Voltage,
    Phase3ActPowerFromGrid,
    Phase3ActPowerToGrid,
    Phase3Current,
    Phase3Voltage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    ActivePower,   // 0.1 W resolution
    Current,       // 1 mA resolution
    Voltage,       // 1 mV resolution
}

impl Quantity {
    pub fn unit(self) -> &'static str {
        match self {
            Quantity::ActivePower => "W",
            Quantity::Current => "A",
            Quantity::Voltage => "V",
        }
    }

    pub fn raw_unit(self) -> &'static str {
        match self {
            Quantity::ActivePower => "dW",
            Quantity::Current => "mA",
            Quantity::Voltage => "mV",
        }
    }

    pub fn divisor(self) -> u64 {
        match self {
            Quantity::ActivePower => 10,
            Quantity::Current | Quantity::Voltage => 1000,
        }
    }
}

impl Measurement {
    pub const ALL: [Measurement; 14] = [
        Measurement::AllActPowerFromGrid,
        Measurement::AllActPowerToGrid,
        Measurement::Phase1ActPowerFromGrid,
        Measurement::Phase1ActPowerToGrid,
        Measurement::Phase1Current,
        Measurement::Phase1Voltage,
        Measurement::Phase2ActPowerFromGrid,
        Measurement::Phase2ActPowerToGrid,
        Measurement::Phase2Current,
        Measurement::Phase2Voltage,
        Measurement::Phase3ActPowerFromGrid,
        Measurement::Phase3ActPowerToGrid,
        Measurement::Phase3Current,
        Measurement::Phase3Voltage,
    ];

    /// Measurement index (OBIS C field) of the value in the channel list.
    pub fn index(self) -> u8 {
        match self {
            Measurement::AllActPowerFromGrid => 1,
            Measurement::AllActPowerToGrid => 2,
            Measurement::Phase1ActPowerFromGrid => 21,
            Measurement::Phase1ActPowerToGrid => 22,
            Measurement::Phase1Current => 31,
            Measurement::Phase1Voltage => 32,
            Measurement::Phase2ActPowerFromGrid => 41,
            Measurement::Phase2ActPowerToGrid => 42,
            Measurement::Phase2Current => 51,
            Measurement::Phase2Voltage => 52,
            Measurement::Phase3ActPowerFromGrid => 61,
            Measurement::Phase3ActPowerToGrid => 62,
            Measurement::Phase3Current => 71,
            Measurement::Phase3Voltage => 72,
        }
    }

    pub fn quantity(self) -> Quantity {
        match self {
            Measurement::Phase1Current | Measurement::Phase2Current | Measurement::Phase3Current => Quantity::Current,
            Measurement::Phase1Voltage | Measurement::Phase2Voltage | Measurement::Phase3Voltage => Quantity::Voltage,
            _ => Quantity::ActivePower,
        }
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Measurement::ALL.iter().copied().find(|m| m.index() == index)
    }

    /// Field name used in exported documents.
    pub fn key(self) -> &'static str {
        match self {
            Measurement::AllActPowerFromGrid => "active_power_from_grid",
            Measurement::AllActPowerToGrid => "active_power_to_grid",
            Measurement::Phase1ActPowerFromGrid => "active_power_from_grid_l1",
            Measurement::Phase1ActPowerToGrid => "active_power_to_grid_l1",
            Measurement::Phase1Current => "current_l1",
            Measurement::Phase1Voltage => "voltage_l1",
            Measurement::Phase2ActPowerFromGrid => "active_power_from_grid_l2",
            Measurement::Phase2ActPowerToGrid => "active_power_to_grid_l2",
            Measurement::Phase2Current => "current_l2",
            Measurement::Phase2Voltage => "voltage_l2",
            Measurement::Phase3ActPowerFromGrid => "active_power_from_grid_l3",
            Measurement::Phase3ActPowerToGrid => "active_power_to_grid_l3",
            Measurement::Phase3Current => "current_l3",
            Measurement::Phase3Voltage => "voltage_l3",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaledValue {
    pub unit: &'static str,
    pub value: u64,
}

/// Raw value of the first momentary record matching the measurement.
/// Repeated records with the same index are ignored.
pub fn raw_value(records: &[ChannelRecord], measurement: Measurement) -> Result<u64, SmaError> {
    records
        .iter()
        .find(|r| r.value_type == ValueType::Actual && r.index == measurement.index())
        .map(|r| r.value)
        .ok_or(SmaError::MeasurementNotFound(measurement))
}

/// Looks up a measurement and scales it to its physical unit. The division
/// truncates, a voltage of 230.999 V reads as 230 V.
pub fn lookup(records: &[ChannelRecord], measurement: Measurement) -> Result<ScaledValue, SmaError> {
    let raw = raw_value(records, measurement)?;
    let quantity = measurement.quantity();

    Ok(ScaledValue {
        unit: quantity.unit(),
        value: raw / quantity.divisor(),
    })
}
