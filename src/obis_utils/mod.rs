use crate::metering_sma::structs::ValueType;

/// Line a measurement index belongs to. SMA meters repeat the per phase
/// block in steps of 20 starting at index 21.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    Total,
    L1,
    L2,
    L3,
}

impl Line {
    fn suffix(self) -> &'static str {
        match self {
            Line::Total => "total",
            Line::L1 => "L1",
            Line::L2 => "L2",
            Line::L3 => "L3",
        }
    }
}

/// Splits an index into its line and the index within the block.
pub fn split_index(index: u8) -> (Line, u8) {
    match index {
        21..=40 => (Line::L1, index - 20),
        41..=60 => (Line::L2, index - 40),
        61..=80 => (Line::L3, index - 60),
        _ => (Line::Total, index),
    }
}

fn base_description(base: u8, value_type: ValueType) -> Option<&'static str> {
    let description = match (base, value_type) {
        (1, ValueType::Actual) => "Active power +",
        (1, ValueType::Counter) => "Active energy +",
        (2, ValueType::Actual) => "Active power -",
        (2, ValueType::Counter) => "Active energy -",
        (3, ValueType::Actual) => "Reactive power +",
        (3, ValueType::Counter) => "Reactive energy +",
        (4, ValueType::Actual) => "Reactive power -",
        (4, ValueType::Counter) => "Reactive energy -",
        (9, ValueType::Actual) => "Apparent power +",
        (9, ValueType::Counter) => "Apparent energy +",
        (10, ValueType::Actual) => "Apparent power -",
        (10, ValueType::Counter) => "Apparent energy -",
        (11, ValueType::Actual) => "Current",
        (12, ValueType::Actual) => "Voltage",
        (13, ValueType::Actual) => "Power factor",
        (14, ValueType::Actual) => "Supply frequency",
        _ => return None,
    };
    Some(description)
}

pub fn get_obis_description(index: u8, value_type: ValueType) -> Option<String> {
    let (line, base) = split_index(index);

    /* Current and voltage only exist per phase, frequency only as total */
    match (line, base) {
        (Line::Total, 11) | (Line::Total, 12) => return None,
        (Line::L1, 14) | (Line::L2, 14) | (Line::L3, 14) => return None,
        _ => {}
    }

    base_description(base, value_type).map(|d| format!("{} ({})", d, line.suffix()))
}

/// Resolution of the raw value as transmitted.
pub fn get_raw_unit(index: u8, value_type: ValueType) -> Option<&'static str> {
    let (line, base) = split_index(index);

    let unit = match (base, value_type) {
        (1, ValueType::Actual) | (2, ValueType::Actual) => "dW",
        (1, ValueType::Counter) | (2, ValueType::Counter) => "Ws",
        (3, ValueType::Actual) | (4, ValueType::Actual) => "dvar",
        (3, ValueType::Counter) | (4, ValueType::Counter) => "vars",
        (9, ValueType::Actual) | (10, ValueType::Actual) => "dVA",
        (9, ValueType::Counter) | (10, ValueType::Counter) => "VAs",
        (11, ValueType::Actual) if line != Line::Total => "mA",
        (12, ValueType::Actual) if line != Line::Total => "mV",
        (13, ValueType::Actual) => "0.001",
        (14, ValueType::Actual) if line == Line::Total => "mHz",
        _ => return None,
    };
    Some(unit)
}
