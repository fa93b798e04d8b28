use crate::config::OutputMode;
use crate::metering_sma::utils::header_fields;
use crate::metering_sma::{EmeterReading, Measurement, SmaError};
use crate::mqtt::MeteringData;
use log::{debug, error, info, warn};
use std::fmt::Write;
use tokio::sync::mpsc::Receiver;

#[cfg(feature = "mqtt")]
use crate::mqtt::MqttPublisher;

const SEPARATOR: &str = "---------------------------------------";
const END_LINE: &str = "------------------------------------------------------------------------------";

fn format_measurement(reading: &EmeterReading, label: &str, measurement: Measurement) -> String {
    match reading.lookup(measurement) {
        Ok(v) => format!("{:<14}[{}]: {}", label, v.unit, v.value),
        Err(e) => {
            debug!("{}", e);
            format!("{:<14}[{}]: n/a", label, measurement.quantity().unit())
        }
    }
}

/// Header and scaled values of one reading. Missing values print as `n/a`.
pub fn format_console_report(reading: &EmeterReading) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Receive message from {} with length {}", reading.source, reading.datagram_len);
    let _ = writeln!(out, "---HEADER:");
    let _ = writeln!(out, "{}", serde_json::Value::Object(header_fields(&reading.frame.header)));
    if reading.truncated {
        let _ = writeln!(out, "(channel list truncated, {} records kept)", reading.frame.records.len());
    }

    let _ = writeln!(out, "---MEASUREMENT VALUES:");
    let blocks: [&[(&str, Measurement)]; 3] = [
        &[
            ("From Grid ALL", Measurement::AllActPowerFromGrid),
            ("From Grid P1", Measurement::Phase1ActPowerFromGrid),
            ("From Grid P2", Measurement::Phase2ActPowerFromGrid),
            ("From Grid P3", Measurement::Phase3ActPowerFromGrid),
        ],
        &[
            ("To Grid ALL", Measurement::AllActPowerToGrid),
            ("To Grid P1", Measurement::Phase1ActPowerToGrid),
            ("To Grid P2", Measurement::Phase2ActPowerToGrid),
            ("To Grid P3", Measurement::Phase3ActPowerToGrid),
        ],
        &[
            ("Voltage P1", Measurement::Phase1Voltage),
            ("Current P1", Measurement::Phase1Current),
            ("Voltage P2", Measurement::Phase2Voltage),
            ("Current P2", Measurement::Phase2Current),
            ("Voltage P3", Measurement::Phase3Voltage),
            ("Current P3", Measurement::Phase3Current),
        ],
    ];

    for (i, block) in blocks.iter().enumerate() {
        if i > 0 {
            let _ = writeln!(out, "{}", SEPARATOR);
        }
        for (label, measurement) in block.iter() {
            let _ = writeln!(out, "{}", format_measurement(reading, label, *measurement));
        }
    }

    let _ = writeln!(out, "{}", reading.received_at.format("%a %b %e %H:%M:%S %Y"));
    let _ = write!(out, "{}", END_LINE);
    out
}

/// Deci-watt grid balance used by the summary output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSummary {
    pub from_grid: i64,
    pub to_grid: i64,
    pub from_grid_phases: [i64; 3],
    pub to_grid_phases: [i64; 3],
}

impl GridSummary {
    pub fn from_reading(reading: &EmeterReading) -> Result<Self, SmaError> {
        let raw = |m: Measurement| reading.raw_value(m).map(|v| v as i64);

        Ok(GridSummary {
            from_grid: raw(Measurement::AllActPowerFromGrid)?,
            to_grid: raw(Measurement::AllActPowerToGrid)?,
            from_grid_phases: [
                raw(Measurement::Phase1ActPowerFromGrid)?,
                raw(Measurement::Phase2ActPowerFromGrid)?,
                raw(Measurement::Phase3ActPowerFromGrid)?,
            ],
            to_grid_phases: [
                raw(Measurement::Phase1ActPowerToGrid)?,
                raw(Measurement::Phase2ActPowerToGrid)?,
                raw(Measurement::Phase3ActPowerToGrid)?,
            ],
        })
    }

    pub fn from_grid_sum(&self) -> i64 {
        self.from_grid_phases.iter().sum()
    }

    pub fn to_grid_sum(&self) -> i64 {
        self.to_grid_phases.iter().sum()
    }

    /// Positive while drawing from the grid, negative while feeding in.
    pub fn delta(&self) -> i64 {
        self.from_grid - self.to_grid
    }

    pub fn delta_phases(&self) -> i64 {
        self.from_grid_sum() - self.to_grid_sum()
    }
}

pub fn format_summary_report(reading: &EmeterReading) -> Result<String, SmaError> {
    let s = GridSummary::from_reading(reading)?;
    let unit = "dW";
    let mut out = String::new();

    let _ = writeln!(out, "From Grid ALL       [{}]: {}", unit, s.from_grid);
    let _ = writeln!(out, "To Grid ALL         [{}]: {}", unit, s.to_grid);
    let _ = writeln!(out, "{}", SEPARATOR);
    for (i, v) in s.from_grid_phases.iter().enumerate() {
        let _ = writeln!(out, "From Grid P{}        [{}]: {}", i + 1, unit, v);
    }
    let _ = writeln!(out, "From Grid P1+P2+P3  [{}]: {}", unit, s.from_grid_sum());
    let _ = writeln!(out, "{}", SEPARATOR);
    for (i, v) in s.to_grid_phases.iter().enumerate() {
        let _ = writeln!(out, "To Grid P{}          [{}]: {}", i + 1, unit, v);
    }
    let _ = writeln!(out, "To Grid P1+P2+P3    [{}]: {}", unit, s.to_grid_sum());
    let _ = writeln!(out, "{}", SEPARATOR);
    let _ = writeln!(out, "Delta Grid from/to  [{}]: {}", unit, s.delta());
    let _ = writeln!(out, "Delta Grid P1+P2+P3 [{}]: {}", unit, s.delta_phases());
    let _ = write!(out, "{}", END_LINE);

    Ok(out)
}

pub fn format_json_line(reading: &EmeterReading) -> Result<String, serde_json::Error> {
    serde_json::to_string(&MeteringData::from_reading(reading))
}

/// Renders one reading in the given mode, `None` if there is nothing to print.
pub fn render(reading: &EmeterReading, mode: OutputMode) -> Option<String> {
    match mode {
        OutputMode::Console => Some(format_console_report(reading)),
        OutputMode::Summary => match format_summary_report(reading) {
            Ok(s) => Some(s),
            Err(e) => {
                warn!("Skipping summary for serial {}: {}", reading.frame.header.serial_number, e);
                None
            }
        },
        OutputMode::Json => match format_json_line(reading) {
            Ok(s) => Some(s),
            Err(e) => {
                error!("Unable to serialize reading: {}", e);
                None
            }
        },
    }
}

pub struct OutputManager {
    receiver: Receiver<EmeterReading>,
    mode: OutputMode,
    #[cfg(feature = "mqtt")]
    mqtt: Option<MqttPublisher>,
}

impl OutputManager {
    pub fn new(receiver: Receiver<EmeterReading>, mode: OutputMode) -> Self {
        OutputManager {
            receiver,
            mode,
            #[cfg(feature = "mqtt")]
            mqtt: None,
        }
    }

    #[cfg(feature = "mqtt")]
    pub fn with_mqtt(mut self, publisher: MqttPublisher) -> Self {
        self.mqtt = Some(publisher);
        self
    }

    pub async fn start_thread(&mut self) {
        info!("Starting output thread ({:?})", self.mode);

        while let Some(reading) = self.receiver.recv().await {
            if let Some(text) = render(&reading, self.mode) {
                println!("{}", text);
            }

            #[cfg(feature = "mqtt")]
            if let Some(mqtt) = &self.mqtt {
                mqtt.publish(&MeteringData::from_reading(&reading)).await;
            }
        }

        debug!("Reading channel closed, output thread exits");
    }
}
