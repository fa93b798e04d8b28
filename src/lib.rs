//! SMA Energy Meter telemetry decoder
//!
//! Decodes the multicast datagrams of SMA Energy Meters and Sunny Home Managers
//! into a header and an ordered list of OBIS channel records, and offers the
//! receiver and output plumbing around it.

pub mod config;
pub mod metering_sma;
pub mod mqtt;
pub mod obis_utils;
pub mod presenter;
pub mod receiver;

// Re-export common types for easier access
pub use config::Config;
pub use metering_sma::{decode, lookup, EmeterFrame, EmeterReading, Measurement, SmaError, SmaManager};
pub use mqtt::MeteringData;
pub use presenter::OutputManager;
pub use receiver::UdpReceiver;

pub fn get_unix_ts() -> u64 {
    return std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
}

pub fn get_id(protocol: String, meter_name: &String) -> String {
    return format!("{}-{}-{:?}", protocol, meter_name, get_unix_ts());
}
