use crate::config::ReceiverConfig;
use crate::receiver::UdpReceiver;
use chrono::{DateTime, Local};
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use thiserror::Error;
use tokio::sync::mpsc::Sender;

pub mod structs;
pub mod parser;
pub mod measurements;
pub mod utils;

pub use measurements::{lookup, raw_value, Measurement, ScaledValue};
pub use parser::{decode, parse_channel_list, parse_header};
pub use structs::*;

/// Errors reported while decoding a datagram or reading values from it.
/// None of them is fatal, the receive loop continues with the next datagram.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SmaError {
    #[error("Datagram too short for header ({len} of {} bytes)", HEADER_SIZE)]
    ShortBuffer { len: usize },

    /// Records decoded before the offending entry are kept in `partial`.
    #[error("Channel {channel}:{index} at offset {offset} needs {width} value bytes, only {remaining} left")]
    TruncatedValue {
        offset: usize,
        channel: u8,
        index: u8,
        width: usize,
        remaining: usize,
        partial: Vec<ChannelRecord>,
    },

    #[error("Measurement {0:?} not found")]
    MeasurementNotFound(Measurement),
}

/// One received and decoded datagram, handed to the output side.
#[derive(Debug, Clone)]
pub struct EmeterReading {
    pub source: SocketAddr,
    pub received_at: DateTime<Local>,
    pub datagram_len: usize,
    pub frame: EmeterFrame,
    /// Set if the channel list ended in a truncated value
    pub truncated: bool,
}

impl EmeterReading {
    pub fn lookup(&self, measurement: Measurement) -> Result<ScaledValue, SmaError> {
        lookup(&self.frame.records, measurement)
    }

    pub fn raw_value(&self, measurement: Measurement) -> Result<u64, SmaError> {
        raw_value(&self.frame.records, measurement)
    }
}

/// Decodes a datagram, keeping the records in front of a truncated value.
pub fn decode_reading(payload: &[u8], source: SocketAddr) -> Result<EmeterReading, SmaError> {
    let header = parse_header(payload)?;

    let (records, truncated) = match parse_channel_list(payload, HEADER_SIZE) {
        Ok(list) => (list.records, false),
        Err(SmaError::TruncatedValue { offset, channel, index, width, remaining, partial }) => {
            warn!("Datagram from {} truncated at offset {} (channel {}:{} needs {} bytes, {} left), keeping {} records",
                  source, offset, channel, index, width, remaining, partial.len());
            (partial, true)
        }
        Err(e) => return Err(e),
    };

    Ok(EmeterReading {
        source,
        received_at: Local::now(),
        datagram_len: payload.len(),
        frame: EmeterFrame { header, records },
        truncated,
    })
}

pub struct SmaManager {
    sender: Sender<EmeterReading>,
    config: ReceiverConfig,
}

impl SmaManager {
    pub fn new(sender: Sender<EmeterReading>, config: ReceiverConfig) -> Self {
        Self { sender, config }
    }

    pub async fn start_thread(&mut self) {
        info!("Starting SMA Energy Meter thread");

        let receiver = match UdpReceiver::bind(self.config.address, self.config.port, self.config.interface, self.config.bufsize) {
            Ok(r) => r,
            Err(e) => {
                error!("Unable to listen on {}:{}: {}", self.config.address, self.config.port, e);
                return;
            }
        };

        info!("Receiving on {}:{}", self.config.address, self.config.port);
        loop {
            let (payload, source) = match receiver.receive().await {
                Ok(d) => d,
                Err(e) => {
                    error!("Error receiving datagram: {}", e);
                    continue;
                }
            };

            if !self.handle_datagram(&payload, source).await {
                debug!("Output side closed, stopping receiver");
                return;
            }
        }
    }

    /// Returns false once nobody listens for readings anymore.
    async fn handle_datagram(&self, payload: &[u8], source: SocketAddr) -> bool {
        debug!("Received message from {} with length {}", source, payload.len());

        match decode_reading(payload, source) {
            Ok(reading) => {
                debug!("Decoded {} records from serial {}", reading.frame.records.len(), reading.frame.header.serial_number);
                self.sender.send(reading).await.is_ok()
            }
            Err(e) => {
                warn!("Dropping datagram from {}: {}", source, e);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> SocketAddr {
        "192.168.1.50:9522".parse().unwrap()
    }

    fn datagram() -> Vec<u8> {
        let header = EmeterHeader {
            id_string: *b"SMA\0",
            version_tag: 2, tag: 0x10, group: 1, length: 0x100, sma_net2: 1,
            protocol_id: 0x6069, system_unit_id: 1, serial_number: 1234567, ticker: 42,
        };
        let mut data = header.to_bytes().to_vec();
        data.extend_from_slice(&[1, 1, 4, 0]);
        data.extend_from_slice(&15000u32.to_be_bytes());
        data.extend_from_slice(&[1, 2, 4, 0]);
        data.extend_from_slice(&3000u32.to_be_bytes());
        data
    }

    #[test]
    fn test_decode_reading() {
        let reading = decode_reading(&datagram(), source()).unwrap();
        assert!(!reading.truncated);
        assert_eq!(reading.datagram_len, 44);
        assert_eq!(reading.lookup(Measurement::AllActPowerFromGrid).unwrap(), ScaledValue { unit: "W", value: 1500 });
        assert_eq!(reading.lookup(Measurement::AllActPowerToGrid).unwrap(), ScaledValue { unit: "W", value: 300 });
    }

    #[test]
    fn test_decode_reading_keeps_partial() {
        let mut data = datagram();
        data.extend_from_slice(&[1, 1, 8, 0, 0, 0]);

        assert!(matches!(decode(&data), Err(SmaError::TruncatedValue { .. })));

        let reading = decode_reading(&data, source()).unwrap();
        assert!(reading.truncated);
        assert_eq!(reading.frame.records.len(), 2);
    }

    #[test]
    fn test_decode_reading_short() {
        let err = decode_reading(&[0u8; 10], source()).unwrap_err();
        assert_eq!(err, SmaError::ShortBuffer { len: 10 });
        assert_eq!(err.to_string(), "Datagram too short for header (10 of 28 bytes)");
    }

    #[tokio::test]
    async fn test_handle_datagram_forwards() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(10);
        let manager = SmaManager::new(tx, ReceiverConfig::default());

        assert!(manager.handle_datagram(&[0u8; 4], source()).await);
        assert!(manager.handle_datagram(&datagram(), source()).await);

        let reading = rx.recv().await.unwrap();
        assert_eq!(reading.frame.header.ticker, 42);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_handle_datagram_closed_output() {
        let (tx, rx) = tokio::sync::mpsc::channel(10);
        drop(rx);
        let manager = SmaManager::new(tx, ReceiverConfig::default());
        assert!(!manager.handle_datagram(&datagram(), source()).await);
    }
}
