use crate::metering_sma::utils::{header_fields, records_by_obis};
use crate::metering_sma::{EmeterReading, Measurement};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[cfg(feature = "mqtt")]
use crate::config::MqttConfig;
#[cfg(feature = "mqtt")]
use log::{debug, error, info};
#[cfg(feature = "mqtt")]
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
#[cfg(feature = "mqtt")]
use std::time::Duration;

pub const PROTOCOL: &str = "sma_emeter";

/// Power channels exported in deci-watt under their `chn<index>` name.
const RAW_POWER_CHANNELS: [Measurement; 8] = [
    Measurement::AllActPowerFromGrid,
    Measurement::Phase1ActPowerFromGrid,
    Measurement::Phase2ActPowerFromGrid,
    Measurement::Phase3ActPowerFromGrid,
    Measurement::AllActPowerToGrid,
    Measurement::Phase1ActPowerToGrid,
    Measurement::Phase2ActPowerToGrid,
    Measurement::Phase3ActPowerToGrid,
];

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MeteringData {
    pub id: String,
    pub meter_name: String,
    pub protocol: String,
    pub transmission_time: u64,
    pub metered_time: u64,
    pub metered_values: serde_json::Map<String, serde_json::Value>
}

impl MeteringData {
    pub fn from_reading(reading: &EmeterReading) -> Self {
        let header = &reading.frame.header;
        let records = &reading.frame.records;
        let meter_name = format!("SMA-{}", header.serial_number);

        let mut values = serde_json::Map::new();
        values.insert("header".to_string(), header_fields(header).into());
        values.insert("source".to_string(), reading.source.to_string().into());
        values.insert("truncated".to_string(), reading.truncated.into());

        /* Values without a record are left out instead of failing the whole document */
        for m in Measurement::ALL {
            if let Ok(v) = reading.lookup(m) {
                values.insert(m.key().to_string(), json!({ "value": v.value, "unit": v.unit }));
            }
        }

        for m in RAW_POWER_CHANNELS {
            if let Ok(raw) = reading.raw_value(m) {
                values.insert(format!("chn{}", m.index()), json!({ "value": raw, "unit": m.quantity().raw_unit() }));
            }
        }

        values.insert("obis".to_string(), records_by_obis(records).into());

        let metered_time = reading.received_at.timestamp().max(0) as u64;
        MeteringData {
            id: crate::get_id(PROTOCOL.to_string(), &meter_name),
            meter_name,
            protocol: PROTOCOL.to_string(),
            transmission_time: crate::get_unix_ts(),
            metered_time,
            metered_values: values,
        }
    }
}

pub fn raw_topic(prefix: &str) -> String {
    format!("{}/raw", prefix)
}

pub fn device_topic(prefix: &str, meter_name: &str) -> String {
    format!("{}/devs/{}", prefix, meter_name)
}

#[cfg(feature = "mqtt")]
pub struct MqttPublisher {
    client: AsyncClient,
    topic_prefix: String,
}

#[cfg(feature = "mqtt")]
impl MqttPublisher {
    /// Connects in the background, rumqttc reconnects on the next poll after an error.
    pub fn new(config: &MqttConfig) -> Self {
        info!("MQTT connection starting up");
        let mut mqttoptions = MqttOptions::new(config.client_name.clone(), config.host.clone(), config.port);
        mqttoptions.set_keep_alive(Duration::from_secs(5));
        if let Some(user) = &config.user {
            mqttoptions.set_credentials(user.clone(), config.pass.clone().unwrap_or_default());
        }

        let (client, mut eventloop) = AsyncClient::new(mqttoptions, 10);

        tokio::spawn(async move {
            info!("MQTT Eventloop started");
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("Connected to MQTT broker");
                    },
                    Ok(_) => {},
                    Err(e) => {
                        error!("Error in MQTT {:?}, reconnecting ", e);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        MqttPublisher {
            client,
            topic_prefix: config.topic_prefix.clone(),
        }
    }

    pub async fn publish(&self, data: &MeteringData) {
        let payload = match serde_json::to_string(data) {
            Ok(p) => p,
            Err(e) => {
                error!("Unable to serialize metering data {}: {}", data.id, e);
                return;
            }
        };

        match self.client.publish(raw_topic(&self.topic_prefix), QoS::AtLeastOnce, false, payload).await {
            Err(e) => { error!("Error sending: {}", e); },
            Ok(_) => { debug!("Send successfully"); }
        }

        let values = serde_json::Value::Object(data.metered_values.clone()).to_string();
        if let Err(e) = self.client.publish(device_topic(&self.topic_prefix, &data.meter_name), QoS::AtLeastOnce, false, values).await {
            error!("Error sending device values: {}", e);
        }
    }
}
