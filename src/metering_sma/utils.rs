use super::structs::*;
use crate::obis_utils;
use serde_json::{json, Map, Value};

/// Header fields keyed and formatted the way SMA tools print them.
pub fn header_fields(header: &EmeterHeader) -> Map<String, Value> {
    let mut map = Map::new();

    map.insert("ID".to_string(), format_id_string(header).into());
    map.insert("4".to_string(), format!("{:04X}", header.version_tag).into());
    map.insert("TAG".to_string(), format!("{:04X}", header.tag).into());
    map.insert("GROUP".to_string(), format!("{:08X}", header.group).into());
    map.insert("LENGTH".to_string(), header.length.into());
    map.insert("SMANET2".to_string(), format!("{:04X}", header.sma_net2).into());
    map.insert("PROTID".to_string(), format!("{:04X}", header.protocol_id).into());
    map.insert("SUSY".to_string(), header.system_unit_id.to_string().into());
    map.insert("SERNO".to_string(), header.serial_number.to_string().into());
    map.insert("TICKER".to_string(), header.ticker.into());

    map
}

pub fn format_id_string(header: &EmeterHeader) -> String {
    let text = header.id_string_lossy();
    if text.chars().all(|c| c.is_ascii_graphic()) && !text.is_empty() {
        return text;
    }
    hex::encode(header.id_string)
}

/// Every record keyed by its OBIS code, with the raw unit where it is known.
pub fn records_by_obis(records: &[ChannelRecord]) -> Map<String, Value> {
    let mut map = Map::new();

    for record in records {
        let code = record.obis_code();
        if map.contains_key(&code) {
            continue;
        }

        let mut entry = json!({ "value": record.value });
        if let Some(unit) = obis_utils::get_raw_unit(record.index, record.value_type) {
            entry["unit"] = unit.into();
        }
        if let Some(description) = obis_utils::get_obis_description(record.index, record.value_type) {
            entry["description"] = description.into();
        }
        map.insert(code, entry);
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> EmeterHeader {
        EmeterHeader {
            id_string: *b"SMA\0",
            version_tag: 0x0002,
            tag: 0x0010,
            group: 1,
            length: 0x0100,
            sma_net2: 0x0001,
            protocol_id: 0x6069,
            system_unit_id: 0x0174,
            serial_number: 1234567,
            ticker: 42,
        }
    }

    #[test]
    fn test_header_fields() {
        let map = header_fields(&header());
        assert_eq!(map["ID"], "SMA");
        assert_eq!(map["4"], "0002");
        assert_eq!(map["TAG"], "0010");
        assert_eq!(map["GROUP"], "00000001");
        assert_eq!(map["LENGTH"], 256);
        assert_eq!(map["PROTID"], "6069");
        assert_eq!(map["SUSY"], "372");
        assert_eq!(map["SERNO"], "1234567");
        assert_eq!(map["TICKER"], 42);
    }

    #[test]
    fn test_format_id_string() {
        assert_eq!(format_id_string(&header()), "SMA");

        let mut binary = header();
        binary.id_string = [0x01, 0x02, 0x03, 0x04];
        assert_eq!(format_id_string(&binary), "01020304");
    }

    #[test]
    fn test_records_by_obis_keeps_first() {
        let records = vec![
            ChannelRecord { channel: 0, index: 1, value_type: ValueType::Actual, tariff: 0, value: 15000 },
            ChannelRecord { channel: 0, index: 1, value_type: ValueType::Actual, tariff: 0, value: 1 },
            ChannelRecord { channel: 0, index: 1, value_type: ValueType::Counter, tariff: 0, value: 3600000 },
        ];
        let map = records_by_obis(&records);
        assert_eq!(map.len(), 2);
        assert_eq!(map["1-0:1.4.0"]["value"], 15000);
        assert_eq!(map["1-0:1.4.0"]["unit"], "dW");
        assert_eq!(map["1-0:1.8.0"]["unit"], "Ws");
    }
}
