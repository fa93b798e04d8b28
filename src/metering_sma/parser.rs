use super::structs::*;
use super::SmaError;
use log::debug;

/// Decodes one complete datagram: header first, then the channel list
/// starting right behind it.
pub fn decode(data: &[u8]) -> Result<EmeterFrame, SmaError> {
    let header = parse_header(data)?;
    let list = parse_channel_list(data, HEADER_SIZE)?;

    Ok(EmeterFrame {
        header,
        records: list.records,
    })
}

pub fn parse_header(data: &[u8]) -> Result<EmeterHeader, SmaError> {
    if data.len() < HEADER_SIZE {
        return Err(SmaError::ShortBuffer { len: data.len() });
    }

    let mut parser = SmaParser::new(data);
    parser.parse_header()
}

pub fn parse_channel_list(data: &[u8], offset: usize) -> Result<ChannelList, SmaError> {
    let mut parser = SmaParser::new(data);
    parser.pos = offset;
    parser.parse_channel_list()
}

struct SmaParser<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SmaParser<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn parse_header(&mut self) -> Result<EmeterHeader, SmaError> {
        let mut id_string = [0u8; 4];
        id_string.copy_from_slice(self.take(4)?);

        let header = EmeterHeader {
            id_string,
            version_tag: self.parse_unsigned16()?,
            tag: self.parse_unsigned16()?,
            group: self.parse_unsigned32()?,
            length: self.parse_unsigned16()?,
            sma_net2: self.parse_unsigned16()?,
            protocol_id: self.parse_unsigned16()?,
            system_unit_id: self.parse_unsigned16()?,
            serial_number: self.parse_unsigned32()?,
            ticker: self.parse_unsigned32()?,
        };

        debug!("SMA header {:?}", header);
        Ok(header)
    }

    fn parse_channel_list(&mut self) -> Result<ChannelList, SmaError> {
        let mut records = Vec::new();
        let mut terminator = None;

        while self.remaining() >= TAG_SIZE {
            let tag_offset = self.pos;
            let mut tag = [0u8; TAG_SIZE];
            tag.copy_from_slice(&self.data[self.pos..self.pos + TAG_SIZE]);
            let [channel, index, type_byte, tariff] = tag;

            let value_type = match ValueType::from_u8(type_byte) {
                Some(t) => t,
                None => {
                    /* End of the known stream, the end marker and trailing padding land here */
                    debug!("Unexpected type {}/{}/{}/{} at offset {}", channel, index, type_byte, tariff, tag_offset);
                    terminator = Some(tag);
                    break;
                }
            };
            self.pos += TAG_SIZE;

            let width = value_type.width();
            if self.remaining() < width {
                return Err(SmaError::TruncatedValue {
                    offset: tag_offset,
                    channel,
                    index,
                    width,
                    remaining: self.remaining(),
                    partial: records,
                });
            }

            let value = match value_type {
                ValueType::Actual => self.parse_unsigned32()? as u64,
                ValueType::Counter => self.parse_unsigned64()?,
            };

            let record = ChannelRecord { channel, index, value_type, tariff, value };
            debug!("{} = {}", record.obis_code(), record.value);
            records.push(record);
        }

        Ok(ChannelList {
            records,
            end_offset: self.pos,
            terminator,
        })
    }

    // Basic type parsers
    fn take(&mut self, len: usize) -> Result<&'a [u8], SmaError> {
        if self.remaining() < len {
            return Err(SmaError::ShortBuffer { len: self.data.len() });
        }

        let data = self.data;
        let slice = &data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn parse_unsigned16(&mut self) -> Result<u16, SmaError> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn parse_unsigned32(&mut self) -> Result<u32, SmaError> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn parse_unsigned64(&mut self) -> Result<u64, SmaError> {
        let bytes = self.take(8)?;
        let mut value = [0u8; 8];
        value.copy_from_slice(bytes);
        Ok(u64::from_be_bytes(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> EmeterHeader {
        EmeterHeader {
            id_string: *b"SMA\0",
            version_tag: 0x0002,
            tag: 0x0010,
            group: 0x0000_0001,
            length: 0x0100,
            sma_net2: 0x0001,
            protocol_id: 0x6069,
            system_unit_id: 0x0001,
            serial_number: 1234567,
            ticker: 42,
        }
    }

    fn record(index: u8, value_type: ValueType, value: u64) -> ChannelRecord {
        ChannelRecord { channel: 1, index, value_type, tariff: 0, value }
    }

    fn datagram(records: &[ChannelRecord]) -> Vec<u8> {
        let mut data = sample_header().to_bytes().to_vec();
        for r in records {
            data.extend_from_slice(&r.to_bytes());
        }
        data
    }

    #[test]
    fn test_header_round_trip() {
        let bytes: Vec<u8> = (0u8..28).map(|b| b.wrapping_mul(37)).collect();
        let header = parse_header(&bytes).unwrap();
        assert_eq!(header.to_bytes().to_vec(), bytes);
    }

    #[test]
    fn test_header_fields() {
        let header = parse_header(&sample_header().to_bytes()).unwrap();
        assert_eq!(&header.id_string, b"SMA\0");
        assert_eq!(header.version_tag, 2);
        assert_eq!(header.tag, 0x10);
        assert_eq!(header.group, 1);
        assert_eq!(header.length, 0x100);
        assert_eq!(header.protocol_id, 0x6069);
        assert_eq!(header.serial_number, 1234567);
        assert_eq!(header.ticker, 42);
    }

    #[test]
    fn test_short_buffer() {
        for len in [0usize, 1, 4, 27] {
            let data = vec![0xAA; len];
            assert!(matches!(parse_header(&data), Err(SmaError::ShortBuffer { len: l }) if l == len));
            assert!(matches!(decode(&data), Err(SmaError::ShortBuffer { .. })));
        }
    }

    #[test]
    fn test_header_only_has_no_records() {
        let frame = decode(&sample_header().to_bytes()).unwrap();
        assert!(frame.records.is_empty());
    }

    #[test]
    fn test_records_in_order_with_end_offset() {
        let records = vec![
            record(1, ValueType::Actual, 15000),
            record(1, ValueType::Counter, 987_654_321_000),
            record(2, ValueType::Actual, 3000),
            record(2, ValueType::Counter, 42),
        ];
        let data = datagram(&records);

        let list = parse_channel_list(&data, HEADER_SIZE).unwrap();
        assert_eq!(list.records, records);
        assert_eq!(list.end_offset, HEADER_SIZE + 8 + 12 + 8 + 12);
        assert_eq!(list.terminator, None);
    }

    #[test]
    fn test_unknown_type_stops_walk() {
        let mut data = datagram(&[record(1, ValueType::Actual, 15000)]);
        let stop_at = data.len();
        /* Software version tag followed by the end marker */
        data.extend_from_slice(&[0x90, 0x00, 0x00, 0x00, 0x02, 0x00, 0x12, 0x52]);
        data.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
        data.extend_from_slice(&record(2, ValueType::Actual, 3000).to_bytes());

        let list = parse_channel_list(&data, HEADER_SIZE).unwrap();
        assert_eq!(list.records.len(), 1);
        assert_eq!(list.records[0].value, 15000);
        assert_eq!(list.end_offset, stop_at);
        assert_eq!(list.terminator, Some([0x90, 0x00, 0x00, 0x00]));
    }

    #[test]
    fn test_short_trailing_fragment_is_not_an_error() {
        let mut data = datagram(&[record(1, ValueType::Actual, 15000)]);
        data.extend_from_slice(&[0x00, 0x02, 0x04]);

        let list = parse_channel_list(&data, HEADER_SIZE).unwrap();
        assert_eq!(list.records.len(), 1);
        assert_eq!(list.end_offset, HEADER_SIZE + 8);
    }

    #[test]
    fn test_truncated_counter_returns_partial() {
        let mut data = datagram(&[record(1, ValueType::Actual, 15000)]);
        let tag_offset = data.len();
        data.extend_from_slice(&[0x01, 0x01, 0x08, 0x00, 0x00, 0x00, 0x01]);

        match parse_channel_list(&data, HEADER_SIZE) {
            Err(SmaError::TruncatedValue { offset, channel, index, width, remaining, partial }) => {
                assert_eq!(offset, tag_offset);
                assert_eq!((channel, index), (1, 1));
                assert_eq!(width, 8);
                assert_eq!(remaining, 3);
                assert_eq!(partial, vec![record(1, ValueType::Actual, 15000)]);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_offset_beyond_buffer() {
        let data = sample_header().to_bytes();
        let list = parse_channel_list(&data, 100).unwrap();
        assert!(list.records.is_empty());
    }

    #[test]
    fn test_walk_is_restartable() {
        let data = datagram(&[record(1, ValueType::Actual, 15000), record(2, ValueType::Actual, 3000)]);
        let first = decode(&data).unwrap();
        let second = decode(&data).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_end_to_end_scenario() {
        let mut data = Vec::new();
        data.extend_from_slice(b"SMA\0");
        data.extend_from_slice(&[0x00, 0x02, 0x00, 0x10, 0x00, 0x00, 0x00, 0x01, 0x01, 0x00]);
        data.extend_from_slice(&[0x00, 0x01, 0x60, 0x69, 0x00, 0x01]);
        data.extend_from_slice(&1234567u32.to_be_bytes());
        data.extend_from_slice(&42u32.to_be_bytes());
        data.extend_from_slice(&[1, 1, 4, 0]);
        data.extend_from_slice(&15000u32.to_be_bytes());
        data.extend_from_slice(&[1, 2, 4, 0]);
        data.extend_from_slice(&3000u32.to_be_bytes());

        let frame = decode(&data).unwrap();
        assert_eq!(frame.header, sample_header());
        assert_eq!(frame.header.serial_number, 1234567);
        assert_eq!(frame.header.ticker, 42);
        assert_eq!(frame.records.len(), 2);
        assert_eq!(frame.records[1].index, 2);
        assert_eq!(frame.records[1].value, 3000);
    }
}
