// SMA Energy Meter datagram structures

/// Fixed size of the datagram header, the channel list starts right after it.
pub const HEADER_SIZE: usize = 28;

/// Size of the OBIS tag (channel, index, type, tariff) in front of every value.
pub const TAG_SIZE: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmeterHeader {
    pub id_string: [u8; 4],      // "SMA\0" on real devices, not checked
    pub version_tag: u16,
    pub tag: u16,
    pub group: u32,
    pub length: u16,             // Informational, never checked against the datagram
    pub sma_net2: u16,
    pub protocol_id: u16,
    pub system_unit_id: u16,     // SUSy ID
    pub serial_number: u32,
    pub ticker: u32,             // Device tick counter
}

impl EmeterHeader {
    /// Encodes the header back into its wire layout.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(&self.id_string);
        out[4..6].copy_from_slice(&self.version_tag.to_be_bytes());
        out[6..8].copy_from_slice(&self.tag.to_be_bytes());
        out[8..12].copy_from_slice(&self.group.to_be_bytes());
        out[12..14].copy_from_slice(&self.length.to_be_bytes());
        out[14..16].copy_from_slice(&self.sma_net2.to_be_bytes());
        out[16..18].copy_from_slice(&self.protocol_id.to_be_bytes());
        out[18..20].copy_from_slice(&self.system_unit_id.to_be_bytes());
        out[20..24].copy_from_slice(&self.serial_number.to_be_bytes());
        out[24..28].copy_from_slice(&self.ticker.to_be_bytes());
        out
    }

    pub fn id_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.id_string)
            .trim_end_matches('\0')
            .to_string()
    }
}

/// Width marker of a channel record. The numeric value is the byte width
/// of the value that follows the tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Actual = 4,    // Momentary value, 4 bytes
    Counter = 8,   // Cumulative counter, 8 bytes
}

impl ValueType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            4 => Some(ValueType::Actual),
            8 => Some(ValueType::Counter),
            _ => None,
        }
    }

    pub fn width(self) -> usize {
        self as usize
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRecord {
    pub channel: u8,
    pub index: u8,
    pub value_type: ValueType,
    pub tariff: u8,
    pub value: u64,
}

impl ChannelRecord {
    /// OBIS notation A-B:C.D.E with the medium fixed to electricity.
    pub fn obis_code(&self) -> String {
        format!("1-{}:{}.{}.{}", self.channel, self.index, self.value_type.as_u8(), self.tariff)
    }

    /// Number of bytes this record occupies on the wire.
    pub fn wire_len(&self) -> usize {
        TAG_SIZE + self.value_type.width()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.wire_len());
        out.extend_from_slice(&[self.channel, self.index, self.value_type.as_u8(), self.tariff]);
        match self.value_type {
            ValueType::Actual => out.extend_from_slice(&(self.value as u32).to_be_bytes()),
            ValueType::Counter => out.extend_from_slice(&self.value.to_be_bytes()),
        }
        out
    }
}

/// Result of one walk over the channel list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelList {
    pub records: Vec<ChannelRecord>,
    /// First byte not consumed by the walk
    pub end_offset: usize,
    /// Tag with an unknown width marker that stopped the walk
    pub terminator: Option<[u8; TAG_SIZE]>,
}

/// One decoded datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmeterFrame {
    pub header: EmeterHeader,
    pub records: Vec<ChannelRecord>,
}

impl EmeterFrame {
    pub fn counters(&self) -> impl Iterator<Item = &ChannelRecord> {
        self.records.iter().filter(|r| r.value_type == ValueType::Counter)
    }
}
