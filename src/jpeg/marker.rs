//! JPEG marker codes.

use std::fmt;

/// A JPEG marker, identified by the byte that follows `0xFF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    /// Start of Image
    Soi,
    /// End of Image
    Eoi,
    /// Restart marker RST0-RST7
    Rst(u8),
    /// Temporary private use in arithmetic coding
    Tem,
    /// Start of Frame SOF0-SOF15 (excluding DHT, JPG and DAC codes)
    Sof(u8),
    /// Define Huffman Table
    Dht,
    /// Define Arithmetic Coding conditioning
    Dac,
    /// Define Quantization Table
    Dqt,
    /// Define Number of Lines
    Dnl,
    /// Define Restart Interval
    Dri,
    /// Define Hierarchical Progression
    Dhp,
    /// Expand Reference Component
    Exp,
    /// APP0-APP15
    App(u8),
    /// Comment
    Com,
    /// Start of Scan
    Sos,
    /// Reserved or unassigned marker
    Other(u8),
}

impl Marker {
    pub const APP1: Marker = Marker::App(1);
    pub const APP2: Marker = Marker::App(2);

    /// Creates a marker from the byte following `0xFF`.
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0xD8 => Marker::Soi,
            0xD9 => Marker::Eoi,
            0xD0..=0xD7 => Marker::Rst(byte - 0xD0),
            0x01 => Marker::Tem,
            0xC4 => Marker::Dht,
            0xCC => Marker::Dac,
            0xC0..=0xCF if byte != 0xC8 => Marker::Sof(byte - 0xC0),
            0xDB => Marker::Dqt,
            0xDC => Marker::Dnl,
            0xDD => Marker::Dri,
            0xDE => Marker::Dhp,
            0xDF => Marker::Exp,
            0xE0..=0xEF => Marker::App(byte - 0xE0),
            0xFE => Marker::Com,
            0xDA => Marker::Sos,
            _ => Marker::Other(byte),
        }
    }

    /// Converts the marker to its byte value.
    ///
    /// Indices are taken modulo the marker family size, so `Rst(9)` is RST1.
    /// `Sof(4)`, `Sof(8)` and `Sof(12)` are never produced by
    /// [`Marker::from_byte`]; those codes belong to DHT, JPG and DAC.
    pub fn to_byte(self) -> u8 {
        match self {
            Marker::Soi => 0xD8,
            Marker::Eoi => 0xD9,
            Marker::Rst(n) => 0xD0 | (n & 0x07),
            Marker::Tem => 0x01,
            Marker::Sof(n) => {
                debug_assert!(!matches!(n & 0x0F, 4 | 8 | 12), "SOF{n} is not a frame marker");
                0xC0 | (n & 0x0F)
            }
            Marker::Dht => 0xC4,
            Marker::Dac => 0xCC,
            Marker::Dqt => 0xDB,
            Marker::Dnl => 0xDC,
            Marker::Dri => 0xDD,
            Marker::Dhp => 0xDE,
            Marker::Exp => 0xDF,
            Marker::App(n) => 0xE0 | (n & 0x0F),
            Marker::Com => 0xFE,
            Marker::Sos => 0xDA,
            Marker::Other(b) => b,
        }
    }

    /// Two-byte marker code, e.g. `0xFFE2` for APP2.
    pub fn code(self) -> u16 {
        0xFF00 | u16::from(self.to_byte())
    }

    /// Returns true if the marker stands alone without a length field.
    pub fn is_standalone(self) -> bool {
        matches!(self, Marker::Soi | Marker::Eoi | Marker::Rst(_) | Marker::Tem)
    }

    /// Returns true for any start-of-frame marker.
    pub fn is_sof(self) -> bool {
        matches!(self, Marker::Sof(_))
    }

    /// Short symbolic name such as `SOF0` or `APP2`.
    pub fn name(self) -> String {
        match self {
            Marker::Soi => "SOI".to_string(),
            Marker::Eoi => "EOI".to_string(),
            Marker::Rst(n) => format!("RST{n}"),
            Marker::Tem => "TEM".to_string(),
            Marker::Sof(n) => format!("SOF{n}"),
            Marker::Dht => "DHT".to_string(),
            Marker::Dac => "DAC".to_string(),
            Marker::Dqt => "DQT".to_string(),
            Marker::Dnl => "DNL".to_string(),
            Marker::Dri => "DRI".to_string(),
            Marker::Dhp => "DHP".to_string(),
            Marker::Exp => "EXP".to_string(),
            Marker::App(n) => format!("APP{n}"),
            Marker::Com => "COM".to_string(),
            Marker::Sos => "SOS".to_string(),
            Marker::Other(b) => format!("0x{b:02X}"),
        }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}
