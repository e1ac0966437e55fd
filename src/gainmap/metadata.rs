//! ISO 21496-1 gain map metadata record.
//!
//! Headrooms and the gain map range are log2 values (stops); gamma and the
//! offsets are linear.

use serde::Serialize;

use super::rational::{SRational, URational};
use crate::error::{ProbeError, Result};

const FLAG_MULTI_CHANNEL: u8 = 0x80;
const FLAG_USE_BASE_COLOUR_SPACE: u8 = 0x40;
const FLAG_USE_COMMON_DENOMINATOR: u8 = 0x08;
const FLAG_BACKWARD_DIRECTION: u8 = 0x04;
const FLAG_RESERVED: u8 = !(FLAG_MULTI_CHANNEL
    | FLAG_USE_BASE_COLOUR_SPACE
    | FLAG_USE_COMMON_DENOMINATOR
    | FLAG_BACKWARD_DIRECTION);

/// Minimum headroom span, in stops, for a gain map to count as meaningful HDR.
pub const MEANINGFUL_HDR_STOPS: f64 = 0.5;

/// The flags byte of the metadata body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct GainMapFlags {
    /// Three gain map channels (RGB) instead of one achromatic channel
    pub is_multichannel: bool,
    /// Gain map math is done in the base image colour space
    pub use_base_colour_space: bool,
    /// All fractions share one denominator
    pub use_common_denominator: bool,
    /// The base image is the HDR rendition
    pub backward_direction: bool,
    /// Bits not assigned by the standard, kept as read
    pub reserved: u8,
}

impl GainMapFlags {
    pub fn from_byte(byte: u8) -> Self {
        Self {
            is_multichannel: byte & FLAG_MULTI_CHANNEL != 0,
            use_base_colour_space: byte & FLAG_USE_BASE_COLOUR_SPACE != 0,
            use_common_denominator: byte & FLAG_USE_COMMON_DENOMINATOR != 0,
            backward_direction: byte & FLAG_BACKWARD_DIRECTION != 0,
            reserved: byte & FLAG_RESERVED,
        }
    }

    pub fn to_byte(self) -> u8 {
        let mut byte = self.reserved & FLAG_RESERVED;
        if self.is_multichannel {
            byte |= FLAG_MULTI_CHANNEL;
        }
        if self.use_base_colour_space {
            byte |= FLAG_USE_BASE_COLOUR_SPACE;
        }
        if self.use_common_denominator {
            byte |= FLAG_USE_COMMON_DENOMINATOR;
        }
        if self.backward_direction {
            byte |= FLAG_BACKWARD_DIRECTION;
        }
        byte
    }

    /// Number of per-channel records that follow the headrooms.
    pub fn channel_count(self) -> usize {
        if self.is_multichannel {
            3
        } else {
            1
        }
    }
}

/// Which colour component a channel record applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Channel {
    Achromatic,
    Red,
    Green,
    Blue,
}

impl Channel {
    /// Channel for record `index` of a body with `count` records.
    pub fn for_index(index: usize, count: usize) -> Self {
        match (count, index) {
            (1, _) => Channel::Achromatic,
            (_, 0) => Channel::Red,
            (_, 1) => Channel::Green,
            _ => Channel::Blue,
        }
    }
}

/// Per-channel gain map parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelMetadata {
    pub channel: Channel,
    /// log2 of the minimum content boost
    pub gain_map_min: SRational,
    /// log2 of the maximum content boost
    pub gain_map_max: SRational,
    /// Gamma applied to the encoded gain map values
    pub gamma: URational,
    pub base_offset: SRational,
    pub alternate_offset: SRational,
}

impl ChannelMetadata {
    /// Linear content boost range `(2^min, 2^max)`.
    pub fn content_boost_range(&self) -> Option<(f64, f64)> {
        let min = self.gain_map_min.value()?;
        let max = self.gain_map_max.value()?;
        Some((min.exp2(), max.exp2()))
    }

    fn validate(&self, index: usize) -> Result<()> {
        let field = |name: &str| format!("channels[{index}].{name}");

        let min = defined(&field("gain_map_min"), self.gain_map_min.value(), self.gain_map_min)?;
        let max = defined(&field("gain_map_max"), self.gain_map_max.value(), self.gain_map_max)?;
        let gamma = defined(&field("gamma"), self.gamma.value(), self.gamma)?;
        defined(&field("base_offset"), self.base_offset.value(), self.base_offset)?;
        defined(
            &field("alternate_offset"),
            self.alternate_offset.value(),
            self.alternate_offset,
        )?;

        if gamma <= 0.0 {
            return Err(ProbeError::invalid_field(field("gamma"), self.gamma));
        }
        if min > max {
            return Err(ProbeError::invalid_field(
                field("gain_map_min"),
                format!("{} exceeds gain_map_max {}", self.gain_map_min, self.gain_map_max),
            ));
        }
        Ok(())
    }
}

fn defined(field: &str, value: Option<f64>, raw: impl ToString) -> Result<f64> {
    value.ok_or_else(|| ProbeError::invalid_field(field, raw))
}

/// Decoded ISO 21496-1 gain map metadata.
///
/// Only produced by a successful parse, which has already checked every
/// field against its domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GainMapMetadata {
    minimum_version: u16,
    writer_version: u16,
    flags: GainMapFlags,
    base_hdr_headroom: URational,
    alternate_hdr_headroom: URational,
    channels: Vec<ChannelMetadata>,
}

impl GainMapMetadata {
    /// Builds a record and checks it, failing with `InvalidField` on the
    /// first value outside its domain.
    pub(crate) fn new(
        minimum_version: u16,
        writer_version: u16,
        flags: GainMapFlags,
        base_hdr_headroom: URational,
        alternate_hdr_headroom: URational,
        channels: Vec<ChannelMetadata>,
    ) -> Result<Self> {
        let metadata = Self {
            minimum_version,
            writer_version,
            flags,
            base_hdr_headroom,
            alternate_hdr_headroom,
            channels,
        };
        metadata.validate()?;
        Ok(metadata)
    }

    fn validate(&self) -> Result<()> {
        if self.channels.len() != self.flags.channel_count() {
            return Err(ProbeError::invalid_field("channels", self.channels.len()));
        }

        let base = defined(
            "base_hdr_headroom",
            self.base_hdr_headroom.value(),
            self.base_hdr_headroom,
        )?;
        let alternate = defined(
            "alternate_hdr_headroom",
            self.alternate_hdr_headroom.value(),
            self.alternate_hdr_headroom,
        )?;
        if base == alternate {
            return Err(ProbeError::invalid_field(
                "alternate_hdr_headroom",
                format!(
                    "{} equals base_hdr_headroom {}",
                    self.alternate_hdr_headroom, self.base_hdr_headroom
                ),
            ));
        }

        for (index, channel) in self.channels.iter().enumerate() {
            channel.validate(index)?;
        }
        Ok(())
    }

    pub fn minimum_version(&self) -> u16 {
        self.minimum_version
    }

    pub fn writer_version(&self) -> u16 {
        self.writer_version
    }

    pub fn flags(&self) -> GainMapFlags {
        self.flags
    }

    pub fn base_hdr_headroom(&self) -> URational {
        self.base_hdr_headroom
    }

    pub fn alternate_hdr_headroom(&self) -> URational {
        self.alternate_hdr_headroom
    }

    /// One record per channel, length matching [`GainMapFlags::channel_count`].
    pub fn channels(&self) -> &[ChannelMetadata] {
        &self.channels
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Whether the base image is the HDR rendition.
    pub fn base_is_hdr(&self) -> bool {
        self.flags.backward_direction
    }

    fn headrooms(&self) -> (f64, f64) {
        (
            self.base_hdr_headroom.value().unwrap_or_default(),
            self.alternate_hdr_headroom.value().unwrap_or_default(),
        )
    }

    /// Headroom of the HDR rendition in stops.
    pub fn hdr_capacity_stops(&self) -> f64 {
        let (base, alternate) = self.headrooms();
        base.max(alternate)
    }

    /// Checks if the gain map spans more than half a stop of headroom.
    pub fn is_meaningful_hdr(&self) -> bool {
        let (base, alternate) = self.headrooms();
        (alternate - base).abs() > MEANINGFUL_HDR_STOPS
    }

    /// Weight of the gain map for a display with the given headroom in stops.
    ///
    /// 0 reproduces the base rendition, 1 the alternate rendition.
    pub fn rendition_weight(&self, display_headroom: f64) -> f64 {
        let (base, alternate) = self.headrooms();
        ((display_headroom - base) / (alternate - base)).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(channel: Channel, min: i32, max: i32) -> ChannelMetadata {
        ChannelMetadata {
            channel,
            gain_map_min: SRational::new(min, 1),
            gain_map_max: SRational::new(max, 1),
            gamma: URational::new(1, 1),
            base_offset: SRational::new(1, 64),
            alternate_offset: SRational::new(1, 64),
        }
    }

    fn single_channel(base: URational, alternate: URational) -> Result<GainMapMetadata> {
        GainMapMetadata::new(
            0,
            0,
            GainMapFlags::default(),
            base,
            alternate,
            vec![channel(Channel::Achromatic, 0, 3)],
        )
    }

    #[test]
    fn test_flags_byte() {
        let flags = GainMapFlags::from_byte(0b1100_1101);
        assert!(flags.is_multichannel);
        assert!(flags.use_base_colour_space);
        assert!(flags.use_common_denominator);
        assert!(flags.backward_direction);
        assert_eq!(flags.reserved, 0b0000_0001);
        assert_eq!(flags.to_byte(), 0b1100_1101);
        assert_eq!(flags.channel_count(), 3);
        assert_eq!(GainMapFlags::from_byte(0).channel_count(), 1);
    }

    #[test]
    fn test_channel_names() {
        assert_eq!(Channel::for_index(0, 1), Channel::Achromatic);
        assert_eq!(Channel::for_index(0, 3), Channel::Red);
        assert_eq!(Channel::for_index(2, 3), Channel::Blue);
    }

    #[test]
    fn test_valid_record_helpers() {
        let metadata = single_channel(URational::new(0, 1), URational::new(3, 1)).unwrap();
        assert_eq!(metadata.hdr_capacity_stops(), 3.0);
        assert!(metadata.is_meaningful_hdr());
        assert!(!metadata.base_is_hdr());
        assert_eq!(metadata.rendition_weight(1.5), 0.5);
        assert_eq!(metadata.rendition_weight(10.0), 1.0);
        assert_eq!(metadata.rendition_weight(-1.0), 0.0);
        assert_eq!(
            metadata.channels()[0].content_boost_range(),
            Some((1.0, 8.0))
        );
    }

    #[test]
    fn test_zero_denominator_headroom() {
        let err = single_channel(URational::new(1, 0), URational::new(3, 1)).unwrap_err();
        assert_eq!(
            err,
            ProbeError::InvalidField {
                field: "base_hdr_headroom".to_string(),
                value: "1/0".to_string(),
            }
        );
    }

    #[test]
    fn test_equal_headrooms() {
        let err = single_channel(URational::new(2, 1), URational::new(4, 2)).unwrap_err();
        assert!(matches!(err, ProbeError::InvalidField { ref field, .. } if field == "alternate_hdr_headroom"));
    }

    #[test]
    fn test_gain_range_inverted() {
        let err = GainMapMetadata::new(
            0,
            0,
            GainMapFlags::default(),
            URational::new(0, 1),
            URational::new(3, 1),
            vec![channel(Channel::Achromatic, 4, 3)],
        )
        .unwrap_err();
        assert!(matches!(err, ProbeError::InvalidField { ref field, .. } if field == "channels[0].gain_map_min"));
    }

    #[test]
    fn test_channel_count_mismatch() {
        let flags = GainMapFlags {
            is_multichannel: true,
            ..Default::default()
        };
        let err = GainMapMetadata::new(
            0,
            0,
            flags,
            URational::new(0, 1),
            URational::new(3, 1),
            vec![channel(Channel::Red, 0, 3)],
        )
        .unwrap_err();
        assert!(matches!(err, ProbeError::InvalidField { ref field, .. } if field == "channels"));
    }
}
