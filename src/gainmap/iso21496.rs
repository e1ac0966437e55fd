//! ISO 21496-1 binary gain map metadata in a JPEG APP2 segment.
//!
//! The APP2 payload starts with the NUL-terminated URN identifier, followed
//! by a big-endian body:
//!
//! ```text
//! u16 minimum_version
//! u16 writer_version
//! u8  flags                      (absent in a version-only block)
//! headrooms                      base, then alternate
//! channel records x 1 or 3       min, max, gamma, base offset, alternate offset
//! ```
//!
//! With the common-denominator flag set, one `u32` denominator precedes the
//! headroom numerators and every field stores only its numerator. Otherwise
//! each field is a numerator/denominator pair.

use serde::Serialize;

use super::metadata::{Channel, ChannelMetadata, GainMapFlags, GainMapMetadata};
use super::rational::{SRational, URational};
use super::reader::FieldReader;
use crate::error::{ProbeError, Result};
use crate::jpeg::marker::Marker;
use crate::jpeg::scanner::{MarkerSegment, SegmentScanner};

/// APP2 identifier of an ISO 21496-1 block.
pub const ISO21496_IDENTIFIER: &[u8] = b"urn:iso:std:iso:ts:21496:-1\0";

/// The identifier without its terminating NUL.
pub const ISO21496_URN: &str = "urn:iso:std:iso:ts:21496:-1";

/// Highest `minimum_version` this parser understands.
pub const SUPPORTED_MINIMUM_VERSION: u16 = 0;

/// Options controlling how strictly a block is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Accept bytes after the last channel record (logged as a warning).
    pub allow_trailing_bytes: bool,
}

impl ParseOptions {
    /// Rejects anything beyond the exact record layout.
    pub fn strict() -> Self {
        Self {
            allow_trailing_bytes: false,
        }
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            allow_trailing_bytes: true,
        }
    }
}

/// Contents of an ISO 21496-1 APP2 block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IsoBlock {
    /// The short block the primary image carries to announce a gain map.
    VersionOnly {
        minimum_version: u16,
        writer_version: u16,
    },
    /// A full metadata record, normally in the gain map image.
    Metadata(GainMapMetadata),
}

impl IsoBlock {
    pub fn metadata(&self) -> Option<&GainMapMetadata> {
        match self {
            IsoBlock::Metadata(metadata) => Some(metadata),
            IsoBlock::VersionOnly { .. } => None,
        }
    }

    pub fn into_metadata(self) -> Option<GainMapMetadata> {
        match self {
            IsoBlock::Metadata(metadata) => Some(metadata),
            IsoBlock::VersionOnly { .. } => None,
        }
    }
}

/// An ISO 21496-1 block together with where it was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocatedBlock {
    /// Offset of the APP2 marker in the scanned buffer
    pub offset: usize,
    /// Marker code, always `0xFFE2`
    pub marker: u16,
    /// Declared segment length
    pub segment_length: u16,
    pub urn: &'static str,
    pub block: IsoBlock,
}

/// Returns the metadata body that follows the identifier.
pub fn strip_identifier(payload: &[u8]) -> Result<&[u8]> {
    payload
        .strip_prefix(ISO21496_IDENTIFIER)
        .ok_or(ProbeError::UnrecognizedSignature)
}

/// Decodes an APP2 payload into either a version-only block or a full record.
pub fn parse_iso_block(payload: &[u8], options: ParseOptions) -> Result<IsoBlock> {
    let body = strip_identifier(payload)?;
    let mut reader = FieldReader::new(body, ISO21496_IDENTIFIER.len());
    let (minimum_version, writer_version) = read_versions(&mut reader)?;

    if reader.remaining() == 0 {
        tracing::debug!(minimum_version, writer_version, "Version-only ISO 21496-1 block");
        return Ok(IsoBlock::VersionOnly {
            minimum_version,
            writer_version,
        });
    }

    decode_record(&mut reader, minimum_version, writer_version, options).map(IsoBlock::Metadata)
}

/// Decodes an APP2 payload that must hold a full metadata record.
///
/// A version-only block fails with `UnexpectedEndOfData` on `flags`.
pub fn parse_gain_map_metadata(payload: &[u8]) -> Result<GainMapMetadata> {
    parse_gain_map_metadata_with(payload, ParseOptions::default())
}

/// Same as [`parse_gain_map_metadata`] with explicit options.
pub fn parse_gain_map_metadata_with(
    payload: &[u8],
    options: ParseOptions,
) -> Result<GainMapMetadata> {
    let body = strip_identifier(payload)?;
    let mut reader = FieldReader::new(body, ISO21496_IDENTIFIER.len());
    let (minimum_version, writer_version) = read_versions(&mut reader)?;
    decode_record(&mut reader, minimum_version, writer_version, options)
}

/// Decodes an ISO 21496-1 block from a scanned APP2 segment.
pub fn parse_segment(segment: &MarkerSegment<'_>, options: ParseOptions) -> Result<LocatedBlock> {
    if segment.marker() != Marker::APP2 {
        return Err(ProbeError::UnrecognizedSignature);
    }
    let block = parse_iso_block(segment.payload(), options)?;
    Ok(LocatedBlock {
        offset: segment.offset(),
        marker: segment.marker().code(),
        segment_length: segment.declared_length().unwrap_or_default(),
        urn: ISO21496_URN,
        block,
    })
}

/// Decodes a complete APP2 segment given as marker, length and payload bytes.
///
/// The declared length must match the buffer exactly.
pub fn parse_framed_segment(bytes: &[u8], options: ParseOptions) -> Result<LocatedBlock> {
    if bytes.len() < 4 {
        return Err(ProbeError::malformed(0, "segment shorter than marker and length"));
    }
    if bytes[0] != 0xFF || bytes[1] != Marker::APP2.to_byte() {
        return Err(ProbeError::malformed(
            0,
            format!(
                "expected APP2 marker 0xFFE2, found 0x{:02X}{:02X}",
                bytes[0], bytes[1]
            ),
        ));
    }
    let declared = u16::from_be_bytes([bytes[2], bytes[3]]);
    if usize::from(declared) != bytes.len() - 2 {
        return Err(ProbeError::malformed(
            2,
            format!(
                "declared length {} does not match segment size {}",
                declared,
                bytes.len() - 2
            ),
        ));
    }

    // Reuse the scanner's framing rules by prefixing an SOI.
    let mut framed = Vec::with_capacity(bytes.len() + 2);
    framed.extend_from_slice(&[0xFF, 0xD8]);
    framed.extend_from_slice(bytes);
    let segment = SegmentScanner::new(&framed)
        .nth(1)
        .ok_or_else(|| ProbeError::malformed(0, "no segment after marker"))??;

    let mut located = parse_segment(&segment, options)?;
    located.offset = 0;
    Ok(located)
}

fn read_versions(reader: &mut FieldReader<'_>) -> Result<(u16, u16)> {
    let minimum_version = reader.read_u16("minimum_version")?;
    if minimum_version > SUPPORTED_MINIMUM_VERSION {
        return Err(ProbeError::invalid_field("minimum_version", minimum_version));
    }
    let writer_version = reader.read_u16("writer_version")?;
    Ok((minimum_version, writer_version))
}

fn decode_record(
    reader: &mut FieldReader<'_>,
    minimum_version: u16,
    writer_version: u16,
    options: ParseOptions,
) -> Result<GainMapMetadata> {
    let flags = GainMapFlags::from_byte(reader.read_u8("flags")?);
    if flags.reserved != 0 {
        tracing::debug!(reserved = flags.reserved, "Reserved gain map flag bits set");
    }

    let metadata = if flags.use_common_denominator {
        decode_common_denominator(reader, minimum_version, writer_version, flags)?
    } else {
        decode_explicit(reader, minimum_version, writer_version, flags)?
    };

    let trailing = reader.remaining();
    if trailing > 0 {
        if !options.allow_trailing_bytes {
            return Err(ProbeError::invalid_field("trailing_bytes", trailing));
        }
        tracing::warn!(trailing, offset = reader.offset(), "Ignoring bytes after gain map metadata");
    }

    tracing::debug!(
        channels = metadata.channel_count(),
        common_denominator = flags.use_common_denominator,
        "Decoded ISO 21496-1 metadata"
    );
    Ok(metadata)
}

fn channel_field(index: usize, name: &str) -> String {
    format!("channels[{index}].{name}")
}

fn read_urational(reader: &mut FieldReader<'_>, field: &str) -> Result<URational> {
    let numerator = reader.read_u32(field)?;
    let denominator = reader.read_u32(field)?;
    Ok(URational::new(numerator, denominator))
}

fn read_srational(reader: &mut FieldReader<'_>, field: &str) -> Result<SRational> {
    let numerator = reader.read_i32(field)?;
    let denominator = reader.read_u32(field)?;
    Ok(SRational::new(numerator, denominator))
}

fn read_numerator(
    reader: &mut FieldReader<'_>,
    index: usize,
    name: &str,
    denominator: u32,
) -> Result<SRational> {
    let numerator = reader.read_i32(&channel_field(index, name))?;
    Ok(SRational::new(numerator, denominator))
}

fn decode_explicit(
    reader: &mut FieldReader<'_>,
    minimum_version: u16,
    writer_version: u16,
    flags: GainMapFlags,
) -> Result<GainMapMetadata> {
    let base_hdr_headroom = read_urational(reader, "base_hdr_headroom")?;
    let alternate_hdr_headroom = read_urational(reader, "alternate_hdr_headroom")?;

    let count = flags.channel_count();
    let mut channels = Vec::with_capacity(count);
    for index in 0..count {
        channels.push(ChannelMetadata {
            channel: Channel::for_index(index, count),
            gain_map_min: read_srational(reader, &channel_field(index, "gain_map_min"))?,
            gain_map_max: read_srational(reader, &channel_field(index, "gain_map_max"))?,
            gamma: read_urational(reader, &channel_field(index, "gamma"))?,
            base_offset: read_srational(reader, &channel_field(index, "base_offset"))?,
            alternate_offset: read_srational(reader, &channel_field(index, "alternate_offset"))?,
        });
    }

    GainMapMetadata::new(
        minimum_version,
        writer_version,
        flags,
        base_hdr_headroom,
        alternate_hdr_headroom,
        channels,
    )
}

fn decode_common_denominator(
    reader: &mut FieldReader<'_>,
    minimum_version: u16,
    writer_version: u16,
    flags: GainMapFlags,
) -> Result<GainMapMetadata> {
    let denominator = reader.read_u32("common_denominator")?;
    if denominator == 0 {
        return Err(ProbeError::invalid_field("common_denominator", denominator));
    }

    let base_hdr_headroom = URational::new(reader.read_u32("base_hdr_headroom")?, denominator);
    let alternate_hdr_headroom =
        URational::new(reader.read_u32("alternate_hdr_headroom")?, denominator);

    let count = flags.channel_count();
    let mut channels = Vec::with_capacity(count);
    for index in 0..count {
        channels.push(ChannelMetadata {
            channel: Channel::for_index(index, count),
            gain_map_min: read_numerator(reader, index, "gain_map_min", denominator)?,
            gain_map_max: read_numerator(reader, index, "gain_map_max", denominator)?,
            gamma: URational::new(reader.read_u32(&channel_field(index, "gamma"))?, denominator),
            base_offset: read_numerator(reader, index, "base_offset", denominator)?,
            alternate_offset: read_numerator(reader, index, "alternate_offset", denominator)?,
        });
    }

    GainMapMetadata::new(
        minimum_version,
        writer_version,
        flags,
        base_hdr_headroom,
        alternate_hdr_headroom,
        channels,
    )
}
