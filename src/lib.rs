//! Gain Map Probe
//!
//! A Rust library for inspecting JPEG containers and decoding the ISO 21496-1
//! gain map metadata carried by HDR (UltraHDR / Adobe gain map) JPEGs.
//!
//! # Features
//!
//! - **Scanning**: Walk JPEG marker segments lazily, with exact byte framing
//! - **Inspection**: Segment report with dimensions, XMP packets and APP2 blocks
//! - **Decoding**: Parse the binary ISO 21496-1 metadata record from APP2
//! - **Streams**: Locate the primary image, thumbnails and gain map image
//!
//! # Standards Support
//!
//! - ISO 21496-1 (Gain map metadata)
//! - Adobe Gain Map XMP (`hdrgm` namespace, read only)
//!
//! # License
//!
//! GPL-2.0-or-later

pub mod error;
pub mod gainmap;
pub mod hex;
pub mod jpeg;

pub use error::{ProbeError, Result};
pub use gainmap::{
    find_gain_map_metadata, parse_gain_map_metadata, GainMapLocation, GainMapMetadata, IsoBlock,
    ParseOptions,
};
pub use jpeg::{
    inspect, locate_streams, split_codestreams, ContainerReport, MarkerSegment, SegmentScanner,
};

/// Checks if a JPEG buffer declares an ISO 21496-1 gain map.
///
/// This is a fast check over the primary image header: it looks for an
/// ISO 21496-1 APP2 block, or XMP with `hdrgm` properties, without decoding
/// any record.
///
/// # Arguments
/// * `buffer` - JPEG file contents as bytes
///
/// # Returns
/// `true` if the header announces a gain map, `false` otherwise
pub fn has_gain_map(buffer: &[u8]) -> bool {
    SegmentScanner::new(buffer)
        .map_while(std::result::Result::ok)
        .any(|segment| {
            segment.is_iso21496()
                || segment
                    .xmp_packet()
                    .is_some_and(jpeg::XmpParser::has_gain_map_metadata)
        })
}

/// Extracts the ISO 21496-1 gain map metadata from a JPEG file.
///
/// Searches the primary image and every appended image for a full record,
/// decoding leniently (see [`ParseOptions::default`]).
///
/// # Arguments
/// * `buffer` - JPEG file contents as bytes
///
/// # Errors
/// Returns [`ProbeError::NoGainMapMetadata`] if no record exists, or the
/// decode error of the first malformed record.
pub fn extract_metadata(buffer: &[u8]) -> Result<GainMapMetadata> {
    find_gain_map_metadata(buffer, ParseOptions::default()).map(|found| found.metadata)
}

/// Decodes an APP2 segment given as a hex dump.
///
/// The dump must contain the marker, the length field and the payload; the
/// declared length must match the decoded size.
///
/// # Arguments
/// * `dump` - hex digits, optionally separated by whitespace
/// * `options` - decoding strictness
pub fn parse_hex_segment(dump: &str, options: ParseOptions) -> Result<gainmap::LocatedBlock> {
    let bytes = hex::decode_hex_dump(dump)?;
    gainmap::iso21496::parse_framed_segment(&bytes, options)
}
