//! Segment-by-segment inspection report of a JPEG file.
//!
//! Every codestream in the file is walked through its entropy-coded data up
//! to EOI, so segments of the gain map image appended after the primary
//! image are reported too. All offsets are from the start of the file.

use serde::Serialize;

use super::marker::Marker;
use super::scanner::{MarkerSegment, SegmentScanner, XMP_IDENTIFIER};
use super::streams::{split_codestreams, EmbeddedStream};
use super::xmp::{XmpGainMap, XmpParser};
use crate::error::Result;
use crate::gainmap::iso21496::{self, LocatedBlock, ParseOptions};

/// One row of the segment table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentSummary {
    /// Index into [`ContainerReport::codestreams`]
    pub stream: usize,
    pub offset: usize,
    pub name: String,
    pub code: u16,
    /// Declared length, `None` for standalone markers
    pub length: Option<u16>,
    pub description: String,
}

/// Frame size from the first SOFn segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dimensions {
    pub width: u16,
    pub height: u16,
}

/// An XMP packet carried in APP1.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct XmpPacket {
    pub index: usize,
    /// Offset of the APP1 segment holding the packet
    pub offset: usize,
    /// Offset of the packet bytes after the XMP identifier
    pub data_offset: usize,
    pub size: usize,
    /// `hdrgm` properties, if the packet declares any
    pub gain_map: Option<XmpGainMap>,
}

/// An ISO 21496-1 APP2 segment that failed to decode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockError {
    pub offset: usize,
    pub error: String,
}

impl XmpPacket {
    /// Raw packet bytes in the file the report was built from.
    pub fn bytes<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        &data[self.data_offset..self.data_offset + self.size]
    }
}

/// Everything the scanner learned about a file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainerReport {
    /// Primary image first, then images stored after it
    pub codestreams: Vec<EmbeddedStream>,
    pub segments: Vec<SegmentSummary>,
    /// Frame size of the primary image
    pub dimensions: Option<Dimensions>,
    pub restart_interval: Option<u16>,
    pub xmp_packets: Vec<XmpPacket>,
    pub iso_blocks: Vec<LocatedBlock>,
    pub iso_errors: Vec<BlockError>,
    /// Offset of the primary image's first entropy-coded data
    pub entropy_data_offset: Option<usize>,
}

fn describe(segment: &MarkerSegment<'_>) -> String {
    let marker = segment.marker();
    if let Some((width, height)) = segment.frame_dimensions() {
        return format!("Dimensions: {}x{}", width, height);
    }
    if marker == Marker::Dri {
        return match segment.restart_interval() {
            Some(interval) => format!("Restart Interval: {} MCU", interval),
            None => "Incomplete DRI segment data".to_string(),
        };
    }
    if segment.is_xmp() {
        return "Contains XMP metadata".to_string();
    }
    if segment.is_extended_xmp() {
        return "Extended XMP chunk".to_string();
    }
    if segment.is_exif() {
        return "Exif metadata".to_string();
    }
    if segment.is_icc_profile() {
        return "ICC profile chunk".to_string();
    }
    if segment.is_mpf() {
        return "Multi-Picture Format index".to_string();
    }
    if segment.is_iso21496() {
        return "ISO 21496-1 gain map metadata".to_string();
    }
    match marker {
        Marker::Soi => "Start of image".to_string(),
        Marker::Eoi => "End of image".to_string(),
        Marker::Sos => "Start of scan".to_string(),
        Marker::Dqt => "Quantization tables".to_string(),
        Marker::Dht => "Huffman tables".to_string(),
        Marker::Com => String::from_utf8_lossy(segment.payload())
            .trim_end_matches('\0')
            .to_string(),
        _ => String::new(),
    }
}

impl ContainerReport {
    /// Checks if any decoded ISO block is a full metadata record.
    pub fn has_gain_map_record(&self) -> bool {
        self.iso_blocks.iter().any(|b| b.block.metadata().is_some())
    }

    fn record(
        &mut self,
        stream: usize,
        base: usize,
        segment: &MarkerSegment<'_>,
        options: ParseOptions,
    ) {
        let marker = segment.marker();
        let offset = base + segment.offset();
        let primary = stream == 0;

        if primary && self.dimensions.is_none() {
            self.dimensions = segment
                .frame_dimensions()
                .map(|(width, height)| Dimensions { width, height });
        }
        if primary && self.restart_interval.is_none() {
            self.restart_interval = segment.restart_interval();
        }
        if let Some(packet) = segment.xmp_packet() {
            let gain_map = if XmpParser::has_gain_map_metadata(packet) {
                match XmpParser::parse(packet) {
                    Ok(hints) => Some(hints),
                    Err(e) => {
                        tracing::warn!(offset, "Unreadable XMP packet: {e}");
                        None
                    }
                }
            } else {
                None
            };
            self.xmp_packets.push(XmpPacket {
                index: self.xmp_packets.len(),
                offset,
                data_offset: base + segment.payload_offset() + XMP_IDENTIFIER.len(),
                size: packet.len(),
                gain_map,
            });
        }
        if segment.is_iso21496() {
            match iso21496::parse_segment(segment, options) {
                Ok(block) => self.iso_blocks.push(LocatedBlock { offset, ..block }),
                Err(e) => {
                    tracing::warn!(offset, "Bad ISO 21496-1 block: {e}");
                    self.iso_errors.push(BlockError {
                        offset,
                        error: e.to_string(),
                    });
                }
            }
        }
        if primary && marker == Marker::Sos && self.entropy_data_offset.is_none() {
            self.entropy_data_offset = Some(base + segment.end());
        }

        self.segments.push(SegmentSummary {
            stream,
            offset,
            name: marker.name(),
            code: marker.code(),
            length: segment.declared_length(),
            description: describe(segment),
        });
    }
}

/// Scans every codestream in `data` and builds a report of their segments.
///
/// Framing errors abort the report. A malformed ISO 21496-1 block does not:
/// it is recorded in [`ContainerReport::iso_errors`] and scanning continues.
pub fn inspect(data: &[u8], options: ParseOptions) -> Result<ContainerReport> {
    let codestreams = split_codestreams(data);
    let mut report = ContainerReport {
        codestreams: Vec::new(),
        segments: Vec::new(),
        dimensions: None,
        restart_interval: None,
        xmp_packets: Vec::new(),
        iso_blocks: Vec::new(),
        iso_errors: Vec::new(),
        entropy_data_offset: None,
    };

    for (index, stream) in codestreams.iter().enumerate() {
        for segment in SegmentScanner::through_entropy(stream.bytes(data)) {
            let segment = segment.map_err(|e| e.shifted(stream.start))?;
            report.record(index, stream.start, &segment, options);
        }
    }
    report.codestreams = codestreams;

    tracing::debug!(
        codestreams = report.codestreams.len(),
        segments = report.segments.len(),
        xmp = report.xmp_packets.len(),
        iso = report.iso_blocks.len(),
        "Inspected file"
    );
    Ok(report)
}
