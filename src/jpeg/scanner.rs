//! JPEG marker segment scanner.
//!
//! Walks the marker segments of a JPEG codestream in a single forward pass,
//! from SOI up to the start of the entropy-coded data.

use std::iter::FusedIterator;

use byteorder::{BigEndian, ByteOrder};

use super::marker::Marker;
use crate::error::{ProbeError, Result};

/// APP1 identifier of an XMP packet.
pub const XMP_IDENTIFIER: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";
/// APP1 identifier of an Extended XMP chunk.
pub const EXTENDED_XMP_IDENTIFIER: &[u8] = b"http://ns.adobe.com/xmp/extension/\0";
/// APP1 identifier of an Exif block.
pub const EXIF_IDENTIFIER: &[u8] = b"Exif\0\0";
/// APP2 identifier of an ICC profile chunk.
pub const ICC_IDENTIFIER: &[u8] = b"ICC_PROFILE\0";
/// APP2 identifier of a Multi-Picture Format index.
pub const MPF_IDENTIFIER: &[u8] = b"MPF\0";

/// A marker segment borrowed from the scanned buffer.
///
/// The framed bytes cover any fill bytes, the marker, the length field and
/// the payload, so consecutive segments tile the scanned range exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerSegment<'a> {
    offset: usize,
    marker: Marker,
    fill: usize,
    length: Option<u16>,
    framed: &'a [u8],
}

impl<'a> MarkerSegment<'a> {
    /// Offset of the first framing byte in the scanned buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Offset one past the last byte of this segment.
    pub fn end(&self) -> usize {
        self.offset + self.framed.len()
    }

    pub fn marker(&self) -> Marker {
        self.marker
    }

    /// Number of `0xFF` fill bytes preceding the marker.
    pub fn fill_bytes(&self) -> usize {
        self.fill
    }

    /// Declared length field (includes its own two bytes), if the marker has one.
    pub fn declared_length(&self) -> Option<u16> {
        self.length
    }

    /// Offset of the payload in the scanned buffer.
    pub fn payload_offset(&self) -> usize {
        self.offset + self.header_len()
    }

    /// Segment payload, excluding marker and length bytes.
    pub fn payload(&self) -> &'a [u8] {
        &self.framed[self.header_len()..]
    }

    /// All bytes of the segment as they appear in the buffer.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.framed
    }

    fn header_len(&self) -> usize {
        let length_field = if self.length.is_some() { 2 } else { 0 };
        self.fill + 2 + length_field
    }

    /// Checks if the payload starts with the given identifier.
    pub fn has_identifier(&self, identifier: &[u8]) -> bool {
        self.payload().starts_with(identifier)
    }

    /// Checks if this segment contains XMP data.
    pub fn is_xmp(&self) -> bool {
        self.marker == Marker::APP1 && self.has_identifier(XMP_IDENTIFIER)
    }

    /// Checks if this segment contains Extended XMP data.
    pub fn is_extended_xmp(&self) -> bool {
        self.marker == Marker::APP1 && self.has_identifier(EXTENDED_XMP_IDENTIFIER)
    }

    /// Checks if this segment contains Exif data.
    pub fn is_exif(&self) -> bool {
        self.marker == Marker::APP1 && self.has_identifier(EXIF_IDENTIFIER)
    }

    /// Checks if this segment contains an ICC profile chunk.
    pub fn is_icc_profile(&self) -> bool {
        self.marker == Marker::APP2 && self.has_identifier(ICC_IDENTIFIER)
    }

    /// Checks if this segment is an MPF (Multi-Picture Format) segment.
    pub fn is_mpf(&self) -> bool {
        self.marker == Marker::APP2 && self.has_identifier(MPF_IDENTIFIER)
    }

    /// Checks if this segment carries an ISO 21496-1 gain map block.
    pub fn is_iso21496(&self) -> bool {
        self.marker == Marker::APP2
            && self.has_identifier(crate::gainmap::iso21496::ISO21496_IDENTIFIER)
    }

    /// Gets the XMP packet if this is an XMP segment.
    pub fn xmp_packet(&self) -> Option<&'a [u8]> {
        if !self.is_xmp() {
            return None;
        }
        Some(&self.payload()[XMP_IDENTIFIER.len()..])
    }

    /// Image dimensions `(width, height)` if this is a start-of-frame segment.
    pub fn frame_dimensions(&self) -> Option<(u16, u16)> {
        if !self.marker.is_sof() {
            return None;
        }
        let data = self.payload();
        if data.len() < 5 {
            return None;
        }
        let height = BigEndian::read_u16(&data[1..3]);
        let width = BigEndian::read_u16(&data[3..5]);
        Some((width, height))
    }

    /// Restart interval in MCUs if this is a DRI segment.
    pub fn restart_interval(&self) -> Option<u16> {
        if self.marker != Marker::Dri {
            return None;
        }
        let data = self.payload();
        if data.len() < 2 {
            return None;
        }
        Some(BigEndian::read_u16(&data[0..2]))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Start,
    Segments,
    Done,
}

/// Lazy single-pass iterator over the marker segments of a codestream.
///
/// Yields SOI first and stops after EOI. A scanner made with [`Self::new`]
/// also stops after SOS, where the entropy-coded data begins; see
/// [`Self::through_entropy`]. Any framing error is yielded once, after which the iterator is
/// exhausted.
#[derive(Debug, Clone)]
pub struct SegmentScanner<'a> {
    data: &'a [u8],
    pos: usize,
    state: ScanState,
    through_entropy: bool,
}

impl<'a> SegmentScanner<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            state: ScanState::Start,
            through_entropy: false,
        }
    }

    /// Scanner that steps over the entropy-coded data after each SOS and
    /// keeps going until EOI, so every scan of a progressive image and the
    /// trailing EOI are yielded.
    ///
    /// Entropy-coded bytes (including stuffed `FF 00` pairs and RSTn markers)
    /// are not yielded, so segments tile the scanned range only up to the
    /// first SOS.
    pub fn through_entropy(data: &'a [u8]) -> Self {
        Self {
            through_entropy: true,
            ..Self::new(data)
        }
    }

    /// Number of bytes consumed so far.
    pub fn scanned_len(&self) -> usize {
        self.pos
    }

    fn next_segment(&mut self) -> Result<Option<MarkerSegment<'a>>> {
        let data = self.data;

        if self.state == ScanState::Start && !data.starts_with(&[0xFF, 0xD8]) {
            return Err(ProbeError::malformed(0, "missing SOI marker"));
        }
        if self.pos >= data.len() {
            return Ok(None);
        }

        let start = self.pos;
        if data[start] != 0xFF {
            return Err(ProbeError::malformed(
                start,
                format!("expected marker, found byte 0x{:02X}", data[start]),
            ));
        }

        let mut pos = start + 1;
        while pos < data.len() && data[pos] == 0xFF {
            pos += 1;
        }
        if pos >= data.len() {
            return Err(ProbeError::malformed(start, "buffer ends inside marker"));
        }
        if data[pos] == 0x00 {
            return Err(ProbeError::malformed(
                start,
                "stuffed 0xFF00 outside entropy-coded data",
            ));
        }

        let fill = pos - start - 1;
        let marker = Marker::from_byte(data[pos]);
        let header_end = pos + 1;

        let (length, end) = if marker.is_standalone() {
            (None, header_end)
        } else {
            if header_end + 2 > data.len() {
                return Err(ProbeError::malformed(
                    start,
                    format!("{marker} length field truncated"),
                ));
            }
            let length = BigEndian::read_u16(&data[header_end..header_end + 2]);
            if length < 2 {
                return Err(ProbeError::malformed(
                    start,
                    format!("{marker} segment length {length} is less than 2"),
                ));
            }
            let end = header_end + length as usize;
            if end > data.len() {
                return Err(ProbeError::malformed(
                    start,
                    format!(
                        "{marker} segment declares {length} bytes but only {} remain",
                        data.len() - header_end
                    ),
                ));
            }
            (Some(length), end)
        };

        tracing::trace!(offset = start, %marker, ?length, fill, "Scanned segment");

        self.pos = end;
        self.state = match marker {
            Marker::Eoi => ScanState::Done,
            Marker::Sos if !self.through_entropy => ScanState::Done,
            Marker::Sos => {
                self.pos = skip_entropy_data(data, end);
                tracing::trace!(from = end, to = self.pos, "Skipped entropy-coded data");
                ScanState::Segments
            }
            _ => ScanState::Segments,
        };

        Ok(Some(MarkerSegment {
            offset: start,
            marker,
            fill,
            length,
            framed: &data[start..end],
        }))
    }
}

impl<'a> Iterator for SegmentScanner<'a> {
    type Item = Result<MarkerSegment<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == ScanState::Done {
            return None;
        }
        match self.next_segment() {
            Ok(Some(segment)) => Some(Ok(segment)),
            Ok(None) => {
                self.state = ScanState::Done;
                None
            }
            Err(err) => {
                self.state = ScanState::Done;
                Some(Err(err))
            }
        }
    }
}

impl FusedIterator for SegmentScanner<'_> {}

/// Scans all header segments of a codestream, failing on the first framing error.
pub fn scan_segments(data: &[u8]) -> Result<Vec<MarkerSegment<'_>>> {
    let segments = SegmentScanner::new(data).collect::<Result<Vec<_>>>()?;
    tracing::debug!(count = segments.len(), "Scanned codestream header");
    Ok(segments)
}

/// Returns the offset of the first marker after entropy-coded data starting
/// at `start`, or `data.len()` if the data runs to the end of the buffer.
///
/// Stuffed `FF 00` pairs and RST0-RST7 belong to the entropy-coded data. The
/// returned offset points at the first `0xFF` of any fill run before the
/// marker.
pub fn skip_entropy_data(data: &[u8], start: usize) -> usize {
    let mut pos = start;
    while pos < data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }
        let mut next = pos + 1;
        while next < data.len() && data[next] == 0xFF {
            next += 1;
        }
        match data.get(next) {
            None => break,
            Some(0x00 | 0xD0..=0xD7) => pos = next + 1,
            Some(_) => return pos,
        }
    }
    data.len()
}

/// Length of the codestream at the start of `data`, up to and including its
/// EOI marker.
///
/// The codestream is walked segment by segment, so `FF D9` bytes inside
/// marker payloads are never mistaken for its end.
pub fn codestream_end(data: &[u8]) -> Result<usize> {
    for segment in SegmentScanner::through_entropy(data) {
        let segment = segment?;
        if segment.marker() == Marker::Eoi {
            return Ok(segment.end());
        }
    }
    Err(ProbeError::malformed(data.len(), "missing EOI marker"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(marker: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![0xFF, marker];
        out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    fn minimal_codestream() -> Vec<u8> {
        let mut data = vec![0xFF, 0xD8];
        data.extend(segment(0xE0, b"JFIF\0\x01\x02\x00\x00\x01\x00\x01\x00\x00"));
        data.extend(segment(0xDD, &[0x00, 0x10]));
        data.extend(segment(0xC0, &[8, 0x00, 0x20, 0x00, 0x40, 1, 1, 0x11, 0]));
        data.extend(segment(0xDA, &[1, 1, 0, 0, 63, 0]));
        data.extend_from_slice(&[0x12, 0x34, 0xFF, 0x00, 0x56, 0xFF, 0xD9]);
        data
    }

    #[test]
    fn test_minimal_jpeg() {
        let data = vec![0xFF, 0xD8, 0xFF, 0xD9];
        let segments = scan_segments(&data).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].marker(), Marker::Soi);
        assert_eq!(segments[1].marker(), Marker::Eoi);
        assert_eq!(segments[1].offset(), 2);
    }

    #[test]
    fn test_missing_soi() {
        let data = vec![0x00, 0x00];
        let err = scan_segments(&data).unwrap_err();
        assert!(matches!(err, ProbeError::MalformedContainer { offset: 0, .. }));
        assert!(scan_segments(&[]).is_err());
    }

    #[test]
    fn test_stops_at_start_of_scan() {
        let data = minimal_codestream();
        let mut scanner = SegmentScanner::new(&data);
        let markers: Vec<_> = scanner.by_ref().map(|s| s.unwrap().marker()).collect();
        assert_eq!(
            markers,
            vec![Marker::Soi, Marker::App(0), Marker::Dri, Marker::Sof(0), Marker::Sos]
        );
        assert_eq!(scanner.scanned_len(), data.len() - 7);
        assert!(scanner.next().is_none());
    }

    #[test]
    fn test_segments_tile_scanned_range() {
        let data = minimal_codestream();
        let mut scanner = SegmentScanner::new(&data);
        let mut rebuilt = Vec::new();
        for segment in scanner.by_ref() {
            rebuilt.extend_from_slice(segment.unwrap().as_bytes());
        }
        assert_eq!(rebuilt, &data[..scanner.scanned_len()]);
    }

    #[test]
    fn test_frame_dimensions_and_restart_interval() {
        let data = minimal_codestream();
        let segments = scan_segments(&data).unwrap();
        let sof = segments.iter().find_map(MarkerSegment::frame_dimensions);
        assert_eq!(sof, Some((0x40, 0x20)));
        let dri = segments.iter().find_map(MarkerSegment::restart_interval);
        assert_eq!(dri, Some(16));
    }

    #[test]
    fn test_fill_bytes_belong_to_segment() {
        let mut data = vec![0xFF, 0xD8, 0xFF, 0xFF];
        data.extend(segment(0xFE, b"hi"));
        let segments = scan_segments(&data).unwrap();
        let com = &segments[1];
        assert_eq!(com.marker(), Marker::Com);
        assert_eq!(com.fill_bytes(), 2);
        assert_eq!(com.payload(), b"hi");
        assert_eq!(com.payload_offset(), 8);
        assert_eq!(com.end(), data.len());
    }

    #[test]
    fn test_length_less_than_two() {
        let data = vec![0xFF, 0xD8, 0xFF, 0xE2, 0x00, 0x01];
        let err = scan_segments(&data).unwrap_err();
        assert!(matches!(err, ProbeError::MalformedContainer { offset: 2, .. }));
    }

    #[test]
    fn test_truncated_segment() {
        let mut data = vec![0xFF, 0xD8];
        let full = segment(0xE2, &[0xAB; 16]);
        data.extend_from_slice(&full[..full.len() - 1]);
        let err = scan_segments(&data).unwrap_err();
        assert!(matches!(err, ProbeError::MalformedContainer { offset: 2, .. }));
    }

    #[test]
    fn test_truncated_length_field() {
        let data = vec![0xFF, 0xD8, 0xFF, 0xE1, 0x00];
        assert!(scan_segments(&data).is_err());
    }

    #[test]
    fn test_garbage_between_segments() {
        let data = vec![0xFF, 0xD8, 0x42, 0xFF, 0xD9];
        let mut scanner = SegmentScanner::new(&data);
        assert!(scanner.next().unwrap().is_ok());
        assert!(scanner.next().unwrap().is_err());
        assert!(scanner.next().is_none());
    }

    #[test]
    fn test_segment_identifiers() {
        let mut xmp = XMP_IDENTIFIER.to_vec();
        xmp.extend_from_slice(b"<x:xmpmeta/>");
        let mut data = vec![0xFF, 0xD8];
        data.extend(segment(0xE1, &xmp));
        data.extend(segment(0xE2, b"MPF\0II*\0"));
        data.extend(segment(0xE2, b"ICC_PROFILE\0\x01\x01"));
        data.extend_from_slice(&[0xFF, 0xD9]);

        let segments = scan_segments(&data).unwrap();
        assert!(segments[1].is_xmp());
        assert_eq!(segments[1].xmp_packet(), Some(&b"<x:xmpmeta/>"[..]));
        assert!(segments[2].is_mpf());
        assert!(segments[3].is_icc_profile());
        assert!(!segments[3].is_iso21496());
    }

    #[test]
    fn test_through_entropy_reaches_eoi() {
        let data = minimal_codestream();
        let mut scanner = SegmentScanner::through_entropy(&data);
        let markers: Vec<_> = scanner.by_ref().map(|s| s.unwrap().marker()).collect();
        assert_eq!(
            markers,
            vec![
                Marker::Soi,
                Marker::App(0),
                Marker::Dri,
                Marker::Sof(0),
                Marker::Sos,
                Marker::Eoi
            ]
        );
        assert_eq!(scanner.scanned_len(), data.len());
    }

    #[test]
    fn test_through_entropy_progressive_scans() {
        let mut data = vec![0xFF, 0xD8];
        data.extend(segment(0xC2, &[8, 0x00, 0x08, 0x00, 0x08, 1, 1, 0x11, 0]));
        data.extend(segment(0xDA, &[1, 1, 0, 0, 0, 0]));
        // RST markers and stuffed bytes stay inside the entropy data.
        data.extend_from_slice(&[0x01, 0xFF, 0xD0, 0x02, 0xFF, 0x00, 0xFF, 0xD1, 0x03]);
        data.extend(segment(0xC4, &[0x10; 4]));
        data.extend(segment(0xDA, &[1, 1, 0, 1, 63, 0]));
        data.extend_from_slice(&[0x04, 0x05, 0xFF, 0xFF, 0xD9]);

        let segments = SegmentScanner::through_entropy(&data)
            .collect::<Result<Vec<_>>>()
            .unwrap();
        let markers: Vec<_> = segments.iter().map(MarkerSegment::marker).collect();
        assert_eq!(
            markers,
            vec![
                Marker::Soi,
                Marker::Sof(2),
                Marker::Sos,
                Marker::Dht,
                Marker::Sos,
                Marker::Eoi
            ]
        );
        let eoi = segments.last().unwrap();
        assert_eq!(eoi.fill_bytes(), 1);
        assert_eq!(eoi.offset(), data.len() - 3);
    }

    #[test]
    fn test_skip_entropy_data() {
        let data = [0x01, 0xFF, 0x00, 0xFF, 0xD3, 0x02, 0xFF, 0xFF, 0xC4];
        assert_eq!(skip_entropy_data(&data, 0), 6);
        assert_eq!(skip_entropy_data(&data[..5], 0), 5);
        assert_eq!(skip_entropy_data(&[0x01, 0xFF], 0), 2);
    }

    #[test]
    fn test_codestream_end_ignores_payload_eoi() {
        let mut data = vec![0xFF, 0xD8];
        data.extend(segment(0xE2, b"ICC_PROFILE\0\x01\x01\xFF\xD9\xFF\xD8"));
        data.extend(segment(0xDA, &[1, 1, 0, 0, 63, 0]));
        data.extend_from_slice(&[0x12, 0xFF, 0x00, 0xFF, 0xD9]);
        let primary_len = data.len();
        data.extend_from_slice(&[0xFF, 0xD8, 0xFF, 0xD9]);

        assert_eq!(codestream_end(&data).unwrap(), primary_len);
        assert_eq!(codestream_end(&data[primary_len..]).unwrap(), 4);
    }

    #[test]
    fn test_codestream_end_requires_eoi() {
        let mut data = vec![0xFF, 0xD8];
        data.extend(segment(0xDA, &[1, 1, 0, 0, 63, 0]));
        data.extend_from_slice(&[0x12, 0x34]);
        let err = codestream_end(&data).unwrap_err();
        assert_eq!(
            err,
            ProbeError::MalformedContainer {
                offset: data.len(),
                reason: "missing EOI marker".to_string(),
            }
        );
    }
}
