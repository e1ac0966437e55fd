//! Locating the JPEG codestreams packed into one file.
//!
//! HDR JPEGs append the gain map image after the primary image, and Exif
//! blocks often embed a thumbnail. [`split_codestreams`] finds them
//! structurally: it walks the primary image segment by segment to its EOI,
//! then follows the MPF index or the images appended back to back.
//! [`locate_streams`] instead pairs raw SOI and EOI byte patterns with a
//! stack. That also finds nested thumbnails, but marker-like bytes inside
//! APPn payloads (ICC curve tables, for one) produce spurious pairs.

use std::fmt;

use serde::Serialize;

use super::mpf::parse_mp_entries;
use super::scanner::{codestream_end, SegmentScanner, MPF_IDENTIFIER};

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];

/// How a codestream relates to the others in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StreamRole {
    /// First top-level codestream
    Main,
    /// Codestream nested inside another one
    Thumbnail,
    /// Top-level codestream after the main one, such as a gain map
    Auxiliary,
}

impl fmt::Display for StreamRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StreamRole::Main => "Main Image",
            StreamRole::Thumbnail => "Thumbnail",
            StreamRole::Auxiliary => "Auxiliary Image",
        })
    }
}

/// Byte range `start..end` of one codestream, including SOI and EOI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EmbeddedStream {
    pub start: usize,
    pub end: usize,
    pub role: StreamRole,
}

impl EmbeddedStream {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The codestream bytes within the scanned file.
    pub fn bytes<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        &data[self.start..self.end]
    }

    fn contains(&self, other: &EmbeddedStream) -> bool {
        other.start > self.start && other.end < self.end
    }
}

fn find_all(data: &[u8], pattern: [u8; 2]) -> Vec<usize> {
    data.windows(2)
        .enumerate()
        .filter(|(_, window)| window[..] == pattern)
        .map(|(pos, _)| pos)
        .collect()
}

/// Finds every SOI..EOI codestream in `data`, ordered by start offset.
pub fn locate_streams(data: &[u8]) -> Vec<EmbeddedStream> {
    let soi_positions = find_all(data, SOI);
    let eoi_positions = find_all(data, EOI);

    if soi_positions.len() != eoi_positions.len() {
        tracing::warn!(
            soi = soi_positions.len(),
            eoi = eoi_positions.len(),
            "Mismatched SOI/EOI marker counts"
        );
    }

    let mut events: Vec<(usize, bool)> = soi_positions
        .into_iter()
        .map(|pos| (pos, true))
        .chain(eoi_positions.into_iter().map(|pos| (pos, false)))
        .collect();
    events.sort_unstable();

    let mut open = Vec::new();
    let mut ranges = Vec::new();
    for (pos, is_soi) in events {
        if is_soi {
            open.push(pos);
        } else if let Some(start) = open.pop() {
            ranges.push((start, pos + EOI.len()));
        }
    }

    let mut streams: Vec<EmbeddedStream> = ranges
        .into_iter()
        .map(|(start, end)| EmbeddedStream {
            start,
            end,
            role: StreamRole::Auxiliary,
        })
        .collect();
    streams.sort_unstable_by_key(|s| s.start);

    let nested: Vec<bool> = streams
        .iter()
        .map(|inner| streams.iter().any(|outer| outer.contains(inner)))
        .collect();

    let mut seen_main = false;
    for (stream, is_nested) in streams.iter_mut().zip(nested) {
        stream.role = if is_nested {
            StreamRole::Thumbnail
        } else if !seen_main {
            seen_main = true;
            StreamRole::Main
        } else {
            StreamRole::Auxiliary
        };
    }

    tracing::debug!(count = streams.len(), "Located codestreams");
    streams
}

fn mpf_streams(data: &[u8], primary_end: usize) -> Vec<EmbeddedStream> {
    let Some(mpf) = SegmentScanner::new(&data[..primary_end])
        .map_while(std::result::Result::ok)
        .find(|segment| segment.is_mpf())
    else {
        return Vec::new();
    };
    let Some(entries) = parse_mp_entries(mpf.payload()) else {
        tracing::warn!(offset = mpf.offset(), "Unreadable MPF index");
        return Vec::new();
    };

    let base = mpf.payload_offset() + MPF_IDENTIFIER.len();
    entries
        .iter()
        .filter(|entry| entry.offset != 0)
        .filter_map(|entry| {
            let start = base.checked_add(entry.offset as usize)?;
            let end = start.checked_add(entry.size as usize)?;
            if end > data.len() || !data[start..].starts_with(&SOI) {
                tracing::warn!(start, end, "MPF entry does not point at a codestream");
                return None;
            }
            Some(EmbeddedStream {
                start,
                end,
                role: StreamRole::Auxiliary,
            })
        })
        .collect()
}

fn appended_streams(data: &[u8], primary_end: usize) -> Vec<EmbeddedStream> {
    let mut streams = Vec::new();
    let mut pos = primary_end;
    while data[pos..].starts_with(&SOI) {
        let end = match codestream_end(&data[pos..]) {
            Ok(len) => pos + len,
            Err(e) => {
                tracing::warn!(start = pos, "Appended codestream runs to end of file: {e}");
                data.len()
            }
        };
        streams.push(EmbeddedStream {
            start: pos,
            end,
            role: StreamRole::Auxiliary,
        });
        pos = end;
    }
    streams
}

/// Splits `data` into its primary codestream and the images stored after it.
///
/// The primary image is walked to its real EOI. Auxiliary images come from
/// the MPF index when the primary has one that points at valid codestreams,
/// otherwise from codestreams that follow each other directly. If the
/// primary has no EOI, the whole buffer is returned as the main stream.
/// The main stream comes first, auxiliary streams follow in file order.
pub fn split_codestreams(data: &[u8]) -> Vec<EmbeddedStream> {
    if data.is_empty() {
        return Vec::new();
    }
    let primary_end = match codestream_end(data) {
        Ok(end) => end,
        Err(e) => {
            tracing::debug!("Primary codestream has no end: {e}");
            return vec![EmbeddedStream {
                start: 0,
                end: data.len(),
                role: StreamRole::Main,
            }];
        }
    };

    let mut streams = mpf_streams(data, primary_end);
    if streams.is_empty() {
        streams = appended_streams(data, primary_end);
    }
    streams.sort_unstable_by_key(|s| s.start);
    streams.insert(
        0,
        EmbeddedStream {
            start: 0,
            end: primary_end,
            role: StreamRole::Main,
        },
    );

    tracing::debug!(count = streams.len(), "Split codestreams");
    streams
}
