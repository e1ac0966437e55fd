//! Finding the gain map record among the codestreams of a file.
//!
//! The primary image normally carries only a version-only ISO 21496-1 block;
//! the full record lives in the gain map image appended after it.

use serde::Serialize;

use super::iso21496::{self, IsoBlock, ParseOptions};
use super::metadata::GainMapMetadata;
use crate::error::{ProbeError, Result};
use crate::jpeg::scanner::SegmentScanner;
use crate::jpeg::streams::{split_codestreams, EmbeddedStream};

/// A full metadata record and where it was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GainMapLocation {
    /// Codestream holding the record
    pub stream: EmbeddedStream,
    /// Offset of the APP2 segment in the whole file
    pub offset: usize,
    pub metadata: GainMapMetadata,
}

/// Returns the first full ISO 21496-1 record in `data`.
///
/// The primary image header is searched first, then each image stored after
/// it, as split by [`split_codestreams`]. Streams with broken framing are skipped with a warning. If no record is
/// found, the first block decode error is returned, or
/// [`ProbeError::NoGainMapMetadata`] when there was none.
pub fn find_gain_map_metadata(data: &[u8], options: ParseOptions) -> Result<GainMapLocation> {
    let mut first_error = None;

    for stream in split_codestreams(data) {
        let bytes = stream.bytes(data);
        for segment in SegmentScanner::new(bytes) {
            let segment = match segment {
                Ok(segment) => segment,
                Err(e) => {
                    tracing::warn!(stream = stream.start, "Skipping rest of {}: {e}", stream.role);
                    break;
                }
            };
            if !segment.is_iso21496() {
                continue;
            }

            let offset = stream.start + segment.offset();
            match iso21496::parse_iso_block(segment.payload(), options) {
                Ok(IsoBlock::Metadata(metadata)) => {
                    tracing::debug!(offset, role = %stream.role, "Found gain map metadata");
                    return Ok(GainMapLocation {
                        stream,
                        offset,
                        metadata,
                    });
                }
                Ok(IsoBlock::VersionOnly { writer_version, .. }) => {
                    tracing::debug!(offset, writer_version, "Skipping version-only block");
                }
                Err(e) => {
                    tracing::warn!(offset, "Bad ISO 21496-1 block: {e}");
                    first_error.get_or_insert(e);
                }
            }
        }
    }

    Err(first_error.unwrap_or(ProbeError::NoGainMapMetadata))
}
