//! JPEG container inspection.
//!
//! This module walks the marker segments of JPEG codestreams, including:
//! - symbolic marker names and segment framing
//! - APP1 (Exif, XMP) and APP2 (ICC profile, MPF, ISO 21496-1) identifiers
//! - codestreams embedded in one file (thumbnails, gain map images)

pub mod marker;
pub mod mpf;
pub mod report;
pub mod scanner;
pub mod streams;
pub mod xmp;

pub use marker::Marker;
pub use report::{inspect, ContainerReport, SegmentSummary};
pub use scanner::{scan_segments, MarkerSegment, SegmentScanner};
pub use streams::{locate_streams, split_codestreams, EmbeddedStream, StreamRole};
pub use xmp::{XmpGainMap, XmpParser};
