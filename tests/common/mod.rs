//! Synthetic JPEG containers and ISO 21496-1 payloads, assembled byte by byte.

#![allow(dead_code)]

pub const ISO_IDENTIFIER: &[u8] = b"urn:iso:std:iso:ts:21496:-1\0";
pub const XMP_IDENTIFIER: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";
pub const ICC_IDENTIFIER: &[u8] = b"ICC_PROFILE\0";

/// ICC curve bytes that happen to contain SOI and EOI marker pairs.
pub const ICC_WITH_MARKER_BYTES: &[u8] = &[0x00, 0x10, 0xFF, 0xD8, 0x7F, 0xFF, 0xD9, 0xFF, 0xD8];

/// Builds a codestream header segment by segment.
#[derive(Debug, Clone, Default)]
pub struct JpegBuilder {
    data: Vec<u8>,
}

impl JpegBuilder {
    pub fn new() -> Self {
        Self {
            data: vec![0xFF, 0xD8],
        }
    }

    pub fn segment(mut self, marker: u8, payload: &[u8]) -> Self {
        self.data.extend_from_slice(&[0xFF, marker]);
        self.data
            .extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
        self.data.extend_from_slice(payload);
        self
    }

    pub fn xmp(self, packet: &str) -> Self {
        let mut payload = XMP_IDENTIFIER.to_vec();
        payload.extend_from_slice(packet.as_bytes());
        self.segment(0xE1, &payload)
    }

    pub fn iso(self, body: &[u8]) -> Self {
        self.segment(0xE2, &iso_payload(body))
    }

    /// Single-chunk ICC profile.
    pub fn icc(self, profile: &[u8]) -> Self {
        let mut payload = ICC_IDENTIFIER.to_vec();
        payload.extend_from_slice(&[1, 1]);
        payload.extend_from_slice(profile);
        self.segment(0xE2, &payload)
    }

    /// Big-endian MPF index with one `(size, offset)` entry per image.
    pub fn mpf(self, images: &[(u32, u32)]) -> Self {
        let mut payload = b"MPF\0MM\x00\x2A".to_vec();
        payload.extend_from_slice(&8u32.to_be_bytes());
        payload.extend_from_slice(&1u16.to_be_bytes());
        payload.extend_from_slice(&[0xB0, 0x02, 0x00, 0x07]);
        payload.extend_from_slice(&((images.len() * 16) as u32).to_be_bytes());
        payload.extend_from_slice(&26u32.to_be_bytes());
        payload.extend_from_slice(&0u32.to_be_bytes());
        for &(size, offset) in images {
            payload.extend_from_slice(&0u32.to_be_bytes());
            payload.extend_from_slice(&size.to_be_bytes());
            payload.extend_from_slice(&offset.to_be_bytes());
            payload.extend_from_slice(&[0; 4]);
        }
        self.segment(0xE2, &payload)
    }

    pub fn frame(self, width: u16, height: u16) -> Self {
        let mut payload = vec![8];
        payload.extend_from_slice(&height.to_be_bytes());
        payload.extend_from_slice(&width.to_be_bytes());
        payload.extend_from_slice(&[1, 1, 0x11, 0]);
        self.segment(0xC0, &payload)
    }

    /// Ends the header with SOS, a little scan data and EOI.
    pub fn finish(mut self) -> Vec<u8> {
        self.data
            .extend_from_slice(&[0xFF, 0xDA, 0x00, 0x08, 1, 1, 0x00, 0, 63, 0]);
        self.data.extend_from_slice(&[0x12, 0x34, 0xFF, 0x00, 0x56]);
        self.data.extend_from_slice(&[0xFF, 0xD9]);
        self.data
    }

    /// Header only, without scan data or EOI.
    pub fn header(self) -> Vec<u8> {
        self.data
    }
}

pub fn iso_payload(body: &[u8]) -> Vec<u8> {
    let mut payload = ISO_IDENTIFIER.to_vec();
    payload.extend_from_slice(body);
    payload
}

/// Writer of ISO 21496-1 bodies with explicit fractions.
#[derive(Debug, Clone)]
pub struct IsoBody {
    pub writer_version: u16,
    pub flags: u8,
    pub base_headroom: (u32, u32),
    pub alternate_headroom: (u32, u32),
    pub gain_map_min: (i32, u32),
    pub gain_map_max: (i32, u32),
    pub gamma: (u32, u32),
    pub base_offset: (i32, u32),
    pub alternate_offset: (i32, u32),
}

impl Default for IsoBody {
    fn default() -> Self {
        Self {
            writer_version: 0,
            flags: 0,
            base_headroom: (0, 1),
            alternate_headroom: (3, 1),
            gain_map_min: (0, 1),
            gain_map_max: (3, 1),
            gamma: (1, 1),
            base_offset: (1, 64),
            alternate_offset: (1, 64),
        }
    }
}

impl IsoBody {
    pub fn bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&self.writer_version.to_be_bytes());
        out.push(self.flags);
        for (n, d) in [self.base_headroom, self.alternate_headroom] {
            out.extend_from_slice(&n.to_be_bytes());
            out.extend_from_slice(&d.to_be_bytes());
        }
        let channels = if self.flags & 0x80 != 0 { 3 } else { 1 };
        for _ in 0..channels {
            push_signed(&mut out, self.gain_map_min);
            push_signed(&mut out, self.gain_map_max);
            out.extend_from_slice(&self.gamma.0.to_be_bytes());
            out.extend_from_slice(&self.gamma.1.to_be_bytes());
            push_signed(&mut out, self.base_offset);
            push_signed(&mut out, self.alternate_offset);
        }
        out
    }
}

fn push_signed(out: &mut Vec<u8>, (n, d): (i32, u32)) {
    out.extend_from_slice(&n.to_be_bytes());
    out.extend_from_slice(&d.to_be_bytes());
}

/// Version-only body as carried by the primary image.
pub fn version_only_body() -> Vec<u8> {
    vec![0x00, 0x00, 0x00, 0x00]
}

const PRIMARY_XMP: &str = r#"<x:xmpmeta xmlns:x="adobe:ns:meta/"><rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"><rdf:Description xmlns:hdrgm="http://ns.adobe.com/hdr-gain-map/1.0/" hdrgm:Version="1.0"/></rdf:RDF></x:xmpmeta>"#;

/// Gain map image carrying the full record.
pub fn gain_map_image(record: &IsoBody) -> Vec<u8> {
    JpegBuilder::new()
        .iso(&record.bytes())
        .frame(16, 8)
        .finish()
}

/// Primary image with a version-only block, followed by a gain map image
/// that carries the full record.
pub fn ultrahdr_file(record: &IsoBody) -> Vec<u8> {
    let mut data = JpegBuilder::new()
        .xmp(PRIMARY_XMP)
        .iso(&version_only_body())
        .frame(64, 32)
        .finish();
    data.extend_from_slice(&gain_map_image(record));
    data
}

/// Primary image whose MPF index points at `gain_map`, stored after
/// `padding` zero bytes.
pub fn ultrahdr_file_with_mpf(gain_map: &[u8], padding: usize) -> Vec<u8> {
    let primary = |offset: u32| {
        JpegBuilder::new()
            .mpf(&[(0, 0), (gain_map.len() as u32, offset)])
            .xmp(PRIMARY_XMP)
            .iso(&version_only_body())
            .frame(64, 32)
            .finish()
    };
    // The TIFF header follows SOI, the APP2 marker and length, and "MPF\0".
    let tiff_base = 2 + 4 + 4;
    let gain_map_start = primary(0).len() + padding;

    let mut data = primary((gain_map_start - tiff_base) as u32);
    data.resize(gain_map_start, 0);
    data.extend_from_slice(gain_map);
    data
}
