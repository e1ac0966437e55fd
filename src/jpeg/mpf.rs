//! Multi-Picture Format index (CIPA DC-007) in APP2.
//!
//! UltraHDR writers record the size and offset of the gain map image in the
//! MP Entry table of the primary image. Offsets are relative to the start of
//! the TIFF header that follows the `MPF\0` identifier; the first image has
//! offset 0.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use serde::Serialize;

use super::scanner::MPF_IDENTIFIER;

const MP_ENTRY_TAG: u16 = 0xB002;
const MP_ENTRY_SIZE: usize = 16;
const IFD_ENTRY_SIZE: usize = 12;

/// One image in the MP Entry table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MpEntry {
    /// Image attribute flags and type code
    pub attribute: u32,
    pub size: u32,
    /// Offset from the MPF TIFF header, 0 for the first image
    pub offset: u32,
}

fn read_u16<B: ByteOrder>(data: &[u8], offset: usize) -> Option<u16> {
    data.get(offset..offset + 2).map(B::read_u16)
}

fn read_u32<B: ByteOrder>(data: &[u8], offset: usize) -> Option<u32> {
    data.get(offset..offset + 4).map(B::read_u32)
}

fn read_entries<B: ByteOrder>(tiff: &[u8]) -> Option<Vec<MpEntry>> {
    let ifd = read_u32::<B>(tiff, 4)? as usize;
    let count = read_u16::<B>(tiff, ifd)?;

    let (byte_count, table) = (0..usize::from(count)).find_map(|i| {
        let entry = ifd + 2 + i * IFD_ENTRY_SIZE;
        if read_u16::<B>(tiff, entry)? != MP_ENTRY_TAG {
            return None;
        }
        Some((
            read_u32::<B>(tiff, entry + 4)? as usize,
            read_u32::<B>(tiff, entry + 8)? as usize,
        ))
    })?;

    (0..byte_count / MP_ENTRY_SIZE)
        .map(|i| {
            let at = table + i * MP_ENTRY_SIZE;
            Some(MpEntry {
                attribute: read_u32::<B>(tiff, at)?,
                size: read_u32::<B>(tiff, at + 4)?,
                offset: read_u32::<B>(tiff, at + 8)?,
            })
        })
        .collect()
}

/// Reads the MP Entry table from an MPF APP2 payload.
///
/// Returns `None` when the payload is not MPF or the table is incomplete.
pub fn parse_mp_entries(payload: &[u8]) -> Option<Vec<MpEntry>> {
    let tiff = payload.strip_prefix(MPF_IDENTIFIER)?;
    match tiff.get(..2)? {
        b"II" => read_entries::<LittleEndian>(tiff),
        b"MM" => read_entries::<BigEndian>(tiff),
        _ => None,
    }
}
