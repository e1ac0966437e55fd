//! Big-endian field reader with named truncation errors.

use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt};

use crate::error::{ProbeError, Result};

/// Sequential reader over a metadata body.
///
/// Every read names the field it belongs to, so a short buffer is reported
/// as the first field that could not be read in full.
pub(crate) struct FieldReader<'a> {
    cursor: Cursor<&'a [u8]>,
    base_offset: usize,
}

impl<'a> FieldReader<'a> {
    /// `base_offset` is added to positions reported in errors.
    pub fn new(data: &'a [u8], base_offset: usize) -> Self {
        Self {
            cursor: Cursor::new(data),
            base_offset,
        }
    }

    fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    /// Offset of the next field, relative to the start of the payload.
    pub fn offset(&self) -> usize {
        self.base_offset + self.position()
    }

    pub fn remaining(&self) -> usize {
        self.cursor.get_ref().len().saturating_sub(self.position())
    }

    fn ensure(&self, field: &str, needed: usize) -> Result<()> {
        let available = self.remaining();
        if available < needed {
            return Err(ProbeError::UnexpectedEndOfData {
                field: field.to_string(),
                offset: self.offset(),
                needed,
                available,
            });
        }
        Ok(())
    }

    fn truncated(&self, field: &str, needed: usize) -> ProbeError {
        ProbeError::UnexpectedEndOfData {
            field: field.to_string(),
            offset: self.offset(),
            needed,
            available: self.remaining(),
        }
    }

    pub fn read_u8(&mut self, field: &str) -> Result<u8> {
        self.ensure(field, 1)?;
        self.cursor.read_u8().map_err(|_| self.truncated(field, 1))
    }

    pub fn read_u16(&mut self, field: &str) -> Result<u16> {
        self.ensure(field, 2)?;
        self.cursor
            .read_u16::<BigEndian>()
            .map_err(|_| self.truncated(field, 2))
    }

    pub fn read_u32(&mut self, field: &str) -> Result<u32> {
        self.ensure(field, 4)?;
        self.cursor
            .read_u32::<BigEndian>()
            .map_err(|_| self.truncated(field, 4))
    }

    pub fn read_i32(&mut self, field: &str) -> Result<i32> {
        self.ensure(field, 4)?;
        self.cursor
            .read_i32::<BigEndian>()
            .map_err(|_| self.truncated(field, 4))
    }
}
