//! Block writer stream.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};

use super::format::*;
use crate::util::Result;

/// Output stream for writing container blocks.
pub struct OStream {
    writer: BufWriter<File>,
    pos: u64,
}

impl OStream {
    /// Create (truncate) the file and write a not-yet-frozen header.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        let mut stream = Self {
            writer: BufWriter::with_capacity(2 * 1024 * 1024, file), // 2MB buffer
            pos: 0,
        };
        stream.write_bytes(MAGIC)?;
        stream.write_u8(NOT_FROZEN_FLAG)?;
        stream.write_u16(CURRENT_VERSION)?;
        stream.write_u64(0)?; // Root position placeholder.
        Ok(stream)
    }

    /// Current write position.
    #[inline]
    pub fn pos(&self) -> u64 {
        self.pos
    }

    /// Write bytes and advance position.
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data)?;
        self.pos += data.len() as u64;
        Ok(())
    }

    /// Write a u64 value (little-endian).
    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.writer.write_u64::<LittleEndian>(value)?;
        self.pos += 8;
        Ok(())
    }

    /// Write a u16 value (little-endian).
    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.writer.write_u16::<LittleEndian>(value)?;
        self.pos += 2;
        Ok(())
    }

    /// Write a u8 value.
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.writer.write_u8(value)?;
        self.pos += 1;
        Ok(())
    }

    /// Write a data block and return its child offset.
    ///
    /// Empty data is not written; it is referenced by [`EMPTY_DATA`].
    pub fn write_data(&mut self, data: &[u8]) -> Result<u64> {
        if data.is_empty() {
            return Ok(EMPTY_DATA);
        }
        let pos = self.pos;
        self.write_u64(data.len() as u64)?;
        self.write_bytes(data)?;
        Ok(make_data_offset(pos))
    }

    /// Write a group block from child offsets and return its child offset.
    pub fn write_group(&mut self, children: &[u64]) -> Result<u64> {
        if children.is_empty() {
            return Ok(make_group_offset(0));
        }
        let pos = self.pos;
        self.write_u64(children.len() as u64)?;
        for &child in children {
            self.write_u64(child)?;
        }
        Ok(make_group_offset(pos))
    }

    /// Patch the header with the root position and set the frozen flag.
    pub fn finish(&mut self, root_pos: u64) -> Result<()> {
        self.writer.flush()?;
        self.writer.seek(SeekFrom::Start(ROOT_POS_OFFSET as u64))?;
        self.writer.write_u64::<LittleEndian>(root_pos)?;
        self.writer.flush()?;
        // Frozen flag last.
        self.writer.seek(SeekFrom::Start(FROZEN_OFFSET as u64))?;
        self.writer.write_u8(FROZEN_FLAG)?;
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        self.pos = self.writer.seek(SeekFrom::End(0))?;
        Ok(())
    }
}
