//! Cursor over an immutable byte buffer.
//!
//! Bits are consumed LSB-first within each byte and bytes in buffer order,
//! which is how the Source engine packs its bit streams. Byte sized reads
//! work at any bit position, they simply read 8 bits at a time when the
//! cursor is not aligned.

use std::borrow::Cow;

use crate::DemoError;

const MAX_VARINT32_BYTES: usize = 5;
const MAX_VARINT64_BYTES: usize = 10;

#[derive(Debug, Clone)]
pub struct BitReader<'b> {
    buffer: &'b [u8],
    position: usize,
}

impl<'b> BitReader<'b> {
    pub fn new(buffer: &'b [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    /// Current position in bits.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Current position in whole bytes, rounded down.
    pub fn byte_position(&self) -> usize {
        self.position / 8
    }

    pub fn remaining_bits(&self) -> usize {
        self.buffer.len() * 8 - self.position
    }

    pub fn remaining_bytes(&self) -> usize {
        self.remaining_bits() / 8
    }

    pub fn is_empty(&self) -> bool {
        self.remaining_bits() == 0
    }

    fn ensure(&self, bits: usize) -> Result<(), DemoError> {
        let available = self.remaining_bits();
        if bits > available {
            return Err(DemoError::OutOfBounds {
                position: self.position,
                requested: bits,
                available,
            });
        }
        Ok(())
    }

    pub fn read_bit(&mut self) -> Result<bool, DemoError> {
        Ok(self.read_bits(1)? == 1)
    }

    /// Reads `count` bits (at most 64) into the low bits of the result.
    pub fn read_bits(&mut self, count: u32) -> Result<u64, DemoError> {
        let value = self.peek_bits(count)?;
        self.position += count as usize;
        Ok(value)
    }

    /// Same as [`BitReader::read_bits`] without moving the cursor.
    pub fn peek_bits(&self, count: u32) -> Result<u64, DemoError> {
        assert!(count <= 64, "Can only read up to 64 bits at once");
        self.ensure(count as usize)?;

        let mut value = 0u64;
        let mut read = 0u32;
        let mut position = self.position;
        while read < count {
            let byte = self.buffer[position / 8];
            let offset = (position % 8) as u32;
            let take = (8 - offset).min(count - read);
            let mask = ((1u16 << take) - 1) as u8;

            value |= u64::from((byte >> offset) & mask) << read;

            read += take;
            position += take as usize;
        }

        Ok(value)
    }

    pub fn read_u8(&mut self) -> Result<u8, DemoError> {
        Ok(self.read_bits(8)? as u8)
    }

    pub fn read_u32_le(&mut self) -> Result<u32, DemoError> {
        Ok(self.read_bits(32)? as u32)
    }

    pub fn read_f32(&mut self) -> Result<f32, DemoError> {
        Ok(f32::from_bits(self.read_u32_le()?))
    }

    /// Protobuf style varint, at most 5 bytes.
    pub fn read_varint32(&mut self) -> Result<u32, DemoError> {
        Ok(self.read_varint(MAX_VARINT32_BYTES)? as u32)
    }

    /// Protobuf style varint, at most 10 bytes.
    pub fn read_varint64(&mut self) -> Result<u64, DemoError> {
        self.read_varint(MAX_VARINT64_BYTES)
    }

    /// Zigzag encoded signed varint.
    pub fn read_signed_varint32(&mut self) -> Result<i32, DemoError> {
        let raw = self.read_varint32()?;
        Ok(((raw >> 1) as i32) ^ -((raw & 1) as i32))
    }

    fn read_varint(&mut self, max_bytes: usize) -> Result<u64, DemoError> {
        let start = self.position;

        let mut value = 0u64;
        for index in 0..max_bytes {
            let byte = self.read_u8()?;
            value |= u64::from(byte & 0x7F) << (7 * index);

            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }

        Err(DemoError::VarintOverflow {
            position: start,
            max_bytes,
        })
    }

    /// Reads `count` bytes, borrowing from the buffer when the cursor is
    /// byte aligned.
    pub fn read_bytes(&mut self, count: usize) -> Result<Cow<'b, [u8]>, DemoError> {
        self.ensure(count * 8)?;

        if self.position % 8 == 0 {
            let start = self.position / 8;
            self.position += count * 8;
            return Ok(Cow::Borrowed(&self.buffer[start..start + count]));
        }

        let mut bytes = Vec::with_capacity(count);
        for _ in 0..count {
            bytes.push(self.read_u8()?);
        }
        Ok(Cow::Owned(bytes))
    }

    /// A varint length followed by that many bytes.
    pub fn read_length_prefixed(&mut self) -> Result<Cow<'b, [u8]>, DemoError> {
        let length = self.read_varint32()? as usize;
        self.read_bytes(length)
    }

    /// A varint length prefixed string, invalid UTF-8 is replaced.
    pub fn read_string(&mut self) -> Result<String, DemoError> {
        let raw = self.read_length_prefixed()?;
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }

    /// Reads up to and including the next NUL byte.
    pub fn read_cstring(&mut self) -> Result<String, DemoError> {
        let mut bytes = Vec::new();
        loop {
            match self.read_u8()? {
                0 => break,
                b => bytes.push(b),
            }
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn skip_bits(&mut self, count: usize) -> Result<(), DemoError> {
        self.ensure(count)?;
        self.position += count;
        Ok(())
    }

    pub fn skip_bytes(&mut self, count: usize) -> Result<(), DemoError> {
        self.skip_bits(count * 8)
    }
}
