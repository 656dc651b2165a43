//! S4 typed blocks and the cursor API used to (de)serialize them.
//!
//! On disk, a block is a 4-byte header (`length: u16 LE` — the block's
//! total size *including* this header — followed by `type: u16 LE`)
//! immediately followed by `length - 4` bytes of payload. A block's
//! length is fixed at construction; the cursor can move freely within
//! the payload and overwrite bytes in place, but can never grow it —
//! that keeps every AEAD operation over a block working against a
//! stable, pre-declared size.

use crate::error::{Error, Result};

/// A single S4 block: a type tag, a fixed-length payload, and a cursor
/// for sequential or random-access reads/writes.
#[derive(Debug, Clone)]
pub struct Block {
    block_type: u16,
    payload: Vec<u8>,
    cursor: usize,
}

impl Block {
    /// Construct an empty block of the given type and payload length.
    /// Every byte starts zeroed.
    pub fn new(block_type: u16, payload_len: usize) -> Self {
        Self {
            block_type,
            payload: vec![0u8; payload_len],
            cursor: 0,
        }
    }

    /// Rebuild a block from its on-disk bytes (header + payload).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 4 {
            return Err(Error::CorruptBlock("block shorter than its header".into()));
        }
        let length = u16::from_le_bytes([bytes[0], bytes[1]]) as usize;
        let block_type = u16::from_le_bytes([bytes[2], bytes[3]]);
        if length != bytes.len() {
            return Err(Error::CorruptBlock(format!(
                "block header declares length {length} but {} bytes were supplied",
                bytes.len()
            )));
        }
        Ok(Self {
            block_type,
            payload: bytes[4..].to_vec(),
            cursor: 0,
        })
    }

    /// Serialize the block to its on-disk bytes: 4-byte header followed
    /// by the payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        let total_len = self.payload.len() + 4;
        let mut out = Vec::with_capacity(total_len);
        out.extend_from_slice(&(total_len as u16).to_le_bytes());
        out.extend_from_slice(&self.block_type.to_le_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    /// The block's type tag.
    pub fn block_type(&self) -> u16 {
        self.block_type
    }

    /// The block's total on-disk length, header included.
    pub fn block_length(&self) -> u16 {
        (self.payload.len() + 4) as u16
    }

    /// The payload bytes, with no header.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Mutable access to the payload bytes, bypassing the cursor — used
    /// by the AEAD layer to fill in the encrypted body in one shot.
    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.payload
    }

    fn check_bound(&self, pos: usize) -> Result<()> {
        if pos > self.payload.len() {
            return Err(Error::OutOfBounds(format!(
                "position {pos} exceeds payload length {}",
                self.payload.len()
            )));
        }
        Ok(())
    }

    /// Move the cursor to an absolute offset from the start of the
    /// payload.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        self.check_bound(pos)?;
        self.cursor = pos;
        Ok(())
    }

    /// Move the cursor to `offset` bytes back from the end of the
    /// payload.
    pub fn seek_back(&mut self, offset: usize) -> Result<()> {
        let len = self.payload.len();
        if offset > len {
            return Err(Error::OutOfBounds(format!(
                "seek_back({offset}) exceeds payload length {len}"
            )));
        }
        self.cursor = len - offset;
        Ok(())
    }

    /// Current cursor position.
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Read `len` bytes at the cursor and advance it.
    pub fn read(&mut self, len: usize) -> Result<&[u8]> {
        let end = self.cursor.checked_add(len).ok_or_else(|| {
            Error::OutOfBounds("read length overflowed cursor position".into())
        })?;
        self.check_bound(end)?;
        let slice = &self.payload[self.cursor..end];
        self.cursor = end;
        Ok(slice)
    }

    /// Write `data` at the cursor, advancing it. Never extends the
    /// payload — writing past the end is an `OutOfBounds` error, not an
    /// implicit grow.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        let end = self.cursor.checked_add(data.len()).ok_or_else(|| {
            Error::OutOfBounds("write length overflowed cursor position".into())
        })?;
        self.check_bound(end)?;
        self.payload[self.cursor..end].copy_from_slice(data);
        self.cursor = end;
        Ok(())
    }

    /// Read one byte at the cursor.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read(1)?[0])
    }

    /// Read a little-endian `u16` at the cursor.
    pub fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.read(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Read a little-endian `u32` at the cursor.
    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Write one byte at the cursor.
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write(&[value])
    }

    /// Write a little-endian `u16` at the cursor.
    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.write(&value.to_le_bytes())
    }

    /// Write a little-endian `u32` at the cursor.
    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.write(&value.to_le_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes_and_types_roundtrip() {
        let block = Block::new(0x1234, 10);
        assert_eq!(block.block_length(), 14);
        assert_eq!(block.block_type(), 0x1234);

        let bytes = block.to_bytes();
        let restored = Block::from_bytes(&bytes).unwrap();
        assert_eq!(restored.block_type(), 0x1234);
        assert_eq!(restored.block_length(), 14);
        assert_eq!(restored.payload(), block.payload());
    }

    #[test]
    fn test_sequential_write_then_random_access_edit() {
        // Grounded in the cursor fixture's first step: write a string,
        // then seek back from the end and overwrite its last character.
        let message = b"Bender is Great!";
        let mut block = Block::new(1, message.len());
        block.write(message).unwrap();
        assert_eq!(block.payload(), message);

        block.seek_back(1).unwrap();
        block.write_u8(b'?').unwrap();
        assert_eq!(block.payload(), b"Bender is Great?");
    }

    #[test]
    fn test_18_byte_cursor_scenario_matches_reference_fixture() {
        // Mirrors the reference client's BlockTests::RandomAccess: an
        // 18-byte block holding a 16-byte string plus a trailing u16,
        // then a 3-byte backward seek to patch the string's last byte.
        let message = b"Bender is Great!";
        assert_eq!(message.len(), 16);
        let mut block = Block::new(1, message.len() + 2);
        block.write(message).unwrap();
        block.write_u16(0).unwrap();

        block.seek_back(3).unwrap();
        block.write_u8(b'?').unwrap();
        assert_eq!(&block.payload()[..16], b"Bender is Great?");
    }

    #[test]
    fn test_write_cannot_extend_block() {
        let mut block = Block::new(1, 4);
        block.seek(0).unwrap();
        let err = block.write(b"too long").unwrap_err();
        assert!(matches!(err, Error::OutOfBounds(_)));
    }

    #[test]
    fn test_seek_past_end_is_out_of_bounds() {
        let mut block = Block::new(1, 4);
        assert!(block.seek(5).is_err());
        assert!(block.seek_back(5).is_err());
    }

    #[test]
    fn test_corrupt_block_length_mismatch() {
        let mut bytes = Block::new(1, 4).to_bytes();
        bytes[0] = 0xff; // lie about the declared length
        let err = Block::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, Error::CorruptBlock(_)));
    }

    #[test]
    fn test_read_write_ints_are_little_endian() {
        let mut block = Block::new(1, 8);
        block.write_u8(0xab).unwrap();
        block.write_u16(0x1234).unwrap();
        block.write_u32(0xdeadbeef).unwrap();
        block.seek(0).unwrap();
        assert_eq!(block.read_u8().unwrap(), 0xab);
        assert_eq!(block.read_u16().unwrap(), 0x1234);
        assert_eq!(block.read_u32().unwrap(), 0xdeadbeef);
    }
}
