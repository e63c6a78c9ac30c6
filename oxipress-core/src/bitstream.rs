//! Bit-level I/O for DEFLATE streams.
//!
//! DEFLATE packs its variable-length fields LSB-first: the first bit of the
//! stream lands in the least significant bit of the first byte. Huffman
//! codes are the one exception, transmitted most significant bit first;
//! [`BitWriter::write_huffman_code`] performs the required reversal so the
//! rest of the encoder never has to think about it.
//!
//! # Example
//!
//! ```
//! use oxipress_core::bitstream::{BitReader, BitWriter};
//! use std::io::Cursor;
//!
//! let mut writer = BitWriter::new();
//! writer.write_bits(0b101, 3).unwrap();
//! writer.write_bits(0b1100, 4).unwrap();
//! let bytes = writer.finish().unwrap().into_vec();
//!
//! let mut reader = BitReader::new(Cursor::new(&bytes));
//! assert_eq!(reader.read_bits(3).unwrap(), 0b101);
//! assert_eq!(reader.read_bits(4).unwrap(), 0b1100);
//! ```

use crate::buffer::ByteBuffer;
use crate::error::{OxiPressError, Result};
use std::io::Read;

/// Reads bits LSB-first from any `Read` source.
///
/// Incoming bytes are staged in a 64-bit window so that reads spanning byte
/// boundaries never touch the source more than necessary.
#[derive(Debug)]
pub struct BitReader<R: Read> {
    source: R,
    /// Bits waiting to be consumed, first bit in the LSB.
    window: u64,
    /// How many bits of `window` are valid.
    available: u8,
    /// Bits consumed so far, used for error positions.
    consumed: u64,
}

impl<R: Read> BitReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            source,
            window: 0,
            available: 0,
            consumed: 0,
        }
    }

    /// Position in the stream, in bits, for error reporting.
    pub fn bit_position(&self) -> u64 {
        self.consumed
    }

    /// Pull bytes from the source until `count` bits are staged.
    fn refill(&mut self, count: u8) -> Result<()> {
        debug_assert!(count <= 32, "window refill limited to 32 bits");

        while self.available < count {
            let want = usize::from(count - self.available).div_ceil(8).min(4);
            let mut chunk = [0u8; 4];
            let got = self.source.read(&mut chunk[..want])?;
            if got == 0 {
                return Err(OxiPressError::unexpected_eof(want));
            }
            for &byte in &chunk[..got] {
                self.window |= u64::from(byte) << self.available;
                self.available += 8;
            }
        }
        Ok(())
    }

    /// Drop `count` staged bits.
    fn advance(&mut self, count: u8) {
        self.window >>= count;
        self.available -= count;
        self.consumed += u64::from(count);
    }

    /// Read `count` bits (at most 32), first bit in the LSB of the result.
    #[inline]
    pub fn read_bits(&mut self, count: u8) -> Result<u32> {
        debug_assert!(count <= 32, "read_bits limited to 32 bits");

        if count == 0 {
            return Ok(0);
        }
        self.refill(count)?;
        let value = (self.window & ((1u64 << count) - 1)) as u32;
        self.advance(count);
        Ok(value)
    }

    /// Read a single bit.
    pub fn read_bit(&mut self) -> Result<bool> {
        self.read_bits(1).map(|bit| bit == 1)
    }

    /// Discard bits up to the next byte boundary.
    pub fn align_to_byte(&mut self) {
        let partial = self.available % 8;
        if partial != 0 {
            self.advance(partial);
        }
    }

    /// Read whole bytes, bypassing bit staging.
    ///
    /// Must be called on a byte boundary (stored blocks align first).
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        debug_assert!(self.available % 8 == 0, "read_bytes requires byte alignment");

        let staged = usize::from(self.available / 8).min(buf.len());
        for slot in &mut buf[..staged] {
            *slot = (self.window & 0xFF) as u8;
            self.advance(8);
        }

        let direct = &mut buf[staged..];
        if !direct.is_empty() {
            self.source.read_exact(direct)?;
            self.consumed += 8 * direct.len() as u64;
        }
        Ok(())
    }
}

/// Writes bits LSB-first into a [`ByteBuffer`].
///
/// Bits collect in a 64-bit accumulator and spill to the buffer as whole
/// bytes. Buffer growth is fallible, so allocation failure surfaces as an
/// error instead of aborting. `finish()` zero-pads the final partial byte
/// and hands back the buffer.
#[derive(Debug, Default)]
pub struct BitWriter {
    out: ByteBuffer,
    /// Bits not yet spilled, first bit in the LSB.
    pending: u64,
    /// How many bits of `pending` are valid.
    pending_bits: u8,
    /// Total bits written, including those still pending.
    written: u64,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of bits written so far.
    pub fn bits_written(&self) -> u64 {
        self.written
    }

    /// Number of whole bytes spilled to the output buffer so far.
    pub fn bytes_written(&self) -> usize {
        self.out.len()
    }

    /// Spill whole bytes from the accumulator into the output buffer.
    #[inline]
    fn spill(&mut self) -> Result<()> {
        // At most 39 bits are ever pending (7 left over plus one 32-bit
        // write), so `whole` stays below 8 and the shift below 64.
        let whole = self.pending_bits / 8;
        if whole > 0 {
            let bytes = self.pending.to_le_bytes();
            self.out.extend_from_slice(&bytes[..usize::from(whole)])?;
            self.pending >>= 8 * whole;
            self.pending_bits -= 8 * whole;
        }
        Ok(())
    }

    /// Write the low `count` bits of `value` (at most 32), LSB leaving
    /// first. Bits of `value` above `count` are ignored.
    #[inline]
    pub fn write_bits(&mut self, value: u32, count: u8) -> Result<()> {
        debug_assert!(count <= 32, "write_bits limited to 32 bits");

        if count == 0 {
            return Ok(());
        }
        let value = if count < 32 {
            value & ((1 << count) - 1)
        } else {
            value
        };
        self.pending |= u64::from(value) << self.pending_bits;
        self.pending_bits += count;
        self.written += u64::from(count);
        self.spill()
    }

    /// Write a single bit.
    #[inline]
    pub fn write_bit(&mut self, bit: bool) -> Result<()> {
        self.write_bits(u32::from(bit), 1)
    }

    /// Write a canonical Huffman code.
    ///
    /// DEFLATE transmits Huffman codes most significant bit first, opposite
    /// to everything else in the stream, so the code is reversed before
    /// packing.
    #[inline]
    pub fn write_huffman_code(&mut self, code: u32, length: u8) -> Result<()> {
        debug_assert!(length > 0, "Huffman codes are at least one bit");
        debug_assert!(length <= 32, "Huffman codes are at most 32 bits");

        let reversed = code.reverse_bits() >> (32 - length);
        self.write_bits(reversed, length)
    }

    /// Zero-pad up to the next byte boundary.
    pub fn align_to_byte(&mut self) -> Result<()> {
        let partial = self.pending_bits % 8;
        if partial != 0 {
            self.write_bits(0, 8 - partial)?;
        }
        Ok(())
    }

    /// Write whole bytes, bypassing bit packing.
    ///
    /// Must be called on a byte boundary (stored blocks align first).
    pub fn write_bytes(&mut self, buf: &[u8]) -> Result<()> {
        self.spill()?;
        debug_assert!(self.pending_bits == 0, "write_bytes requires byte alignment");

        self.out.extend_from_slice(buf)?;
        self.written += 8 * buf.len() as u64;
        Ok(())
    }

    /// Zero-pad the final partial byte and hand back the output buffer.
    pub fn finish(mut self) -> Result<ByteBuffer> {
        self.align_to_byte()?;
        self.spill()?;
        Ok(self.out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_reader_delivers_lsb_first() {
        // 0xB5 = 0b1011_0101, so bit-at-a-time reads see 1,0,1,0,1,1,0,1.
        let mut reader = BitReader::new(Cursor::new(vec![0xB5u8]));
        let bits: Vec<u32> = (0..8).map(|_| reader.read_bits(1).unwrap()).collect();
        assert_eq!(bits, [1, 0, 1, 0, 1, 1, 0, 1]);
    }

    #[test]
    fn test_reader_spans_byte_boundary() {
        let mut reader = BitReader::new(Cursor::new(vec![0xFFu8, 0x00]));
        assert_eq!(reader.read_bits(4).unwrap(), 0b1111);
        assert_eq!(reader.read_bits(8).unwrap(), 0b0000_1111);
        assert_eq!(reader.read_bits(4).unwrap(), 0);
    }

    #[test]
    fn test_reading_past_end_fails() {
        let mut reader = BitReader::new(Cursor::new(vec![0x01u8]));
        assert_eq!(reader.read_bits(8).unwrap(), 1);
        assert!(reader.read_bits(1).is_err());
    }

    #[test]
    fn test_bit_position_tracks_consumption() {
        let mut reader = BitReader::new(Cursor::new(vec![0u8; 4]));
        reader.read_bits(3).unwrap();
        reader.read_bits(11).unwrap();
        assert_eq!(reader.bit_position(), 14);
        reader.align_to_byte();
        assert_eq!(reader.bit_position(), 16);
    }

    #[test]
    fn test_writer_packs_lsb_first() {
        let mut writer = BitWriter::new();
        for bit in [true, false, true, false, true, true, false, true] {
            writer.write_bit(bit).unwrap();
        }
        assert_eq!(writer.finish().unwrap().into_vec(), [0xB5]);
    }

    #[test]
    fn test_writer_packs_fields_in_order() {
        let mut writer = BitWriter::new();
        writer.write_bits(0b101, 3).unwrap();
        writer.write_bits(0b11001, 5).unwrap();
        assert_eq!(writer.finish().unwrap().into_vec(), [0b1100_1101]);
    }

    #[test]
    fn test_writer_masks_extra_bits() {
        let mut writer = BitWriter::new();
        writer.write_bits(0xFFFF_FF02, 8).unwrap();
        assert_eq!(writer.finish().unwrap().into_vec(), [0x02]);
    }

    #[test]
    fn test_huffman_code_is_reversed() {
        // Fixed-tree literal 0 has the 8-bit code 0b0011_0000. MSB-first
        // transmission means the stream byte reads back 0b0000_1100.
        let mut writer = BitWriter::new();
        writer.write_huffman_code(0b0011_0000, 8).unwrap();
        assert_eq!(writer.finish().unwrap().into_vec(), [0b0000_1100]);
    }

    #[test]
    fn test_write_bytes_after_alignment() {
        let mut writer = BitWriter::new();
        writer.write_bits(0b010, 3).unwrap();
        writer.align_to_byte().unwrap();
        writer.write_bytes(&[0xDE, 0xAD]).unwrap();
        assert_eq!(writer.finish().unwrap().into_vec(), [0x02, 0xDE, 0xAD]);
    }

    #[test]
    fn test_mixed_width_roundtrip() {
        let fields: [(u32, u8); 6] = [
            (0b101, 3),
            (0xFFFF, 16),
            (0, 1),
            (0x12345, 20),
            (1, 1),
            (0x7F, 7),
        ];
        let mut writer = BitWriter::new();
        for (value, width) in fields {
            writer.write_bits(value, width).unwrap();
        }
        let bytes = writer.finish().unwrap().into_vec();

        let mut reader = BitReader::new(Cursor::new(bytes));
        for (value, width) in fields {
            assert_eq!(reader.read_bits(width).unwrap(), value, "{} bits", width);
        }
    }

    #[test]
    fn test_reader_align_then_read_bytes() {
        let mut reader = BitReader::new(Cursor::new(vec![0xFFu8, 0xAA, 0x55]));
        reader.read_bits(3).unwrap();
        reader.align_to_byte();
        let mut buf = [0u8; 2];
        reader.read_bytes(&mut buf).unwrap();
        assert_eq!(buf, [0xAA, 0x55]);
    }
}
