//! Variable width codes packed LSB-first into GIF sub-blocks
use std::io::{self, Write};

use crate::traits::WriteBytesExt;
use crate::types::MAX_SUB_BLOCK;

use super::Code;

/// Packs codes into length-prefixed sub-blocks of up to 255 bytes.
pub struct CodeWriter<W: Write> {
    w: W,
    acc: u32,
    bits: u8,
    block: [u8; MAX_SUB_BLOCK],
    len: usize,
}

impl<W: Write> CodeWriter<W> {
    pub fn new(w: W) -> CodeWriter<W> {
        CodeWriter { w, acc: 0, bits: 0, block: [0; MAX_SUB_BLOCK], len: 0 }
    }

    /// Appends the `width` low bits of `code`.
    pub fn write_code(&mut self, code: Code, width: u8) -> io::Result<()> {
        let mask = (1u32 << width) - 1;
        self.acc |= (code as u32 & mask) << self.bits;
        self.bits += width;
        while self.bits >= 8 {
            self.push_byte(self.acc as u8)?;
            self.acc >>= 8;
            self.bits -= 8;
        }
        Ok(())
    }

    fn push_byte(&mut self, byte: u8) -> io::Result<()> {
        self.block[self.len] = byte;
        self.len += 1;
        if self.len == MAX_SUB_BLOCK {
            self.write_block()?;
        }
        Ok(())
    }

    fn write_block(&mut self) -> io::Result<()> {
        if self.len > 0 {
            self.w.write_le(self.len as u8)?;
            self.w.write_all(&self.block[..self.len])?;
            self.len = 0;
        }
        Ok(())
    }

    /// Pads the last byte with zero bits, writes the pending sub-block and
    /// the zero-length terminator.
    pub fn finish(mut self) -> io::Result<W> {
        if self.bits > 0 {
            self.push_byte(self.acc as u8)?;
            self.acc = 0;
            self.bits = 0;
        }
        self.write_block()?;
        self.w.write_le(0u8)?;
        Ok(self.w)
    }
}

/// Unpacks codes from the payload bytes of consecutive sub-blocks.
///
/// Bits left over from a previous call are kept, so the width may change
/// from one code to the next.
#[derive(Debug, Default)]
pub struct CodeReader {
    acc: u32,
    bits: u8,
}

impl CodeReader {
    pub fn new() -> CodeReader {
        CodeReader::default()
    }

    /// Takes bytes from `buf` until `width` bits are buffered.
    ///
    /// Returns the number of bytes consumed and the code, if enough bits
    /// were available.
    pub fn read_code(&mut self, buf: &[u8], width: u8) -> (usize, Option<Code>) {
        let mut consumed = 0;
        for &byte in buf {
            if self.bits >= width {
                break;
            }
            self.acc |= (byte as u32) << self.bits;
            self.bits += 8;
            consumed += 1;
        }
        if self.bits < width {
            return (consumed, None);
        }
        let code = (self.acc & ((1 << width) - 1)) as Code;
        self.acc >>= width;
        self.bits -= width;
        (consumed, Some(code))
    }

    /// Bits received but not yet handed out as codes
    pub fn buffered_bits(&self) -> u8 {
        self.bits
    }
}

#[cfg(test)]
mod test {
    use super::{CodeReader, CodeWriter};

    #[test]
    fn packs_lsb_first() {
        let mut w = CodeWriter::new(Vec::new());
        w.write_code(4, 3).unwrap();
        w.write_code(0, 3).unwrap();
        w.write_code(5, 3).unwrap();
        assert_eq!(w.finish().unwrap(), [2, 0x44, 0x01, 0]);
    }

    #[test]
    fn splits_sub_blocks() {
        let mut w = CodeWriter::new(Vec::new());
        for i in 0..300u16 {
            w.write_code(i & 0xFF, 8).unwrap();
        }
        let out = w.finish().unwrap();
        assert_eq!(out.len(), 1 + 255 + 1 + 45 + 1);
        assert_eq!(out[0], 255);
        assert_eq!(out[256], 45);
        assert_eq!(out[257], 255);
        assert_eq!(*out.last().unwrap(), 0);
    }

    #[test]
    fn empty_stream_is_only_terminator() {
        let w = CodeWriter::new(Vec::new());
        assert_eq!(w.finish().unwrap(), [0]);
    }

    #[test]
    fn width_changes_between_codes() {
        let codes: Vec<(u16, u8)> = vec![(4, 3), (7, 3), (9, 4), (0xABC, 12), (1, 5), (300, 9)];
        let mut w = CodeWriter::new(Vec::new());
        for &(code, width) in &codes {
            w.write_code(code, width).unwrap();
        }
        let out = w.finish().unwrap();
        let payload = &out[1..1 + out[0] as usize];

        let mut r = CodeReader::new();
        let mut buf = payload;
        for &(code, width) in &codes {
            let (consumed, read) = r.read_code(buf, width);
            buf = &buf[consumed..];
            assert_eq!(read, Some(code));
        }
        assert!(r.buffered_bits() < 8);
    }

    #[test]
    fn needs_more_bytes() {
        let mut r = CodeReader::new();
        assert_eq!(r.read_code(&[0xFF], 12), (1, None));
        assert_eq!(r.read_code(&[0x0F], 12), (1, Some(0xFFF)));
        assert_eq!(r.buffered_bits(), 4);
    }
}
